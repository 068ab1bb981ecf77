//! Shared utilities for the kakehashi project messaging system.
//!
//! This crate holds the pieces both the server and the client binaries
//! need: logging setup and time utilities.

pub mod logger;
pub mod time;
