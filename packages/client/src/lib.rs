//! Reconnecting messaging client for the Kakehashi project workspace.
//!
//! The heart of this crate is the [`controller::ConnectionController`]
//! state machine: it owns the WebSocket lifecycle (connect → join →
//! connected ⇄ reconnecting), replays `join_project` on every reconnect,
//! publishes server events to a multi-subscriber bus, and exposes a
//! connection-health snapshot for UI banners.

pub mod controller;
pub mod dedup;
pub mod error;
pub mod events;
pub mod formatter;
pub mod input;
pub mod session;
pub mod typing;
pub mod ui;
