//! Data Transfer Objects (DTOs) for the messaging system.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket wire events
//! - `http`: HTTP API response DTOs

pub mod conversion;
pub mod http;
pub mod websocket;
