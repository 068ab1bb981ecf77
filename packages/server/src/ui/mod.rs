//! WebSocket messaging server implementation.

mod handler;
mod monitor;
mod notify;
mod server;
mod signal;
pub mod state;

pub use monitor::LivenessConfig;
pub use server::Server;
