//! Error types for the messaging client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server refused the join (invalid token or session).
    /// Reconnecting cannot help, so the client exits immediately.
    #[error("join rejected by server: {0}")]
    AuthRejected(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
}
