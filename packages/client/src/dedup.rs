//! Client-side message de-duplication.
//!
//! Delivery is at-least-once and the sender receives its own echo, so the
//! client keeps the set of seen message ids and drops everything it has
//! already observed.

use std::collections::HashSet;

/// Set of message ids this client has already observed.
#[derive(Debug, Default)]
pub struct MessageDeduper {
    seen: HashSet<String>,
}

impl MessageDeduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message id. Returns `true` on first sighting, `false` for
    /// duplicates (echoes, redeliveries after reconnect).
    pub fn observe(&mut self, message_id: &str) -> bool {
        self.seen.insert(message_id.to_string())
    }
}
