//! Liveness monitor: evicts connections that stopped sending heartbeats.
//!
//! Each connection is expected to send an application-level `ping` every
//! `ping_interval`; the handler stamps `last_seen` and replies `pong`. This
//! task sweeps all rooms once per interval and evicts every connection
//! whose `last_seen` is older than `ping_interval * max_missed`, through
//! the same leave path as a transport close. An evicted connection's later
//! close resolves to a no-op, so `user_left` goes out exactly once.

use std::sync::Arc;
use std::time::Duration;

use kakehashi_shared::time::Clock as _;

use crate::domain::{RoomRegistry as _, Timestamp};
use crate::usecase::LeaveReason;

use super::notify;
use super::state::AppState;

/// Heartbeat configuration
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    /// Expected interval between client pings
    pub ping_interval: Duration,
    /// Number of missed intervals after which a connection is evicted
    pub max_missed: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            max_missed: 2,
        }
    }
}

impl LivenessConfig {
    /// How far back `last_seen` may lag before a connection counts as stale
    fn cutoff_millis(&self) -> i64 {
        self.ping_interval.as_millis() as i64 * i64::from(self.max_missed)
    }
}

/// Spawn the sweeper task. Aborted by the server on shutdown.
pub fn spawn_liveness_monitor(
    state: Arc<AppState>,
    config: LivenessConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + config.ping_interval;
        let mut ticker = tokio::time::interval_at(start, config.ping_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let deadline = Timestamp::new(state.clock.now_utc_millis() - config.cutoff_millis());
            let stale = state.registry.stale_connections(deadline).await;
            for connection in stale {
                tracing::info!(
                    "Evicting connection '{}' ({}) from project '{}': missed heartbeats",
                    connection.id,
                    connection.participant.user_id,
                    connection.project_id,
                );
                notify::evict(
                    &state,
                    &connection.project_id,
                    &connection.id,
                    LeaveReason::TimedOut,
                )
                .await;
            }
        }
    })
}
