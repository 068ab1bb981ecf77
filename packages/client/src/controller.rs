//! Client connection controller with reconnection support.
//!
//! State machine: `disconnected → connecting → connected ⇄ reconnecting`,
//! terminal `disconnected` once the retry budget is exhausted or the join
//! is rejected. On every (re)connect the session replays `join_project`
//! with the full identity; the server resolves a rejoin as "last join
//! wins". A successful reconnect resets the attempt counter and stamps
//! `last_connected`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};

use kakehashi_server::infrastructure::dto::websocket::{
    ClientEvent, JoinProjectPayload, ServerEvent,
};

use crate::{
    dedup::MessageDeduper,
    error::ClientError,
    events::EventBus,
    session::{SessionEnd, run_client_session},
};

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_INTERVAL_SECS: u64 = 5;

/// Heartbeat cadence expected by the server's liveness monitor
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Connection health snapshot, published through a watch channel so the UI
/// can render a reconnect banner.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionHealth {
    pub state: ConnectionState,
    pub is_connected: bool,
    pub is_reconnecting: bool,
    /// Unix millis of the last successful connect
    pub last_connected: Option<i64>,
    pub reconnect_attempts: u32,
}

impl ConnectionHealth {
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            is_connected: false,
            is_reconnecting: false,
            last_connected: None,
            reconnect_attempts: 0,
        }
    }
}

/// Full identity replayed in `join_project` on every (re)connect
#[derive(Debug, Clone)]
pub struct JoinIdentity {
    pub project_id: String,
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    pub share_token: Option<String>,
}

impl JoinIdentity {
    pub fn join_event(&self) -> ClientEvent {
        ClientEvent::JoinProject(JoinProjectPayload {
            project_id: self.project_id.clone(),
            user_id: self.user_id.clone(),
            user_type: self.user_type.clone(),
            user_name: self.user_name.clone(),
            share_token: self.share_token.clone(),
        })
    }
}

/// Retry/heartbeat configuration
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: Duration::from_secs(RECONNECT_INTERVAL_SECS),
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
        }
    }
}

/// Check if the client should exit immediately based on the error type.
///
/// A rejected join means the token or session is bad; reconnecting with
/// the same identity cannot succeed.
pub fn should_exit_immediately(error: &ClientError) -> bool {
    matches!(error, ClientError::AuthRejected(_))
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `error` - The client error that occurred
/// * `current_attempt` - The current reconnection attempt count (0-indexed)
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(
    error: &ClientError,
    current_attempt: u32,
    max_attempts: u32,
) -> bool {
    if should_exit_immediately(error) {
        return false;
    }
    current_attempt < max_attempts
}

/// The client-side counterpart of the server's connection gateway.
///
/// Owns the socket lifecycle explicitly (created by the caller, torn down
/// when `run` returns) instead of living in a module-level singleton.
pub struct ConnectionController {
    url: String,
    identity: JoinIdentity,
    config: ControllerConfig,
    bus: EventBus,
    health_tx: watch::Sender<ConnectionHealth>,
    /// Seen-message set survives reconnects so redelivered messages stay
    /// de-duplicated
    deduper: Arc<Mutex<MessageDeduper>>,
}

impl ConnectionController {
    pub fn new(url: String, identity: JoinIdentity) -> Self {
        Self::with_config(url, identity, ControllerConfig::default())
    }

    pub fn with_config(url: String, identity: JoinIdentity, config: ControllerConfig) -> Self {
        let (health_tx, _) = watch::channel(ConnectionHealth::disconnected());
        Self {
            url,
            identity,
            config,
            bus: EventBus::new(),
            health_tx,
            deduper: Arc::new(Mutex::new(MessageDeduper::new())),
        }
    }

    /// Subscribe to server events (multi-subscriber).
    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.bus.subscribe()
    }

    /// Watch the connection health snapshot.
    pub fn health(&self) -> watch::Receiver<ConnectionHealth> {
        self.health_tx.subscribe()
    }

    /// Run the connection lifecycle until the user exits, the join is
    /// rejected, or the retry budget is exhausted.
    ///
    /// `outbound` carries the events the local UI wants to send; closing
    /// it ends the session normally.
    pub async fn run(
        &self,
        mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    ) -> Result<(), ClientError> {
        let mut attempts: u32 = 0;

        loop {
            self.health_tx.send_modify(|health| {
                health.is_connected = false;
                health.reconnect_attempts = attempts;
                if attempts == 0 {
                    health.state = ConnectionState::Connecting;
                    health.is_reconnecting = false;
                } else {
                    health.state = ConnectionState::Reconnecting;
                    health.is_reconnecting = true;
                }
            });

            tracing::info!(
                "Attempting to connect to {} as '{}' (attempt {}/{})",
                self.url,
                self.identity.user_id,
                attempts + 1,
                self.config.max_reconnect_attempts,
            );

            let result = run_client_session(
                &self.url,
                &self.identity,
                &self.bus,
                &self.health_tx,
                &mut outbound,
                self.deduper.clone(),
                self.config.heartbeat_interval,
            )
            .await;

            match result {
                Ok(SessionEnd::UserExit) => {
                    tracing::info!("Client session ended normally");
                    self.set_disconnected();
                    return Ok(());
                }
                Ok(SessionEnd::ConnectionLost) => {
                    // The connection had been established, so this loss
                    // starts a fresh reconnect cycle
                    tracing::warn!("Connection lost, reconnecting");
                    attempts = 1;
                }
                Err(e) => {
                    if should_exit_immediately(&e) {
                        tracing::error!("{}", e);
                        self.set_disconnected();
                        return Err(e);
                    }
                    attempts += 1;
                    if !should_attempt_reconnect(&e, attempts, self.config.max_reconnect_attempts)
                    {
                        tracing::error!(
                            "Failed to reconnect after {} attempts",
                            self.config.max_reconnect_attempts,
                        );
                        self.set_disconnected();
                        return Err(e);
                    }
                    tracing::warn!("Connection failed: {}", e);
                }
            }

            tracing::info!(
                "Reconnecting in {} seconds... (attempt {}/{})",
                self.config.reconnect_interval.as_secs(),
                attempts + 1,
                self.config.max_reconnect_attempts,
            );
            tokio::time::sleep(self.config.reconnect_interval).await;
        }
    }

    fn set_disconnected(&self) {
        self.health_tx.send_modify(|health| {
            health.state = ConnectionState::Disconnected;
            health.is_connected = false;
            health.is_reconnecting = false;
        });
    }
}
