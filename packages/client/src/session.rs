//! One WebSocket session: connect, replay join, pump events both ways.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};

use kakehashi_server::infrastructure::dto::websocket::{ClientEvent, ServerEvent};
use kakehashi_shared::time::get_utc_timestamp;

use crate::{
    controller::{ConnectionHealth, ConnectionState, JoinIdentity},
    dedup::MessageDeduper,
    error::ClientError,
    events::EventBus,
};

/// How a session ended (connect/auth failures are `Err` instead)
#[derive(Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// The outbound channel closed: the user is done, don't reconnect
    UserExit,
    /// The transport dropped after the connection was established
    ConnectionLost,
}

/// Why the read task stopped
#[derive(Debug)]
enum ReadEnd {
    ConnectionLost,
    /// The server replied with an `error` event before the first presence
    /// snapshot: the join was refused
    AuthRejected(String),
}

/// Run one client session over a fresh WebSocket connection.
///
/// Sends `join_project` with the full identity immediately after the
/// transport opens, then pumps inbound events to the bus (de-duplicating
/// `new_message` by id) and outbound events to the socket, emitting an
/// application-level `ping` every `heartbeat_interval`.
pub async fn run_client_session(
    url: &str,
    identity: &JoinIdentity,
    bus: &EventBus,
    health_tx: &watch::Sender<ConnectionHealth>,
    outbound: &mut mpsc::UnboundedReceiver<ClientEvent>,
    deduper: Arc<Mutex<MessageDeduper>>,
    heartbeat_interval: Duration,
) -> Result<SessionEnd, ClientError> {
    let (ws_stream, _response) = connect_async(url)
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    tracing::info!("Connected to messaging server");

    // Connection established: stamp health and reset the attempt counter
    health_tx.send_modify(|health| {
        health.state = ConnectionState::Connected;
        health.is_connected = true;
        health.is_reconnecting = false;
        health.last_connected = Some(get_utc_timestamp());
        health.reconnect_attempts = 0;
    });

    let (mut write, mut read) = ws_stream.split();

    // Replay join with the full identity on every (re)connect; the server
    // resolves a rejoin as "last join wins"
    let join_json = serde_json::to_string(&identity.join_event()).unwrap();
    write
        .send(Message::Text(join_json.into()))
        .await
        .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

    // Read task: parse server events and publish them to the bus
    let bus = bus.clone();
    let mut read_task = tokio::spawn(async move {
        let mut joined = false;
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            match &event {
                                // The first presence snapshot acknowledges the join
                                ServerEvent::PresenceUpdate(_) => joined = true,
                                ServerEvent::Error(payload) if !joined => {
                                    return ReadEnd::AuthRejected(payload.reason.clone());
                                }
                                ServerEvent::NewMessage(message) => {
                                    // at-least-once delivery: drop echoes and
                                    // redelivered copies by message id
                                    if !deduper.lock().unwrap().observe(&message.id) {
                                        tracing::debug!(
                                            "Dropped duplicate message '{}'",
                                            message.id
                                        );
                                        continue;
                                    }
                                }
                                _ => {}
                            }
                            bus.publish(event);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to parse server event: {}", e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    return ReadEnd::ConnectionLost;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    return ReadEnd::ConnectionLost;
                }
                _ => {}
            }
        }
        ReadEnd::ConnectionLost
    });

    // Heartbeat ticker (first ping one interval after connect)
    let start = tokio::time::Instant::now() + heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(start, heartbeat_interval);

    // Write side runs in this task so the outbound receiver survives
    // reconnects
    loop {
        tokio::select! {
            end = &mut read_task => {
                return match end.unwrap_or(ReadEnd::ConnectionLost) {
                    ReadEnd::AuthRejected(reason) => Err(ClientError::AuthRejected(reason)),
                    ReadEnd::ConnectionLost => Ok(SessionEnd::ConnectionLost),
                };
            }
            maybe_event = outbound.recv() => {
                match maybe_event {
                    Some(event) => {
                        let json = serde_json::to_string(&event).unwrap();
                        if write.send(Message::Text(json.into())).await.is_err() {
                            tracing::warn!("Failed to send event");
                            read_task.abort();
                            return Ok(SessionEnd::ConnectionLost);
                        }
                    }
                    None => {
                        // Input channel closed: the user is done
                        read_task.abort();
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(SessionEnd::UserExit);
                    }
                }
            }
            _ = heartbeat.tick() => {
                let json = serde_json::to_string(&ClientEvent::Ping).unwrap();
                if write.send(Message::Text(json.into())).await.is_err() {
                    tracing::warn!("Failed to send heartbeat");
                    read_task.abort();
                    return Ok(SessionEnd::ConnectionLost);
                }
            }
        }
    }
}
