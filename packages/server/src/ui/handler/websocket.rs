//! WebSocket connection handlers.
//!
//! A connection starts unauthenticated: the first accepted event is
//! `join_project`, which runs the gateway (auth + last-join-wins). Until
//! then, room-scoped events are refused with an `error` event. Validation
//! failures are replied to the offending connection only; an auth failure
//! closes the connection.
//!
//! Channel ownership drives the teardown: before the join, the reader task
//! holds the only sender; after the join, the pusher registration does.
//! Unregistering the connection (explicit leave, heartbeat eviction,
//! superseding rejoin) therefore closes the channel, which ends the writer
//! task after it drained the queued frames and tears the socket down.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{
        Connection, MessageContent, MessageDraft, MessageId, MessageKind, MessagePriority,
        MessagePusher as _, Participant, ProjectId, PusherChannel, RoomRegistry as _, ShareToken,
        Timestamp, UserId, UserName, UserType,
    },
    infrastructure::dto::websocket::{
        BulkMessagesReadPayload, ClientEvent, JoinProjectPayload, MarkMessageReadPayload,
        MarkMessagesReadPayload, MessageReadPayload, SendMessagePayload, ServerEvent,
        TypingStartPayload, UserJoinedPayload, UserTypingPayload,
    },
    ui::{notify, state::AppState},
    usecase::{JoinRequest, LeaveReason},
};

use kakehashi_shared::time::Clock as _;

/// Window for flushing queued frames after the reader stopped
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// The connection's joined state, shared between the reader task and the
/// disconnect path.
type JoinedSlot = Arc<std::sync::Mutex<Option<Connection>>>;

/// Whether the reader loop should keep the socket open after an event.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Spawns a task that receives messages from the rx channel and pushes them
/// to the WebSocket sender.
///
/// This function handles the outbound message flow: events addressed to
/// this connection (via its channel) are written to the socket. When every
/// sender is gone the task drains the remaining frames and ends, tearing
/// the socket down.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();

    // Channel carrying outbound events for this connection. The reader
    // task owns the pre-join sender; a successful join hands ownership to
    // the pusher registration.
    let (tx, rx) = mpsc::unbounded_channel();
    let joined: JoinedSlot = Arc::new(std::sync::Mutex::new(None));

    let mut send_task = pusher_loop(rx, sender);

    let state_clone = state.clone();
    let joined_clone = joined.clone();

    // Reader task: parse and dispatch inbound events
    let mut recv_task = tokio::spawn(async move {
        let mut reply_tx = Some(tx);
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::error!("WebSocket error: {}", e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let flow = handle_event(
                                &state_clone,
                                &mut reply_tx,
                                &joined_clone,
                                event,
                            )
                            .await;
                            if flow == Flow::Close {
                                break;
                            }
                        }
                        Err(e) => {
                            // Malformed payloads only concern the offender
                            tracing::warn!("Failed to parse event as JSON: {}", e);
                            send_error(
                                &state_clone,
                                &reply_tx,
                                &joined_clone,
                                "malformed payload",
                            )
                            .await;
                        }
                    }
                }
                Message::Ping(_) => {
                    tracing::debug!("Received transport ping");
                    // Ping/pong is handled automatically by the WebSocket protocol
                }
                Message::Close(_) => {
                    tracing::info!("Connection requested close");
                    break;
                }
                _ => {}
            }
        }
    });

    let send_done = tokio::select! {
        _ = &mut recv_task => false,
        _ = &mut send_task => {
            recv_task.abort();
            true
        }
    };

    // Disconnect path: shared with heartbeat timeouts and write failures.
    // No-op when the connection was already evicted (superseded rejoin or
    // liveness timeout). Unregistering drops the last channel sender.
    let departed = joined.lock().unwrap().take();
    if let Some(connection) = departed {
        notify::evict(
            &state,
            &connection.project_id,
            &connection.id,
            LeaveReason::Disconnected,
        )
        .await;
    }

    // Let the writer drain queued frames (e.g. a join refusal) before the
    // socket drops
    if !send_done {
        let _ = tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await;
        send_task.abort();
    }
}

fn joined_connection(joined: &JoinedSlot) -> Option<Connection> {
    joined.lock().unwrap().clone()
}

/// Reply to this connection: through the pre-join channel if it still owns
/// one, through the pusher registration otherwise.
async fn send_error(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
    reason: &str,
) {
    let event = notify::error_event(reason);
    match reply_tx {
        Some(tx) => notify::reply(tx, &event),
        None => {
            if let Some(connection) = joined_connection(joined) {
                let json = serde_json::to_string(&event).unwrap();
                if let Err(e) = state.message_pusher.push_to(&connection.id, &json).await {
                    tracing::debug!("Failed to push error event: {}", e);
                }
            }
        }
    }
}

async fn handle_event(
    state: &Arc<AppState>,
    reply_tx: &mut Option<PusherChannel>,
    joined: &JoinedSlot,
    event: ClientEvent,
) -> Flow {
    match event {
        ClientEvent::JoinProject(payload) => handle_join(state, reply_tx, joined, payload).await,
        ClientEvent::SendMessage(payload) => {
            handle_send_message(state, reply_tx, joined, payload).await;
            Flow::Continue
        }
        ClientEvent::TypingStart(payload) => {
            handle_typing_start(state, reply_tx, joined, payload).await;
            Flow::Continue
        }
        ClientEvent::TypingStop(_) => {
            handle_typing_stop(state, reply_tx, joined).await;
            Flow::Continue
        }
        ClientEvent::MarkMessageRead(payload) => {
            handle_mark_message_read(state, reply_tx, joined, payload).await;
            Flow::Continue
        }
        ClientEvent::MarkMessagesRead(payload) => {
            handle_mark_messages_read(state, reply_tx, joined, payload).await;
            Flow::Continue
        }
        ClientEvent::Ping => {
            handle_ping(state, reply_tx, joined).await;
            Flow::Continue
        }
    }
}

fn parse_join_request(payload: JoinProjectPayload) -> Result<JoinRequest, String> {
    let project_id = ProjectId::new(payload.project_id).map_err(|e| e.to_string())?;
    let user_type = UserType::parse(&payload.user_type).map_err(|e| e.to_string())?;
    let participant = Participant::new(
        UserId::new(payload.user_id).map_err(|e| e.to_string())?,
        user_type,
        UserName::new(payload.user_name).map_err(|e| e.to_string())?,
    );
    let share_token = payload
        .share_token
        .map(ShareToken::new)
        .transpose()
        .map_err(|e| e.to_string())?;
    Ok(JoinRequest {
        project_id,
        participant,
        share_token,
    })
}

async fn handle_join(
    state: &Arc<AppState>,
    reply_tx: &mut Option<PusherChannel>,
    joined: &JoinedSlot,
    payload: JoinProjectPayload,
) -> Flow {
    if joined.lock().unwrap().is_some() {
        send_error(state, reply_tx, joined, "already joined a project").await;
        return Flow::Continue;
    }
    let Some(tx) = reply_tx.clone() else {
        // Cannot happen: the slot is only emptied by a successful join
        return Flow::Close;
    };

    let request = match parse_join_request(payload) {
        Ok(request) => request,
        Err(reason) => {
            notify::reply(&tx, &notify::error_event(reason));
            return Flow::Continue;
        }
    };
    let project_id = request.project_id.clone();

    match state
        .join_project_usecase
        .execute(request, tx.clone())
        .await
    {
        Ok(joined_room) => {
            let connection = joined_room.connection.clone();
            tracing::info!(
                "User '{}' ({}) joined project '{}' as connection '{}'",
                connection.participant.user_id,
                connection.participant.user_type,
                project_id,
                connection.id,
            );
            *joined.lock().unwrap() = Some(connection.clone());
            // The pusher registration owns the channel from here on
            *reply_tx = None;

            // Full presence snapshot to everyone, including the joiner
            let presence = notify::presence_event(joined_room.presence);
            notify::reply(&tx, &presence);
            drop(tx);
            notify::broadcast(
                state,
                &project_id,
                joined_room.notify_targets.clone(),
                &presence,
            )
            .await;

            // user_joined only to the other members
            let user_joined = ServerEvent::UserJoined(UserJoinedPayload {
                user_id: connection.participant.user_id.as_str().to_string(),
                user_type: connection.participant.user_type.as_str().to_string(),
                user_name: connection.participant.user_name.as_str().to_string(),
                joined_at: connection.joined_at.value(),
            });
            notify::broadcast(state, &project_id, joined_room.notify_targets, &user_joined).await;

            Flow::Continue
        }
        Err(e) => {
            tracing::warn!("Join refused for project '{}': {}", project_id, e);
            notify::reply(&tx, &notify::error_event(e.to_string()));
            Flow::Close
        }
    }
}

/// Resolve the joined connection, checking that the event targets the
/// joined project. Replies with an `error` event and returns None otherwise.
async fn require_joined(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
    event_project_id: &str,
) -> Option<Connection> {
    let Some(connection) = joined_connection(joined) else {
        send_error(state, reply_tx, joined, "join a project first").await;
        return None;
    };
    if connection.project_id.as_str() != event_project_id {
        send_error(
            state,
            reply_tx,
            joined,
            "event does not target the joined project",
        )
        .await;
        return None;
    }
    Some(connection)
}

async fn handle_send_message(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
    payload: SendMessagePayload,
) {
    let Some(connection) = require_joined(state, reply_tx, joined, &payload.project_id).await
    else {
        return;
    };

    let content = match MessageContent::new(payload.content) {
        Ok(content) => content,
        Err(e) => {
            send_error(state, reply_tx, joined, &e.to_string()).await;
            return;
        }
    };
    let parent_message_id = match payload
        .parent_message_id
        .as_deref()
        .map(MessageId::parse)
        .transpose()
    {
        Ok(id) => id,
        Err(e) => {
            send_error(state, reply_tx, joined, &e.to_string()).await;
            return;
        }
    };
    let thread_id = match payload.thread_id.as_deref().map(MessageId::parse).transpose() {
        Ok(id) => id,
        Err(e) => {
            send_error(state, reply_tx, joined, &e.to_string()).await;
            return;
        }
    };

    // The authenticated join identity is the source of truth for the
    // sender; senderName/senderType in the payload are not trusted.
    let draft = MessageDraft {
        project_id: connection.project_id.clone(),
        sender: connection.participant.clone(),
        content,
        kind: payload
            .message_type
            .as_deref()
            .map(MessageKind::parse_lenient)
            .unwrap_or_default(),
        priority: payload
            .priority
            .as_deref()
            .map(MessagePriority::parse_lenient)
            .unwrap_or_default(),
        parent_message_id,
        thread_id,
    };

    match state.send_message_usecase.execute(draft).await {
        Ok(sent) => {
            tracing::info!(
                "Broadcasting message '{}' from '{}' to {} connection(s) in project '{}'",
                sent.message.id,
                connection.participant.user_id,
                sent.targets.len(),
                connection.project_id,
            );
            let event = ServerEvent::NewMessage(sent.message.into());
            notify::broadcast(state, &connection.project_id, sent.targets, &event).await;
        }
        Err(e) => {
            // Send failures are reported inline to the sender only
            tracing::warn!(
                "Failed to send message in project '{}': {}",
                connection.project_id,
                e
            );
            send_error(state, reply_tx, joined, "failed to send message, please retry").await;
        }
    }
}

async fn handle_typing_start(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
    payload: TypingStartPayload,
) {
    let Some(connection) = require_joined(state, reply_tx, joined, &payload.project_id).await
    else {
        return;
    };
    let participant = connection.participant.clone();

    // The expiry event is prebuilt so the authoritative server timer can
    // broadcast it without touching DTO code.
    let expiry_event = ServerEvent::UserTyping(UserTypingPayload {
        user_id: participant.user_id.as_str().to_string(),
        user_type: participant.user_type.as_str().to_string(),
        user_name: participant.user_name.as_str().to_string(),
        is_typing: false,
    });
    let expiry_json = serde_json::to_string(&expiry_event).unwrap();

    let started = state
        .typing_usecase
        .start(
            &connection.project_id,
            participant.clone(),
            connection.id,
            expiry_json,
        )
        .await;

    if started.is_some() {
        let typing = ServerEvent::UserTyping(UserTypingPayload {
            user_id: participant.user_id.as_str().to_string(),
            user_type: participant.user_type.as_str().to_string(),
            user_name: participant.user_name.as_str().to_string(),
            is_typing: true,
        });
        let targets = state
            .registry
            .connection_ids_except(&connection.project_id, &connection.id)
            .await;
        notify::broadcast(state, &connection.project_id, targets, &typing).await;
    }
}

async fn handle_typing_stop(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
) {
    let Some(connection) = joined_connection(joined) else {
        send_error(state, reply_tx, joined, "join a project first").await;
        return;
    };
    let participant = &connection.participant;

    let stopped = state
        .typing_usecase
        .stop(
            &connection.project_id,
            &participant.user_id,
            participant.user_type,
        )
        .await;

    if stopped {
        let typing = ServerEvent::UserTyping(UserTypingPayload {
            user_id: participant.user_id.as_str().to_string(),
            user_type: participant.user_type.as_str().to_string(),
            user_name: participant.user_name.as_str().to_string(),
            is_typing: false,
        });
        let targets = state
            .registry
            .connection_ids_except(&connection.project_id, &connection.id)
            .await;
        notify::broadcast(state, &connection.project_id, targets, &typing).await;
    }
}

async fn handle_mark_message_read(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
    payload: MarkMessageReadPayload,
) {
    let Some(connection) = require_joined(state, reply_tx, joined, &payload.project_id).await
    else {
        return;
    };

    let message_id = match MessageId::parse(&payload.message_id) {
        Ok(id) => id,
        Err(e) => {
            send_error(state, reply_tx, joined, &e.to_string()).await;
            return;
        }
    };

    match state
        .mark_read_usecase
        .execute(
            &connection.project_id,
            &message_id,
            connection.participant.clone(),
        )
        .await
    {
        Ok(outcome) => {
            let event = ServerEvent::MessageRead(MessageReadPayload {
                message_id: outcome.receipt.message_id.to_string(),
                read_by: outcome.receipt.read_by.as_str().to_string(),
                read_by_type: outcome.receipt.read_by_type.as_str().to_string(),
                read_at: outcome.receipt.read_at.value(),
            });
            notify::broadcast(state, &connection.project_id, outcome.targets, &event).await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to mark message '{}' read in project '{}': {}",
                payload.message_id,
                connection.project_id,
                e
            );
            send_error(state, reply_tx, joined, &e.to_string()).await;
        }
    }
}

async fn handle_mark_messages_read(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
    payload: MarkMessagesReadPayload,
) {
    let Some(connection) = require_joined(state, reply_tx, joined, &payload.project_id).await
    else {
        return;
    };

    let sender_type = match UserType::parse(&payload.sender_type) {
        Ok(user_type) => user_type,
        Err(e) => {
            send_error(state, reply_tx, joined, &e.to_string()).await;
            return;
        }
    };

    match state
        .mark_read_usecase
        .execute_bulk(
            &connection.project_id,
            connection.participant.clone(),
            sender_type,
        )
        .await
    {
        Ok(outcome) => {
            let event = ServerEvent::BulkMessagesRead(BulkMessagesReadPayload {
                count: outcome.count,
                read_at: outcome.read_at.value(),
                read_by: outcome.reader.user_id.as_str().to_string(),
                read_by_type: outcome.reader.user_type.as_str().to_string(),
                sender_type: outcome.sender_type.as_str().to_string(),
                is_bulk: true,
            });
            notify::broadcast(state, &connection.project_id, outcome.targets, &event).await;
        }
        Err(e) => {
            tracing::warn!(
                "Failed to bulk-mark messages read in project '{}': {}",
                connection.project_id,
                e
            );
            send_error(state, reply_tx, joined, &e.to_string()).await;
        }
    }
}

async fn handle_ping(
    state: &Arc<AppState>,
    reply_tx: &Option<PusherChannel>,
    joined: &JoinedSlot,
) {
    match joined_connection(joined) {
        Some(connection) => {
            let now = Timestamp::new(state.clock.now_utc_millis());
            state
                .registry
                .touch(&connection.project_id, &connection.id, now)
                .await;
            let json = serde_json::to_string(&ServerEvent::Pong).unwrap();
            if let Err(e) = state.message_pusher.push_to(&connection.id, &json).await {
                tracing::debug!("Failed to push pong: {}", e);
            }
        }
        None => {
            if let Some(tx) = reply_tx {
                notify::reply(tx, &ServerEvent::Pong);
            }
        }
    }
}
