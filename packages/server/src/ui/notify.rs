//! Event fan-out helpers shared by the WebSocket handler and the liveness
//! monitor.
//!
//! Broadcast failures mean the receiving task of that connection is gone,
//! so the failed connection is evicted through the shared leave path. The
//! departure announcements themselves use a log-only broadcast: a dead
//! socket among the remaining members is picked up by the next broadcast
//! or by the liveness monitor, which keeps the eviction cascade bounded.

use std::sync::Arc;

use crate::domain::{
    ConnectionId, MessagePusher as _, PresenceEntry, ProjectId, PusherChannel,
};
use crate::infrastructure::dto::websocket::{
    ErrorPayload, PresenceUpdatePayload, ServerEvent, UserLeftPayload, UserTypingPayload,
};
use crate::usecase::{Departure, LeaveReason};

use super::state::AppState;

/// Build an `error{reason}` event.
pub fn error_event(reason: impl Into<String>) -> ServerEvent {
    ServerEvent::Error(ErrorPayload {
        reason: reason.into(),
    })
}

/// Build a full-snapshot `presence_update` event.
pub fn presence_event(presence: Vec<PresenceEntry>) -> ServerEvent {
    ServerEvent::PresenceUpdate(PresenceUpdatePayload {
        users: presence.into_iter().map(Into::into).collect(),
    })
}

/// Send an event directly to this connection's own channel.
///
/// Used for replies that must reach the connection before it is registered
/// with the pusher (join refusals) and for connection-scoped replies
/// (`pong`, validation errors).
pub fn reply(tx: &PusherChannel, event: &ServerEvent) {
    let json = serde_json::to_string(event).unwrap();
    if tx.send(json).is_err() {
        tracing::debug!("Failed to reply: connection channel already closed");
    }
}

/// Broadcast an event and evict every connection whose channel is gone.
pub async fn broadcast(
    state: &Arc<AppState>,
    project_id: &ProjectId,
    targets: Vec<ConnectionId>,
    event: &ServerEvent,
) {
    let json = serde_json::to_string(event).unwrap();
    let outcome = state.message_pusher.broadcast(targets, &json).await;
    for failed in outcome.failed {
        evict(state, project_id, &failed, LeaveReason::WriteFailed).await;
    }
}

/// Evict a connection through the shared leave path and announce the
/// departure to the remaining members. No-op if the connection already
/// left (the leave usecase resolves only once per connection).
pub async fn evict(
    state: &Arc<AppState>,
    project_id: &ProjectId,
    connection_id: &ConnectionId,
    reason: LeaveReason,
) {
    if let Some(departure) = state
        .leave_project_usecase
        .execute(project_id, connection_id, reason)
        .await
    {
        announce_departure(state, &departure).await;
    }
}

/// Announce a departure: synthetic `user_typing{isTyping:false}` if the
/// departed member was typing, then `user_left` and the presence snapshot.
pub async fn announce_departure(state: &Arc<AppState>, departure: &Departure) {
    let participant = &departure.connection.participant;

    if departure.typing_cleared {
        let typing_stopped = ServerEvent::UserTyping(UserTypingPayload {
            user_id: participant.user_id.as_str().to_string(),
            user_type: participant.user_type.as_str().to_string(),
            user_name: participant.user_name.as_str().to_string(),
            is_typing: false,
        });
        broadcast_logged(state, departure.notify_targets.clone(), &typing_stopped).await;
    }

    let user_left = ServerEvent::UserLeft(UserLeftPayload {
        user_id: participant.user_id.as_str().to_string(),
        user_type: participant.user_type.as_str().to_string(),
        user_name: participant.user_name.as_str().to_string(),
        left_at: departure.left_at.value(),
    });
    broadcast_logged(state, departure.notify_targets.clone(), &user_left).await;

    let presence = presence_event(departure.presence.clone());
    broadcast_logged(state, departure.notify_targets.clone(), &presence).await;
}

/// Broadcast without evicting failed targets (used inside departure
/// announcements to keep the cascade bounded).
async fn broadcast_logged(state: &Arc<AppState>, targets: Vec<ConnectionId>, event: &ServerEvent) {
    let json = serde_json::to_string(event).unwrap();
    let outcome = state.message_pusher.broadcast(targets, &json).await;
    if !outcome.failed.is_empty() {
        tracing::warn!(
            "Failed to push departure event to {} connection(s)",
            outcome.failed.len()
        );
    }
}
