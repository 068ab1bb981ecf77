//! Conversion logic between DTOs and domain entities.

use kakehashi_shared::time::timestamp_to_rfc3339;

use crate::domain::{Message, PresenceEntry, RoomSummary, TypingEntry};
use crate::infrastructure::dto::http as http_dto;
use crate::infrastructure::dto::websocket as dto;

// ========================================
// Domain Entity → WebSocket DTO
// ========================================

impl From<Message> for dto::MessageDto {
    fn from(model: Message) -> Self {
        Self {
            id: model.id.to_string(),
            project_id: model.project_id.into_string(),
            sender_name: model.sender_name.into_string(),
            sender_type: model.sender_type.as_str().to_string(),
            content: model.content.into_string(),
            message_type: model.kind.as_str().to_string(),
            priority: model.priority.as_str().to_string(),
            parent_message_id: model.parent_message_id.map(|id| id.to_string()),
            thread_id: model.thread_id.map(|id| id.to_string()),
            status: model.status.as_str().to_string(),
            is_read: model.is_read,
            created_at: model.created_at.value(),
            read_at: model.read_at.map(|t| t.value()),
            edited_at: model.edited_at.map(|t| t.value()),
        }
    }
}

impl From<PresenceEntry> for dto::PresenceUserDto {
    fn from(model: PresenceEntry) -> Self {
        Self {
            user_id: model.user_id.into_string(),
            user_type: model.user_type.as_str().to_string(),
            user_name: model.user_name.into_string(),
            project_id: model.project_id.into_string(),
            last_seen: model.last_seen.value(),
            connection_id: model.connection_id.to_string(),
        }
    }
}

// ========================================
// Domain Entity → HTTP DTO
// ========================================

impl From<RoomSummary> for http_dto::ProjectSummaryDto {
    fn from(model: RoomSummary) -> Self {
        Self {
            project_id: model.project_id.into_string(),
            member_count: model.member_count,
            created_at: timestamp_to_rfc3339(model.created_at.value()),
        }
    }
}

impl From<PresenceEntry> for http_dto::ParticipantDetailDto {
    fn from(model: PresenceEntry) -> Self {
        Self {
            user_id: model.user_id.into_string(),
            user_type: model.user_type.as_str().to_string(),
            user_name: model.user_name.into_string(),
            connection_id: model.connection_id.to_string(),
            last_seen: timestamp_to_rfc3339(model.last_seen.value()),
        }
    }
}

impl From<TypingEntry> for http_dto::TypingUserDto {
    fn from(model: TypingEntry) -> Self {
        Self {
            user_id: model.participant.user_id.into_string(),
            user_type: model.participant.user_type.as_str().to_string(),
            user_name: model.participant.user_name.into_string(),
        }
    }
}
