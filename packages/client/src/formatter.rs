//! Message formatting utilities for client display.

use chrono::{DateTime, Utc};

use kakehashi_server::infrastructure::dto::websocket::{
    BulkMessagesReadPayload, MessageDto, MessageReadPayload, PresenceUserDto, ServerEvent,
    UserJoinedPayload, UserLeftPayload, UserTypingPayload,
};
use kakehashi_shared::time::timestamp_to_rfc3339;

/// Short clock time for inline message lines ("14:03:27" UTC)
fn format_clock_time(timestamp_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => timestamp_millis.to_string(),
    }
}

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a server event for the terminal.
    ///
    /// Returns `None` for events that have no visible representation
    /// (`pong`).
    pub fn format_event(event: &ServerEvent, own_user_id: &str) -> Option<String> {
        match event {
            ServerEvent::PresenceUpdate(payload) => {
                Some(Self::format_presence_update(&payload.users, own_user_id))
            }
            ServerEvent::UserJoined(payload) => Some(Self::format_user_joined(payload)),
            ServerEvent::UserLeft(payload) => Some(Self::format_user_left(payload)),
            ServerEvent::NewMessage(message) => Some(Self::format_new_message(message)),
            ServerEvent::UserTyping(payload) => Some(Self::format_user_typing(payload)),
            ServerEvent::MessageRead(payload) => Some(Self::format_message_read(payload)),
            ServerEvent::BulkMessagesRead(payload) => Some(Self::format_bulk_read(payload)),
            ServerEvent::Error(payload) => Some(Self::format_error(&payload.reason)),
            ServerEvent::Pong => None,
        }
    }

    /// Format the presence snapshot showing all participants
    pub fn format_presence_update(users: &[PresenceUserDto], own_user_id: &str) -> String {
        let mut output = String::new();
        output.push_str("\n\n============================================================\n");
        output.push_str("Online:\n");

        if users.is_empty() {
            output.push_str("(No one online)\n");
        } else {
            for user in users {
                let is_me = user.user_id == own_user_id;
                let me_suffix = if is_me { " (me)" } else { "" };
                output.push_str(&format!(
                    "{} [{}]{}\n",
                    user.user_name, user.user_type, me_suffix
                ));
            }
        }

        output.push_str("============================================================\n");
        output
    }

    /// Format a user-joined notification
    pub fn format_user_joined(payload: &UserJoinedPayload) -> String {
        let timestamp_str = timestamp_to_rfc3339(payload.joined_at);
        format!(
            "\n+ {} [{}] joined at {}\n",
            payload.user_name, payload.user_type, timestamp_str
        )
    }

    /// Format a user-left notification
    pub fn format_user_left(payload: &UserLeftPayload) -> String {
        let timestamp_str = timestamp_to_rfc3339(payload.left_at);
        format!(
            "\n- {} [{}] left at {}\n",
            payload.user_name, payload.user_type, timestamp_str
        )
    }

    /// Format an incoming chat message
    pub fn format_new_message(message: &MessageDto) -> String {
        let timestamp_str = format_clock_time(message.created_at);
        let priority_marker = match message.priority.as_str() {
            "urgent" => " [URGENT]",
            "high" => " [!]",
            _ => "",
        };
        format!(
            "\n\n------------------------------------------------------------\n\
             @{}{}: {}\n\
             id {} | sent at {}\n\
             ------------------------------------------------------------\n",
            message.sender_name, priority_marker, message.content, message.id, timestamp_str
        )
    }

    /// Format a typing indicator change
    pub fn format_user_typing(payload: &UserTypingPayload) -> String {
        if payload.is_typing {
            format!("\n… {} is typing\n", payload.user_name)
        } else {
            format!("\n… {} stopped typing\n", payload.user_name)
        }
    }

    /// Format a single read receipt
    pub fn format_message_read(payload: &MessageReadPayload) -> String {
        let timestamp_str = timestamp_to_rfc3339(payload.read_at);
        format!(
            "\n✓ message {} read by {} at {}\n",
            payload.message_id, payload.read_by, timestamp_str
        )
    }

    /// Format a bulk read receipt
    pub fn format_bulk_read(payload: &BulkMessagesReadPayload) -> String {
        format!(
            "\n✓ {} read {} message(s) from {}\n",
            payload.read_by, payload.count, payload.sender_type
        )
    }

    /// Format an error from the server
    pub fn format_error(reason: &str) -> String {
        format!("\n! server error: {}\n", reason)
    }
}
