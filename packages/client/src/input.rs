//! Input line parsing for the CLI client.
//!
//! Plain lines become chat messages; slash commands drive read receipts:
//!
//! - `/read <message_id>`: mark one message read
//! - `/readall [sender_type]`: mark all messages from the given sender
//!   type read (defaults to the counterpart of the own user type)

use kakehashi_server::infrastructure::dto::websocket::{
    ClientEvent, MarkMessageReadPayload, MarkMessagesReadPayload, SendMessagePayload,
};

use crate::controller::JoinIdentity;

/// Parse one input line into a client event.
///
/// Returns `Err(reason)` for malformed commands.
pub fn parse_line(line: &str, identity: &JoinIdentity) -> Result<ClientEvent, String> {
    if let Some(rest) = line.strip_prefix("/read ") {
        let message_id = rest.trim();
        if message_id.is_empty() {
            return Err("usage: /read <message_id>".to_string());
        }
        return Ok(ClientEvent::MarkMessageRead(MarkMessageReadPayload {
            message_id: message_id.to_string(),
            project_id: identity.project_id.clone(),
            user_id: identity.user_id.clone(),
            user_type: identity.user_type.clone(),
        }));
    }

    if line == "/readall" || line.starts_with("/readall ") {
        let sender_type = line
            .strip_prefix("/readall")
            .map(str::trim)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| counterpart_of(&identity.user_type));
        return Ok(ClientEvent::MarkMessagesRead(MarkMessagesReadPayload {
            project_id: identity.project_id.clone(),
            user_id: identity.user_id.clone(),
            user_type: identity.user_type.clone(),
            sender_type,
        }));
    }

    if line.starts_with('/') {
        return Err(format!("unknown command: {}", line));
    }

    Ok(ClientEvent::SendMessage(SendMessagePayload {
        project_id: identity.project_id.clone(),
        sender_name: identity.user_name.clone(),
        sender_type: identity.user_type.clone(),
        content: line.to_string(),
        parent_message_id: None,
        thread_id: None,
        priority: None,
        message_type: None,
    }))
}

/// In a two-party room the unread messages come from the other side.
fn counterpart_of(user_type: &str) -> String {
    match user_type {
        "freelancer" => "client".to_string(),
        _ => "freelancer".to_string(),
    }
}
