//! HTTP API response DTOs.

use serde::Serialize;

/// Summary of an active project room
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummaryDto {
    pub project_id: String,
    pub member_count: usize,
    pub created_at: String,
}

/// Detail of an active project room: who is present, who is typing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetailDto {
    pub project_id: String,
    pub participants: Vec<ParticipantDetailDto>,
    pub typing: Vec<TypingUserDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDetailDto {
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    pub connection_id: String,
    pub last_seen: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUserDto {
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
}
