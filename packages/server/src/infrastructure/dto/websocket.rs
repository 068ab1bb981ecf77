//! WebSocket ワイヤイベント定義
//!
//! すべてのイベントは `type` タグつきの JSON。タグは snake_case、
//! ペイロードのキーは camelCase（既存クライアントとのワイヤ互換）。
//! タイムスタンプは UTC ミリ秒の整数。

use serde::{Deserialize, Serialize};

/// クライアント → サーバーのイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinProject(JoinProjectPayload),
    SendMessage(SendMessagePayload),
    TypingStart(TypingStartPayload),
    TypingStop(TypingStopPayload),
    MarkMessageRead(MarkMessageReadPayload),
    MarkMessagesRead(MarkMessagesReadPayload),
    Ping,
}

/// サーバー → クライアントのイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    PresenceUpdate(PresenceUpdatePayload),
    UserJoined(UserJoinedPayload),
    UserLeft(UserLeftPayload),
    NewMessage(MessageDto),
    UserTyping(UserTypingPayload),
    MessageRead(MessageReadPayload),
    BulkMessagesRead(BulkMessagesReadPayload),
    Pong,
    Error(ErrorPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinProjectPayload {
    pub project_id: String,
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub project_id: String,
    pub sender_name: String,
    pub sender_type: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStartPayload {
    pub project_id: String,
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStopPayload {
    pub project_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkMessageReadPayload {
    pub message_id: String,
    pub project_id: String,
    pub user_id: String,
    pub user_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkMessagesReadPayload {
    pub project_id: String,
    pub user_id: String,
    pub user_type: String,
    /// 既読化の対象となる送信者種別
    pub sender_type: String,
}

/// プレゼンスの完全なスナップショット
///
/// 差分ではなくスナップショット。再接続後のクライアントはこれ一つで
/// 状態を再構築できる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdatePayload {
    pub users: Vec<PresenceUserDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUserDto {
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    pub project_id: String,
    pub last_seen: i64,
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedPayload {
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    pub joined_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftPayload {
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    pub left_at: i64,
}

/// 永続化済みメッセージのワイヤ表現
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub project_id: String,
    pub sender_name: String,
    pub sender_type: String,
    pub content: String,
    pub message_type: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub status: String,
    pub is_read: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<i64>,
}

/// タイピング状態の変化（スナップショットではなく差分）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub user_id: String,
    pub user_type: String,
    pub user_name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub message_id: String,
    pub read_by: String,
    pub read_by_type: String,
    pub read_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkMessagesReadPayload {
    /// 新たに既読へ遷移した件数
    pub count: usize,
    pub read_at: i64,
    pub read_by: String,
    pub read_by_type: String,
    /// 既読化の対象となった送信者種別
    pub sender_type: String,
    pub is_bulk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub reason: String,
}
