//! ドメイン層のエラー型定義

use thiserror::Error;

/// 値オブジェクトの検証エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("project id must not be empty")]
    EmptyProjectId,

    #[error("user id must not be empty")]
    EmptyUserId,

    #[error("user name must not be empty")]
    EmptyUserName,

    #[error("share token must not be empty")]
    EmptyShareToken,

    #[error("message content must not be empty")]
    EmptyMessageContent,

    #[error("message content is too long ({0} characters)")]
    MessageContentTooLong(usize),

    #[error("unknown user type: '{0}'")]
    UnknownUserType(String),

    #[error("invalid message id: '{0}'")]
    InvalidMessageId(String),
}

/// Message Store（永続化層）のエラー
///
/// Store の書き込みが失敗した操作は全体が失敗し、ブロードキャストは行われない。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("message '{0}' not found")]
    MessageNotFound(String),

    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

/// メッセージ送信（通知）のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagePushError {
    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(String),

    #[error("failed to push message to connection '{0}'")]
    PushFailed(String),
}

/// 認証エラー
///
/// join は一切の Room 状態を作る前に拒否される。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("project '{0}' is not registered")]
    UnknownProject(String),

    #[error("invalid share token for project '{0}'")]
    InvalidShareToken(String),

    #[error("share token for project '{0}' has expired")]
    ExpiredShareToken(String),

    #[error("user '{user_id}' does not own project '{project_id}'")]
    NotProjectOwner { user_id: String, project_id: String },

    #[error("invalid session for user '{0}'")]
    InvalidSession(String),
}
