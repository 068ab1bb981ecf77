//! UseCase 層のエラー型定義

use thiserror::Error;

use crate::domain::{AuthError, StoreError};

/// join の失敗
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// client としての参加には共有トークンが必須
    #[error("share token is required for client access")]
    MissingShareToken,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// メッセージ送信の失敗
///
/// 永続化が失敗した場合、操作全体が失敗しブロードキャストは行われない。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    #[error("failed to persist message: {0}")]
    Persistence(#[from] StoreError),
}

/// 既読化の失敗
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkReadError {
    #[error("failed to update read state: {0}")]
    Persistence(#[from] StoreError),
}
