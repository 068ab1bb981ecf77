//! UseCase: メッセージ送信（Message Broadcaster）
//!
//! persist-before-broadcast: Store への書き込みが完了してからでなければ
//! new_message は配られない。書き込みが失敗した場合は何も配られない。
//! 配送対象には送信者自身も含まれる（エコー方式。クライアントは
//! メッセージ id で重複排除する）。

use std::sync::Arc;

use crate::domain::{ConnectionId, Message, MessageDraft, MessageStore, RoomRegistry};

use super::error::SendMessageError;

/// 送信の結果
///
/// 永続化済みメッセージと、送信者を含む配送対象。
#[derive(Debug)]
pub struct SentMessage {
    pub message: Message,
    pub targets: Vec<ConnectionId>,
}

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    /// RoomRegistry（Room 状態の抽象化）
    registry: Arc<dyn RoomRegistry>,
    /// MessageStore（永続化層の抽象化）
    message_store: Arc<dyn MessageStore>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(registry: Arc<dyn RoomRegistry>, message_store: Arc<dyn MessageStore>) -> Self {
        Self {
            registry,
            message_store,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `draft` - 永続化前のメッセージ（id と created_at は Store が採番）
    ///
    /// # Returns
    ///
    /// * `Ok(SentMessage)` - 永続化済みメッセージと配送対象
    /// * `Err(SendMessageError)` - 永続化失敗（ブロードキャストは行わないこと）
    pub async fn execute(&self, draft: MessageDraft) -> Result<SentMessage, SendMessageError> {
        // 1. 先に永続化する。失敗したら操作全体が失敗する。
        let message = self.message_store.persist(draft).await?;

        // 2. 配送対象は送信者を含む全メンバー（エコー方式）
        let targets = self.registry.connection_ids(&message.project_id).await;

        Ok(SentMessage { message, targets })
    }
}
