//! InMemory Message Store 実装
//!
//! ドメイン層が定義する MessageStore trait の具体的な実装。
//! 本番ではプロジェクト管理側のデータストアがこの役割を担う。
//! id と created_at の採番は Store の責務（persist が確定させる）。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use kakehashi_shared::time::Clock;

use crate::domain::{
    Message, MessageDraft, MessageId, MessageStore, Participant, ProjectId, ReadReceipt,
    StoreError, Timestamp, UserType,
};

/// インメモリ Message Store 実装
pub struct InMemoryMessageStore {
    /// プロジェクトごとのメッセージ（created_at 昇順 = 挿入順）
    messages: Mutex<HashMap<ProjectId, Vec<Message>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageStore {
    /// 新しい InMemoryMessageStore を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn persist(&self, draft: MessageDraft) -> Result<Message, StoreError> {
        let created_at = Timestamp::new(self.clock.now_utc_millis());
        let message = Message::from_draft(MessageId::generate(), draft, created_at);

        let mut messages = self.messages.lock().await;
        messages
            .entry(message.project_id.clone())
            .or_default()
            .push(message.clone());
        tracing::debug!(
            "Message '{}' persisted for project '{}'",
            message.id,
            message.project_id,
        );
        Ok(message)
    }

    async fn mark_read(
        &self,
        project_id: &ProjectId,
        message_id: &MessageId,
        reader: &Participant,
        read_at: Timestamp,
    ) -> Result<ReadReceipt, StoreError> {
        let mut messages = self.messages.lock().await;
        let message = messages
            .get_mut(project_id)
            .and_then(|list| list.iter_mut().find(|m| m.id == *message_id))
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;

        // 既に既読なら最初の read_at を保った同じ最終状態を返す（冪等）
        message.mark_read(read_at);
        Ok(ReadReceipt {
            message_id: *message_id,
            project_id: project_id.clone(),
            read_by: reader.user_id.clone(),
            read_by_type: reader.user_type,
            read_at: message.read_at.unwrap_or(read_at),
        })
    }

    async fn mark_many_read(
        &self,
        project_id: &ProjectId,
        _reader: &Participant,
        sender_type: UserType,
        read_at: Timestamp,
    ) -> Result<usize, StoreError> {
        let mut messages = self.messages.lock().await;
        let Some(list) = messages.get_mut(project_id) else {
            return Ok(0);
        };
        let count = list
            .iter_mut()
            .filter(|m| m.sender_type == sender_type)
            .map(|m| m.mark_read(read_at))
            .filter(|&marked| marked)
            .count();
        Ok(count)
    }

    async fn list_by_project(&self, project_id: &ProjectId) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().await;
        Ok(messages.get(project_id).cloned().unwrap_or_default())
    }

    async fn get(
        &self,
        project_id: &ProjectId,
        message_id: &MessageId,
    ) -> Result<Message, StoreError> {
        let messages = self.messages.lock().await;
        messages
            .get(project_id)
            .and_then(|list| list.iter().find(|m| m.id == *message_id))
            .cloned()
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))
    }
}
