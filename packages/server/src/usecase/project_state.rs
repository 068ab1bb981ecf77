//! UseCase: プロジェクト状態の取得（HTTP API 用）

use std::sync::Arc;

use crate::domain::{
    Message, MessageStore, PresenceEntry, ProjectId, RoomRegistry, RoomSummary, StoreError,
    TypingEntry,
};

/// プロジェクトの現在の状態（プレゼンスとタイピング）
#[derive(Debug)]
pub struct ProjectState {
    pub project_id: ProjectId,
    pub presence: Vec<PresenceEntry>,
    pub typing: Vec<TypingEntry>,
}

/// プロジェクト状態取得のユースケース
pub struct GetProjectStateUseCase {
    registry: Arc<dyn RoomRegistry>,
    message_store: Arc<dyn MessageStore>,
}

impl GetProjectStateUseCase {
    /// 新しい GetProjectStateUseCase を作成
    pub fn new(registry: Arc<dyn RoomRegistry>, message_store: Arc<dyn MessageStore>) -> Self {
        Self {
            registry,
            message_store,
        }
    }

    /// アクティブな Room のサマリ一覧
    pub async fn summaries(&self) -> Vec<RoomSummary> {
        self.registry.summaries().await
    }

    /// プロジェクトの現在の状態。Room が存在しなければ None。
    pub async fn detail(&self, project_id: &ProjectId) -> Option<ProjectState> {
        if !self.registry.contains(project_id).await {
            return None;
        }
        Some(ProjectState {
            project_id: project_id.clone(),
            presence: self.registry.presence_snapshot(project_id).await,
            typing: self.registry.typing_snapshot(project_id).await,
        })
    }

    /// プロジェクトのメッセージ履歴（Store からの読み戻し）
    ///
    /// Room が破棄済みでも履歴は返る（履歴は Store にのみ残る）。
    pub async fn messages(&self, project_id: &ProjectId) -> Result<Vec<Message>, StoreError> {
        self.message_store.list_by_project(project_id).await
    }
}
