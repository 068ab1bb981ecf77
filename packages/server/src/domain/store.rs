//! Message Store trait 定義
//!
//! メッセージの永続化は外部コラボレータの責務。ドメイン層は
//! このインターフェースにのみ依存する。Store は唯一の永続的な
//! 情報源であり、broadcast の前に書き込みが完了していなければならない
//! （persist-before-broadcast）。

use async_trait::async_trait;

use super::entity::{Message, MessageDraft, MessageId, Participant, ReadReceipt};
use super::error::StoreError;
use super::value_object::{ProjectId, Timestamp, UserType};

/// Message Store trait
///
/// 複数の Room（将来的には複数プロセス）からの並行書き込みを許容する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// メッセージを永続化し、id と created_at を採番して返す
    async fn persist(&self, draft: MessageDraft) -> Result<Message, StoreError>;

    /// 単一メッセージを既読にする。
    ///
    /// 既に既読の場合も同じ最終状態のレシートを返す（冪等）。
    async fn mark_read(
        &self,
        project_id: &ProjectId,
        message_id: &MessageId,
        reader: &Participant,
        read_at: Timestamp,
    ) -> Result<ReadReceipt, StoreError>;

    /// 指定の送信者種別からの未読メッセージを一括で既読にし、
    /// 新たに既読へ遷移した件数を返す（二回目は 0、エラーにはならない）。
    async fn mark_many_read(
        &self,
        project_id: &ProjectId,
        reader: &Participant,
        sender_type: UserType,
        read_at: Timestamp,
    ) -> Result<usize, StoreError>;

    /// プロジェクトのメッセージ一覧（created_at 昇順）
    async fn list_by_project(&self, project_id: &ProjectId) -> Result<Vec<Message>, StoreError>;

    /// 単一メッセージの取得
    async fn get(
        &self,
        project_id: &ProjectId,
        message_id: &MessageId,
    ) -> Result<Message, StoreError>;
}
