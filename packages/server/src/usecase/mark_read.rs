//! UseCase: 既読化（Read-Receipt Tracker）
//!
//! 単一・一括どちらも read-after-write: Store の更新が完了してから
//! message_read / bulk_messages_read を配る。イベントを受け取った
//! クライアントが CRUD 側で再取得しても必ず既読が見えることを保証する。
//! 既読済みメッセージの再既読化は冪等（エラーにしない。クライアントは
//! イベントの重複を許容する）。

use std::sync::Arc;

use kakehashi_shared::time::Clock;

use crate::domain::{
    ConnectionId, MessageId, MessageStore, Participant, ProjectId, ReadReceipt, RoomRegistry,
    Timestamp, UserType,
};

use super::error::MarkReadError;

/// 単一既読化の結果
#[derive(Debug)]
pub struct ReadOutcome {
    pub receipt: ReadReceipt,
    pub targets: Vec<ConnectionId>,
}

/// 一括既読化の結果
#[derive(Debug)]
pub struct BulkReadOutcome {
    /// 新たに既読へ遷移した件数
    pub count: usize,
    pub read_at: Timestamp,
    pub reader: Participant,
    /// 既読化の対象となった送信者種別
    pub sender_type: UserType,
    pub targets: Vec<ConnectionId>,
}

/// 既読化のユースケース
pub struct MarkReadUseCase {
    registry: Arc<dyn RoomRegistry>,
    message_store: Arc<dyn MessageStore>,
    clock: Arc<dyn Clock>,
}

impl MarkReadUseCase {
    /// 新しい MarkReadUseCase を作成
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        message_store: Arc<dyn MessageStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            message_store,
            clock,
        }
    }

    /// 単一メッセージの既読化を実行
    pub async fn execute(
        &self,
        project_id: &ProjectId,
        message_id: &MessageId,
        reader: Participant,
    ) -> Result<ReadOutcome, MarkReadError> {
        let read_at = Timestamp::new(self.clock.now_utc_millis());

        // Store の更新が broadcast より先
        let receipt = self
            .message_store
            .mark_read(project_id, message_id, &reader, read_at)
            .await?;

        let targets = self.registry.connection_ids(project_id).await;
        Ok(ReadOutcome { receipt, targets })
    }

    /// 指定の送信者種別からの未読メッセージを一括で既読化する
    pub async fn execute_bulk(
        &self,
        project_id: &ProjectId,
        reader: Participant,
        sender_type: UserType,
    ) -> Result<BulkReadOutcome, MarkReadError> {
        let read_at = Timestamp::new(self.clock.now_utc_millis());

        let count = self
            .message_store
            .mark_many_read(project_id, &reader, sender_type, read_at)
            .await?;

        let targets = self.registry.connection_ids(project_id).await;
        Ok(BulkReadOutcome {
            count,
            read_at,
            reader,
            sender_type,
            targets,
        })
    }
}
