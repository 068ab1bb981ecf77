//! UseCase: プロジェクト退出（切断・evict の共通経路）
//!
//! トランスポートの close、ハートビートのタイムアウト、ブロードキャストの
//! 書き込み失敗はすべてこのユースケースを通る。Registry が退出を一度しか
//! 成立させないため、user_left の通知も一度だけになる。

use std::fmt;
use std::sync::Arc;

use kakehashi_shared::time::Clock;

use crate::domain::{
    Connection, ConnectionId, MessagePusher, PresenceEntry, ProjectId, RoomRegistry, Timestamp,
};

/// 退出の理由（ログ用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// トランスポートレベルの close
    Disconnected,
    /// ハートビートのタイムアウト
    TimedOut,
    /// ブロードキャスト時の書き込み失敗
    WriteFailed,
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            LeaveReason::Disconnected => "disconnected",
            LeaveReason::TimedOut => "timed out",
            LeaveReason::WriteFailed => "write failed",
        };
        write!(f, "{}", reason)
    }
}

/// 退出の結果
#[derive(Debug)]
pub struct Departure {
    pub connection: Connection,
    pub presence: Vec<PresenceEntry>,
    pub notify_targets: Vec<ConnectionId>,
    /// 退出者のタイピングエントリを同時にクリアしたか
    /// （true なら isTyping:false の合成イベントを流す必要がある）
    pub typing_cleared: bool,
    pub room_dropped: bool,
    pub left_at: Timestamp,
}

/// プロジェクト退出のユースケース
pub struct LeaveProjectUseCase {
    registry: Arc<dyn RoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
}

impl LeaveProjectUseCase {
    /// 新しい LeaveProjectUseCase を作成
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            clock,
        }
    }

    /// プロジェクト退出を実行
    ///
    /// # Returns
    ///
    /// * `Some(Departure)` - 退出が成立した（通知対象と変更後のプレゼンスを含む）
    /// * `None` - 接続は既に取り除かれていた（evict 済みの接続の close など）
    pub async fn execute(
        &self,
        project_id: &ProjectId,
        connection_id: &ConnectionId,
        reason: LeaveReason,
    ) -> Option<Departure> {
        let outcome = self.registry.leave(project_id, connection_id).await?;
        self.message_pusher.unregister_client(connection_id).await;

        let left_at = Timestamp::new(self.clock.now_utc_millis());
        tracing::info!(
            "Connection '{}' ({}) left project '{}': {}",
            connection_id,
            outcome.connection.participant.user_id,
            project_id,
            reason,
        );
        if outcome.room_dropped {
            tracing::debug!("Room '{}' dropped (last member left)", project_id);
        }

        Some(Departure {
            connection: outcome.connection,
            presence: outcome.presence,
            notify_targets: outcome.notify_targets,
            typing_cleared: outcome.typing_cleared,
            room_dropped: outcome.room_dropped,
            left_at,
        })
    }
}
