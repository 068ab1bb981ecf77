//! UseCase: タイピング通知（Typing Coordinator）
//!
//! サーバー側のタイマーが唯一の正。typing_start から 3 秒以内に
//! typing_stop が来なければエントリを失効させ、isTyping:false の
//! 合成イベントを一度だけ配る。世代番号の照合により、typing_start で
//! 更新されたエントリを古いタイマーが消すことはない。
//! 送信者の接続が typing_stop を送らずに死んだ場合は退出経路が
//! エントリをクリアする（leave_project 参照）ため、失効タイマーは
//! 何もしない。

use std::sync::Arc;
use std::time::Duration;

use kakehashi_shared::time::Clock;

use crate::domain::{
    ConnectionId, MessagePusher, Participant, ProjectId, RoomRegistry, Timestamp, UserId,
    UserType,
};

/// typing_stop が来ない場合の自動失効までの時間
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// タイピング通知のユースケース
pub struct TypingUseCase {
    registry: Arc<dyn RoomRegistry>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl TypingUseCase {
    /// 新しい TypingUseCase を作成（失効は 3 秒）
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_timeout(registry, message_pusher, clock, TYPING_TIMEOUT)
    }

    /// 失効時間を指定して作成（テスト用）
    pub fn with_timeout(
        registry: Arc<dyn RoomRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            clock,
            timeout,
        }
    }

    /// タイピング開始を記録し、失効タイマーを仕掛ける
    ///
    /// # Arguments
    ///
    /// * `project_id` - 対象プロジェクト
    /// * `participant` - タイピング中の参加者
    /// * `exclude` - 参加者自身の接続（失効イベントの配送対象から外す）
    /// * `expiry_json` - 失効時に配る isTyping:false イベント（構築済み JSON）
    ///
    /// # Returns
    ///
    /// * `Some(generation)` - 記録された（呼び出し側は isTyping:true を配る）
    /// * `None` - 参加者は Room のメンバーではない
    pub async fn start(
        &self,
        project_id: &ProjectId,
        participant: Participant,
        exclude: ConnectionId,
        expiry_json: String,
    ) -> Option<u64> {
        let at = Timestamp::new(self.clock.now_utc_millis());
        let user_id = participant.user_id.clone();
        let user_type = participant.user_type;
        let generation = self
            .registry
            .start_typing(project_id, participant, at)
            .await?;

        // サーバー側の失効タイマー（クライアントのタイマーは補助でしかない）
        let registry = self.registry.clone();
        let pusher = self.message_pusher.clone();
        let project_id = project_id.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // typing_stop・再 start・退出が先に処理されていれば何もしない
            if registry
                .expire_typing(&project_id, &user_id, user_type, generation)
                .await
            {
                tracing::debug!(
                    "Typing entry for '{}' ({}) in project '{}' expired",
                    user_id,
                    user_type,
                    project_id,
                );
                let targets = registry.connection_ids_except(&project_id, &exclude).await;
                let outcome = pusher.broadcast(targets, &expiry_json).await;
                if !outcome.failed.is_empty() {
                    // 死んだソケットは liveness monitor が回収する
                    tracing::warn!(
                        "Failed to push typing expiry to {} connection(s) in project '{}'",
                        outcome.failed.len(),
                        project_id,
                    );
                }
            }
        });

        Some(generation)
    }

    /// タイピング停止を記録する
    ///
    /// # Returns
    ///
    /// エントリが存在していたか（true なら呼び出し側は isTyping:false を配る）
    pub async fn stop(
        &self,
        project_id: &ProjectId,
        user_id: &UserId,
        user_type: UserType,
    ) -> bool {
        self.registry.stop_typing(project_id, user_id, user_type).await
    }
}
