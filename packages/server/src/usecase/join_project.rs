//! UseCase: プロジェクト参加（Connection Gateway）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - JoinProjectUseCase::execute() メソッド
//! - 参加処理（認証、"last join wins" による旧接続の置き換え、チャンネル登録）
//!
//! ### なぜこのテストが必要か
//! - 認証失敗時に Room 状態が一切作られないことを保証
//! - 再接続でプレゼンスが重複しないことを保証
//! - 置き換えられた旧接続のチャンネルが破棄されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系: freelancer のセッション参加、client の共有トークン参加
//! - 異常系: トークン欠落、無効トークン、所有者でないユーザー
//! - エッジケース: 同一アイデンティティでの再 join

use std::sync::Arc;

use kakehashi_shared::time::Clock;

use crate::domain::{
    Connection, ConnectionId, IdentityValidator, MessagePusher, Participant, PresenceEntry,
    ProjectId, PusherChannel, RoomRegistry, ShareToken, Timestamp, UserType,
};

use super::error::JoinError;

/// 参加要求
#[derive(Debug, Clone)]
pub struct JoinRequest {
    pub project_id: ProjectId,
    pub participant: Participant,
    pub share_token: Option<ShareToken>,
}

/// 参加の結果
///
/// プレゼンスのスナップショットと、join した本人以外の通知対象を含む。
#[derive(Debug)]
pub struct JoinedRoom {
    pub connection: Connection,
    pub presence: Vec<PresenceEntry>,
    pub notify_targets: Vec<ConnectionId>,
}

/// プロジェクト参加のユースケース
pub struct JoinProjectUseCase {
    /// RoomRegistry（Room 状態の抽象化）
    registry: Arc<dyn RoomRegistry>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// IdentityValidator（認証の抽象化）
    identity_validator: Arc<dyn IdentityValidator>,
    /// Clock（時刻の抽象化）
    clock: Arc<dyn Clock>,
}

impl JoinProjectUseCase {
    /// 新しい JoinProjectUseCase を作成
    pub fn new(
        registry: Arc<dyn RoomRegistry>,
        message_pusher: Arc<dyn MessagePusher>,
        identity_validator: Arc<dyn IdentityValidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            message_pusher,
            identity_validator,
            clock,
        }
    }

    /// プロジェクト参加を実行
    ///
    /// # Arguments
    ///
    /// * `request` - 参加要求（アイデンティティと任意の共有トークン）
    /// * `sender` - この接続へのメッセージ送信用チャンネル
    ///
    /// # Returns
    ///
    /// * `Ok(JoinedRoom)` - 参加成功
    /// * `Err(JoinError)` - 認証失敗（Room 状態は一切変更されない）
    pub async fn execute(
        &self,
        request: JoinRequest,
        sender: PusherChannel,
    ) -> Result<JoinedRoom, JoinError> {
        // 1. Room 状態に触れる前に認証する
        match request.participant.user_type {
            UserType::Freelancer => {
                self.identity_validator
                    .validate_session(&request.participant.user_id, &request.project_id)
                    .await?;
            }
            UserType::Client => {
                let token = request
                    .share_token
                    .as_ref()
                    .ok_or(JoinError::MissingShareToken)?;
                self.identity_validator
                    .validate_share_token(token, &request.project_id)
                    .await?;
            }
        }

        // 2. 接続を生成して Room に参加させる
        //    （同一アイデンティティの旧接続は "last join wins" で置き換えられる）
        let joined_at = Timestamp::new(self.clock.now_utc_millis());
        let connection = Connection::new(
            ConnectionId::generate(),
            request.project_id.clone(),
            request.participant,
            joined_at,
        );
        let outcome = self.registry.join(connection.clone()).await;

        // 3. 置き換えられた旧接続のチャンネルを破棄する
        //    （チャンネルの破棄で旧ソケットの送信ループが終了し、接続が閉じる。
        //      プレゼンスは置き換え済みなので user_left は流さない）
        if let Some(superseded) = outcome.superseded {
            self.message_pusher.unregister_client(&superseded.id).await;
            tracing::info!(
                "Connection '{}' superseded by rejoin of '{}' ({})",
                superseded.id,
                connection.participant.user_id,
                connection.participant.user_type,
            );
        }

        // 4. 新しい接続のチャンネルを登録する
        self.message_pusher
            .register_client(connection.id, sender)
            .await;

        Ok(JoinedRoom {
            connection,
            presence: outcome.presence,
            notify_targets: outcome.notify_targets,
        })
    }
}
