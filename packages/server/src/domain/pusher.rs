//! MessagePusher trait 定義
//!
//! 接続中のクライアントへのメッセージ送信（通知）の抽象化。
//! WebSocket などの具体的なトランスポートは Infrastructure 層が実装する。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::entity::ConnectionId;
use super::error::MessagePushError;

/// クライアントへのメッセージ送信用チャンネル
pub type PusherChannel = mpsc::UnboundedSender<String>;

/// broadcast の結果
///
/// 個々の接続への送信失敗はブロードキャスト全体を失敗させない。
/// 呼び出し側は failed の接続を evict する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: Vec<ConnectionId>,
    pub failed: Vec<ConnectionId>,
}

/// MessagePusher trait
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続のメッセージ送信チャンネルを登録する
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続のチャンネルを登録解除する（チャンネルの破棄でソケットも閉じる）
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// 単一の接続にメッセージを送信する
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続にメッセージを送信し、配送できた接続とできなかった接続を
    /// 区別して返す
    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) -> BroadcastOutcome;
}
