//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの `UnboundedSender` を管理
//! - 接続へのメッセージ送信（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket の生成は UI 層（`ui/handler/websocket.rs`）で行われます。
//! この実装は生成された `UnboundedSender` を受け取り、メッセージ送信に
//! 使用します。チャンネルへの送信は非同期 I/O を伴わないため、
//! ブロードキャストが遅いソケットに足止めされることはありません。
//!
//! broadcast は配送できた接続とできなかった接続を区別して返します。
//! 送信失敗は受信側タスクの終了（= 接続の死）を意味するため、
//! 呼び出し側は failed の接続を evict します。失敗が他のメンバーへの
//! 配送を妨げることはありません。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    BroadcastOutcome, ConnectionId, MessagePushError, MessagePusher, PusherChannel,
};

/// WebSocket を使った MessagePusher 実装
pub struct WebSocketMessagePusher {
    /// 接続中の接続 ID と対応する WebSocket sender のマップ
    clients: Mutex<HashMap<ConnectionId, PusherChannel>>,
}

impl WebSocketMessagePusher {
    /// 新しい WebSocketMessagePusher を作成
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for WebSocketMessagePusher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel) {
        let mut clients = self.clients.lock().await;
        clients.insert(connection_id, sender);
        tracing::debug!("Connection '{}' registered to MessagePusher", connection_id);
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        let mut clients = self.clients.lock().await;
        clients.remove(connection_id);
        tracing::debug!(
            "Connection '{}' unregistered from MessagePusher",
            connection_id
        );
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        content: &str,
    ) -> Result<(), MessagePushError> {
        let clients = self.clients.lock().await;

        if let Some(sender) = clients.get(connection_id) {
            sender
                .send(content.to_string())
                .map_err(|_| MessagePushError::PushFailed(connection_id.to_string()))?;
            tracing::debug!("Pushed message to connection '{}'", connection_id);
            Ok(())
        } else {
            Err(MessagePushError::ConnectionNotFound(
                connection_id.to_string(),
            ))
        }
    }

    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) -> BroadcastOutcome {
        let clients = self.clients.lock().await;

        let mut outcome = BroadcastOutcome::default();
        for target in targets {
            match clients.get(&target) {
                Some(sender) => {
                    if sender.send(content.to_string()).is_ok() {
                        outcome.delivered.push(target);
                    } else {
                        // 受信側タスクが終了している。呼び出し側が evict する。
                        tracing::warn!("Failed to push message to connection '{}'", target);
                        outcome.failed.push(target);
                    }
                }
                None => {
                    tracing::warn!(
                        "Connection '{}' not found during broadcast, skipping",
                        target
                    );
                    outcome.failed.push(target);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - WebSocketMessagePusher の基本的なメッセージ送信機能
    // - push_to: 特定の接続への送信
    // - broadcast: 複数接続への送信と、失敗した接続の報告
    //
    // 【なぜこのテストが必要か】
    // - MessagePusher は全ブロードキャストが通る通信層の中核
    // - 一部の接続の失敗が他のメンバーへの配送を妨げないことを保証する
    // ========================================

    fn create_test_pusher() -> WebSocketMessagePusher {
        WebSocketMessagePusher::new()
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 特定の接続にメッセージを送信できる
        // given (前提条件):
        let pusher = create_test_pusher();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        pusher.register_client(connection_id, tx).await;

        // when (操作):
        let result = pusher.push_to(&connection_id, "Hello").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await, Some("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_push_to_connection_not_found() {
        // テスト項目: 未登録の接続への送信はエラーを返す
        // given (前提条件):
        let pusher = create_test_pusher();
        let connection_id = ConnectionId::generate();

        // when (操作):
        let result = pusher.push_to(&connection_id, "Hello").await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(MessagePushError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_all_targets() {
        // テスト項目: 複数の接続にメッセージをブロードキャストできる
        // given (前提条件):
        let pusher = create_test_pusher();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let alice = ConnectionId::generate();
        let bob = ConnectionId::generate();
        pusher.register_client(alice, tx1).await;
        pusher.register_client(bob, tx2).await;

        // when (操作):
        let outcome = pusher.broadcast(vec![alice, bob], "Broadcast message").await;

        // then (期待する結果):
        assert_eq!(outcome.delivered.len(), 2);
        assert!(outcome.failed.is_empty());
        assert_eq!(rx1.recv().await, Some("Broadcast message".to_string()));
        assert_eq!(rx2.recv().await, Some("Broadcast message".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_isolates_dead_connection() {
        // テスト項目: 受信側が閉じた接続は failed として報告され、
        //             他の接続への配送は続行される
        // given (前提条件):
        let pusher = create_test_pusher();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        let alice = ConnectionId::generate();
        let dead = ConnectionId::generate();
        pusher.register_client(alice, tx1).await;
        pusher.register_client(dead, tx2).await;
        drop(rx2); // 受信側タスクの終了を模擬

        // when (操作):
        let outcome = pusher.broadcast(vec![dead, alice], "Broadcast message").await;

        // then (期待する結果):
        assert_eq!(outcome.delivered, vec![alice]);
        assert_eq!(outcome.failed, vec![dead]);
        assert_eq!(rx1.recv().await, Some("Broadcast message".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_reports_unknown_connection_as_failed() {
        // テスト項目: 未登録の接続は failed として報告される
        // given (前提条件):
        let pusher = create_test_pusher();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let alice = ConnectionId::generate();
        let unknown = ConnectionId::generate();
        pusher.register_client(alice, tx1).await;

        // when (操作):
        let outcome = pusher
            .broadcast(vec![alice, unknown], "Broadcast message")
            .await;

        // then (期待する結果):
        assert_eq!(outcome.delivered, vec![alice]);
        assert_eq!(outcome.failed, vec![unknown]);
        assert_eq!(rx1.recv().await, Some("Broadcast message".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_empty_targets() {
        // テスト項目: 空のターゲットリストでもエラーにならない
        // given (前提条件):
        let pusher = create_test_pusher();

        // when (操作):
        let outcome = pusher.broadcast(vec![], "Message").await;

        // then (期待する結果):
        assert!(outcome.delivered.is_empty());
        assert!(outcome.failed.is_empty());
    }
}
