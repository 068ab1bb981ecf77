//! Multi-subscriber event bus.
//!
//! Server events fan out through a `tokio::sync::broadcast` channel so any
//! number of UI components can subscribe independently. A single mutable
//! callback slot would silently drop earlier subscribers; the bus makes
//! the subscription surface explicit instead.

use tokio::sync::broadcast;

use kakehashi_server::infrastructure::dto::websocket::ServerEvent;

const EVENT_BUS_CAPACITY: usize = 256;

/// Broadcast bus carrying [`ServerEvent`]s to all subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Events published with no subscribers are dropped.
    pub fn publish(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_subscribers_receive_published_events() {
        // テスト項目: 複数の購読者全員がイベントを受け取る
        // given (前提条件):
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        // when (操作):
        bus.publish(ServerEvent::Pong);

        // then (期待する結果):
        assert_eq!(first.recv().await.unwrap(), ServerEvent::Pong);
        assert_eq!(second.recv().await.unwrap(), ServerEvent::Pong);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_panic() {
        // テスト項目: 購読者がいない状態の publish は何もしない
        // given (前提条件):
        let bus = EventBus::new();

        // when (操作):
        bus.publish(ServerEvent::Pong);

        // then (期待する結果): パニックしない
    }

    #[tokio::test]
    async fn test_late_subscriber_only_sees_later_events() {
        // テスト項目: 購読後に発行されたイベントだけが届く
        // given (前提条件):
        let bus = EventBus::new();
        bus.publish(ServerEvent::Pong);

        // when (操作):
        let mut late = bus.subscribe();
        bus.publish(ServerEvent::Pong);

        // then (期待する結果): 1 件だけ受信できる
        assert!(late.recv().await.is_ok());
        assert!(late.try_recv().is_err());
    }
}
