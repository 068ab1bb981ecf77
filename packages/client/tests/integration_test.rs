//! Integration tests driving an in-process server over real WebSockets.
//!
//! Each test wires the full server stack (registry, store, validator,
//! pusher, usecases) with shortened typing/heartbeat timers, runs it on a
//! dedicated port, and speaks the wire protocol with raw
//! tokio-tungstenite connections so the assertions see actual frames.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use kakehashi_server::{
    domain::{MessagePusher, MessageStore, ProjectId, RoomRegistry, ShareToken, UserId},
    infrastructure::{
        auth::InMemoryIdentityValidator, message_pusher::WebSocketMessagePusher,
        registry::InMemoryRoomRegistry, store::InMemoryMessageStore,
    },
    ui::{LivenessConfig, Server, state::AppState},
    usecase::{
        GetProjectStateUseCase, JoinProjectUseCase, LeaveProjectUseCase, MarkReadUseCase,
        SendMessageUseCase, TypingUseCase,
    },
};
use kakehashi_shared::time::{Clock, SystemClock};

const PROJECT: &str = "project-1";
const OWNER: &str = "freelancer-1";
const TOKEN: &str = "share-token-1";
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// In-process server with shortened timers for tests
struct TestServer {
    port: u16,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Wire the full server stack and serve it on the given port.
    async fn start(port: u16, liveness: LivenessConfig, typing_timeout: Duration) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new(clock.clone()));
        let message_store: Arc<dyn MessageStore> =
            Arc::new(InMemoryMessageStore::new(clock.clone()));
        let validator = Arc::new(InMemoryIdentityValidator::new(clock.clone()));
        validator
            .register_project(
                ProjectId::new(PROJECT.to_string()).unwrap(),
                UserId::new(OWNER.to_string()).unwrap(),
                ShareToken::new(TOKEN.to_string()).unwrap(),
                None,
            )
            .await;
        let message_pusher: Arc<dyn MessagePusher> = Arc::new(WebSocketMessagePusher::new());

        let app_state = Arc::new(AppState {
            join_project_usecase: Arc::new(JoinProjectUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                validator,
                clock.clone(),
            )),
            leave_project_usecase: Arc::new(LeaveProjectUseCase::new(
                registry.clone(),
                message_pusher.clone(),
                clock.clone(),
            )),
            send_message_usecase: Arc::new(SendMessageUseCase::new(
                registry.clone(),
                message_store.clone(),
            )),
            mark_read_usecase: Arc::new(MarkReadUseCase::new(
                registry.clone(),
                message_store.clone(),
                clock.clone(),
            )),
            typing_usecase: Arc::new(TypingUseCase::with_timeout(
                registry.clone(),
                message_pusher.clone(),
                clock.clone(),
                typing_timeout,
            )),
            project_state_usecase: Arc::new(GetProjectStateUseCase::new(
                registry.clone(),
                message_store.clone(),
            )),
            registry,
            message_pusher,
            clock,
        });

        let server = Server::new(app_state).with_liveness(liveness);
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run("127.0.0.1".to_string(), port).await {
                panic!("Test server failed: {}", e);
            }
        });

        // Wait until the listener accepts connections
        for _ in 0..50 {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return Self { port, handle };
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Test server did not start on port {port}");
    }

    async fn start_default(port: u16) -> Self {
        Self::start(port, LivenessConfig::default(), Duration::from_millis(300)).await
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Receive the next text frame as JSON, panicking after the timeout.
async fn recv_event(ws: &mut WsStream) -> Value {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let frame = tokio::time::timeout_at(deadline, ws.next())
            .await
            .expect("Timed out waiting for event")
            .expect("Connection closed while waiting for event")
            .expect("WebSocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).expect("Frame is not valid JSON");
        }
    }
}

/// Receive events until one of the given type arrives, skipping others.
async fn wait_for_event(ws: &mut WsStream, event_type: &str) -> Value {
    for _ in 0..20 {
        let event = recv_event(ws).await;
        if event["type"] == event_type {
            return event;
        }
    }
    panic!("Did not receive '{event_type}' within 20 events");
}

fn join_event(user_id: &str, user_type: &str, user_name: &str, token: Option<&str>) -> Value {
    let mut event = json!({
        "type": "join_project",
        "projectId": PROJECT,
        "userId": user_id,
        "userType": user_type,
        "userName": user_name,
    });
    if let Some(token) = token {
        event["shareToken"] = json!(token);
    }
    event
}

/// Connect, join, and consume the initial presence snapshot.
async fn join_freelancer(url: &str) -> WsStream {
    let mut ws = connect(url).await;
    send_json(&mut ws, join_event(OWNER, "freelancer", "Alice", None)).await;
    let presence = wait_for_event(&mut ws, "presence_update").await;
    assert!(presence["users"].is_array());
    ws
}

async fn join_client(url: &str, user_id: &str, user_name: &str) -> WsStream {
    let mut ws = connect(url).await;
    send_json(
        &mut ws,
        join_event(user_id, "client", user_name, Some(TOKEN)),
    )
    .await;
    wait_for_event(&mut ws, "presence_update").await;
    ws
}

#[tokio::test]
async fn test_health_endpoint_responds() {
    // テスト項目: /api/health が status ok を返す
    // given (前提条件):
    let server = TestServer::start_default(18090).await;

    // when (操作):
    let response: Value = reqwest::get(server.http_url("/api/health"))
        .await
        .expect("Failed to reach health endpoint")
        .json()
        .await
        .expect("Health response is not JSON");

    // then (期待する結果):
    assert_eq!(response["status"], "ok");
}

#[tokio::test]
async fn test_join_broadcasts_presence_and_user_joined() {
    // テスト項目: 参加でスナップショットが全員に配られ、既存メンバーには
    //             user_joined も届く
    // given (前提条件):
    let server = TestServer::start_default(18091).await;
    let mut alice = join_freelancer(&server.ws_url()).await;

    // when (操作): bob (client) が参加
    let mut bob = join_client(&server.ws_url(), "client-1", "Bob").await;

    // then (期待する結果): alice に 2 人のスナップショットと user_joined が届く
    let presence = wait_for_event(&mut alice, "presence_update").await;
    assert_eq!(presence["users"].as_array().unwrap().len(), 2);
    let joined = wait_for_event(&mut alice, "user_joined").await;
    assert_eq!(joined["userId"], "client-1");
    assert_eq!(joined["userType"], "client");

    // bob のスナップショットにも 2 人いる（自身の join への返信で確認済みだが、
    // ここでは HTTP 側からも確認する)
    let detail: Value = reqwest::get(server.http_url(&format!("/api/projects/{PROJECT}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["participants"].as_array().unwrap().len(), 2);

    bob.close(None).await.ok();
}

#[tokio::test]
async fn test_message_flow_with_read_receipt() {
    // テスト項目: §メッセージ送受信と既読レシートの一連の流れ
    //   A が送信 → B が new_message を受信（status: sent）
    //   A は自分のエコーを受信（同じ id）
    //   B が既読化 → A に message_read が届き、Store 側も既読になる
    // given (前提条件):
    let server = TestServer::start_default(18092).await;
    let mut alice = join_freelancer(&server.ws_url()).await;
    let mut bob = join_client(&server.ws_url(), "client-1", "Bob").await;
    // alice 側の参加通知を読み捨てる
    wait_for_event(&mut alice, "user_joined").await;

    // when (操作): alice がメッセージを送信
    send_json(
        &mut alice,
        json!({
            "type": "send_message",
            "projectId": PROJECT,
            "senderName": "Alice",
            "senderType": "freelancer",
            "content": "hello",
        }),
    )
    .await;

    // then (期待する結果): bob に新着メッセージが届く
    let message = wait_for_event(&mut bob, "new_message").await;
    assert_eq!(message["content"], "hello");
    assert_eq!(message["status"], "sent");
    assert_eq!(message["isRead"], false);
    assert_eq!(message["senderType"], "freelancer");
    let message_id = message["id"].as_str().unwrap().to_string();

    // 送信者自身にもエコーが届く（クライアントは id で重複排除する）
    let echo = wait_for_event(&mut alice, "new_message").await;
    assert_eq!(echo["id"].as_str().unwrap(), message_id);

    // when (操作): bob が既読化
    send_json(
        &mut bob,
        json!({
            "type": "mark_message_read",
            "messageId": message_id,
            "projectId": PROJECT,
            "userId": "client-1",
            "userType": "client",
        }),
    )
    .await;

    // then (期待する結果): alice に message_read が届く
    let read = wait_for_event(&mut alice, "message_read").await;
    assert_eq!(read["messageId"].as_str().unwrap(), message_id);
    assert_eq!(read["readBy"], "client-1");
    assert_eq!(read["readByType"], "client");

    // read-after-write: イベントを見た後の再取得で必ず既読が見える
    let messages: Value =
        reqwest::get(server.http_url(&format!("/api/projects/{PROJECT}/messages")))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
    assert_eq!(messages[0]["status"], "read");
    assert_eq!(messages[0]["isRead"], true);
}

#[tokio::test]
async fn test_typing_expires_without_explicit_stop() {
    // テスト項目: typing_stop なしの typing_start は自動失効し、
    //             isTyping:false の合成イベントが届く
    // given (前提条件): タイピング失効 300ms
    let server = TestServer::start_default(18093).await;
    let mut alice = join_freelancer(&server.ws_url()).await;
    let mut bob = join_client(&server.ws_url(), "client-1", "Bob").await;
    wait_for_event(&mut alice, "user_joined").await;

    // when (操作): alice がタイピングを開始し、そのまま黙る
    send_json(
        &mut alice,
        json!({
            "type": "typing_start",
            "projectId": PROJECT,
            "userId": OWNER,
            "userType": "freelancer",
            "userName": "Alice",
        }),
    )
    .await;

    // then (期待する結果): bob に true が届き、やがて false が届く
    let typing = wait_for_event(&mut bob, "user_typing").await;
    assert_eq!(typing["isTyping"], true);
    assert_eq!(typing["userId"], OWNER);

    let stopped = wait_for_event(&mut bob, "user_typing").await;
    assert_eq!(stopped["isTyping"], false);
    assert_eq!(stopped["userId"], OWNER);
}

#[tokio::test]
async fn test_silent_connection_is_evicted_by_heartbeat_timeout() {
    // テスト項目: ping を送らない接続はハートビートタイムアウトで evict され、
    //             残りのメンバーに user_left とプレゼンス更新が届く
    // given (前提条件): ping 間隔 200ms、2 回欠けたら evict
    let liveness = LivenessConfig {
        ping_interval: Duration::from_millis(200),
        max_missed: 2,
    };
    let server = TestServer::start(18094, liveness, Duration::from_millis(300)).await;
    let mut alice = join_freelancer(&server.ws_url()).await;
    let mut bob = join_client(&server.ws_url(), "client-1", "Bob").await;
    wait_for_event(&mut alice, "user_joined").await;

    // when (操作): alice はハートビートを送り続け、bob は黙る
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let user_left = loop {
        send_json(&mut alice, json!({"type": "ping"})).await;
        let frame = tokio::time::timeout(Duration::from_millis(150), alice.next()).await;
        if let Ok(Some(Ok(Message::Text(text)))) = frame {
            let event: Value = serde_json::from_str(&text).unwrap();
            if event["type"] == "user_left" {
                break event;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("bob was not evicted within the deadline");
        }
    };

    // then (期待する結果): bob の退出が通知され、プレゼンスから消える
    assert_eq!(user_left["userId"], "client-1");
    let presence = wait_for_event(&mut alice, "presence_update").await;
    let users = presence["users"].as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["userId"], OWNER);

    // evict された bob のソケットはサーバー側から閉じられる
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match bob.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "bob's socket should be closed after eviction");
}

#[tokio::test]
async fn test_rejoin_replaces_presence_entry() {
    // テスト項目: 同一アイデンティティの再接続でプレゼンスが重複せず、
    //             user_left も流れない（last join wins）
    // given (前提条件):
    let server = TestServer::start_default(18095).await;
    let mut alice = join_freelancer(&server.ws_url()).await;
    let mut bob_first = join_client(&server.ws_url(), "client-1", "Bob").await;
    wait_for_event(&mut alice, "user_joined").await;

    // when (操作): bob が新しいソケットで再 join
    let _bob_second = join_client(&server.ws_url(), "client-1", "Bob").await;

    // then (期待する結果): プレゼンスは 2 人のまま
    let presence = wait_for_event(&mut alice, "presence_update").await;
    assert_eq!(presence["users"].as_array().unwrap().len(), 2);

    // user_left は流れない: スナップショットの直後は user_joined
    let next = recv_event(&mut alice).await;
    assert_eq!(next["type"], "user_joined");
    assert_eq!(next["userId"], "client-1");

    // 置き換えられた古いソケットは閉じられる
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match bob_first.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "superseded socket should be closed");

    // HTTP 側でも 1 エントリずつ
    let detail: Value = reqwest::get(server.http_url(&format!("/api/projects/{PROJECT}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_share_token_is_refused_before_joining() {
    // テスト項目: 無効な共有トークンでの join は error イベントの後に
    //             接続が閉じられ、Room 状態には現れない
    // given (前提条件):
    let server = TestServer::start_default(18096).await;
    let mut alice = join_freelancer(&server.ws_url()).await;

    // when (操作): 誤ったトークンで join を試みる
    let mut intruder = connect(&server.ws_url()).await;
    send_json(
        &mut intruder,
        join_event("client-9", "client", "Mallory", Some("wrong-token")),
    )
    .await;

    // then (期待する結果): error イベントが届き、接続が閉じる
    let error = wait_for_event(&mut intruder, "error").await;
    assert!(
        error["reason"].as_str().unwrap().contains("share token"),
        "unexpected reason: {}",
        error["reason"]
    );
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match intruder.next().await {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "refused connection should be closed");

    // alice には何の通知も届いていない（presence は 1 人のまま）
    let detail: Value = reqwest::get(server.http_url(&format!("/api/projects/{PROJECT}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["participants"].as_array().unwrap().len(), 1);

    alice.close(None).await.ok();
}

#[tokio::test]
async fn test_bulk_read_receipt_counts_new_transitions_only() {
    // テスト項目: 一括既読化は新規遷移の件数を運び、繰り返しは 0 件になる
    // given (前提条件): alice が 2 通送信済み
    let server = TestServer::start_default(18097).await;
    let mut alice = join_freelancer(&server.ws_url()).await;
    let mut bob = join_client(&server.ws_url(), "client-1", "Bob").await;
    wait_for_event(&mut alice, "user_joined").await;

    for content in ["first", "second"] {
        send_json(
            &mut alice,
            json!({
                "type": "send_message",
                "projectId": PROJECT,
                "senderName": "Alice",
                "senderType": "freelancer",
                "content": content,
            }),
        )
        .await;
        wait_for_event(&mut bob, "new_message").await;
    }

    // when (操作): bob が freelancer からのメッセージを一括既読化（2 回）
    let bulk_read = json!({
        "type": "mark_messages_read",
        "projectId": PROJECT,
        "userId": "client-1",
        "userType": "client",
        "senderType": "freelancer",
    });
    send_json(&mut bob, bulk_read.clone()).await;
    let first = wait_for_event(&mut alice, "bulk_messages_read").await;
    send_json(&mut bob, bulk_read).await;
    let second = wait_for_event(&mut alice, "bulk_messages_read").await;

    // then (期待する結果):
    assert_eq!(first["count"], 2);
    assert_eq!(first["isBulk"], true);
    assert_eq!(first["readBy"], "client-1");
    assert_eq!(second["count"], 0);
}

#[tokio::test]
async fn test_connection_controller_round_trip() {
    // テスト項目: ConnectionController が join を再生し、イベントバスに
    //             サーバーイベントを流し、入力チャンネルの close で
    //             正常終了する
    // given (前提条件):
    let server = TestServer::start_default(18099).await;
    let mut alice = join_freelancer(&server.ws_url()).await;

    let identity = kakehashi_client::controller::JoinIdentity {
        project_id: PROJECT.to_string(),
        user_id: "client-1".to_string(),
        user_type: "client".to_string(),
        user_name: "Bob".to_string(),
        share_token: Some(TOKEN.to_string()),
    };
    let controller = Arc::new(kakehashi_client::controller::ConnectionController::new(
        server.ws_url(),
        identity,
    ));
    let mut events = controller.events();
    let health = controller.health();
    let (outbound_tx, outbound_rx) = tokio::sync::mpsc::unbounded_channel();
    let runner = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.run(outbound_rx).await })
    };

    // when (操作): 接続確立を待ち、bob からメッセージを送る
    let presence = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            if let kakehashi_server::infrastructure::dto::websocket::ServerEvent::PresenceUpdate(
                payload,
            ) = events.recv().await.unwrap()
            {
                break payload;
            }
        }
    })
    .await
    .expect("controller did not receive the presence snapshot");
    assert_eq!(presence.users.len(), 2);
    assert!(health.borrow().is_connected);

    wait_for_event(&mut alice, "user_joined").await;
    outbound_tx
        .send(
            kakehashi_client::input::parse_line(
                "hello from the controller",
                &kakehashi_client::controller::JoinIdentity {
                    project_id: PROJECT.to_string(),
                    user_id: "client-1".to_string(),
                    user_type: "client".to_string(),
                    user_name: "Bob".to_string(),
                    share_token: Some(TOKEN.to_string()),
                },
            )
            .unwrap(),
        )
        .unwrap();

    // then (期待する結果): alice に届く
    let message = wait_for_event(&mut alice, "new_message").await;
    assert_eq!(message["content"], "hello from the controller");
    assert_eq!(message["senderType"], "client");

    // 入力チャンネルを閉じるとセッションは正常終了する
    drop(outbound_tx);
    let result = tokio::time::timeout(RECV_TIMEOUT, runner)
        .await
        .expect("controller did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(!health.borrow().is_connected);
}

#[tokio::test]
async fn test_empty_message_is_rejected_inline() {
    // テスト項目: 空のメッセージは送信者だけに error が返り、
    //             他のメンバーには何も配られない
    // given (前提条件):
    let server = TestServer::start_default(18098).await;
    let mut alice = join_freelancer(&server.ws_url()).await;
    let mut bob = join_client(&server.ws_url(), "client-1", "Bob").await;
    wait_for_event(&mut alice, "user_joined").await;

    // when (操作): alice が空白だけのメッセージを送る
    send_json(
        &mut alice,
        json!({
            "type": "send_message",
            "projectId": PROJECT,
            "senderName": "Alice",
            "senderType": "freelancer",
            "content": "   ",
        }),
    )
    .await;

    // then (期待する結果): alice に error、bob には届かない
    let error = wait_for_event(&mut alice, "error").await;
    assert!(error["reason"].as_str().unwrap().contains("content"));

    send_json(
        &mut alice,
        json!({
            "type": "send_message",
            "projectId": PROJECT,
            "senderName": "Alice",
            "senderType": "freelancer",
            "content": "real message",
        }),
    )
    .await;
    let message = wait_for_event(&mut bob, "new_message").await;
    assert_eq!(message["content"], "real message");
}
