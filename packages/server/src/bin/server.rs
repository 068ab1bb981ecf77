//! Real-time project messaging server.
//!
//! One WebSocket room per project: presence, typing indicators, chat
//! messages with read receipts, and heartbeat-based liveness.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-server
//! cargo run --bin kakehashi-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;

use kakehashi_server::{
    domain::{MessagePusher, MessageStore, ProjectId, RoomRegistry, ShareToken, UserId},
    infrastructure::{
        auth::InMemoryIdentityValidator, message_pusher::WebSocketMessagePusher,
        registry::InMemoryRoomRegistry, store::InMemoryMessageStore,
    },
    ui::{Server, state::AppState},
    usecase::{
        GetProjectStateUseCase, JoinProjectUseCase, LeaveProjectUseCase, MarkReadUseCase,
        SendMessageUseCase, TypingUseCase,
    },
};
use kakehashi_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Real-time project messaging server with presence and read receipts", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Project to register on startup (stand-in for the external project
    /// management service)
    #[arg(long, default_value = "demo-project")]
    project_id: String,

    /// Freelancer user id owning the registered project
    #[arg(long, default_value = "freelancer-1")]
    owner_id: String,

    /// Share token granting client access to the registered project
    #[arg(long, default_value = "demo-share-token")]
    share_token: String,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Clock
    // 2. Registry / Store / Validator
    // 3. MessagePusher
    // 4. UseCases
    // 5. AppState + Server

    // 1. Clock (shared by all layers)
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 2. Room registry, message store, and identity validator (in-memory)
    let registry: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new(clock.clone()));
    let message_store: Arc<dyn MessageStore> =
        Arc::new(InMemoryMessageStore::new(clock.clone()));
    let validator = Arc::new(InMemoryIdentityValidator::new(clock.clone()));

    let project_id = ProjectId::new(args.project_id).expect("Failed to create ProjectId");
    let owner = UserId::new(args.owner_id).expect("Failed to create UserId");
    let share_token = ShareToken::new(args.share_token).expect("Failed to create ShareToken");
    validator
        .register_project(project_id.clone(), owner.clone(), share_token, None)
        .await;
    tracing::info!(
        "Project '{}' registered (owner: '{}')",
        project_id,
        owner
    );

    // 3. Create MessagePusher (WebSocket implementation)
    let message_pusher: Arc<dyn MessagePusher> = Arc::new(WebSocketMessagePusher::new());

    // 4. Create UseCases
    let join_project_usecase = Arc::new(JoinProjectUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        validator.clone(),
        clock.clone(),
    ));
    let leave_project_usecase = Arc::new(LeaveProjectUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let send_message_usecase = Arc::new(SendMessageUseCase::new(
        registry.clone(),
        message_store.clone(),
    ));
    let mark_read_usecase = Arc::new(MarkReadUseCase::new(
        registry.clone(),
        message_store.clone(),
        clock.clone(),
    ));
    let typing_usecase = Arc::new(TypingUseCase::new(
        registry.clone(),
        message_pusher.clone(),
        clock.clone(),
    ));
    let project_state_usecase = Arc::new(GetProjectStateUseCase::new(
        registry.clone(),
        message_store.clone(),
    ));

    // 5. Create and run the server
    let app_state = Arc::new(AppState {
        join_project_usecase,
        leave_project_usecase,
        send_message_usecase,
        mark_read_usecase,
        typing_usecase,
        project_state_usecase,
        registry,
        message_pusher,
        clock,
    });
    let server = Server::new(app_state);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
