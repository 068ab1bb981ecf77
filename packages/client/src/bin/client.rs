//! Reconnecting CLI messaging client with typing indicators and read
//! receipts.
//!
//! Connects to a kakehashi server, joins a project room, and sends
//! messages from stdin. Typing indicators are emitted automatically; read
//! receipts are driven with `/read <message_id>` and `/readall`.
//! Automatically reconnects on disconnection (max 5 attempts with 5 second
//! interval) and replays the join after every reconnect.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kakehashi-client -- --user-id freelancer-1 --user-type freelancer
//! cargo run --bin kakehashi-client -- --user-id client-1 --user-type client \
//!     --user-name "Client One" --share-token demo-share-token
//! ```

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use kakehashi_client::{
    controller::{ConnectionController, JoinIdentity},
    formatter::MessageFormatter,
    input::parse_line,
    typing::{TYPING_STOP_DELAY, TypingTracker},
    ui::redisplay_prompt,
};
use kakehashi_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "CLI messaging client with presence, typing indicators and read receipts", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Project to join
    #[arg(short = 'p', long, default_value = "demo-project")]
    project_id: String,

    /// User id
    #[arg(long, default_value = "freelancer-1")]
    user_id: String,

    /// User type: "freelancer" or "client"
    #[arg(long, default_value = "freelancer")]
    user_type: String,

    /// Display name
    #[arg(long, default_value = "Freelancer")]
    user_name: String,

    /// Share token (required for client access)
    #[arg(long)]
    share_token: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let identity = JoinIdentity {
        project_id: args.project_id,
        user_id: args.user_id,
        user_type: args.user_type,
        user_name: args.user_name,
        share_token: args.share_token,
    };

    let controller = ConnectionController::new(args.url, identity.clone());
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    // Print server events as they arrive
    let mut events = controller.events();
    let own_user_id = identity.user_id.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Some(line) = MessageFormatter::format_event(&event, &own_user_id) {
                        print!("{}", line);
                        redisplay_prompt(&own_user_id);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(count)) => {
                    tracing::warn!("Display fell behind, dropped {} events", count);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Reconnect banner
    let mut health = controller.health();
    tokio::spawn(async move {
        while health.changed().await.is_ok() {
            let snapshot = health.borrow_and_update().clone();
            if snapshot.is_reconnecting {
                tracing::warn!(
                    "Connection lost, reconnecting (attempt {})",
                    snapshot.reconnect_attempts
                );
            }
        }
    });

    // Typing auto-stop timer mirrors the server-side expiry
    let tracker = TypingTracker::spawn(identity.clone(), outbound_tx.clone(), TYPING_STOP_DELAY);

    println!(
        "\nYou are '{}' in project '{}'. Type messages and press Enter to send.",
        identity.user_id, identity.project_id
    );
    println!("Commands: /read <message_id>, /readall [sender_type]. Press Ctrl+C to exit.\n");

    // Blocking thread for rustyline (synchronous readline)
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let prompt_user_id = identity.user_id.clone();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", prompt_user_id);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    break;
                }
                Err(e) => {
                    tracing::error!("Readline error: {}", e);
                    break;
                }
            }
        }
    });

    // Bridge input lines to outbound events
    let bridge_identity = identity.clone();
    tokio::spawn(async move {
        while let Some(line) = input_rx.recv().await {
            tracker.keystroke();
            match parse_line(&line, &bridge_identity) {
                Ok(event) => {
                    if outbound_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(reason) => {
                    eprintln!("{}", reason);
                    redisplay_prompt(&bridge_identity.user_id);
                }
            }
        }
        // outbound_tx drops here, which ends the controller session
    });

    // Run the connection state machine until exit
    if let Err(e) = controller.run(outbound_rx).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
