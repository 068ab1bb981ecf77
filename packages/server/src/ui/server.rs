//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::{
    handler::http::{get_project_detail, get_project_messages, get_projects, health_check},
    handler::websocket::websocket_handler,
    monitor::{LivenessConfig, spawn_liveness_monitor},
    signal::shutdown_signal,
    state::AppState,
};

/// WebSocket messaging server
///
/// This struct encapsulates the server configuration and provides methods
/// to run the server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(app_state);
/// server.run("127.0.0.1".to_string(), 8080).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
    liveness: LivenessConfig,
}

impl Server {
    /// Create a new Server instance with the default heartbeat settings
    /// (30 second ping interval, eviction after 2 missed intervals)
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            liveness: LivenessConfig::default(),
        }
    }

    /// Override the heartbeat settings (integration tests shrink them)
    pub fn with_liveness(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = liveness;
        self
    }

    /// Build the router (WebSocket endpoint + HTTP API)
    fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/projects", get(get_projects))
            .route("/api/projects/{project_id}", get(get_project_detail))
            .route(
                "/api/projects/{project_id}/messages",
                get(get_project_messages),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the WebSocket messaging server
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8080)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address
    /// or if there's an error during server execution.
    pub async fn run(
        self,
        host: String,
        port: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = self.router();

        // Background sweeper for connections that stopped sending heartbeats
        let monitor = spawn_liveness_monitor(self.state.clone(), self.liveness);

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!(
            "WebSocket messaging server listening on {}",
            listener.local_addr()?
        );
        tracing::info!("Connect to: ws://{}/ws", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        // Set up graceful shutdown signal handler
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        monitor.abort();
        result?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
