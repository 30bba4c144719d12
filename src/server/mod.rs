//! HTTP front door and server assembly.
//!
//! Builds the component graph, mounts it on an axum router, and serves it.
//!
//! # Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/room/{roomID}/connect` | WebSocket upgrade, joins `roomID` |
//! | GET | `/room/generate-id` | `{"roomID": "..."}` or 503 |
//! | GET | `/health` | `OK` |
//!
//! # Example
//!
//! ```no_run
//! use screenecho_server::{Server, ServerConfig};
//!
//! # async fn example() -> screenecho_server::Result<()> {
//! let server = Server::bind(ServerConfig::new().with_port(0)).await?;
//! println!("listening on {}", server.local_addr());
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Server configuration.
pub mod config;

pub use config::ServerConfig;

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::clients::ClientRegistry;
use crate::error::Result;
use crate::identifiers::RoomId;
use crate::protocol::RoomIdResponse;
use crate::rooms::RoomManager;
use crate::signaling::SignalingRelay;
use crate::streams::StreamTracker;
use crate::transport::ConnectionRegistry;

// ============================================================================
// AppState
// ============================================================================

/// Component graph shared by all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Link ownership and dispatch.
    pub connections: Arc<ConnectionRegistry>,
    /// Client identities.
    pub clients: Arc<ClientRegistry>,
    /// Rooms and broadcast.
    pub rooms: Arc<RoomManager>,
    /// Active streams.
    pub streams: Arc<StreamTracker>,
    /// Negotiation relay.
    pub relay: Arc<SignalingRelay>,
}

impl AppState {
    /// Builds the components and wires their subscriptions.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        let connections = ConnectionRegistry::new();
        let clients = ClientRegistry::new(Arc::clone(&connections));
        let rooms = RoomManager::with_room_id_attempts(Arc::clone(&clients), config.room_id_attempts);
        let streams = StreamTracker::new(&clients, Arc::clone(&rooms));
        let relay = SignalingRelay::new(Arc::clone(&clients));

        Self {
            connections,
            clients,
            rooms,
            streams,
            relay,
        }
    }
}

/// Builds the router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/room/generate-id", get(generate_id_handler))
        .route("/room/{room_id}/connect", get(connect_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Server
// ============================================================================

/// A running server.
pub struct Server {
    local_addr: SocketAddr,
    state: AppState,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Server {
    /// Validates the config, binds the listener, and starts serving.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the config is invalid
    /// - [`Error::Io`](crate::Error::Io) if binding fails
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let state = AppState::new(&config);
        let router = build_router(state.clone());

        let listener = TcpListener::bind(config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "Server terminated");
            }
        });

        info!(%local_addr, "Signaling server started");

        Ok(Self {
            local_addr,
            state,
            shutdown_tx,
            task,
        })
    }

    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the component graph.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stops accepting requests and waits for the serve task.
    ///
    /// Upgraded links keep running until their peers disconnect.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Serve task failed");
        }
        info!(local_addr = %self.local_addr, "Signaling server stopped");
    }

    /// Waits until the serve task ends.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Serve task failed");
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// WebSocket upgrade for a room.
async fn connect_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    debug!(%room_id, "Upgrade requested");

    ws.on_upgrade(move |socket| async move {
        let pending = state.connections.establish_socket(socket);
        state.rooms.connect_to_room(RoomId::from(room_id), pending);
    })
}

/// Mints an unused room ID.
async fn generate_id_handler(State(state): State<AppState>) -> Response {
    match state.rooms.generate_room_id() {
        Ok(room_id) => Json(RoomIdResponse { room_id }).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// Liveness probe.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// Tests
// ============================================================================
