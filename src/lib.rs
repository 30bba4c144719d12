//! ScreenEcho server - rendezvous and signaling for multi-party screen sharing.
//!
//! Browsers join a named room over a WebSocket, learn their own client id,
//! and use the server to exchange WebRTC negotiation messages with peers in
//! the room. Media never flows through the server.
//!
//! # Architecture
//!
//! ```text
//!   WebSocket ──► ConnectionRegistry ──dispatch by type──┬─► SignalingRelay
//!                       │                                └─► StreamTracker
//!                       ▼                                        │
//!                 ClientRegistry ◄──────── RoomManager ◄─────────┘
//! ```
//!
//! Key design principles:
//!
//! - One writer task per link, so sends on a link never interleave
//! - Strict decoding: any extra, missing, or mistyped field is rejected
//! - Cleanup on disconnect completes before a client id becomes unresolvable
//! - Rooms exist only while they have members
//!
//! # Quick Start
//!
//! ```no_run
//! use screenecho_server::{Result, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Server::bind(ServerConfig::new().with_port(8080)).await?;
//!     println!("listening on {}", server.local_addr());
//!     server.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`clients`] | Client identities and disconnect hooks |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Envelope, payloads, strict codec |
//! | [`rooms`] | Room lifecycle and broadcast |
//! | [`server`] | HTTP front door and configuration |
//! | [`signaling`] | Offer, answer, and ICE relay |
//! | [`streams`] | Active stream tracking |
//! | [`transport`] | Links and message dispatch |

// ============================================================================
// Modules
// ============================================================================

/// Client identities.
pub mod clients;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol.
pub mod protocol;

/// Rooms and broadcast.
pub mod rooms;

/// HTTP front door and server assembly.
pub mod server;

/// WebRTC negotiation relay.
pub mod signaling;

/// Active stream tracking.
pub mod streams;

/// WebSocket transport layer.
///
/// Link ownership, ordered writes, close sequence, and dispatch.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Components
pub use clients::{ClientIdentity, ClientRegistry};
pub use rooms::{Room, RoomManager};
pub use signaling::SignalingRelay;
pub use streams::{StreamRecord, StreamTracker};
pub use transport::{ConnectionRegistry, Link, PendingLink};

// Server
pub use server::{AppState, Server, ServerConfig, build_router};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ClientId, LinkId, RoomId, SubscriptionId};
