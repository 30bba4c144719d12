//! WebSocket transport layer.
//!
//! Links carry envelopes between the server and connected clients. The
//! registry owns every link and routes inbound envelopes by type tag.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Browser client │         WebSocket            │  Link           │
//! │                 │◄────────────────────────────►│  writer task    │
//! │                 │  /room/{roomID}/connect      │  read loop      │
//! └─────────────────┘                              └────────┬────────┘
//!                                                           │ dispatch
//!                                                  ┌────────▼────────┐
//!                                                  │ ConnectionReg.  │
//!                                                  └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `link` | Ordered writer and close sequence |
//! | `dispatcher` | Link ownership, read loop, subscriptions |

// ============================================================================
// Submodules
// ============================================================================

/// One connection: writer task and close observers.
pub mod link;

/// Connection registry and type-keyed dispatch.
pub mod dispatcher;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{ConnectionRegistry, MessageHandler, PendingLink};
pub use link::{CloseObserver, Link};
