//! Rooms: named groups of clients.
//!
//! A room exists while it has at least one member. The first join creates
//! it, the last departure reclaims it, and a later join with the same ID
//! starts a fresh room.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `room` | Member set of one room |
//! | `manager` | Room lifecycle, broadcast, ID generation |

// ============================================================================
// Submodules
// ============================================================================

/// A single room.
pub mod room;

/// Room lifecycle and broadcast.
pub mod manager;

// ============================================================================
// Re-exports
// ============================================================================

pub use manager::{DEFAULT_ROOM_ID_ATTEMPTS, JoinObserver, ROOM_ID_LENGTH, RoomManager};
pub use room::Room;
