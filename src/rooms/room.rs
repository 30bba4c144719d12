//! A single room and its member set.

use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard};
use rustc_hash::FxHashSet;

use crate::identifiers::{ClientId, RoomId};

// ============================================================================
// Room
// ============================================================================

/// A named group of clients.
///
/// Each member is in exactly this one room for its whole lifetime.
pub struct Room {
    id: RoomId,
    members: RwLock<FxHashSet<ClientId>>,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("members", &self.len())
            .finish()
    }
}

impl Room {
    pub(crate) fn new(id: RoomId) -> Self {
        Self {
            id,
            members: RwLock::new(FxHashSet::default()),
        }
    }

    /// Returns the room ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Returns `true` if the client is a member.
    #[inline]
    #[must_use]
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.read().contains(&client_id)
    }

    /// Returns a snapshot of the member ids.
    #[must_use]
    pub fn members(&self) -> Vec<ClientId> {
        self.members.read().iter().copied().collect()
    }

    /// Returns the member count.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Returns `true` if the room has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Adds a member.
    ///
    /// # Panics
    ///
    /// Panics if the client is already a member; ids are never reused.
    pub(crate) fn add(&self, client_id: ClientId) {
        let inserted = self.members.write().insert(client_id);
        assert!(inserted, "client {client_id} already joined room {}", self.id);
    }

    /// Removes a member. Returns `false` if it was not a member.
    pub(crate) fn remove(&self, client_id: ClientId) -> bool {
        self.members.write().remove(&client_id)
    }

    /// Holds the member set for reading.
    pub(crate) fn read_members(&self) -> RwLockReadGuard<'_, FxHashSet<ClientId>> {
        self.members.read()
    }
}

// ============================================================================
// Tests
// ============================================================================
