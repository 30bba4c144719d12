//! Room lifecycle, membership, and broadcast.
//!
//! # Lock Order
//!
//! The room map lock is always taken before a room's member lock. Broadcast
//! holds a room's member lock while resolving members through the client
//! registry; the registry never calls back into rooms.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clients::{ClientIdentity, ClientRegistry};
use crate::error::{Error, Result};
use crate::identifiers::{ClientId, RoomId};
use crate::protocol::{ClientDisconnectMessage, Envelope, encode, message_types};
use crate::rooms::Room;
use crate::transport::PendingLink;

// ============================================================================
// Constants
// ============================================================================

/// Length of a generated room ID.
pub const ROOM_ID_LENGTH: usize = 6;

/// Default number of attempts to find an unused room ID.
pub const DEFAULT_ROOM_ID_ATTEMPTS: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// Observer notified after a client joined a room.
pub type JoinObserver = Arc<dyn Fn(&Arc<Room>, &Arc<ClientIdentity>) + Send + Sync>;

// ============================================================================
// RoomManager
// ============================================================================

/// Creates rooms on first join and reclaims them when the last member leaves.
pub struct RoomManager {
    clients: Arc<ClientRegistry>,
    rooms: RwLock<FxHashMap<RoomId, Arc<Room>>>,
    join_observers: RwLock<Vec<JoinObserver>>,
    room_id_attempts: usize,
}

impl fmt::Debug for RoomManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomManager")
            .field("rooms", &self.room_count())
            .field("room_id_attempts", &self.room_id_attempts)
            .finish_non_exhaustive()
    }
}

impl RoomManager {
    /// Creates a manager with the default ID generation attempts.
    #[must_use]
    pub fn new(clients: Arc<ClientRegistry>) -> Arc<Self> {
        Self::with_room_id_attempts(clients, DEFAULT_ROOM_ID_ATTEMPTS)
    }

    /// Creates a manager with a custom number of ID generation attempts.
    #[must_use]
    pub fn with_room_id_attempts(clients: Arc<ClientRegistry>, attempts: usize) -> Arc<Self> {
        Arc::new(Self {
            clients,
            rooms: RwLock::new(FxHashMap::default()),
            join_observers: RwLock::new(Vec::new()),
            room_id_attempts: attempts,
        })
    }

    /// Returns the client registry.
    #[inline]
    #[must_use]
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Returns the number of live rooms.
    #[inline]
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    /// Returns a live room.
    #[must_use]
    pub fn get(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.read().get(room_id).cloned()
    }

    /// Returns `true` if the room currently exists.
    #[must_use]
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.read().contains_key(room_id)
    }

    /// Returns the members of a room, empty if it does not exist.
    #[must_use]
    pub fn members(&self, room_id: &RoomId) -> Vec<ClientId> {
        self.get(room_id).map(|room| room.members()).unwrap_or_default()
    }

    /// Finds the room a client belongs to.
    ///
    /// Scans every room: O(rooms × members).
    #[must_use]
    pub fn room_of(&self, client_id: ClientId) -> Option<Arc<Room>> {
        self.rooms
            .read()
            .values()
            .find(|room| room.contains(client_id))
            .cloned()
    }

    /// Registers an observer for joins.
    pub fn on_client_join<F>(&self, observer: F)
    where
        F: Fn(&Arc<Room>, &Arc<ClientIdentity>) + Send + Sync + 'static,
    {
        self.join_observers.write().push(Arc::new(observer));
    }
}

// ============================================================================
// RoomManager - Join & Leave
// ============================================================================

impl RoomManager {
    /// Admits a new link into a room, creating the room if needed.
    ///
    /// The link is registered as a client, joined, and only then starts
    /// reading.
    pub fn connect_to_room(
        self: &Arc<Self>,
        room_id: RoomId,
        pending: PendingLink,
    ) -> Arc<ClientIdentity> {
        let identity = self.clients.register(pending.link().clone());
        let room = self.join(room_id, &identity);

        let manager = Arc::downgrade(self);
        let leaving = Arc::clone(&room);
        let client_id = identity.id();
        identity.on_disconnect(async move {
            if let Some(manager) = manager.upgrade() {
                manager.leave(&leaving, client_id);
            }
        });

        let observers: Vec<JoinObserver> = self.join_observers.read().clone();
        for observer in observers {
            observer(&room, &identity);
        }

        pending.listen();
        identity
    }

    /// Adds a client to a room, creating it atomically if absent.
    fn join(&self, room_id: RoomId, identity: &ClientIdentity) -> Arc<Room> {
        let mut rooms = self.rooms.write();
        let room = rooms
            .entry(room_id)
            .or_insert_with_key(|id| {
                info!(room_id = %id, "Room created");
                Arc::new(Room::new(id.clone()))
            })
            .clone();
        room.add(identity.id());
        drop(rooms);

        info!(room_id = %room.id(), client_id = %identity.id(), "Client joined room");
        room
    }

    /// Removes a departed client and tells the remaining members.
    fn leave(&self, room: &Arc<Room>, client_id: ClientId) {
        if !room.remove(client_id) {
            debug!(room_id = %room.id(), %client_id, "Client was not a member");
        }

        if room.is_empty() {
            let mut rooms = self.rooms.write();
            if room.is_empty() && rooms.get(room.id()).is_some_and(|r| Arc::ptr_eq(r, room)) {
                rooms.remove(room.id());
                info!(room_id = %room.id(), "Room reclaimed");
            }
            return;
        }

        self.broadcast(
            room,
            &Envelope::new(
                message_types::CLIENT_DISCONNECT,
                ClientDisconnectMessage { client_id },
            ),
            Some(client_id),
        );

        info!(room_id = %room.id(), %client_id, "Client left room");
    }
}

// ============================================================================
// RoomManager - Broadcast
// ============================================================================

impl RoomManager {
    /// Sends an envelope to every member of a room except `exclude`.
    ///
    /// The envelope is encoded once.
    ///
    /// # Panics
    ///
    /// Panics if a member has no registered identity.
    pub fn broadcast<T: Serialize>(
        &self,
        room: &Room,
        envelope: &Envelope<T>,
        exclude: Option<ClientId>,
    ) {
        let frame = match encode(envelope) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(room_id = %room.id(), error = %e, "Failed to encode broadcast");
                return;
            }
        };

        let members = room.read_members();
        for &member in members.iter() {
            if Some(member) == exclude {
                continue;
            }

            let Some(identity) = self.clients.lookup(member) else {
                panic!("room {} member {member} has no registered client", room.id());
            };
            identity.link().send_frame(frame.clone());
        }

        debug!(
            room_id = %room.id(),
            message_type = envelope.message_type(),
            "Broadcast sent"
        );
    }
}

// ============================================================================
// RoomManager - ID Generation
// ============================================================================

impl RoomManager {
    /// Generates a room ID that no live room is using.
    ///
    /// The ID is not reserved; a later connect with it simply creates the room.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RoomIdUnavailable`] if every attempt collided.
    pub fn generate_room_id(&self) -> Result<RoomId> {
        let mut rng = rand::thread_rng();

        for _ in 0..self.room_id_attempts {
            let candidate = RoomId::new(
                (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(ROOM_ID_LENGTH)
                    .map(char::from)
                    .collect::<String>(),
            );

            if !self.contains(&candidate) {
                debug!(room_id = %candidate, "Room ID generated");
                return Ok(candidate);
            }
        }

        warn!(attempts = self.room_id_attempts, "Room ID space exhausted");
        Err(Error::room_id_unavailable(self.room_id_attempts))
    }
}

// ============================================================================
// Tests
// ============================================================================
