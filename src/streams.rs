//! Active stream tracking.
//!
//! Records which clients are currently sharing their screen, per room, and
//! relays `stream-started` / `stream-stopped` to the rest of the room. The
//! payloads of both messages are opaque to the server and forwarded verbatim.
//!
//! A client has at most one active stream. The first start of a client
//! installs a single disconnect hook, so a client that departs without
//! sending `stream-stopped` still has its record removed; peers learn about
//! it through `client-disconnect`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

use crate::clients::{ClientIdentity, ClientRegistry};
use crate::error::{Error, Result};
use crate::identifiers::{ClientId, RoomId, SubscriptionId};
use crate::protocol::{RawEnvelope, message_types};
use crate::rooms::{Room, RoomManager};

// ============================================================================
// StreamRecord
// ============================================================================

/// One active stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Streaming client.
    pub client_id: ClientId,
    /// Preview image; never populated by the current protocol.
    pub preview: Option<Vec<u8>>,
}

// ============================================================================
// StreamTracker
// ============================================================================

/// Per-room list of active streams.
pub struct StreamTracker {
    rooms: Arc<RoomManager>,
    active: RwLock<FxHashMap<RoomId, Vec<StreamRecord>>>,
    /// Clients whose disconnect hook is installed.
    watched: Mutex<FxHashSet<ClientId>>,
    subscriptions: RwLock<Vec<SubscriptionId>>,
}

impl fmt::Debug for StreamTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTracker")
            .field("rooms_streaming", &self.active.read().len())
            .finish_non_exhaustive()
    }
}

impl StreamTracker {
    /// Creates a tracker and subscribes it to stream messages.
    #[must_use]
    pub fn new(clients: &Arc<ClientRegistry>, rooms: Arc<RoomManager>) -> Arc<Self> {
        let tracker = Arc::new(Self {
            rooms,
            active: RwLock::new(FxHashMap::default()),
            watched: Mutex::new(FxHashSet::default()),
            subscriptions: RwLock::new(Vec::new()),
        });

        let weak = Arc::downgrade(&tracker);
        let started = clients.subscribe(message_types::STREAM_STARTED, move |sender, envelope| {
            if let Some(tracker) = weak.upgrade() {
                tracker.handle_stream_started(sender, envelope);
            }
        });

        let weak = Arc::downgrade(&tracker);
        let stopped = clients.subscribe(message_types::STREAM_STOPPED, move |sender, envelope| {
            if let Some(tracker) = weak.upgrade() {
                tracker.handle_stream_stopped(sender, envelope);
            }
        });

        tracker.subscriptions.write().extend([started, stopped]);
        tracker
    }

    /// Returns the subscriptions this tracker installed.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<SubscriptionId> {
        self.subscriptions.read().clone()
    }

    /// Returns the active streams of a room.
    #[must_use]
    pub fn streams(&self, room_id: &RoomId) -> Vec<StreamRecord> {
        self.active.read().get(room_id).cloned().unwrap_or_default()
    }

    /// Returns `true` if the client has an active stream.
    #[must_use]
    pub fn is_streaming(&self, client_id: ClientId) -> bool {
        self.active
            .read()
            .values()
            .any(|records| records.iter().any(|r| r.client_id == client_id))
    }
}

// ============================================================================
// StreamTracker - Start & Stop
// ============================================================================

impl StreamTracker {
    /// Records a stream for a client in its current room.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInRoom`] if the client is unknown or in no room
    /// - [`Error::AlreadyStreaming`] if the client already streams
    pub fn start(self: &Arc<Self>, client_id: ClientId) -> Result<Arc<Room>> {
        let identity = self
            .rooms
            .clients()
            .lookup(client_id)
            .ok_or_else(|| Error::not_in_room(client_id))?;
        let room = self
            .rooms
            .room_of(client_id)
            .ok_or_else(|| Error::not_in_room(client_id))?;
        self.start_in(&room, &identity)?;
        Ok(room)
    }

    /// Removes a client's stream record.
    ///
    /// Returns `false` if the client had no stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInRoom`] if the client is in no room.
    pub fn stop(&self, client_id: ClientId) -> Result<bool> {
        let room = self
            .rooms
            .room_of(client_id)
            .ok_or_else(|| Error::not_in_room(client_id))?;
        Ok(self.stop_in(room.id(), client_id))
    }

    fn start_in(self: &Arc<Self>, room: &Room, identity: &ClientIdentity) -> Result<()> {
        let room_id = room.id();
        let client_id = identity.id();
        {
            let mut active = self.active.write();
            let records = active.entry(room_id.clone()).or_default();

            if records.iter().any(|r| r.client_id == client_id) {
                return Err(Error::already_streaming(client_id));
            }
            records.push(StreamRecord {
                client_id,
                preview: None,
            });
        }

        self.watch(identity);
        info!(%room_id, %client_id, "Stream started");
        Ok(())
    }

    /// Installs the disconnect hook once per client.
    fn watch(self: &Arc<Self>, identity: &ClientIdentity) {
        let client_id = identity.id();
        if !self.watched.lock().insert(client_id) {
            return;
        }

        let tracker = Arc::downgrade(self);
        identity.on_disconnect(async move {
            if let Some(tracker) = tracker.upgrade() {
                tracker.forget(client_id);
            }
        });
    }

    /// Drops every record of a departed client, whatever room it was in.
    fn forget(&self, client_id: ClientId) {
        self.watched.lock().remove(&client_id);

        let mut active = self.active.write();
        active.retain(|room_id, records| {
            let before = records.len();
            records.retain(|r| r.client_id != client_id);
            if records.len() != before {
                info!(%room_id, %client_id, "Stream dropped on disconnect");
            }
            !records.is_empty()
        });
    }

    fn stop_in(&self, room_id: &RoomId, client_id: ClientId) -> bool {
        let mut active = self.active.write();
        let Some(records) = active.get_mut(room_id) else {
            return false;
        };

        let before = records.len();
        records.retain(|r| r.client_id != client_id);
        let removed = records.len() != before;

        if records.is_empty() {
            active.remove(room_id);
        }

        if removed {
            info!(%room_id, %client_id, "Stream stopped");
        }
        removed
    }
}

// ============================================================================
// StreamTracker - Handlers
// ============================================================================

impl StreamTracker {
    fn handle_stream_started(self: &Arc<Self>, sender: &Arc<ClientIdentity>, envelope: &RawEnvelope) {
        let Some(room) = self.sender_room(sender) else {
            return;
        };

        if let Err(e) = self.start_in(&room, sender) {
            debug!(client_id = %sender.id(), error = %e, "Stream start rejected");
            sender.send_error(&e);
            return;
        }

        self.rooms.broadcast(&room, envelope, Some(sender.id()));
    }

    fn handle_stream_stopped(&self, sender: &Arc<ClientIdentity>, envelope: &RawEnvelope) {
        let Some(room) = self.sender_room(sender) else {
            return;
        };

        self.stop_in(room.id(), sender.id());
        self.rooms.broadcast(&room, envelope, Some(sender.id()));
    }

    /// Resolves the sender's room.
    ///
    /// A departing sender may already have left; anyone else must be in a
    /// room.
    fn sender_room(&self, sender: &ClientIdentity) -> Option<Arc<Room>> {
        match self.rooms.room_of(sender.id()) {
            Some(room) => Some(room),
            None if sender.is_departing() => {
                debug!(client_id = %sender.id(), "Dropped stream message from departed client");
                None
            }
            None => panic!("client {} is in no room", sender.id()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
