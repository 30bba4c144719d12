//! Client identities.
//!
//! Every link that joins a room is registered as a client: it gets a fresh
//! [`ClientId`], learns it through a `client-id` envelope, and keeps it until
//! the link closes.
//!
//! # Departure
//!
//! The registry installs exactly one close observer per link. When it runs:
//!
//! 1. All of the client's disconnect hooks run concurrently.
//! 2. The identity is removed from the registry.
//!
//! While hooks run the identity is still resolvable, so components that
//! broadcast to room members never see a member without an identity.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Error;
use crate::identifiers::{ClientId, LinkId, SubscriptionId};
use crate::protocol::{ClientIdMessage, Envelope, RawEnvelope, message_types};
use crate::transport::link::run_to_completion;
use crate::transport::{ConnectionRegistry, Link};

// ============================================================================
// ClientIdentity
// ============================================================================

#[derive(Default)]
struct HookState {
    hooks: Vec<BoxFuture<'static, ()>>,
    departed: bool,
}

/// A registered participant.
pub struct ClientIdentity {
    id: ClientId,
    display_name: String,
    link: Link,
    hooks: Mutex<HookState>,
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("id", &self.id)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl ClientIdentity {
    fn new(id: ClientId, link: Link) -> Self {
        Self {
            id,
            display_name: String::new(),
            link,
            hooks: Mutex::new(HookState::default()),
        }
    }

    /// Returns the client ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Returns the display name. Always empty; no message sets it.
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the client's link.
    #[inline]
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Returns `true` once the client's link started closing.
    #[inline]
    #[must_use]
    pub fn is_departing(&self) -> bool {
        self.link.is_closing()
    }

    /// Sends an envelope to this client.
    #[inline]
    pub fn send<T: Serialize>(&self, envelope: &Envelope<T>) {
        self.link.send(envelope);
    }

    /// Sends an `error` envelope to this client.
    #[inline]
    pub fn send_error(&self, err: &Error) {
        self.link.send_error(err);
    }

    /// Registers cleanup to run when the client departs.
    ///
    /// Hooks run concurrently and all finish before the identity is removed.
    /// A hook registered after departure runs immediately.
    pub fn on_disconnect<F>(&self, hook: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.hooks.lock();
        if state.departed {
            drop(state);
            tokio::spawn(hook);
            return;
        }
        state.hooks.push(hook.boxed());
    }

    /// Returns the number of hooks waiting for disconnect.
    #[must_use]
    pub fn pending_hook_count(&self) -> usize {
        self.hooks.lock().hooks.len()
    }

    async fn run_disconnect_hooks(&self) {
        let hooks = {
            let mut state = self.hooks.lock();
            state.departed = true;
            std::mem::take(&mut state.hooks)
        };

        debug!(client_id = %self.id, hooks = hooks.len(), "Running disconnect hooks");

        run_to_completion(hooks, "disconnect hook").await;
    }
}

// ============================================================================
// ClientRegistry
// ============================================================================

#[derive(Default)]
struct ClientTable {
    by_id: FxHashMap<ClientId, Arc<ClientIdentity>>,
    by_link: FxHashMap<LinkId, ClientId>,
}

/// Maps client ids and links to identities.
pub struct ClientRegistry {
    connections: Arc<ConnectionRegistry>,
    table: RwLock<ClientTable>,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.client_count())
            .finish_non_exhaustive()
    }
}

impl ClientRegistry {
    /// Creates an empty registry on top of a connection registry.
    #[must_use]
    pub fn new(connections: Arc<ConnectionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            connections,
            table: RwLock::new(ClientTable::default()),
        })
    }

    /// Returns the underlying connection registry.
    #[inline]
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    /// Returns the number of registered clients.
    #[inline]
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.table.read().by_id.len()
    }

    /// Registers a link as a new client.
    ///
    /// Sends the `client-id` envelope and arranges removal when the link
    /// closes.
    pub fn register(self: &Arc<Self>, link: Link) -> Arc<ClientIdentity> {
        let identity = Arc::new(ClientIdentity::new(ClientId::generate(), link.clone()));

        {
            let mut table = self.table.write();
            table.by_id.insert(identity.id, Arc::clone(&identity));
            table.by_link.insert(link.id(), identity.id);
        }

        identity.send(&Envelope::new(
            message_types::CLIENT_ID,
            ClientIdMessage {
                client_id: identity.id,
            },
        ));

        let registry = Arc::downgrade(self);
        let departing = Arc::clone(&identity);
        link.on_close(async move {
            departing.run_disconnect_hooks().await;
            if let Some(registry) = registry.upgrade() {
                registry.remove(&departing);
            }
        });

        info!(client_id = %identity.id, link_id = %link.id(), "Client registered");

        identity
    }

    /// Resolves a client ID.
    #[must_use]
    pub fn lookup(&self, client_id: ClientId) -> Option<Arc<ClientIdentity>> {
        self.table.read().by_id.get(&client_id).cloned()
    }

    /// Resolves the client owning a link.
    #[must_use]
    pub fn lookup_by_link(&self, link_id: LinkId) -> Option<Arc<ClientIdentity>> {
        let table = self.table.read();
        let client_id = table.by_link.get(&link_id)?;
        table.by_id.get(client_id).cloned()
    }

    /// Sends an envelope to a client.
    #[inline]
    pub fn send_to<T: Serialize>(&self, identity: &ClientIdentity, envelope: &Envelope<T>) {
        identity.send(envelope);
    }

    fn remove(&self, identity: &ClientIdentity) {
        let mut table = self.table.write();
        table.by_id.remove(&identity.id);
        table.by_link.remove(&identity.link.id());
        drop(table);

        info!(client_id = %identity.id, "Client removed");
    }
}

// ============================================================================
// ClientRegistry - Subscriptions
// ============================================================================

impl ClientRegistry {
    /// Registers a handler that receives the sender's identity.
    ///
    /// A message from a link with no identity is dropped when the link is
    /// closing. On an open link it is an invariant violation and panics.
    pub fn subscribe<F>(self: &Arc<Self>, message_type: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Arc<ClientIdentity>, &RawEnvelope) + Send + Sync + 'static,
    {
        let registry: Weak<Self> = Arc::downgrade(self);

        self.connections.subscribe(message_type, move |link, envelope| {
            let Some(registry) = registry.upgrade() else {
                return;
            };

            match registry.lookup_by_link(link.id()) {
                Some(sender) => handler(&sender, envelope),
                None if link.is_closing() => debug!(
                    link_id = %link.id(),
                    message_type = envelope.message_type(),
                    "Dropped message from departed client"
                ),
                None => panic!("link {} has no registered client", link.id()),
            }
        })
    }

    /// Removes a handler.
    #[inline]
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.connections.unsubscribe(id)
    }
}

// ============================================================================
// Tests
// ============================================================================
