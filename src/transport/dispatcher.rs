//! Connection registry and type-keyed dispatch.
//!
//! Owns every live [`Link`], runs one read loop per link, and routes each
//! decoded envelope to the handlers subscribed to its type tag.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             ConnectionRegistry               │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ LinkId → Link                          │  │
//! │  └────────────────────────────────────────┘  │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ "sdp-offer"      → [handler, ...]      │  │
//! │  │ "stream-started" → [handler, ...]      │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//!        ▲ frames                     │ spawn per handler
//!   read loop (one per link)          ▼
//! ```
//!
//! # Lifecycle
//!
//! 1. [`ConnectionRegistry::establish`] wraps a transport into a [`PendingLink`]
//! 2. Callers register the link and install close observers
//! 3. [`PendingLink::listen`] starts the read loop
//! 4. The first read failure runs the link's close sequence

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::BoxStream;
use futures_util::{Sink, Stream, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{LinkId, SubscriptionId};
use crate::protocol::{Envelope, RawEnvelope, decode_envelope, message_types};
use crate::transport::Link;

// ============================================================================
// Constants
// ============================================================================

/// Shape hint attached to decode failures.
const EXPECTED_ENVELOPE: &str = r#"Expected types like: {"type":"","msg":null}"#;

// ============================================================================
// Types
// ============================================================================

/// Handler invoked for each envelope of a subscribed type.
///
/// Runs in its own task; must not assume ordering relative to other handlers.
pub type MessageHandler = Arc<dyn Fn(&Link, &RawEnvelope) + Send + Sync>;

/// Boxed read half of a transport.
type FrameStream = BoxStream<'static, Result<Message>>;

struct Subscription {
    id: SubscriptionId,
    handler: MessageHandler,
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// Owns all links and dispatches inbound envelopes by type.
///
/// Subscriptions may be added or removed at any time, including while
/// messages are being dispatched.
pub struct ConnectionRegistry {
    /// Live links by ID.
    links: RwLock<FxHashMap<LinkId, Link>>,

    /// Handlers by message type.
    handlers: RwLock<FxHashMap<String, Vec<Subscription>>>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("links", &self.links.read().len())
            .field("message_types", &self.handlers.read().len())
            .finish()
    }
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            links: RwLock::new(FxHashMap::default()),
            handlers: RwLock::new(FxHashMap::default()),
        })
    }

    /// Returns the number of links whose read loop is running.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.links.read().len()
    }

    /// Returns a live link by ID.
    #[must_use]
    pub fn link(&self, link_id: LinkId) -> Option<Link> {
        self.links.read().get(&link_id).cloned()
    }
}

// ============================================================================
// ConnectionRegistry - Establish
// ============================================================================

impl ConnectionRegistry {
    /// Wraps an upgraded WebSocket.
    pub fn establish_socket(self: &Arc<Self>, socket: WebSocket) -> PendingLink {
        let (writer, reader) = socket.split();
        self.establish(writer, reader)
    }

    /// Wraps any sink/stream pair speaking WebSocket messages.
    ///
    /// Reading does not start until [`PendingLink::listen`] is called.
    pub fn establish<W, R, E>(self: &Arc<Self>, writer: W, reader: R) -> PendingLink
    where
        W: Sink<Message> + Send + 'static,
        W::Error: fmt::Display,
        R: Stream<Item = std::result::Result<Message, E>> + Send + 'static,
        E: fmt::Display,
    {
        let link = Link::new(writer);
        let reader = reader
            .map(|frame| frame.map_err(|e| Error::transport(e.to_string())))
            .boxed();

        debug!(link_id = %link.id(), "Link established");

        PendingLink {
            registry: Arc::clone(self),
            link,
            reader,
        }
    }
}

// ============================================================================
// ConnectionRegistry - Subscriptions
// ============================================================================

impl ConnectionRegistry {
    /// Registers a handler for one message type.
    ///
    /// Several handlers may share a type; each one gets every envelope.
    pub fn subscribe<F>(&self, message_type: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Link, &RawEnvelope) + Send + Sync + 'static,
    {
        let id = SubscriptionId::generate();
        let message_type = message_type.into();

        debug!(subscription_id = %id, %message_type, "Handler subscribed");

        self.handlers
            .write()
            .entry(message_type)
            .or_default()
            .push(Subscription {
                id,
                handler: Arc::new(handler),
            });

        id
    }

    /// Removes a handler.
    ///
    /// Returns `false` if the subscription was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();

        let mut removed = false;
        handlers.retain(|_, subscriptions| {
            let before = subscriptions.len();
            subscriptions.retain(|s| s.id != id);
            removed |= subscriptions.len() != before;
            !subscriptions.is_empty()
        });

        if removed {
            debug!(subscription_id = %id, "Handler unsubscribed");
        }
        removed
    }

    /// Returns the number of handlers for a message type.
    #[must_use]
    pub fn handler_count(&self, message_type: &str) -> usize {
        self.handlers
            .read()
            .get(message_type)
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// ConnectionRegistry - Read Loop
// ============================================================================

impl ConnectionRegistry {
    /// Reads frames until the transport fails, then closes the link.
    async fn run_read_loop(self: Arc<Self>, link: Link, mut reader: FrameStream) {
        loop {
            match reader.next().await {
                Some(Ok(Message::Text(text))) => self.handle_frame(&link, text.as_str()),

                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handle_frame(&link, text),
                    Err(e) => {
                        debug!(link_id = %link.id(), error = %e, "Non UTF-8 binary frame");
                        link.send_error(&Error::decode(e.to_string()));
                    }
                },

                Some(Ok(Message::Close(_))) => {
                    debug!(link_id = %link.id(), "Close frame received");
                    break;
                }

                Some(Ok(_)) => {}

                Some(Err(e)) => {
                    debug!(link_id = %link.id(), error = %e, "Read failed");
                    break;
                }

                None => {
                    debug!(link_id = %link.id(), "Stream ended");
                    break;
                }
            }
        }

        link.close().await;
        self.links.write().remove(&link.id());

        info!(link_id = %link.id(), "Link disconnected");
    }

    /// Decodes one frame and dispatches it.
    fn handle_frame(&self, link: &Link, text: &str) {
        trace!(link_id = %link.id(), frame = text, "Frame received");

        match decode_envelope(text) {
            Ok(envelope) => self.dispatch(link, envelope),
            Err(e) => {
                warn!(link_id = %link.id(), error = %e, "Rejected malformed frame");

                let payload = e
                    .to_error_message()
                    .with_expected(EXPECTED_ENVELOPE)
                    .with_actual(format!("Types of {text} didn't match."));
                link.send(&Envelope::new(message_types::ERROR, payload));
            }
        }
    }

    /// Spawns one task per subscribed handler.
    fn dispatch(&self, link: &Link, envelope: RawEnvelope) {
        let handlers: Vec<MessageHandler> = self
            .handlers
            .read()
            .get(envelope.message_type())
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            trace!(
                link_id = %link.id(),
                message_type = envelope.message_type(),
                "No handler for message type"
            );
            return;
        }

        let envelope = Arc::new(envelope);
        for handler in handlers {
            let link = link.clone();
            let envelope = Arc::clone(&envelope);
            tokio::spawn(async move { handler(&link, &envelope) });
        }
    }
}

// ============================================================================
// PendingLink
// ============================================================================

/// A link whose read loop has not started yet.
///
/// Gives callers a window to register the link and install close observers
/// before any message can be dispatched for it.
pub struct PendingLink {
    registry: Arc<ConnectionRegistry>,
    link: Link,
    reader: FrameStream,
}

impl fmt::Debug for PendingLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLink")
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl PendingLink {
    /// Returns the link.
    #[inline]
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Starts the read loop and returns the live link.
    pub fn listen(self) -> Link {
        let Self {
            registry,
            link,
            reader,
        } = self;

        registry.links.write().insert(link.id(), link.clone());
        tokio::spawn(registry.run_read_loop(link.clone(), reader));

        link
    }
}

// ============================================================================
// Tests
// ============================================================================
