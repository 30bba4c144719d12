//! Envelope wrapper shared by every message.
//!
//! # Format
//!
//! ```json
//! { "type": "sdp-offer", "msg": { ... } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

// ============================================================================
// Message Types
// ============================================================================

/// Type tags used in the `type` field.
pub mod message_types {
    /// Server announces the client's own id, once, right after connect.
    pub const CLIENT_ID: &str = "client-id";
    /// Server tells remaining room members that a client left.
    pub const CLIENT_DISCONNECT: &str = "client-disconnect";
    /// Session description offer, relayed to the callee.
    pub const SDP_OFFER: &str = "sdp-offer";
    /// Session description answer, relayed to the caller.
    pub const SDP_ANSWER: &str = "sdp-answer";
    /// ICE candidate, relayed to the remote peer.
    pub const ICE_CANDIDATE: &str = "new-ice-candidate";
    /// A client started sharing its screen.
    pub const STREAM_STARTED: &str = "stream-started";
    /// A client stopped sharing its screen.
    pub const STREAM_STOPPED: &str = "stream-stopped";
    /// Error report, targeted at the offending sender.
    pub const ERROR: &str = "error";
}

// ============================================================================
// Envelope
// ============================================================================

/// Typed message wrapper.
///
/// Inbound envelopes carry their payload as [`RawValue`] so the dispatcher
/// only inspects the `type` tag; handlers decode the payload they expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<T> {
    /// Message type tag, see [`message_types`].
    #[serde(rename = "type")]
    pub message_type: String,

    /// Message payload.
    pub msg: T,
}

/// Envelope with an undecoded payload.
pub type RawEnvelope = Envelope<Box<RawValue>>;

impl<T> Envelope<T> {
    /// Creates an envelope.
    #[inline]
    #[must_use]
    pub fn new(message_type: impl Into<String>, msg: T) -> Self {
        Self {
            message_type: message_type.into(),
            msg,
        }
    }

    /// Returns the type tag.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

impl RawEnvelope {
    /// Returns the raw JSON text of the payload.
    #[inline]
    #[must_use]
    pub fn raw_msg(&self) -> &str {
        self.msg.get()
    }
}
