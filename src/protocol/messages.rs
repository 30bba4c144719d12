//! Payload types.
//!
//! Inbound payloads deny unknown fields and have no optional fields, so the
//! strict codec rejects any frame whose field set differs from the schema.
//! Negotiation blobs (`offer`, `answer`, `candidate`) are kept as
//! [`RawValue`] and relayed byte-for-byte.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::identifiers::{ClientId, RoomId};

// ============================================================================
// Server Notices
// ============================================================================

/// Payload of `client-id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientIdMessage {
    /// The receiving client's own id.
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Payload of `client-disconnect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientDisconnectMessage {
    /// The departed client.
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Human readable description.
    #[serde(rename = "errorMessage")]
    pub error_message: String,

    /// Shape the server expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,

    /// What the server actually received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

impl ErrorMessage {
    /// Creates an error payload with only the message set.
    #[inline]
    #[must_use]
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            expected: None,
            actual: None,
        }
    }

    /// Sets the expected shape.
    #[inline]
    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Sets the received input.
    #[inline]
    #[must_use]
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

/// Body of the room id mint endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIdResponse {
    /// Freshly generated, currently unused room id.
    #[serde(rename = "roomID")]
    pub room_id: RoomId,
}

// ============================================================================
// Signaling Payloads
// ============================================================================

/// Inbound `sdp-offer`: the caller names the callee.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdpOfferRequest {
    /// Callee id as sent by the client, validated by the relay.
    #[serde(rename = "calleeClientID")]
    pub callee_client_id: String,

    /// Opaque session description.
    pub offer: Box<RawValue>,
}

/// Outbound `sdp-offer`: the callee learns who is calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdpOfferRelay {
    /// The sender of the original offer.
    #[serde(rename = "callerClientID")]
    pub caller_client_id: ClientId,

    /// Opaque session description.
    pub offer: Box<RawValue>,
}

/// `sdp-answer`, forwarded to the caller unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SdpAnswerMessage {
    /// Caller id as sent by the client.
    #[serde(rename = "callerClientID")]
    pub caller_client_id: String,

    /// Opaque session description.
    pub answer: Box<RawValue>,
}

/// `new-ice-candidate`.
///
/// Inbound, `remoteClientID` names the receiver. Outbound, the relay
/// rewrites it to the sender so the receiver knows which peer it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IceCandidateMessage {
    /// Peer id, receiver inbound and sender outbound.
    #[serde(rename = "remoteClientID")]
    pub remote_client_id: String,

    /// Opaque candidate.
    pub candidate: Box<RawValue>,
}
