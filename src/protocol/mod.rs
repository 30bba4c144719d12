//! Wire protocol: envelope, payload types, and the strict codec.
//!
//! Every frame on a link is an [`Envelope`] `{ "type": ..., "msg": ... }`.
//! Inbound frames are decoded strictly: an extra field, a missing field, or
//! a mistyped field is a decode failure.
//!
//! # Message Catalogue
//!
//! | Direction | Type | Payload |
//! |-----------|------|---------|
//! | server → client | `client-id` | [`ClientIdMessage`] |
//! | server → room | `client-disconnect` | [`ClientDisconnectMessage`] |
//! | client → callee | `sdp-offer` | [`SdpOfferRequest`] in, [`SdpOfferRelay`] out |
//! | client → caller | `sdp-answer` | [`SdpAnswerMessage`], forwarded unmodified |
//! | client → remote | `new-ice-candidate` | [`IceCandidateMessage`] |
//! | client → room | `stream-started` / `stream-stopped` | opaque |
//! | server → client | `error` | [`ErrorMessage`] |

// ============================================================================
// Submodules
// ============================================================================

/// Envelope wrapper and message type tags.
pub mod envelope;

/// Payload types for each message type.
pub mod messages;

/// Strict decoding and encoding.
pub mod strict;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{Envelope, RawEnvelope, message_types};
pub use messages::{
    ClientDisconnectMessage, ClientIdMessage, ErrorMessage, IceCandidateMessage,
    RoomIdResponse, SdpAnswerMessage, SdpOfferRelay, SdpOfferRequest,
};
pub use strict::{decode_envelope, decode_payload, encode};
