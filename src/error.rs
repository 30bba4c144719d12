//! Error types for the signaling server.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Error Categories
//!
//! | Category | Variants | Handling |
//! |----------|----------|----------|
//! | Configuration | [`Error::Config`] | Startup fails |
//! | Transport | [`Error::Io`], [`Error::Transport`], [`Error::ConnectionClosed`] | Fatal to one link only |
//! | Decode | [`Error::Decode`], [`Error::Json`] | `error` envelope, link stays open |
//! | Relay resolution | [`Error::InvalidClientId`], [`Error::ClientNotFound`] | `error` envelope, no state mutated |
//! | Streams | [`Error::AlreadyStreaming`] | `error` envelope, no state mutated |
//! | Rooms | [`Error::RoomIdUnavailable`], [`Error::NotInRoom`] | 503 from the mint endpoint, or returned to library callers |
//!
//! Invariant violations are not represented here; they panic.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::ClientId;
use crate::protocol::ErrorMessage;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Strict decoding failed (extra, missing, or mistyped field).
    #[error("Message had invalid JSON format. {message}")]
    Decode {
        /// Decoder detail.
        message: String,
    },

    /// A payload named a peer by a string that is not a UUID.
    #[error("{field} is not a valid UUID. {message}")]
    InvalidClientId {
        /// Payload field holding the id.
        field: &'static str,
        /// Parser detail.
        message: String,
    },

    /// A payload named a peer that is not connected.
    #[error("{role} client not found.")]
    ClientNotFound {
        /// Role of the peer in the exchange ("Callee", "Caller", "Remote").
        role: &'static str,
    },

    // ========================================================================
    // Room & Stream Errors
    // ========================================================================
    /// Client already owns a stream record in its room.
    #[error("You already have an active stream.")]
    AlreadyStreaming {
        /// The client that tried to start a second stream.
        client_id: ClientId,
    },

    /// The client is not a member of any room.
    #[error("Client {client_id} is not in a room.")]
    NotInRoom {
        /// The client that was looked up.
        client_id: ClientId,
    },

    /// Every generated room ID collided with an existing room.
    #[error("Unable to generate a unique room ID after {attempts} attempts, please try again.")]
    RoomIdUnavailable {
        /// Number of attempts made.
        attempts: usize,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// The link is closed; no more frames are read or written.
    #[error("Connection closed")]
    ConnectionClosed,

    /// WebSocket transport error.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a strict decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an invalid client id error.
    #[inline]
    pub fn invalid_client_id(field: &'static str, err: uuid::Error) -> Self {
        Self::InvalidClientId {
            field,
            message: err.to_string(),
        }
    }

    /// Creates a client not found error.
    #[inline]
    pub fn client_not_found(role: &'static str) -> Self {
        Self::ClientNotFound { role }
    }

    /// Creates an already streaming error.
    #[inline]
    pub fn already_streaming(client_id: ClientId) -> Self {
        Self::AlreadyStreaming { client_id }
    }

    /// Creates a not in room error.
    #[inline]
    pub fn not_in_room(client_id: ClientId) -> Self {
        Self::NotInRoom { client_id }
    }

    /// Creates a room id unavailable error.
    #[inline]
    pub fn room_id_unavailable(attempts: usize) -> Self {
        Self::RoomIdUnavailable { attempts }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the error is reported to the sender as an `error`
    /// envelope while the link stays open.
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::Json(_)
                | Self::InvalidClientId { .. }
                | Self::ClientNotFound { .. }
                | Self::AlreadyStreaming { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::ConnectionClosed | Self::Io(_)
        )
    }

    /// Converts the error into an `error` envelope payload.
    #[must_use]
    pub fn to_error_message(&self) -> ErrorMessage {
        match self {
            Self::Json(err) => ErrorMessage::new(format!("Message had invalid JSON format. {err}")),
            other => ErrorMessage::new(other.to_string()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
