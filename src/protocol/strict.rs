//! Strict codec.
//!
//! Decoding goes through serde with `deny_unknown_fields` on every inbound
//! type and no defaulted fields, which rejects:
//!
//! - any field not declared by the type
//! - any declared field absent from the input
//! - any field whose JSON type does not match
//!
//! Field names are matched case-sensitively.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;

use crate::error::{Error, Result};

use super::envelope::{Envelope, RawEnvelope};

// ============================================================================
// Decode
// ============================================================================

/// Strictly decodes one inbound frame into an envelope with a raw payload.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the frame is not exactly `{type, msg}`.
pub fn decode_envelope(text: &str) -> Result<RawEnvelope> {
    serde_json::from_str(text).map_err(|e| Error::decode(e.to_string()))
}

/// Strictly decodes an envelope payload into `T`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload does not match `T` exactly.
pub fn decode_payload<T: DeserializeOwned>(raw: &RawValue) -> Result<T> {
    serde_json::from_str(raw.get()).map_err(|e| Error::decode(e.to_string()))
}

// ============================================================================
// Encode
// ============================================================================

/// Encodes an envelope to its JSON text frame.
///
/// # Errors
///
/// Returns [`Error::Json`] if the payload cannot be serialized.
pub fn encode<T: Serialize>(envelope: &Envelope<T>) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::identifiers::ClientId;
    use crate::protocol::message_types;
    use crate::protocol::messages::{ClientIdMessage, IceCandidateMessage, SdpOfferRequest};

    #[test]
    fn test_decode_envelope() {
        let envelope = decode_envelope(r#"{"type":"stream-started","msg":{"a":1}}"#)
            .expect("valid envelope");
        assert_eq!(envelope.message_type(), message_types::STREAM_STARTED);
        assert_eq!(envelope.raw_msg(), r#"{"a":1}"#);
    }

    #[test]
    fn test_decode_envelope_field_order() {
        let envelope = decode_envelope(r#"{"msg":null,"type":"x"}"#).expect("valid envelope");
        assert_eq!(envelope.message_type(), "x");
        assert_eq!(envelope.raw_msg(), "null");
    }

    #[test]
    fn test_decode_envelope_extra_field() {
        let err = decode_envelope(r#"{"type":"x","msg":{},"extra":1}"#).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_decode_envelope_missing_msg() {
        assert!(decode_envelope(r#"{"type":"x"}"#).is_err());
    }

    #[test]
    fn test_decode_envelope_missing_type() {
        assert!(decode_envelope(r#"{"msg":{}}"#).is_err());
    }

    #[test]
    fn test_decode_envelope_wrong_type() {
        assert!(decode_envelope(r#"{"type":5,"msg":{}}"#).is_err());
    }

    #[test]
    fn test_decode_envelope_case_sensitive() {
        assert!(decode_envelope(r#"{"Type":"x","msg":{}}"#).is_err());
    }

    #[test]
    fn test_decode_envelope_not_json() {
        assert!(decode_envelope("hello").is_err());
    }

    #[test]
    fn test_decode_payload_exact() {
        let raw = RawValue::from_string(
            r#"{"calleeClientID":"abc","offer":{"sdp":"v=0","type":"offer"}}"#.to_string(),
        )
        .expect("raw json");
        let offer: SdpOfferRequest = decode_payload(&raw).expect("valid payload");
        assert_eq!(offer.callee_client_id, "abc");
        assert_eq!(offer.offer.get(), r#"{"sdp":"v=0","type":"offer"}"#);
    }

    #[test]
    fn test_decode_payload_missing_opaque_field() {
        let raw = RawValue::from_string(r#"{"calleeClientID":"abc"}"#.to_string())
            .expect("raw json");
        assert!(decode_payload::<SdpOfferRequest>(&raw).is_err());
    }

    #[test]
    fn test_decode_payload_wrong_case() {
        let raw = RawValue::from_string(r#"{"remoteclientid":"abc","candidate":{}}"#.to_string())
            .expect("raw json");
        assert!(decode_payload::<IceCandidateMessage>(&raw).is_err());
    }

    #[test]
    fn test_encode_then_decode() {
        let id = ClientId::generate();
        let json = encode(&Envelope::new(
            message_types::CLIENT_ID,
            ClientIdMessage { client_id: id },
        ))
        .expect("encode");

        let envelope = decode_envelope(&json).expect("decode envelope");
        let msg: ClientIdMessage = decode_payload(&envelope.msg).expect("decode payload");
        assert_eq!(envelope.message_type(), message_types::CLIENT_ID);
        assert_eq!(msg.client_id, id);
    }

    proptest! {
        #[test]
        fn prop_extra_field_always_rejected(key in "[a-zA-Z]{1,12}", reverse in any::<bool>()) {
            prop_assume!(key != "calleeClientID" && key != "offer");
            let json = if reverse {
                format!(r#"{{"{key}":1,"offer":{{}},"calleeClientID":"x"}}"#)
            } else {
                format!(r#"{{"calleeClientID":"x","offer":{{}},"{key}":1}}"#)
            };
            let raw = RawValue::from_string(json).expect("raw json");
            prop_assert!(decode_payload::<SdpOfferRequest>(&raw).is_err());
        }

        #[test]
        fn prop_client_id_round_trip(bytes in any::<[u8; 16]>()) {
            let id = ClientId::from(uuid::Uuid::from_bytes(bytes));
            let json = encode(&Envelope::new("client-id", ClientIdMessage { client_id: id }))
                .expect("encode");
            let envelope = decode_envelope(&json).expect("decode");
            let decoded: ClientIdMessage = decode_payload(&envelope.msg).expect("payload");
            prop_assert_eq!(decoded.client_id, id);
        }
    }
}
