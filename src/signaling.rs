//! Point-to-point WebRTC negotiation relay.
//!
//! Forwards offers, answers, and ICE candidates between two clients. The
//! negotiation blobs are never inspected.
//!
//! | Inbound | Target | Outbound |
//! |---------|--------|----------|
//! | `sdp-offer {calleeClientID, offer}` | callee | `sdp-offer {callerClientID: sender, offer}` |
//! | `sdp-answer {callerClientID, answer}` | caller | unmodified |
//! | `new-ice-candidate {remoteClientID, candidate}` | remote | `remoteClientID` set to sender |
//!
//! Every failure sends exactly one `error` envelope to the sender and
//! nothing to anyone else.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use crate::clients::{ClientIdentity, ClientRegistry};
use crate::error::{Error, Result};
use crate::identifiers::{ClientId, SubscriptionId};
use crate::protocol::{
    Envelope, IceCandidateMessage, RawEnvelope, SdpAnswerMessage, SdpOfferRelay, SdpOfferRequest,
    decode_payload, message_types,
};

// ============================================================================
// SignalingRelay
// ============================================================================

type RelayFn = fn(&SignalingRelay, &ClientIdentity, &RawEnvelope) -> Result<()>;

/// Relays negotiation messages between clients.
pub struct SignalingRelay {
    clients: Arc<ClientRegistry>,
    subscriptions: Vec<SubscriptionId>,
}

impl fmt::Debug for SignalingRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalingRelay")
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl SignalingRelay {
    /// Creates the relay and subscribes its three handlers.
    #[must_use]
    pub fn new(clients: Arc<ClientRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let subscribe = |message_type: &'static str, relay: RelayFn| {
                let weak = weak.clone();
                clients.subscribe(message_type, move |sender, envelope| {
                    let Some(this) = weak.upgrade() else {
                        return;
                    };
                    if let Err(e) = relay(this.as_ref(), sender.as_ref(), envelope) {
                        debug!(
                            client_id = %sender.id(),
                            message_type,
                            error = %e,
                            "Relay rejected"
                        );
                        sender.send_error(&e);
                    }
                })
            };

            let subscriptions = vec![
                subscribe(message_types::SDP_OFFER, Self::relay_offer),
                subscribe(message_types::SDP_ANSWER, Self::relay_answer),
                subscribe(message_types::ICE_CANDIDATE, Self::relay_ice_candidate),
            ];

            Self {
                clients: Arc::clone(&clients),
                subscriptions,
            }
        })
    }

    /// Returns the subscriptions this relay installed.
    #[inline]
    #[must_use]
    pub fn subscriptions(&self) -> &[SubscriptionId] {
        &self.subscriptions
    }
}

// ============================================================================
// SignalingRelay - Handlers
// ============================================================================

impl SignalingRelay {
    fn relay_offer(&self, sender: &ClientIdentity, envelope: &RawEnvelope) -> Result<()> {
        let request: SdpOfferRequest = decode_payload(&envelope.msg)?;
        let callee = self.resolve(&request.callee_client_id, "calleeClientID", "Callee")?;

        callee.send(&Envelope::new(
            message_types::SDP_OFFER,
            SdpOfferRelay {
                caller_client_id: sender.id(),
                offer: request.offer,
            },
        ));

        debug!(caller = %sender.id(), callee = %callee.id(), "Offer relayed");
        Ok(())
    }

    fn relay_answer(&self, sender: &ClientIdentity, envelope: &RawEnvelope) -> Result<()> {
        let answer: SdpAnswerMessage = decode_payload(&envelope.msg)?;
        let caller = self.resolve(&answer.caller_client_id, "callerClientID", "Caller")?;

        caller.send(envelope);

        debug!(callee = %sender.id(), caller = %caller.id(), "Answer relayed");
        Ok(())
    }

    fn relay_ice_candidate(&self, sender: &ClientIdentity, envelope: &RawEnvelope) -> Result<()> {
        let candidate: IceCandidateMessage = decode_payload(&envelope.msg)?;
        let remote = self.resolve(&candidate.remote_client_id, "remoteClientID", "Remote")?;

        remote.send(&Envelope::new(
            message_types::ICE_CANDIDATE,
            IceCandidateMessage {
                remote_client_id: sender.id().to_string(),
                candidate: candidate.candidate,
            },
        ));

        debug!(from = %sender.id(), to = %remote.id(), "ICE candidate relayed");
        Ok(())
    }

    /// Parses a peer id from a payload field and looks it up.
    fn resolve(
        &self,
        raw_id: &str,
        field: &'static str,
        role: &'static str,
    ) -> Result<Arc<ClientIdentity>> {
        let client_id: ClientId = raw_id
            .parse()
            .map_err(|e| Error::invalid_client_id(field, e))?;

        self.clients.lookup(client_id).ok_or_else(|| {
            warn!(%client_id, role, "Relay target not connected");
            Error::client_not_found(role)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::transport::ConnectionRegistry;
    use crate::transport::testing::{MockPeer, mock_transport};

    fn setup() -> (Arc<ClientRegistry>, Arc<SignalingRelay>) {
        let clients = ClientRegistry::new(ConnectionRegistry::new());
        let relay = SignalingRelay::new(Arc::clone(&clients));
        (clients, relay)
    }

    async fn join(clients: &Arc<ClientRegistry>) -> (Arc<ClientIdentity>, MockPeer) {
        let (writer, reader, mut peer) = mock_transport();
        let pending = clients.connections().establish(writer, reader);
        let identity = clients.register(pending.link().clone());
        pending.listen();
        peer.recv_type("client-id").await;
        (identity, peer)
    }

    #[tokio::test]
    async fn test_offer_reaches_callee_with_caller_id() {
        let (clients, relay) = setup();
        assert_eq!(relay.subscriptions().len(), 3);
        let (a, pa) = join(&clients).await;
        let (b, mut pb) = join(&clients).await;

        pa.send_json(&json!({
            "type": "sdp-offer",
            "msg": {"calleeClientID": b.id().to_string(), "offer": {"sdp": "v=0", "type": "offer"}}
        }));

        let msg = pb.recv_json().await;
        assert_eq!(
            msg,
            json!({
                "type": "sdp-offer",
                "msg": {"callerClientID": a.id().to_string(), "offer": {"sdp": "v=0", "type": "offer"}}
            })
        );
    }

    #[tokio::test]
    async fn test_answer_forwarded_unmodified() {
        let (clients, _relay) = setup();
        let (a, mut pa) = join(&clients).await;
        let (_b, pb) = join(&clients).await;

        let answer = json!({
            "type": "sdp-answer",
            "msg": {"callerClientID": a.id().to_string(), "answer": {"sdp": "v=0", "type": "answer"}}
        });
        pb.send_json(&answer);

        assert_eq!(pa.recv_json().await, answer);
    }

    #[tokio::test]
    async fn test_ice_candidate_rewrites_remote_id() {
        let (clients, _relay) = setup();
        let (a, pa) = join(&clients).await;
        let (b, mut pb) = join(&clients).await;

        pa.send_json(&json!({
            "type": "new-ice-candidate",
            "msg": {"remoteClientID": b.id().to_string(), "candidate": {"candidate": "c1"}}
        }));

        let msg = pb.recv_json().await;
        assert_eq!(msg["type"], "new-ice-candidate");
        assert_eq!(msg["msg"]["remoteClientID"], a.id().to_string());
        assert_eq!(msg["msg"]["candidate"], json!({"candidate": "c1"}));
    }

    #[tokio::test]
    async fn test_unknown_callee_yields_one_error() {
        let (clients, _relay) = setup();
        let (_a, mut pa) = join(&clients).await;
        let (_b, mut pb) = join(&clients).await;

        pa.send_json(&json!({
            "type": "sdp-offer",
            "msg": {"calleeClientID": ClientId::generate().to_string(), "offer": {}}
        }));

        let error = pa.recv_json().await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["msg"]["errorMessage"], "Callee client not found.");
        pa.expect_silence().await;
        pb.expect_silence().await;
    }

    #[tokio::test]
    async fn test_invalid_uuid() {
        let (clients, _relay) = setup();
        let (_a, mut pa) = join(&clients).await;

        pa.send_json(&json!({
            "type": "new-ice-candidate",
            "msg": {"remoteClientID": "nope", "candidate": {}}
        }));

        let error = pa.recv_json().await;
        assert!(
            error["msg"]["errorMessage"]
                .as_str()
                .unwrap()
                .starts_with("remoteClientID is not a valid UUID.")
        );
    }

    #[tokio::test]
    async fn test_unknown_caller() {
        let (clients, _relay) = setup();
        let (_a, mut pa) = join(&clients).await;

        pa.send_json(&json!({
            "type": "sdp-answer",
            "msg": {"callerClientID": ClientId::generate().to_string(), "answer": {}}
        }));

        assert_eq!(pa.recv_json().await["msg"]["errorMessage"], "Caller client not found.");
    }

    #[tokio::test]
    async fn test_payload_with_extra_field_rejected() {
        let (clients, _relay) = setup();
        let (_a, mut pa) = join(&clients).await;
        let (b, mut pb) = join(&clients).await;

        pa.send_json(&json!({
            "type": "sdp-offer",
            "msg": {"calleeClientID": b.id().to_string(), "offer": {}, "extra": true}
        }));

        let error = pa.recv_json().await;
        assert!(
            error["msg"]["errorMessage"]
                .as_str()
                .unwrap()
                .starts_with("Message had invalid JSON format.")
        );
        pb.expect_silence().await;
    }

    #[tokio::test]
    async fn test_payload_missing_field_rejected() {
        let (clients, _relay) = setup();
        let (_a, mut pa) = join(&clients).await;

        pa.send_json(&json!({
            "type": "new-ice-candidate",
            "msg": {"candidate": {}}
        }));

        assert_eq!(pa.recv_json().await["type"], "error");
    }
}
