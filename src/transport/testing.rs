//! In-memory transport for unit tests.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream, sink, stream};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::transport::{ConnectionRegistry, Link};

/// How long a peer waits for a frame before giving up.
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a peer listens when asserting that nothing arrives.
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

/// Remote end of an in-memory transport.
pub(crate) struct MockPeer {
    inbound_tx: mpsc::UnboundedSender<Message>,
    outbound_rx: mpsc::UnboundedReceiver<Message>,
}

impl MockPeer {
    /// Sends a text frame to the server.
    pub(crate) fn send_text(&self, text: &str) {
        let _ = self.inbound_tx.send(Message::Text(text.into()));
    }

    /// Sends a JSON value to the server.
    pub(crate) fn send_json(&self, value: &Value) {
        self.send_text(&value.to_string());
    }

    /// Waits for the next frame from the server and parses it.
    pub(crate) async fn recv_json(&mut self) -> Value {
        let message = tokio::time::timeout(RECV_TIMEOUT, self.outbound_rx.recv())
            .await
            .expect("frame within timeout")
            .expect("link still open");
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).expect("valid JSON"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    /// Waits for the next frame of a given type, skipping others.
    pub(crate) async fn recv_type(&mut self, message_type: &str) -> Value {
        loop {
            let value = self.recv_json().await;
            if value["type"] == message_type {
                return value;
            }
        }
    }

    /// Asserts that no frame arrives for a short while.
    pub(crate) async fn expect_silence(&mut self) {
        if let Ok(Some(message)) = tokio::time::timeout(SILENCE_WINDOW, self.outbound_rx.recv()).await {
            panic!("expected silence, got {message:?}");
        }
    }

    /// Drops the peer's side, which ends the server's read stream.
    pub(crate) fn disconnect(self) {
        drop(self);
    }
}

/// Creates only the server's sink half, plus the receiver it writes to.
pub(crate) fn mock_writer() -> (
    impl Sink<Message, Error = Error> + Send + 'static,
    mpsc::UnboundedReceiver<Message>,
) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer = sink::unfold(outbound_tx, |tx, message: Message| async move {
        tx.send(message).map_err(|_| Error::ConnectionClosed)?;
        Ok::<_, Error>(tx)
    });
    (writer, outbound_rx)
}

/// Creates a transport pair: the server's halves and the peer.
pub(crate) fn mock_transport() -> (
    impl Sink<Message, Error = Error> + Send + 'static,
    impl Stream<Item = Result<Message, Error>> + Send + 'static,
    MockPeer,
) {
    let (writer, outbound_rx) = mock_writer();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let reader = stream::unfold(inbound_rx, |mut rx| async move {
        rx.recv().await.map(|message| (Ok(message), rx))
    });

    (
        writer,
        reader,
        MockPeer {
            inbound_tx,
            outbound_rx,
        },
    )
}

/// Establishes a link and starts reading right away.
pub(crate) fn connect(registry: &Arc<ConnectionRegistry>) -> (Link, MockPeer) {
    let (writer, reader, peer) = mock_transport();
    let link = registry.establish(writer, reader).listen();
    (link, peer)
}
