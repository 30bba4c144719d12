//! One bidirectional link to a peer.
//!
//! # Writer Task
//!
//! Each link spawns a writer task that owns the transport's sink half.
//! [`Link::send`] serializes the envelope and enqueues the frame on an
//! unbounded command channel; the writer drains the channel in order, so two
//! messages on one link never interleave. Enqueueing never fails visibly:
//! a dead writer surfaces later through the close sequence.
//!
//! # Close Sequence
//!
//! Driven by the read loop on the first read failure:
//!
//! 1. Mark the link closing and tell the writer to close the transport.
//! 2. Spawn every close observer as its own task.
//! 3. Wait until all observers have finished.
//!
//! Only one close sequence runs per link. Observers registered after the
//! sequence started are spawned immediately.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::extract::ws::Message;
use futures_util::future::{BoxFuture, join_all};
use futures_util::{FutureExt, Sink, SinkExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::error::Error;
use crate::identifiers::LinkId;
use crate::protocol::{Envelope, encode, message_types};

// ============================================================================
// Types
// ============================================================================

/// Future run once when a link closes.
pub type CloseObserver = BoxFuture<'static, ()>;

/// Internal commands for the writer task.
enum LinkCommand {
    /// Write one text frame.
    Send(String),
    /// Close the transport and stop writing.
    Close,
}

/// Observer list guarded by the link's observer lock.
#[derive(Default)]
struct CloseState {
    observers: Vec<CloseObserver>,
    closed: bool,
}

struct LinkInner {
    /// Link identifier.
    id: LinkId,
    /// Channel to the writer task.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    /// Set once the close sequence starts.
    closing: AtomicBool,
    /// Pending observers.
    close_state: Mutex<CloseState>,
}

// ============================================================================
// Link
// ============================================================================

/// Handle to one physical connection.
///
/// Cheap to clone; all clones refer to the same connection.
#[derive(Clone)]
pub struct Link {
    inner: Arc<LinkInner>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.inner.id)
            .field("closing", &self.is_closing())
            .finish()
    }
}

impl Link {
    /// Creates a link around the sink half of a transport.
    ///
    /// Spawns the writer task internally.
    pub(crate) fn new<W>(writer: W) -> Self
    where
        W: Sink<Message> + Send + 'static,
        W::Error: fmt::Display,
    {
        let id = LinkId::generate();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_writer(id, Box::pin(writer), command_rx));

        Self {
            inner: Arc::new(LinkInner {
                id,
                command_tx,
                closing: AtomicBool::new(false),
                close_state: Mutex::new(CloseState::default()),
            }),
        }
    }

    /// Returns the link ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> LinkId {
        self.inner.id
    }

    /// Returns `true` once the close sequence has started.
    #[inline]
    #[must_use]
    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::SeqCst)
    }

    /// Serializes and sends an envelope.
    ///
    /// Delivery is best-effort; failures are logged, never returned.
    pub fn send<T: Serialize>(&self, envelope: &Envelope<T>) {
        match encode(envelope) {
            Ok(frame) => self.send_frame(frame),
            Err(e) => warn!(
                link_id = %self.inner.id,
                message_type = envelope.message_type(),
                error = %e,
                "Failed to encode message"
            ),
        }
    }

    /// Sends an already encoded frame.
    pub fn send_frame(&self, frame: String) {
        trace!(link_id = %self.inner.id, %frame, "Message queued");

        if self.inner.command_tx.send(LinkCommand::Send(frame)).is_err() {
            trace!(link_id = %self.inner.id, "Writer gone, message dropped");
        }
    }

    /// Sends an `error` envelope describing `err`.
    pub fn send_error(&self, err: &Error) {
        self.send(&Envelope::new(message_types::ERROR, err.to_error_message()));
    }

    /// Registers a future to run when the link closes.
    ///
    /// Observers cannot be removed. If the link already closed the observer
    /// is spawned right away.
    pub fn on_close<F>(&self, observer: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.inner.close_state.lock();
        if state.closed {
            drop(state);
            tokio::spawn(observer);
            return;
        }
        state.observers.push(observer.boxed());
    }

    /// Returns the number of observers waiting for the close sequence.
    #[inline]
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.close_state.lock().observers.len()
    }

    /// Runs the close sequence.
    ///
    /// Returns after every observer finished. A second call is a no-op.
    pub(crate) async fn close(&self) {
        if self.inner.closing.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.inner.command_tx.send(LinkCommand::Close);

        let observers = {
            let mut state = self.inner.close_state.lock();
            state.closed = true;
            std::mem::take(&mut state.observers)
        };

        debug!(link_id = %self.inner.id, observers = observers.len(), "Link closing");

        run_to_completion(observers, "close observer").await;

        debug!(link_id = %self.inner.id, "Link closed");
    }

    /// Writer task that owns the sink half.
    async fn run_writer<W>(
        id: LinkId,
        mut writer: std::pin::Pin<Box<W>>,
        mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    ) where
        W: Sink<Message> + Send + 'static,
        W::Error: fmt::Display,
    {
        while let Some(command) = command_rx.recv().await {
            match command {
                LinkCommand::Send(frame) => {
                    if let Err(e) = writer.send(Message::Text(frame.into())).await {
                        warn!(link_id = %id, error = %e, "Failed to write message");
                        break;
                    }
                }
                LinkCommand::Close => {
                    let _ = writer.close().await;
                    break;
                }
            }
        }

        debug!(link_id = %id, "Writer terminated");
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// Spawns every future as its own task and waits for all of them.
///
/// A panicking task is an invariant violation; it is logged and re-raised
/// after the remaining tasks have finished.
pub(crate) async fn run_to_completion(tasks: Vec<BoxFuture<'static, ()>>, what: &'static str) {
    if tasks.is_empty() {
        return;
    }

    let handles: Vec<_> = tasks.into_iter().map(tokio::spawn).collect();

    let mut panic = None;
    for result in join_all(handles).await {
        if let Err(e) = result
            && e.is_panic()
        {
            error!(task = what, "Cleanup task panicked");
            panic.get_or_insert(e.into_panic());
        }
    }

    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::protocol::ErrorMessage;
    use crate::transport::testing::mock_writer;

    #[tokio::test]
    async fn test_send_preserves_order() {
        let (writer, mut out_rx) = mock_writer();
        let link = Link::new(writer);

        for i in 0..50 {
            link.send(&Envelope::new("n", i));
        }

        for i in 0..50 {
            let Some(Message::Text(text)) = out_rx.recv().await else {
                panic!("expected text frame");
            };
            assert_eq!(text.as_str(), format!(r#"{{"type":"n","msg":{i}}}"#));
        }
    }

    #[tokio::test]
    async fn test_send_after_writer_gone_does_not_fail() {
        let (writer, out_rx) = mock_writer();
        let link = Link::new(writer);
        drop(out_rx);

        link.send(&Envelope::new("a", 1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        link.send(&Envelope::new("b", 2));
        link.send_error(&Error::decode("late"));
    }

    #[tokio::test]
    async fn test_send_error_envelope() {
        let (writer, mut out_rx) = mock_writer();
        let link = Link::new(writer);
        link.send_error(&Error::client_not_found("Remote"));

        let Some(Message::Text(text)) = out_rx.recv().await else {
            panic!("expected text frame");
        };
        let envelope: Envelope<ErrorMessage> = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(envelope.message_type, "error");
        assert_eq!(envelope.msg.error_message, "Remote client not found.");
    }

    #[tokio::test]
    async fn test_close_runs_all_observers_before_returning() {
        let (writer, _out_rx) = mock_writer();
        let link = Link::new(writer);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            link.on_close(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(link.observer_count(), 5);

        link.close().await;

        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert!(link.is_closing());
    }

    #[tokio::test]
    async fn test_close_runs_observers_concurrently() {
        let (writer, _out_rx) = mock_writer();
        let link = Link::new(writer);
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let barrier = Arc::new(tokio::sync::Barrier::new(2));

        // Each observer waits for the other; sequential execution would hang.
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            let tx = tx.clone();
            link.on_close(async move {
                barrier.wait().await;
                let _ = tx.send(());
            });
        }

        tokio::time::timeout(Duration::from_secs(1), link.close())
            .await
            .expect("observers ran concurrently");
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_close_twice_runs_observers_once() {
        let (writer, _out_rx) = mock_writer();
        let link = Link::new(writer);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        link.on_close(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        link.close().await;
        link.close().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observer_after_close_runs_immediately() {
        let (writer, _out_rx) = mock_writer();
        let link = Link::new(writer);
        link.close().await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        link.on_close(async move {
            let _ = tx.send(());
        });

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("late observer ran")
            .expect("sender kept");
    }

    #[tokio::test]
    async fn test_close_closes_writer() {
        let (writer, mut out_rx) = mock_writer();
        let link = Link::new(writer);
        link.close().await;

        // Writer task exits and drops the sink, ending the channel.
        let next = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .expect("writer finished");
        assert!(next.is_none());
    }
}
