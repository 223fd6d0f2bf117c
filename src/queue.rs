//! Serialized snapshot application
//!
//! Snapshot applications may be requested from anywhere, but the edit
//! target (the consumer's mirror of the outline) must see them one at a
//! time, each script computed against the snapshot the previous one left
//! behind. Requests go through a single-consumer channel; the context that
//! owns the target drains it, either as an async task ([`ApplyLoop::run`])
//! or by polling ([`ApplyLoop::drain_pending`]).
//!
//! Senders do not own the loop. Once it is dropped every submission fails
//! with [`QueueError::Closed`].
//!
//! Author: Moroya Sakamoto

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

use crate::diff::EditOp;
use crate::error::QueueError;
use crate::mirror::EditTarget;
use crate::snapshot::{Identifiable, Snapshot};
use crate::source::DataSource;

type Reply<Id, E> = Result<Vec<EditOp<Id>>, E>;

struct Request<I: Identifiable, E> {
    snapshot: Snapshot<I>,
    reply: oneshot::Sender<Reply<I::Id, E>>,
}

/// Create a queue in front of `source` and `target`.
///
/// The returned loop must be driven by the context that owns `target`.
pub fn apply_queue<I, T>(source: DataSource<I>, target: T) -> (SnapshotSender<I, T::Error>, ApplyLoop<I, T>)
where
    I: Identifiable,
    T: EditTarget<I::Id>,
{
    let (tx, rx) = mpsc::unbounded_channel();
    (
        SnapshotSender { tx },
        ApplyLoop { source, target, rx },
    )
}

/// Cloneable handle for requesting snapshot applications
pub struct SnapshotSender<I: Identifiable, E> {
    tx: mpsc::UnboundedSender<Request<I, E>>,
}

impl<I: Identifiable, E> Clone for SnapshotSender<I, E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<I: Identifiable, E> SnapshotSender<I, E> {
    /// Queue `snapshot` for application after everything queued before it.
    pub fn submit(&self, snapshot: Snapshot<I>) -> Result<ApplyTicket<I::Id, E>, QueueError<E>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request { snapshot, reply })
            .map_err(|_| QueueError::Closed)?;
        Ok(ApplyTicket { rx })
    }

    /// True once the apply loop has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Completion of one submitted snapshot
pub struct ApplyTicket<Id, E> {
    rx: oneshot::Receiver<Reply<Id, E>>,
}

impl<Id, E> ApplyTicket<Id, E> {
    /// Wait until the snapshot has been applied; yields the script the
    /// target received.
    pub async fn applied(self) -> Result<Vec<EditOp<Id>>, QueueError<E>> {
        match self.rx.await {
            Ok(reply) => reply.map_err(QueueError::Target),
            Err(_) => Err(QueueError::Closed),
        }
    }

    /// Non-blocking check; `None` while the request is still queued.
    pub fn try_applied(&mut self) -> Option<Result<Vec<EditOp<Id>>, QueueError<E>>> {
        match self.rx.try_recv() {
            Ok(reply) => Some(reply.map_err(QueueError::Target)),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(QueueError::Closed)),
        }
    }
}

/// Receiving end, owned by the context that owns the edit target
pub struct ApplyLoop<I: Identifiable, T: EditTarget<I::Id>> {
    source: DataSource<I>,
    target: T,
    rx: mpsc::UnboundedReceiver<Request<I, T::Error>>,
}

impl<I: Identifiable, T: EditTarget<I::Id>> ApplyLoop<I, T> {
    pub fn source(&self) -> &DataSource<I> {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Apply requests until every sender is gone, then hand back the state.
    pub async fn run(mut self) -> (DataSource<I>, T) {
        while let Some(request) = self.rx.recv().await {
            self.handle(request);
        }
        debug!(version = self.source.version(), "apply loop finished");
        (self.source, self.target)
    }

    /// Apply whatever is queued right now without waiting for more.
    /// Returns the number of requests handled.
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(request) = self.rx.try_recv() {
            self.handle(request);
            handled += 1;
        }
        handled
    }

    fn handle(&mut self, request: Request<I, T::Error>) {
        let Request { snapshot, reply } = request;
        let result = self.source.apply_snapshot(snapshot, &mut self.target);
        if reply.send(result).is_err() {
            trace!("submitter dropped its ticket");
        }
    }
}
