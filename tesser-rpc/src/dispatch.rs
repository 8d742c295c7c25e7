//! Correlation of outbound calls with inbound responses.
//!
//! Each world holds one dispatcher: a monotonic sequence counter, the
//! table of pending calls, and an index by target world so that a
//! peer's disposal can reject exactly the calls aimed at it. Pending
//! calls settle through oneshot channels; a response whose sequence
//! number is unknown (typically one that raced a disposal) is dropped
//! silently.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use tesser_core::{RpcError, WireValue, WorldId};
use tokio::sync::oneshot;

/// Settlement of one pending call.
pub(crate) type CallOutcome = Result<WireValue, RpcError>;

struct PendingCall {
    reply: oneshot::Sender<CallOutcome>,
    target: WorldId,
}

pub(crate) struct Dispatcher {
    next_seq: Cell<u64>,
    pending: RefCell<HashMap<u64, PendingCall>>,
    by_target: RefCell<HashMap<WorldId, HashSet<u64>>>,
}

impl Dispatcher {
    pub(crate) fn new() -> Dispatcher {
        Dispatcher {
            next_seq: Cell::new(1),
            pending: RefCell::new(HashMap::new()),
            by_target: RefCell::new(HashMap::new()),
        }
    }

    /// Allocate a sequence number.
    ///
    /// Relayed calls draw from the same counter as locally originated
    /// ones, so the two can never collide in the pending table.
    pub(crate) fn next_seq(&self) -> u64 {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        seq
    }

    /// Record a pending call targeting `target` and return its
    /// sequence number plus the receiver it settles through.
    pub(crate) fn register(&self, target: WorldId) -> (u64, oneshot::Receiver<CallOutcome>) {
        let seq = self.next_seq();
        let (reply, receiver) = oneshot::channel();
        self.pending
            .borrow_mut()
            .insert(seq, PendingCall { reply, target });
        self.by_target
            .borrow_mut()
            .entry(target)
            .or_default()
            .insert(seq);
        (seq, receiver)
    }

    /// Settle the pending call `seq` with `outcome`.
    ///
    /// Unknown sequence numbers are late responses after a disposal and
    /// are dropped.
    pub(crate) fn settle(&self, seq: u64, outcome: CallOutcome) {
        let entry = self.pending.borrow_mut().remove(&seq);
        match entry {
            Some(pending) => {
                if let Some(seqs) = self.by_target.borrow_mut().get_mut(&pending.target) {
                    seqs.remove(&seq);
                }
                if pending.reply.send(outcome).is_err() {
                    tracing::debug!(seq, "caller went away before its response arrived");
                }
            }
            None => tracing::debug!(seq, "dropping response for unknown call"),
        }
    }

    /// Reject every pending call targeting `world`.
    pub(crate) fn cancel_for(&self, world: WorldId) {
        let seqs = self.by_target.borrow_mut().remove(&world).unwrap_or_default();
        for seq in seqs {
            if let Some(pending) = self.pending.borrow_mut().remove(&seq) {
                let _ = pending.reply.send(Err(RpcError::PeerDisposed { world }));
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}
