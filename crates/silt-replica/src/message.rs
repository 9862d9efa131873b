//! Endpoints and the replica inbox
//!
//! A replica is addressed by an [`Endpoint`]: its node id plus a sender for
//! its inbox. Everything a replica reacts to - peer traffic, client calls,
//! timer ticks, its own deferred ship messages - arrives as one [`Incoming`]
//! message and is processed to completion before the next.

use silt_core::{Lattice, NodeId};
use tokio::sync::{mpsc, oneshot};

/// Position in a replica's delta log. Strictly increasing, starts at 0.
pub type SeqNo = u64;

/// A projection applied to the state inside the actor; the closure carries
/// its own reply channel.
pub type Projection<L> = Box<dyn FnOnce(&L) + Send>;

/// The address of a replica's inbox.
///
/// Cloneable and cheap; equality is by node id. Sends are fire-and-forget:
/// a closed inbox is indistinguishable from message loss on a real
/// transport, and anti-entropy self-heals around it.
#[derive(Debug)]
pub struct Endpoint<L: Lattice> {
    id: NodeId,
    tx: mpsc::UnboundedSender<Incoming<L>>,
}

impl<L: Lattice> Endpoint<L> {
    pub fn new(id: NodeId, tx: mpsc::UnboundedSender<Incoming<L>>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn send(&self, message: Incoming<L>) {
        let _ = self.tx.send(message);
    }
}

impl<L: Lattice> Clone for Endpoint<L> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<L: Lattice> PartialEq for Endpoint<L> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<L: Lattice> Eq for Endpoint<L> {}

/// Everything a replica's inbox can receive.
pub enum Incoming<L: Lattice> {
    /// A shipment from a peer: either a delta interval or a full state
    /// (indistinguishable to the receiver). `seq` is the sender's sequence
    /// number and is quoted back in the ack.
    Delta {
        origin: Endpoint<L>,
        payload: L,
        seq: SeqNo,
    },
    /// A peer acknowledges having received everything up through `seq` of
    /// our log.
    Ack { from: Endpoint<L>, seq: SeqNo },
    /// Union these peers into the neighbour set. Idempotent.
    AddNeighbours(Vec<Endpoint<L>>),
    /// Apply a locally-originated mutation. `done` is signaled once the
    /// delta is in the log (sync mode); `None` is fire-and-forget.
    Operation {
        op: L::Mutator,
        done: Option<oneshot::Sender<()>>,
    },
    /// Reply with the user-visible projection of the current state.
    Read { reply: oneshot::Sender<L::Value> },
    /// Run an arbitrary projection against the current state.
    ReadWith(Projection<L>),
    /// Periodic tick: consider scheduling a debounced ship.
    TryShip { done: Option<oneshot::Sender<()>> },
    /// Periodic tick: prune deltas every neighbour has acknowledged.
    GarbageCollect { done: Option<oneshot::Sender<()>> },
    /// Deferred, debounced ship decision for the sequence number snapshot
    /// taken at tick time.
    Ship { snapshot: SeqNo },
    /// Reply with a snapshot of the replica's protocol counters.
    Stats {
        reply: oneshot::Sender<crate::replica::ReplicaStats>,
    },
    /// Ship once more, best-effort, then exit.
    Stop { done: oneshot::Sender<()> },
}
