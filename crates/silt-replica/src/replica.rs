//! The replica actor
//!
//! One replica per logical node. The replica owns its CRDT state, a log of
//! numbered deltas, and per-neighbour ack tracking; everything reaches it
//! through its inbox and is handled to completion, one message at a time.
//!
//! # Protocol
//!
//! On local mutation m:
//!   d = mδ(X)                        // compute delta
//!   X = compress(X ⊔ d)              // apply to state
//!   log[seq] = (self, d); seq += 1   // number it
//!
//! On `try_ship` tick (every ship_interval):
//!   if seq != shipped_seq, schedule {ship, seq} to self after ship_debounce
//!
//! On deferred {ship, s}:
//!   ship to all neighbours if s == seq (quiesced at the snapshot) or the
//!   unshipped backlog exceeds force_ship_backlog; otherwise drop - a
//!   fresher snapshot always follows
//!
//! On shipment to neighbour n:
//!   send the join of log[acked(n)..seq] minus n's own deltas, or the full
//!   state if the log no longer reaches back to acked(n)
//!
//! On inbound {delta, (origin, d), n}:
//!   if causally premature, drop silently; else join, log, and ack n back
//!
//! On inbound {ack, n, s}: acked(n) = max(acked(n), s)
//!
//! On `garbage_collect` tick: prune log entries below every neighbour's ack

use crate::buffer::{AckTracker, DeltaLog};
use crate::config::{Notify, ReplicaConfig};
use crate::driver;
use crate::error::{ReplicaError, Result};
use crate::message::{Endpoint, Incoming, SeqNo};
use silt_core::{CausalContext, Lattice, NodeId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

/// Snapshot of a replica's protocol counters, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaStats {
    pub node_id: NodeId,
    pub seq: SeqNo,
    pub shipped_seq: SeqNo,
    pub buffered_deltas: usize,
    pub neighbours: usize,
}

/// The replica state machine.
///
/// All methods run inside the actor task; none blocks or suspends.
pub(crate) struct Replica<L: Lattice> {
    node_id: NodeId,
    name: String,
    state: L,
    seq: SeqNo,
    shipped_seq: SeqNo,
    log: DeltaLog<L>,
    neighbours: Vec<Endpoint<L>>,
    acks: AckTracker,
    ship_debounce: Duration,
    force_ship_backlog: u64,
    notify: Option<Notify>,
    /// Our own inbox address: the origin of local deltas, the ack target we
    /// hand to peers, and the destination of deferred ship messages.
    endpoint: Endpoint<L>,
}

impl<L: Lattice> Replica<L> {
    pub(crate) fn new(config: &ReplicaConfig, node_id: NodeId, endpoint: Endpoint<L>) -> Self {
        Self {
            node_id,
            name: config.name.clone(),
            state: L::bottom(),
            seq: 0,
            shipped_seq: 0,
            log: DeltaLog::new(),
            neighbours: Vec::new(),
            acks: AckTracker::new(),
            ship_debounce: config.ship_debounce(),
            force_ship_backlog: config.force_ship_backlog,
            notify: config.notify.clone(),
            endpoint,
        }
    }

    fn apply_operation(&mut self, op: L::Mutator) {
        let delta = self.state.mutate(op, self.node_id);
        self.state = self.state.join(&delta).compress();
        self.log.insert(self.seq, self.endpoint.clone(), delta);
        self.seq += 1;
    }

    fn on_delta(&mut self, origin: Endpoint<L>, payload: L, remote_seq: SeqNo) {
        if !causally_admissible(self.state.causal_context(), payload.causal_context()) {
            debug!(
                replica = %self.name,
                from = origin.id(),
                remote_seq,
                "dropping causally premature delta interval"
            );
            return;
        }
        self.state = self.state.join(&payload).compress();
        self.log.insert(self.seq, origin.clone(), payload);
        self.seq += 1;
        origin.send(Incoming::Ack {
            from: self.endpoint.clone(),
            seq: remote_seq,
        });
    }

    fn on_ack(&mut self, from: &Endpoint<L>, seq: SeqNo) {
        self.acks.observe(from.id(), seq);
    }

    fn add_neighbours(&mut self, endpoints: Vec<Endpoint<L>>) {
        for endpoint in endpoints {
            if endpoint.id() != self.node_id && !self.neighbours.contains(&endpoint) {
                self.neighbours.push(endpoint);
            }
        }
    }

    /// Schedule a debounced ship for the current sequence-number snapshot.
    fn on_try_ship(&mut self)
    where
        L: Send + 'static,
        L::Mutator: Send,
        L::Value: Send,
    {
        if self.shipped_seq == self.seq {
            return;
        }
        let target = self.endpoint.clone();
        let snapshot = self.seq;
        let debounce = self.ship_debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            target.send(Incoming::Ship { snapshot });
        });
    }

    /// Decide the fate of a deferred ship snapshot.
    fn on_ship(&mut self, snapshot: SeqNo) {
        let forced = snapshot > self.shipped_seq + self.force_ship_backlog;
        let quiesced = snapshot == self.seq;
        if !forced && !quiesced {
            // Stale snapshot: the next try_ship tick carries a fresher one.
            return;
        }
        self.ship_to_all();
        self.shipped_seq = snapshot;
        if let Some(notify) = &self.notify {
            // An unregistered notify target is dropped silently
            let _ = notify.target.send(notify.message.clone());
        }
    }

    fn ship_to_all(&self) {
        for neighbour in &self.neighbours {
            self.ship_to(neighbour);
        }
    }

    fn ship_to(&self, neighbour: &Endpoint<L>) {
        let remote_acked = self.acks.get(neighbour.id());
        let stale = self
            .log
            .min_key()
            .map_or(true, |min| min > remote_acked);

        if stale {
            // We no longer hold the deltas the neighbour is missing; only a
            // full state can catch it up.
            trace!(replica = %self.name, to = neighbour.id(), seq = self.seq, "shipping full state");
            neighbour.send(Incoming::Delta {
                origin: self.endpoint.clone(),
                payload: self.state.clone(),
                seq: self.seq,
            });
            return;
        }

        match self.log.interval_for(remote_acked, self.seq, neighbour) {
            Some(interval) => {
                trace!(
                    replica = %self.name,
                    to = neighbour.id(),
                    from_seq = remote_acked,
                    seq = self.seq,
                    "shipping delta interval"
                );
                neighbour.send(Incoming::Delta {
                    origin: self.endpoint.clone(),
                    payload: interval,
                    seq: self.seq,
                });
            }
            // Everything pending originated at this neighbour
            None => {}
        }
    }

    fn garbage_collect(&mut self) {
        if self.neighbours.is_empty() {
            return;
        }
        let floor = self
            .acks
            .floor_for(self.neighbours.iter().map(|n| n.id()));
        let pruned = self.log.prune_below(floor);
        if pruned > 0 {
            debug!(replica = %self.name, floor, pruned, "pruned acknowledged deltas");
        }
    }

    fn stats(&self) -> ReplicaStats {
        ReplicaStats {
            node_id: self.node_id,
            seq: self.seq,
            shipped_seq: self.shipped_seq,
            buffered_deltas: self.log.len(),
            neighbours: self.neighbours.len(),
        }
    }

    /// Final best-effort ship before the actor exits.
    fn terminate(&mut self) {
        self.ship_to_all();
        info!(replica = %self.name, node = self.node_id, "replica stopped");
    }
}

/// Would joining a payload claiming `claimed` skip a dot some node already
/// has a contiguous prefix for?
///
/// The payload is premature iff, for some node, its smallest claimed dot
/// lies beyond the next dot our state expects from that node. Nodes we have
/// no contiguous prefix for are not checked; a full state always passes
/// because it claims each node's history from the start.
fn causally_admissible(local: &CausalContext, claimed: &CausalContext) -> bool {
    claimed.first_dots().iter().all(|(node, first)| {
        match local.maxima().get(node) {
            Some(max) => max + 1 >= *first,
            None => true,
        }
    })
}

async fn run<L>(mut replica: Replica<L>, mut inbox: mpsc::UnboundedReceiver<Incoming<L>>)
where
    L: Lattice + Send + 'static,
    L::Mutator: Send,
    L::Value: Send,
{
    loop {
        match inbox.recv().await {
            Some(Incoming::Delta {
                origin,
                payload,
                seq,
            }) => replica.on_delta(origin, payload, seq),
            Some(Incoming::Ack { from, seq }) => replica.on_ack(&from, seq),
            Some(Incoming::AddNeighbours(endpoints)) => replica.add_neighbours(endpoints),
            Some(Incoming::Operation { op, done }) => {
                replica.apply_operation(op);
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Some(Incoming::Read { reply }) => {
                let _ = reply.send(replica.state.read());
            }
            Some(Incoming::ReadWith(project)) => project(&replica.state),
            Some(Incoming::TryShip { done }) => {
                replica.on_try_ship();
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Some(Incoming::GarbageCollect { done }) => {
                replica.garbage_collect();
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Some(Incoming::Ship { snapshot }) => replica.on_ship(snapshot),
            Some(Incoming::Stats { reply }) => {
                let _ = reply.send(replica.stats());
            }
            Some(Incoming::Stop { done }) => {
                replica.terminate();
                let _ = done.send(());
                return;
            }
            // Every handle and peer endpoint is gone
            None => {
                replica.terminate();
                return;
            }
        }
    }
}

/// Start a replica and return a handle to it.
///
/// Spawns the actor task and its periodic driver on the current tokio
/// runtime. Fails only on missing configuration.
pub fn spawn<L>(config: ReplicaConfig) -> Result<ReplicaHandle<L>>
where
    L: Lattice + Send + 'static,
    L::Mutator: Send,
    L::Value: Send,
{
    config.validate()?;

    let node_id: NodeId = rand::random();
    let (tx, rx) = mpsc::unbounded_channel();
    let endpoint = Endpoint::new(node_id, tx);

    let replica = Replica::new(&config, node_id, endpoint.clone());
    info!(replica = %config.name, node = node_id, "replica started");

    tokio::spawn(run(replica, rx));
    tokio::spawn(driver::run(
        endpoint.clone(),
        config.ship_interval(),
        config.gc_interval(),
    ));

    Ok(ReplicaHandle { endpoint })
}

/// Client-side handle to a running replica.
pub struct ReplicaHandle<L: Lattice> {
    endpoint: Endpoint<L>,
}

impl<L: Lattice> Clone for ReplicaHandle<L> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<L: Lattice> ReplicaHandle<L> {
    /// The address other replicas use to reach this one.
    pub fn endpoint(&self) -> Endpoint<L> {
        self.endpoint.clone()
    }

    /// Read the user-visible projection of the current state.
    pub async fn read(&self, timeout: Duration) -> Result<L::Value> {
        let (reply, rx) = oneshot::channel();
        self.endpoint.send(Incoming::Read { reply });
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(ReplicaError::Stopped),
            Err(_) => Err(ReplicaError::ReadTimeout),
        }
    }

    /// Read through a caller-supplied projection of the raw state.
    pub async fn read_with<R, F>(&self, project: F) -> Result<R>
    where
        F: FnOnce(&L) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.endpoint.send(Incoming::ReadWith(Box::new(move |state| {
            let _ = reply.send(project(state));
        })));
        rx.await.map_err(|_| ReplicaError::Stopped)
    }

    /// Apply a mutation and wait until its delta is logged.
    pub async fn operation(&self, op: L::Mutator) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.endpoint.send(Incoming::Operation {
            op,
            done: Some(done),
        });
        rx.await.map_err(|_| ReplicaError::Stopped)
    }

    /// Apply a mutation without waiting.
    pub fn operation_async(&self, op: L::Mutator) {
        self.endpoint.send(Incoming::Operation { op, done: None });
    }

    /// Add one peer to the anti-entropy neighbour set.
    pub fn add_neighbour(&self, endpoint: Endpoint<L>) {
        self.endpoint.send(Incoming::AddNeighbours(vec![endpoint]));
    }

    /// Add several peers at once. Idempotent.
    pub fn add_neighbours(&self, endpoints: Vec<Endpoint<L>>) {
        self.endpoint.send(Incoming::AddNeighbours(endpoints));
    }

    /// Snapshot the replica's protocol counters.
    pub async fn stats(&self) -> Result<ReplicaStats> {
        let (reply, rx) = oneshot::channel();
        self.endpoint.send(Incoming::Stats { reply });
        rx.await.map_err(|_| ReplicaError::Stopped)
    }

    /// Ship once more to every neighbour, best-effort, then stop the actor.
    pub async fn stop(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        self.endpoint.send(Incoming::Stop { done });
        rx.await.map_err(|_| ReplicaError::Stopped)
    }
}
