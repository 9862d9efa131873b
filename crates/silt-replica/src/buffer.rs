//! Delta log and acknowledgement tracking
//!
//! The log maps each sequence number to the delta recorded at that position
//! together with the endpoint that produced it (ourselves or a specific
//! neighbour). The origin matters twice: a neighbour's own deltas are never
//! echoed back to it, and garbage collection prunes by sequence-number floor
//! once every neighbour has acknowledged past an entry.

use crate::message::{Endpoint, SeqNo};
use silt_core::{Lattice, NodeId};
use std::collections::BTreeMap;

/// Ordered log of (origin, delta) pairs keyed by sequence number.
#[derive(Debug, Clone)]
pub struct DeltaLog<L: Lattice> {
    entries: BTreeMap<SeqNo, (Endpoint<L>, L)>,
}

impl<L: Lattice> DeltaLog<L> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, seq: SeqNo, origin: Endpoint<L>, delta: L) {
        self.entries.insert(seq, (origin, delta));
    }

    /// Smallest sequence number still held, if any.
    pub fn min_key(&self) -> Option<SeqNo> {
        self.entries.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join of the deltas in `[from, to)` that did not originate at
    /// `exclude`. `None` when nothing in the range qualifies.
    pub fn interval_for(&self, from: SeqNo, to: SeqNo, exclude: &Endpoint<L>) -> Option<L> {
        let mut interval: Option<L> = None;
        for (_, (origin, delta)) in self.entries.range(from..to) {
            if origin == exclude {
                continue;
            }
            match &mut interval {
                Some(acc) => acc.join_assign(delta),
                None => interval = Some(delta.clone()),
            }
        }
        interval
    }

    /// Drop every entry below `floor`; returns how many were pruned.
    pub fn prune_below(&mut self, floor: SeqNo) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&seq, _| seq >= floor);
        before - self.entries.len()
    }
}

impl<L: Lattice> Default for DeltaLog<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-neighbour highest acknowledged sequence number.
///
/// Updates are monotone max, so reordered acks never regress an entry.
/// A neighbour with no recorded ack reads as 0.
#[derive(Debug, Clone, Default)]
pub struct AckTracker {
    acked: BTreeMap<NodeId, SeqNo>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, node: NodeId, seq: SeqNo) {
        let entry = self.acked.entry(node).or_insert(0);
        *entry = (*entry).max(seq);
    }

    pub fn get(&self, node: NodeId) -> SeqNo {
        self.acked.get(&node).copied().unwrap_or(0)
    }

    /// The GC floor for a neighbour set: the minimum ack among neighbours
    /// that have acknowledged anything, or 0 when none has.
    pub fn floor_for(&self, neighbours: impl Iterator<Item = NodeId>) -> SeqNo {
        neighbours
            .filter_map(|node| self.acked.get(&node).copied())
            .min()
            .unwrap_or(0)
    }
}
