//! PN-Counter (Positive-Negative Counter)
//!
//! Supports both increment and decrement by maintaining two per-node
//! counters: one for increments (P) and one for decrements (N). The value is
//! P - N and the join takes the component-wise max.
//!
//! Unlike a bare PN-counter, every mutation here mints a dot, so counter
//! deltas carry the same causal-context shape as any other lattice and pass
//! through the replication layer's admissibility gate unchanged.

use crate::causal::{CausalContext, NodeId};
use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A PN-counter with a causal context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounter {
    /// Per-node increment totals
    increments: BTreeMap<NodeId, u64>,
    /// Per-node decrement totals
    decrements: BTreeMap<NodeId, u64>,
    context: CausalContext,
}

/// Mutators of [`PnCounter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PnCounterOp {
    Increment(u64),
    Decrement(u64),
}

impl PnCounter {
    pub fn new() -> Self {
        Self {
            increments: BTreeMap::new(),
            decrements: BTreeMap::new(),
            context: CausalContext::new(),
        }
    }

    /// Current value (sum of increments - sum of decrements).
    pub fn value(&self) -> i64 {
        let inc: u64 = self.increments.values().sum();
        let dec: u64 = self.decrements.values().sum();
        (inc as i64).saturating_sub(dec as i64)
    }

    pub fn get_increment(&self, node: NodeId) -> u64 {
        self.increments.get(&node).copied().unwrap_or(0)
    }

    pub fn get_decrement(&self, node: NodeId) -> u64 {
        self.decrements.get(&node).copied().unwrap_or(0)
    }
}

impl Default for PnCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Lattice for PnCounter {
    type Value = i64;
    type Mutator = PnCounterOp;

    fn bottom() -> Self {
        Self::new()
    }

    fn read(&self) -> i64 {
        self.value()
    }

    fn mutate(&self, mutator: PnCounterOp, node: NodeId) -> Self {
        // The delta carries the node's new running total; max-join makes
        // replaying it idempotent.
        let mut delta = Self::new();
        match mutator {
            PnCounterOp::Increment(amount) => {
                let total = self.get_increment(node).saturating_add(amount);
                delta.increments.insert(node, total);
            }
            PnCounterOp::Decrement(amount) => {
                let total = self.get_decrement(node).saturating_add(amount);
                delta.decrements.insert(node, total);
            }
        }
        delta.context.insert(self.context.next_dot(node));
        delta
    }

    fn join(&self, other: &Self) -> Self {
        let mut increments = self.increments.clone();
        let mut decrements = self.decrements.clone();

        for (&node, &total) in &other.increments {
            increments
                .entry(node)
                .and_modify(|e| *e = (*e).max(total))
                .or_insert(total);
        }
        for (&node, &total) in &other.decrements {
            decrements
                .entry(node)
                .and_modify(|e| *e = (*e).max(total))
                .or_insert(total);
        }

        let mut context = self.context.clone();
        context.union(&other.context);
        Self {
            increments,
            decrements,
            context,
        }
    }

    fn compress(mut self) -> Self {
        self.context.compact();
        self
    }

    fn causal_context(&self) -> &CausalContext {
        &self.context
    }
}
