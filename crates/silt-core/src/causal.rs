//! Dots and causal contexts
//!
//! Every mutation is tagged with a [`Dot`]: a (node, counter) pair that is
//! globally unique because counters increase monotonically per node. The set
//! of dots a state has observed is its [`CausalContext`].
//!
//! The context is stored as a per-node *contiguous prefix* (the maxima: the
//! largest counter `m` such that every counter `1..=m` from that node has
//! been observed) plus a cloud of detached dots that arrived ahead of a gap.
//! [`CausalContext::compact`] absorbs cloud dots that have become adjacent
//! to the prefix.
//!
//! The prefix view is what the replication layer's admissibility check
//! inspects: a delta interval that would skip a dot from some node is
//! causally premature and must not be joined yet.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Identity of a replica within causal contexts.
///
/// Chosen at random when the replica starts; 64 bits from a CSPRNG makes
/// collisions across a cluster vanishingly unlikely.
pub type NodeId = u64;

/// A unique identifier for a single mutation event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dot {
    pub node: NodeId,
    pub counter: u64,
}

impl Dot {
    pub fn new(node: NodeId, counter: u64) -> Self {
        Self { node, counter }
    }
}

/// The set of dots a state accounts for.
///
/// Counters start at 1; `maxima[node] = m` means every dot `(node, 1..=m)`
/// is in the context. Dots beyond the prefix live in the cloud until the
/// gap below them fills.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalContext {
    maxima: BTreeMap<NodeId, u64>,
    cloud: BTreeSet<Dot>,
}

impl CausalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `dot` in the context?
    pub fn contains(&self, dot: &Dot) -> bool {
        dot.counter <= self.maxima.get(&dot.node).copied().unwrap_or(0)
            || self.cloud.contains(dot)
    }

    /// Record an observed dot.
    ///
    /// Extends the contiguous prefix when the dot is adjacent to it,
    /// otherwise parks the dot in the cloud. A node appears in `maxima`
    /// only once its prefix is non-empty.
    pub fn insert(&mut self, dot: Dot) {
        let max = self.maxima.get(&dot.node).copied().unwrap_or(0);
        if dot.counter <= max {
            return;
        }
        if dot.counter == max + 1 {
            self.maxima.insert(dot.node, dot.counter);
            self.absorb_cloud(dot.node);
        } else {
            self.cloud.insert(dot);
        }
    }

    /// The next unused counter for `node`, considering both the prefix and
    /// any cloud dots. Used to mint the dot for a fresh local mutation.
    pub fn next_counter(&self, node: NodeId) -> u64 {
        let prefix = self.maxima.get(&node).copied().unwrap_or(0);
        let detached = self
            .cloud
            .range(Dot::new(node, 0)..=Dot::new(node, u64::MAX))
            .next_back()
            .map(|d| d.counter)
            .unwrap_or(0);
        prefix.max(detached) + 1
    }

    /// Mint the next dot for `node`.
    pub fn next_dot(&self, node: NodeId) -> Dot {
        Dot::new(node, self.next_counter(node))
    }

    /// Incorporate every dot of `other` into this context.
    pub fn union(&mut self, other: &Self) {
        for (&node, &max) in &other.maxima {
            let entry = self.maxima.entry(node).or_insert(max);
            *entry = (*entry).max(max);
        }
        self.cloud.extend(other.cloud.iter().copied());
    }

    /// Absorb cloud dots adjacent to the prefix and drop those already
    /// covered by it.
    pub fn compact(&mut self) {
        let nodes: Vec<NodeId> = self.cloud.iter().map(|d| d.node).collect();
        for node in nodes {
            self.absorb_cloud(node);
        }
        let maxima = &self.maxima;
        self.cloud
            .retain(|d| d.counter > maxima.get(&d.node).copied().unwrap_or(0));
    }

    /// Per-node largest contiguous counter.
    pub fn maxima(&self) -> &BTreeMap<NodeId, u64> {
        &self.maxima
    }

    /// Per-node smallest counter this context claims.
    ///
    /// A full state claims from the very beginning of each node's history
    /// (counter 1); a delta interval claims only the dots it actually
    /// carries.
    pub fn first_dots(&self) -> BTreeMap<NodeId, u64> {
        let mut firsts: BTreeMap<NodeId, u64> =
            self.maxima.keys().map(|&n| (n, 1)).collect();
        for dot in &self.cloud {
            firsts
                .entry(dot.node)
                .and_modify(|c| *c = (*c).min(dot.counter))
                .or_insert(dot.counter);
        }
        firsts
    }

    /// True when no dot has been observed.
    pub fn is_empty(&self) -> bool {
        self.cloud.is_empty() && self.maxima.is_empty()
    }

    fn absorb_cloud(&mut self, node: NodeId) {
        let start = self.maxima.get(&node).copied().unwrap_or(0);
        let mut max = start;
        while self.cloud.remove(&Dot::new(node, max + 1)) {
            max += 1;
        }
        if max > start {
            self.maxima.insert(node, max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_extends_prefix() {
        let mut cc = CausalContext::new();
        cc.insert(Dot::new(1, 1));
        cc.insert(Dot::new(1, 2));

        assert_eq!(cc.maxima().get(&1), Some(&2));
        assert!(cc.contains(&Dot::new(1, 1)));
        assert!(cc.contains(&Dot::new(1, 2)));
        assert!(!cc.contains(&Dot::new(1, 3)));
    }

    #[test]
    fn test_insert_ahead_of_gap_goes_to_cloud() {
        let mut cc = CausalContext::new();
        cc.insert(Dot::new(1, 1));
        cc.insert(Dot::new(1, 3));

        assert_eq!(cc.maxima().get(&1), Some(&1));
        assert!(cc.contains(&Dot::new(1, 3)));
        assert!(!cc.contains(&Dot::new(1, 2)));

        // Filling the gap makes the prefix catch up through the cloud
        cc.insert(Dot::new(1, 2));
        assert_eq!(cc.maxima().get(&1), Some(&3));
    }

    #[test]
    fn test_next_counter_skips_cloud_dots() {
        let mut cc = CausalContext::new();
        cc.insert(Dot::new(7, 1));
        cc.insert(Dot::new(7, 5));

        assert_eq!(cc.next_counter(7), 6);
        assert_eq!(cc.next_counter(8), 1);
    }

    #[test]
    fn test_union_then_compact() {
        let mut a = CausalContext::new();
        a.insert(Dot::new(1, 1));
        a.insert(Dot::new(1, 2));

        let mut b = CausalContext::new();
        b.insert(Dot::new(1, 3));
        b.insert(Dot::new(2, 1));

        a.union(&b);
        assert!(a.contains(&Dot::new(1, 3)));
        assert!(a.contains(&Dot::new(2, 1)));

        a.compact();
        assert_eq!(a.maxima().get(&1), Some(&3));
        assert_eq!(a.maxima().get(&2), Some(&1));
    }

    #[test]
    fn test_first_dots() {
        let mut cc = CausalContext::new();
        cc.insert(Dot::new(1, 1));
        cc.insert(Dot::new(1, 2));
        cc.insert(Dot::new(2, 4));
        cc.insert(Dot::new(2, 5));

        let firsts = cc.first_dots();
        assert_eq!(firsts.get(&1), Some(&1));
        assert_eq!(firsts.get(&2), Some(&4));
    }

    #[test]
    fn test_union_is_commutative() {
        let mut a = CausalContext::new();
        a.insert(Dot::new(1, 1));
        a.insert(Dot::new(2, 3));

        let mut b = CausalContext::new();
        b.insert(Dot::new(1, 2));
        b.insert(Dot::new(3, 1));

        let mut ab = a.clone();
        ab.union(&b);
        let mut ba = b.clone();
        ba.union(&a);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut cc = CausalContext::new();
        cc.insert(Dot::new(42, 1));
        cc.insert(Dot::new(42, 7));

        let encoded = serde_json::to_string(&cc).unwrap();
        let decoded: CausalContext = serde_json::from_str(&encoded).unwrap();

        assert_eq!(cc, decoded);
    }
}
