//! Add-wins set (observed-remove set over a dot store)
//!
//! Each add tags the element with a freshly minted dot; remove drops the
//! element's observed dots by covering them with the delta's causal context.
//! Concurrent add and remove of the same element: add wins, because the
//! remove can only cover dots it has observed, never the concurrent add's.
//!
//! There are no tombstones. An entry dot survives a join iff both sides hold
//! it, or one side holds it and the other side's causal context has not seen
//! it (seen-but-dropped means removed).

use crate::causal::{CausalContext, Dot, NodeId};
use crate::lattice::Lattice;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An add-wins observed-remove set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwSet<T: Ord + Clone> {
    /// Maps live elements to the dots that added them
    entries: BTreeMap<T, BTreeSet<Dot>>,
    /// Every dot this state accounts for, live or removed
    context: CausalContext,
}

/// Mutators of [`AwSet`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AwSetOp<T> {
    Add(T),
    Remove(T),
}

impl<T: Ord + Clone> AwSet<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            context: CausalContext::new(),
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.entries.contains_key(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Ord + Clone> Default for AwSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Ord + Clone> Lattice for AwSet<T> {
    type Value = BTreeSet<T>;
    type Mutator = AwSetOp<T>;

    fn bottom() -> Self {
        Self::new()
    }

    fn read(&self) -> BTreeSet<T> {
        self.entries.keys().cloned().collect()
    }

    fn mutate(&self, mutator: AwSetOp<T>, node: NodeId) -> Self {
        let mut delta = Self::new();
        match mutator {
            AwSetOp::Add(value) => {
                // The delta's context covers the element's prior dots, so
                // joining it supersedes every add we have observed for it.
                let dot = self.context.next_dot(node);
                if let Some(old) = self.entries.get(&value) {
                    for d in old {
                        delta.context.insert(*d);
                    }
                }
                delta.entries.insert(value, BTreeSet::from([dot]));
                delta.context.insert(dot);
            }
            AwSetOp::Remove(value) => {
                // Covered dots with no entry read as removed after a join.
                // Removing an unseen element yields an empty (no-op) delta.
                if let Some(old) = self.entries.get(&value) {
                    for d in old {
                        delta.context.insert(*d);
                    }
                }
            }
        }
        delta
    }

    fn join(&self, other: &Self) -> Self {
        let mut entries: BTreeMap<T, BTreeSet<Dot>> = BTreeMap::new();
        let keys: BTreeSet<&T> = self.entries.keys().chain(other.entries.keys()).collect();

        for key in keys {
            let ours = self.entries.get(key);
            let theirs = other.entries.get(key);
            let mut live = BTreeSet::new();

            if let Some(ours) = ours {
                for dot in ours {
                    let in_both = theirs.is_some_and(|t| t.contains(dot));
                    if in_both || !other.context.contains(dot) {
                        live.insert(*dot);
                    }
                }
            }
            if let Some(theirs) = theirs {
                for dot in theirs {
                    if !self.context.contains(dot) {
                        live.insert(*dot);
                    }
                }
            }

            if !live.is_empty() {
                entries.insert((*key).clone(), live);
            }
        }

        let mut context = self.context.clone();
        context.union(&other.context);
        Self { entries, context }
    }

    fn compress(mut self) -> Self {
        self.context.compact();
        self
    }

    fn causal_context(&self) -> &CausalContext {
        &self.context
    }
}
