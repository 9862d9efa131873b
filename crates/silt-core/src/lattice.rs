//! Join-semilattice trait - the mathematical foundation of CRDTs
//!
//! A join-semilattice (S, ⊔) satisfies:
//! - Commutativity: a ⊔ b = b ⊔ a
//! - Associativity: (a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)
//! - Idempotence:   a ⊔ a = a
//!
//! These properties guarantee convergence regardless of message order.

use crate::causal::{CausalContext, NodeId};
use std::cmp::Ordering;

/// The capability consumed by the replication engine.
///
/// A `Lattice` is a state that can be mutated through named delta-mutators.
/// Each mutation yields a *delta* of the same type as the state: a small
/// lattice value that, joined into the state, has the same effect as the
/// full mutation. Delta intervals shipped between replicas are joins of such
/// deltas and are indistinguishable from full states on the wire.
pub trait Lattice: Clone + PartialEq {
    /// The user-visible projection of the state.
    type Value;

    /// The union of named mutators this lattice supports.
    type Mutator;

    /// The bottom element (identity for join). A replica starts here.
    fn bottom() -> Self;

    /// Project the state for a reader.
    fn read(&self) -> Self::Value;

    /// Apply a delta-mutator, returning the delta it produces.
    ///
    /// `node` identifies the mutating replica; it is used to mint the dots
    /// that tag the mutation in the delta's causal context. The state itself
    /// is not modified - the caller joins the delta back in.
    fn mutate(&self, mutator: Self::Mutator, node: NodeId) -> Self;

    /// Join operation (least upper bound).
    /// Must be commutative, associative, and idempotent.
    fn join(&self, other: &Self) -> Self;

    /// Join-assign: self = self ⊔ other
    fn join_assign(&mut self, other: &Self) {
        *self = self.join(other);
    }

    /// Normalize the state, folding detached dots into the contiguous
    /// per-node prefix where possible. Must satisfy
    /// `join(compress(s), x) = compress(join(s, x))` up to normalization.
    fn compress(self) -> Self {
        self
    }

    /// The set of dots this state accounts for.
    fn causal_context(&self) -> &CausalContext;

    /// Partial order derived from join: a ≤ b iff a ⊔ b = b
    fn partial_cmp_lattice(&self, other: &Self) -> Option<Ordering> {
        let joined = self.join(other);
        if &joined == self && &joined == other {
            Some(Ordering::Equal)
        } else if &joined == other {
            Some(Ordering::Less)
        } else if &joined == self {
            Some(Ordering::Greater)
        } else {
            None // Concurrent/incomparable
        }
    }

    /// Check if self ≤ other in the lattice order
    fn leq(&self, other: &Self) -> bool {
        matches!(
            self.partial_cmp_lattice(other),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )
    }
}
