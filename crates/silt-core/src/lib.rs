//! Silt Core - lattice capability and causal machinery
//!
//! This crate provides the building blocks consumed by the Silt replication
//! engine:
//! - The [`Lattice`] trait: join-semilattice states whose mutators yield
//!   small deltas of the same shape as the state
//! - Causal contexts: per-node dot sets with a contiguous-prefix view
//! - Reference lattices: an add-wins set and a PN-counter
//!
//! # Delta-state CRDTs
//!
//! A delta-mutator is a function `mδ` such that `m(X) = X ⊔ mδ(X)`: instead
//! of replaying full states, replicas exchange the (usually tiny) deltas and
//! rely on the join being commutative, associative, and idempotent to
//! converge regardless of delivery order.
//!
//! Every delta here carries a causal context: the set of (node, counter)
//! dots it accounts for. The replication layer uses the per-node contiguous
//! prefix of a state's context to decide whether an incoming delta interval
//! is causally safe to apply.

pub mod awset;
pub mod causal;
pub mod lattice;
pub mod pncounter;

// Re-export main types for convenience
pub use awset::{AwSet, AwSetOp};
pub use causal::{CausalContext, Dot, NodeId};
pub use lattice::Lattice;
pub use pncounter::{PnCounter, PnCounterOp};
