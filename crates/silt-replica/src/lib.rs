//! Silt Replica - delta-interval anti-entropy
//!
//! Each replica accepts local mutations against a join-semilattice state,
//! numbers the resulting deltas into a log, and periodically ships *delta
//! intervals* (joins of contiguous log ranges) to its neighbours. Neighbours
//! acknowledge what they receive; deltas every neighbour has acknowledged
//! are garbage-collected. When a neighbour has fallen behind the log, it is
//! caught up with a full state instead.
//!
//! # Protocol sketch
//!
//! ```text
//! On local mutation m:
//!   d = mδ(X); X = compress(X ⊔ d); log[seq] = (self, d); seq += 1
//!
//! Every ship_interval, if anything is unshipped:
//!   schedule {ship, seq} to self after ship_debounce   // coalesce bursts
//!
//! On {ship, s}: ship to all neighbours iff quiesced at s or the backlog
//! forced it; otherwise drop the stale snapshot.
//!
//! Shipping to n: join of log[acked(n)..seq] minus n's own deltas,
//! or the full state when the log has been pruned past acked(n).
//!
//! On inbound (origin, payload, n): drop if causally premature, else
//! join + log + ack n back to origin.
//!
//! Every gc_interval: drop log entries below every neighbour's ack.
//! ```
//!
//! Convergence needs no coordinator: joins are commutative, associative,
//! and idempotent, and the admissibility filter preserves each node's
//! causal prefix so compression stays sound.
//!
//! # Example
//!
//! ```rust,ignore
//! use silt_core::{AwSet, AwSetOp};
//! use silt_replica::{spawn, ReplicaConfig};
//!
//! let r1 = spawn::<AwSet<String>>(ReplicaConfig::named("r1"))?;
//! let r2 = spawn::<AwSet<String>>(ReplicaConfig::named("r2"))?;
//! r1.add_neighbour(r2.endpoint());
//! r2.add_neighbour(r1.endpoint());
//!
//! r1.operation(AwSetOp::Add("x".into())).await?;
//! // ...after a ship interval, r2.read(..) sees "x"
//! ```

pub mod buffer;
pub mod cluster;
pub mod config;
mod driver;
pub mod error;
pub mod message;
pub mod replica;

// Re-export main types for convenience
pub use buffer::{AckTracker, DeltaLog};
pub use cluster::Cluster;
pub use config::{Notify, ReplicaConfig, ReplicaConfigBuilder};
pub use error::{ReplicaError, Result};
pub use message::{Endpoint, Incoming, SeqNo};
pub use replica::{spawn, ReplicaHandle, ReplicaStats};
