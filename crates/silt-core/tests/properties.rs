//! Property-based tests that MUST pass for all lattice implementations
//!
//! States are generated by replaying random mutation histories across a
//! handful of nodes, so every tested state is reachable and carries a
//! well-formed causal context.

use proptest::prelude::*;
use silt_core::{AwSet, AwSetOp, Lattice, NodeId, PnCounter, PnCounterOp};

macro_rules! lattice_property_tests {
    ($module:ident, $crdt_type:ty, $strategy:expr) => {
        mod $module {
            use super::*;

            proptest! {
                #[test]
                fn join_is_commutative(a in $strategy, b in $strategy) {
                    prop_assert_eq!(a.join(&b), b.join(&a));
                }

                #[test]
                fn join_is_associative(
                    a in $strategy,
                    b in $strategy,
                    c in $strategy
                ) {
                    let left = a.join(&b).join(&c);
                    let right = a.join(&b.join(&c));
                    prop_assert_eq!(left, right);
                }

                #[test]
                fn join_is_idempotent(a in $strategy) {
                    prop_assert_eq!(a.join(&a), a);
                }

                #[test]
                fn bottom_is_identity(a in $strategy) {
                    let bottom = <$crdt_type>::bottom();
                    prop_assert_eq!(a.join(&bottom), a.clone());
                    prop_assert_eq!(bottom.join(&a), a);
                }

                #[test]
                fn join_is_upper_bound(a in $strategy, b in $strategy) {
                    let joined = a.join(&b);
                    prop_assert!(a.leq(&joined));
                    prop_assert!(b.leq(&joined));
                }

                #[test]
                fn compress_preserves_join(a in $strategy, b in $strategy) {
                    let plain = a.join(&b).compress();
                    let compressed = a.clone().compress().join(&b).compress();
                    prop_assert_eq!(plain, compressed);
                }
            }
        }
    };
}

fn replay<L, F, O>(ops: Vec<(u8, O)>, to_mutator: F) -> L
where
    L: Lattice,
    F: Fn(O) -> L::Mutator,
{
    let mut state = L::bottom();
    for (node, op) in ops {
        let delta = state.mutate(to_mutator(op), NodeId::from(node) + 1);
        state = state.join(&delta).compress();
    }
    state
}

fn awset_strategy() -> impl Strategy<Value = AwSet<i32>> {
    prop::collection::vec((0u8..4, 0i32..16, any::<bool>()), 0..24).prop_map(|ops| {
        replay(
            ops.into_iter().map(|(n, v, add)| (n, (v, add))).collect(),
            |(v, add)| {
                if add {
                    AwSetOp::Add(v)
                } else {
                    AwSetOp::Remove(v)
                }
            },
        )
    })
}

fn pncounter_strategy() -> impl Strategy<Value = PnCounter> {
    prop::collection::vec((0u8..4, 1u64..50, any::<bool>()), 0..24).prop_map(|ops| {
        replay(
            ops.into_iter().map(|(n, amt, inc)| (n, (amt, inc))).collect(),
            |(amt, inc)| {
                if inc {
                    PnCounterOp::Increment(amt)
                } else {
                    PnCounterOp::Decrement(amt)
                }
            },
        )
    })
}

lattice_property_tests!(awset_laws, AwSet<i32>, awset_strategy());
lattice_property_tests!(pncounter_laws, PnCounter, pncounter_strategy());

proptest! {
    /// Applying a history's deltas in any interleaving converges to the same
    /// read value.
    #[test]
    fn awset_delta_delivery_order_is_irrelevant(
        ops in prop::collection::vec((0u8..3, 0i32..8, any::<bool>()), 1..16),
        seed in any::<u64>(),
    ) {
        let mut state = AwSet::bottom();
        let mut deltas = Vec::new();
        for (node, v, add) in ops {
            let op = if add { AwSetOp::Add(v) } else { AwSetOp::Remove(v) };
            let delta = state.mutate(op, NodeId::from(node) + 1);
            state = state.join(&delta).compress();
            deltas.push(delta);
        }

        // Deterministic shuffle of the delta sequence
        let mut shuffled = deltas.clone();
        let mut rng = seed;
        for i in (1..shuffled.len()).rev() {
            rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (rng >> 33) as usize % (i + 1));
        }

        let mut replayed = AwSet::bottom();
        for delta in &shuffled {
            replayed.join_assign(delta);
        }
        prop_assert_eq!(replayed.compress().read(), state.read());
    }
}
