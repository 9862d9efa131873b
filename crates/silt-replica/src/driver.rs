//! Periodic driver
//!
//! Owns the two timers that pace a replica: `try_ship` and
//! `garbage_collect`. Each tick is posted to the replica's inbox and awaited
//! to completion, so at most one tick is ever outstanding and ticks never
//! preempt in-flight handling. The driver exits when the replica does.

use crate::message::{Endpoint, Incoming};
use silt_core::Lattice;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

pub(crate) async fn run<L: Lattice>(
    replica: Endpoint<L>,
    ship_interval: Duration,
    gc_interval: Duration,
) {
    let mut ship = tokio::time::interval(ship_interval);
    let mut gc = tokio::time::interval(gc_interval);
    ship.set_missed_tick_behavior(MissedTickBehavior::Delay);
    gc.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ship.tick() => {
                if !deliver(&replica, |done| Incoming::TryShip { done: Some(done) }).await {
                    return;
                }
            }
            _ = gc.tick() => {
                if !deliver(&replica, |done| Incoming::GarbageCollect { done: Some(done) }).await {
                    return;
                }
            }
        }
    }
}

/// Post one tick and wait for the replica to finish handling it.
/// Returns false once the replica is gone.
async fn deliver<L: Lattice>(
    replica: &Endpoint<L>,
    tick: impl FnOnce(oneshot::Sender<()>) -> Incoming<L>,
) -> bool {
    let (done, handled) = oneshot::channel();
    replica.send(tick(done));
    handled.await.is_ok()
}
