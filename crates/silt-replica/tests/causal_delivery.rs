//! Admissibility and wire-level behavior
//!
//! These tests talk to a running replica the way a peer would: through its
//! endpoint, with hand-built delta intervals, observing the acks (and the
//! silences) that come back.

use silt_core::{AwSet, AwSetOp, Lattice, NodeId};
use silt_replica::{
    spawn, Endpoint, Incoming, ReplicaConfig, ReplicaConfigBuilder, ReplicaHandle,
};
use std::time::Duration;
use tokio::sync::mpsc;

type Set = AwSet<String>;

const READ: Duration = Duration::from_millis(1_000);
const PEER: NodeId = 777;

fn fast_config(name: &str) -> ReplicaConfig {
    ReplicaConfigBuilder::new()
        .name(name)
        .ship_interval(10)
        .ship_debounce(5)
        .gc_interval(100)
        .build()
}

/// An endpoint whose inbox we hold, posing as a remote replica.
fn fake_peer() -> (Endpoint<Set>, mpsc::UnboundedReceiver<Incoming<Set>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Endpoint::new(PEER, tx), rx)
}

/// Apply a mutation to a locally-simulated peer state, returning the delta.
fn peer_delta(state: &mut Set, value: &str) -> Set {
    let delta = state.mutate(AwSetOp::Add(value.to_string()), PEER);
    *state = state.join(&delta).compress();
    delta
}

/// Reads act as a barrier: the inbox is FIFO, so once the read returns,
/// everything sent before it has been handled.
async fn read(handle: &ReplicaHandle<Set>) -> std::collections::BTreeSet<String> {
    handle.read(READ).await.unwrap()
}

fn try_recv_ack(rx: &mut mpsc::UnboundedReceiver<Incoming<Set>>) -> Option<u64> {
    match rx.try_recv() {
        Ok(Incoming::Ack { seq, .. }) => Some(seq),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn premature_interval_dropped_then_state_ship_recovers() {
    let replica = spawn::<Set>(fast_config("admit")).unwrap();
    let (peer, mut peer_rx) = fake_peer();

    let mut remote = Set::bottom();
    let d1 = peer_delta(&mut remote, "a");
    let _d2 = peer_delta(&mut remote, "b");
    let d3 = peer_delta(&mut remote, "c");

    // First delta establishes a prefix for the peer's node and is acked
    replica.endpoint().send(Incoming::Delta {
        origin: peer.clone(),
        payload: d1,
        seq: 1,
    });
    assert!(read(&replica).await.contains("a"));
    assert_eq!(try_recv_ack(&mut peer_rx), Some(1));

    // d2 is withheld; d3 skips a dot and must be dropped without an ack
    replica.endpoint().send(Incoming::Delta {
        origin: peer.clone(),
        payload: d3,
        seq: 3,
    });
    let value = read(&replica).await;
    assert!(!value.contains("c"));
    assert_eq!(try_recv_ack(&mut peer_rx), None);

    // A full state carries the complete causal context and always lands
    replica.endpoint().send(Incoming::Delta {
        origin: peer,
        payload: remote.clone(),
        seq: 3,
    });
    let value = read(&replica).await;
    assert!(value.contains("a") && value.contains("b") && value.contains("c"));
    assert_eq!(try_recv_ack(&mut peer_rx), Some(3));
}

#[tokio::test(start_paused = true)]
async fn duplicate_delivery_is_idempotent() {
    let replica = spawn::<Set>(fast_config("replay")).unwrap();
    let (peer, mut peer_rx) = fake_peer();

    let mut remote = Set::bottom();
    let delta = peer_delta(&mut remote, "once");

    for _ in 0..2 {
        replica.endpoint().send(Incoming::Delta {
            origin: peer.clone(),
            payload: delta.clone(),
            seq: 1,
        });
    }

    let value = read(&replica).await;
    assert_eq!(value.len(), 1);
    assert!(value.contains("once"));

    // Both deliveries ack; the duplicate ack is harmless on the other side
    assert_eq!(try_recv_ack(&mut peer_rx), Some(1));
    assert_eq!(try_recv_ack(&mut peer_rx), Some(1));
}

#[tokio::test(start_paused = true)]
async fn shipment_never_echoes_the_neighbours_own_delta() {
    let replica = spawn::<Set>(fast_config("echo")).unwrap();
    let (peer, mut peer_rx) = fake_peer();
    replica.add_neighbour(peer.clone());

    // The peer contributes one delta...
    let mut remote = Set::bottom();
    let delta = peer_delta(&mut remote, "theirs");
    replica.endpoint().send(Incoming::Delta {
        origin: peer.clone(),
        payload: delta,
        seq: 1,
    });
    // ...and the replica mutates locally
    replica
        .operation(AwSetOp::Add("ours".to_string()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    // First the ack for the peer's delta, then the shipment
    assert_eq!(try_recv_ack(&mut peer_rx), Some(1));
    let payload = loop {
        match peer_rx.try_recv() {
            Ok(Incoming::Delta { payload, .. }) => break payload,
            Ok(_) => continue,
            Err(_) => panic!("expected a shipment to the neighbour"),
        }
    };
    assert!(payload.contains(&"ours".to_string()));
    assert!(
        !payload.contains(&"theirs".to_string()),
        "a neighbour's own delta must not be shipped back to it"
    );
}

#[tokio::test(start_paused = true)]
async fn notify_fires_after_each_ship() {
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let config = ReplicaConfigBuilder::new()
        .name("notify")
        .ship_interval(10)
        .ship_debounce(5)
        .notify(silt_replica::Notify::new(notify_tx, "shipped"))
        .build();

    let replica = spawn::<Set>(config).unwrap();
    replica
        .operation(AwSetOp::Add("x".to_string()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(notify_rx.recv().await.as_deref(), Some("shipped"));
}

#[tokio::test(start_paused = true)]
async fn read_with_projects_the_raw_state() {
    let replica = spawn::<Set>(fast_config("project")).unwrap();
    replica
        .operation(AwSetOp::Add("x".to_string()))
        .await
        .unwrap();
    replica
        .operation(AwSetOp::Add("y".to_string()))
        .await
        .unwrap();

    let len = replica.read_with(|state| state.len()).await.unwrap();
    assert_eq!(len, 2);

    let has_x = replica
        .read_with(|state| state.contains(&"x".to_string()))
        .await
        .unwrap();
    assert!(has_x);
}

#[tokio::test(start_paused = true)]
async fn spawn_requires_a_name() {
    let result = spawn::<Set>(ReplicaConfig::default());
    assert!(matches!(
        result,
        Err(silt_replica::ReplicaError::ConfigMissing("name"))
    ));
}
