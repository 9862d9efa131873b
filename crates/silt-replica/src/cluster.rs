//! In-process cluster harness
//!
//! Spawns a set of replicas and wires every pair as neighbours. Used by the
//! integration tests and handy for demos; production deployments wire
//! endpoints through whatever transport glue they have.

use crate::config::ReplicaConfig;
use crate::error::Result;
use crate::replica::{spawn, ReplicaHandle};
use silt_core::Lattice;
use std::time::Duration;

/// A fully-meshed set of replicas.
pub struct Cluster<L: Lattice> {
    handles: Vec<ReplicaHandle<L>>,
}

impl<L> Cluster<L>
where
    L: Lattice + Send + 'static,
    L::Mutator: Send,
    L::Value: Send,
{
    /// Spawn `n` replicas from the same configuration template and connect
    /// every pair. Replica names get a `-<index>` suffix.
    pub fn spawn(n: usize, template: ReplicaConfig) -> Result<Self> {
        let handles = (0..n)
            .map(|i| {
                let mut config = template.clone();
                config.name = format!("{}-{}", template.name, i);
                spawn(config)
            })
            .collect::<Result<Vec<_>>>()?;

        for (i, handle) in handles.iter().enumerate() {
            let peers = handles
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| other.endpoint())
                .collect();
            handle.add_neighbours(peers);
        }

        Ok(Self { handles })
    }

    pub fn replica(&self, idx: usize) -> &ReplicaHandle<L> {
        &self.handles[idx]
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Read every replica's projected value.
    pub async fn read_all(&self, timeout: Duration) -> Result<Vec<L::Value>> {
        let mut values = Vec::with_capacity(self.handles.len());
        for handle in &self.handles {
            values.push(handle.read(timeout).await?);
        }
        Ok(values)
    }

    /// Have all replicas converged to the same read value?
    pub async fn converged(&self, timeout: Duration) -> Result<bool>
    where
        L::Value: PartialEq,
    {
        let values = self.read_all(timeout).await?;
        Ok(values.windows(2).all(|pair| pair[0] == pair[1]))
    }

    /// Stop every replica, final-shipping along the way.
    pub async fn stop(self) -> Result<()> {
        for handle in &self.handles {
            handle.stop().await?;
        }
        Ok(())
    }
}
