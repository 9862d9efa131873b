//! Replica configuration.

use crate::error::{ReplicaError, Result};
use std::time::Duration;
use tokio::sync::mpsc;

/// A target to signal after each successful outbound ship.
///
/// The message is delivered verbatim; a closed target is ignored.
#[derive(Clone, Debug)]
pub struct Notify {
    pub target: mpsc::UnboundedSender<String>,
    pub message: String,
}

impl Notify {
    pub fn new(target: mpsc::UnboundedSender<String>, message: impl Into<String>) -> Self {
        Self {
            target,
            message: message.into(),
        }
    }
}

/// Configuration for a replica.
#[derive(Clone, Debug)]
pub struct ReplicaConfig {
    /// Human-readable replica name, used in logs. Required.
    pub name: String,
    /// How often to consider shipping pending deltas (in milliseconds).
    pub ship_interval_ms: u64,
    /// How long to let a mutation burst settle before shipping (in milliseconds).
    pub ship_debounce_ms: u64,
    /// How often to prune fully-acknowledged deltas (in milliseconds).
    pub gc_interval_ms: u64,
    /// Unshipped-backlog size that forces a ship before the burst settles.
    pub force_ship_backlog: u64,
    /// Optional target signaled after each outbound ship.
    pub notify: Option<Notify>,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            ship_interval_ms: 50,
            ship_debounce_ms: 25,
            gc_interval_ms: 10_000,
            force_ship_backlog: 1_000,
            notify: None,
        }
    }
}

impl ReplicaConfig {
    /// A default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ReplicaError::ConfigMissing("name"));
        }
        Ok(())
    }

    pub(crate) fn ship_interval(&self) -> Duration {
        Duration::from_millis(self.ship_interval_ms)
    }

    pub(crate) fn ship_debounce(&self) -> Duration {
        Duration::from_millis(self.ship_debounce_ms)
    }

    pub(crate) fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}

/// Builder for replica configuration.
pub struct ReplicaConfigBuilder {
    config: ReplicaConfig,
}

impl ReplicaConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ReplicaConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn ship_interval(mut self, ms: u64) -> Self {
        self.config.ship_interval_ms = ms;
        self
    }

    pub fn ship_debounce(mut self, ms: u64) -> Self {
        self.config.ship_debounce_ms = ms;
        self
    }

    pub fn gc_interval(mut self, ms: u64) -> Self {
        self.config.gc_interval_ms = ms;
        self
    }

    pub fn force_ship_backlog(mut self, deltas: u64) -> Self {
        self.config.force_ship_backlog = deltas;
        self
    }

    pub fn notify(mut self, notify: Notify) -> Self {
        self.config.notify = Some(notify);
        self
    }

    pub fn build(self) -> ReplicaConfig {
        self.config
    }
}

impl Default for ReplicaConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ReplicaConfigBuilder::new()
            .name("r1")
            .ship_interval(10)
            .ship_debounce(5)
            .gc_interval(500)
            .force_ship_backlog(64)
            .build();

        assert_eq!(config.name, "r1");
        assert_eq!(config.ship_interval_ms, 10);
        assert_eq!(config.ship_debounce_ms, 5);
        assert_eq!(config.gc_interval_ms, 500);
        assert_eq!(config.force_ship_backlog, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_name_is_fatal() {
        let config = ReplicaConfig::default();
        assert_eq!(
            config.validate(),
            Err(ReplicaError::ConfigMissing("name"))
        );
    }
}
