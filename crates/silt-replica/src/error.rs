//! Error types for the replication engine.

use thiserror::Error;

/// Errors surfaced by replica handles.
///
/// Steady-state protocol trouble (inadmissible deltas, unreachable peers or
/// notify targets) is absorbed by the engine; only startup misconfiguration
/// and client-side failures reach callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    #[error("missing required configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("read timed out")]
    ReadTimeout,

    #[error("replica has stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, ReplicaError>;
