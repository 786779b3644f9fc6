//! Error types for engine commands and the synchronization layer.

use thiserror::Error;

/// Failure reported by the playback engine for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine is unreachable")]
    Unreachable,
    #[error("engine rejected the request: {0}")]
    Rejected(String),
    #[error("engine did not answer within {0} ms")]
    Timeout(u64),
    #[error("index {index} is out of bounds for a queue of {len} items")]
    InvalidIndex { index: usize, len: usize },
}

/// Failures of the UI-to-engine synchronization layer.
///
/// None of these are fatal: every variant degrades to a UI that is temporarily
/// out of sync with the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No engine handle was available when subscribing.
    #[error("playback engine is unavailable")]
    EngineUnavailable,
    /// An engine command failed; local state was not updated.
    #[error("{command} failed: {source}")]
    CommandRejected {
        command: &'static str,
        #[source]
        source: EngineError,
    },
    /// A notification or command result arrived after its owner deactivated.
    #[error("update arrived after the owning component deactivated")]
    StaleUpdate,
    /// Drop target equal to the origin or out of bounds.
    #[error("drop target {target} is not valid for origin {origin}")]
    InvalidDrop { origin: usize, target: usize },
    /// The engine host was initialized twice.
    #[error("playback engine host is already initialized")]
    AlreadyInitialized,
}

impl SyncError {
    pub(crate) fn rejected(command: &'static str, source: EngineError) -> Self {
        SyncError::CommandRejected { command, source }
    }
}
