//! Error types for codelet-core

use thiserror::Error;

/// Result type alias using codelet-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in codelet-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing remote credentials
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network, DNS, or timeout failure reaching the remote
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// Remote snapshot changed between this cycle's read and write
    #[error("Remote snapshot changed during sync; please retry")]
    RemoteConflict,

    /// Remote body failed to parse into the snapshot document shape
    #[error("Malformed remote snapshot: {0}")]
    MalformedSnapshot(String),

    /// Local invariant violation; detected defensively, aborts the operation
    #[error("Local state error: {0}")]
    LocalState(String),

    /// Another sync cycle is already in flight
    #[error("A sync is already in progress")]
    SyncInFlight,

    /// Snippet not found
    #[error("Snippet not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether a failed sync cycle is worth retrying later without
    /// reconfiguration (network-class failures), as opposed to terminal
    /// failures such as bad credentials or a malformed payload.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::RemoteConflict)
    }
}
