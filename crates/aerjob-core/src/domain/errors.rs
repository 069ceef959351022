//! Errors and their operational classification.

use thiserror::Error;

use super::key::ResourceKey;
use super::phase::JobPhase;

/// How the controller reacts to an error.
///
/// - Transient: retry with backoff, no status mutation.
/// - Permanent: log and stop retrying; retrying cannot change the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Errors from the persistence/notification substrate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("stale write for {key}: expected resourceVersion {expected}, found {actual}")]
    Conflict {
        key: ResourceKey,
        expected: u64,
        actual: u64,
    },

    #[error("resource {0} not found")]
    NotFound(ResourceKey),

    #[error("resource {0} already exists")]
    AlreadyExists(ResourceKey),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the execution-resource client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    /// The cluster refused the object; resubmitting it will not help.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the remote execution backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend refused the payload.
    #[error("backend rejected payload: {0}")]
    Rejected(String),

    #[error("backend has no job '{0}'")]
    UnknownJob(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("reconciliation deadline exceeded")]
    Cancelled,

    #[error("refused phase transition {from} -> {to}")]
    InvalidTransition { from: JobPhase, to: JobPhase },
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::InvalidTransition { .. } => ErrorKind::Permanent,
            // Definitive rejections are turned into a Failed phase by the
            // handlers; one that escapes is still not worth retrying.
            ReconcileError::Cluster(ClusterError::Rejected(_))
            | ReconcileError::Backend(BackendError::Rejected(_)) => ErrorKind::Permanent,
            _ => ErrorKind::Transient,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
