// Controller-wide error taxonomy.

use thiserror::Error;

/// Result alias used throughout the reconcile pipeline.
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors the controller loop can encounter while reconciling a single
/// `(namespace, stacksetName)` key.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("cluster API error: {0}")]
    Api(String),

    #[error("cluster API conflict on {kind} {name}")]
    Conflict { kind: &'static str, name: String },

    #[error("invariant violation: {0}")]
    Invariant(#[from] WeightError),

    #[error("stackset {0} is missing required template fields")]
    InvalidStackSet(String),
}

impl ControllerError {
    /// Transient API errors (conflict, timeout, 5xx) are re-enqueued with
    /// backoff rather than treated as fatal; everything else still doesn't
    /// crash the process but isn't worth retrying on the same backoff curve.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::Api(_) | ControllerError::Conflict { .. })
    }
}

/// Errors from the pure weight algebra (shared by the background reconciler
/// and the `traffic` switch CLI).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeightError {
    #[error("cannot reduce the sole backend below 100: {name} is the only entry with non-zero weight")]
    SoleBackend { name: String },

    #[error("unknown stack {0}")]
    UnknownStack(String),
}

/// A non-fatal problem observed while parsing durable annotation state.
/// Per spec the field is treated as absent and a warning event is emitted on
/// the owning object; since this crate has no live API server to attach a
/// Kubernetes Event to, the event is recorded here and surfaced to the
/// caller of a reconcile pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileWarning {
    pub object: String,
    pub message: String,
}

impl ReconcileWarning {
    pub fn new(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self { object: object.into(), message: message.into() }
    }
}
