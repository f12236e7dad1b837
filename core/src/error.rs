//! Error types.
//!
//! [`EngineError`] is what a storage engine reports through its callbacks.
//! [`AccessError`] is the only error exposed by the public operations; every
//! operation resolves to either its value or an `AccessError` on the same
//! future, so diagnostics always travel with the failure.

use thiserror::Error;

/// Failures reported by a storage engine.
///
/// The variants mirror the exception names an IndexedDB-style engine raises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A key or unique index constraint was violated.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A named store or index does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is not valid in the current state (closed session, schema
    /// change outside an upgrade, ...).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A mutation was issued in a read-only transaction.
    #[error("read-only transaction: {0}")]
    ReadOnly(String),

    /// The requested version is lower than the stored version, or invalid.
    #[error("version error: {0}")]
    Version(String),

    /// The database is in use by other open sessions.
    #[error("blocked: {0}")]
    Blocked(String),

    /// A key or record could not be used as provided.
    #[error("data error: {0}")]
    Data(String),

    /// The request or its transaction was aborted.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The engine is not present in this runtime.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Short name of the variant, as an engine would name the exception.
    pub fn name(&self) -> &'static str {
        match self {
            EngineError::Constraint(_) => "ConstraintError",
            EngineError::NotFound(_) => "NotFoundError",
            EngineError::InvalidState(_) => "InvalidStateError",
            EngineError::ReadOnly(_) => "ReadOnlyError",
            EngineError::Version(_) => "VersionError",
            EngineError::Blocked(_) => "BlockedError",
            EngineError::Data(_) => "DataError",
            EngineError::Aborted(_) => "AbortError",
            EngineError::Unavailable(_) => "UnavailableError",
            EngineError::Other(_) => "UnknownError",
        }
    }
}

/// Coarse classification of an [`AccessError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ConstraintViolation,
    NotSupported,
    AlreadyExists,
    Engine,
}

/// Error returned by every public operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    /// A lookup by key or index found nothing, or a named table or index is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// An insert collided with an existing key or a unique index.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// No engine is available, or no session is open.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A table being created outside of a migration already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Any other engine failure; use `.diagnostic()` for details.
    #[error("engine error: {0}")]
    Engine(EngineError),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::ConstraintViolation(_) => ErrorKind::ConstraintViolation,
            AccessError::NotSupported(_) => ErrorKind::NotSupported,
            AccessError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AccessError::Engine(_) => ErrorKind::Engine,
        }
    }

    /// Get the diagnostic message carried by the failure
    pub fn diagnostic(&self) -> String {
        match self {
            AccessError::Engine(err) => format!("{}: {}", err.name(), err),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool { self.kind() == ErrorKind::NotFound }

    pub(crate) fn session_closed() -> Self { AccessError::NotSupported("no open database session".into()) }
}

impl From<EngineError> for AccessError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Constraint(msg) => AccessError::ConstraintViolation(msg),
            EngineError::NotFound(msg) => AccessError::NotFound(msg),
            EngineError::Unavailable(msg) => AccessError::NotSupported(msg),
            other => AccessError::Engine(other),
        }
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self { AccessError::Engine(EngineError::Data(err.to_string())) }
}
