//! Unified error taxonomy for the embedded vector database.
//!
//! Every subsystem (catalog, index engine, retrieval, snapshot, tokens) returns
//! [`Error`]; the facade is the single place that maps it onto wire error codes.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds, matching the taxonomy in the error-handling design: not a type per
/// failure mode, but a small closed set callers can match on.
#[derive(Debug, Error)]
pub enum Error {
    /// Entity id/name absent.
    #[error("not found: {0}")]
    NotFound(String),

    /// An invariant would be violated (duplicate default, vectors block reconfigure).
    #[error("conflict: {0}")]
    Conflict(String),

    /// JSON parse failure, missing field, shape mismatch.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Token missing/expired/insufficient permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Underlying catalog or filesystem error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Unexpected invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Numeric wire code for the facade's `{"error":{"code":..}}` envelope.
    pub fn wire_code(&self) -> i32 {
        match self {
            Error::BadRequest(_) => 1001,
            Error::Storage(_) => 1002,
            Error::Internal(_) => 1099,
            // NotFound / Conflict / Unauthorized don't have dedicated wire codes in the
            // spec's facade table; they surface through the same envelope with 1099
            // unless a narrower HTTP-style mapping is added at a higher layer.
            Error::NotFound(_) | Error::Conflict(_) | Error::Unauthorized(_) => 1099,
        }
    }

    /// `true` for errors a read-side permission check should fold into plain `Denied`.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BadRequest(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}
