//! Error taxonomy shared across the core.
//!
//! Workers and the engine branch on these variants (e.g. pause is never an
//! error, transport failures mark a task FAILED), so they are typed rather
//! than plain anyhow strings. Callers that don't branch use `anyhow::Result`
//! and downcast where needed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QdmError {
    /// Task id or queue order absent from the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Status transition requested from a disallowed state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Connection or HTTP failure during probe or stream.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Persistent-store I/O error. Fatal for the affected operation only.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// HLS playlist could not be parsed or is unusable.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Malformed caller input (bad URL, bad queue position, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result alias for store and core operations with a typed failure.
pub type QdmResult<T> = Result<T, QdmError>;
