//! Error types for Skyweave mesh operations.

use skyweave_core::CoreError;
use thiserror::Error;

/// Errors that can occur in relay and broadcast operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Relay envelope is malformed
    #[error("Invalid relay: {0}")]
    InvalidRelay(String),

    /// Message could not be encoded for identification
    #[error("Message encoding error: {0}")]
    Encoding(#[from] CoreError),
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
