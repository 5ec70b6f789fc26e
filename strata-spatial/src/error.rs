//! Error types of the spatial index.

use strata::errors::{ErrorKind, StrataError};
use strata::store::RecordId;
use thiserror::Error;

/// Errors that can occur in spatial indexing operations
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Fanout bounds are invalid, or persisted tree metadata is unreadable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The record has no reference in any tree.
    #[error("Record {0} is not indexed")]
    NotIndexed(RecordId),

    /// The record is referenced by a leaf that belongs to another tree.
    #[error("Record {0} is indexed in a different tree")]
    IndexedElsewhere(RecordId),

    /// The record is already referenced by this tree.
    #[error("Record {0} is already indexed")]
    AlreadyIndexed(RecordId),

    /// The tree structure is corrupt. The enclosing transaction is rolled back.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The payload envelope could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Backing store failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StrataError),
}

impl From<SpatialError> for StrataError {
    fn from(err: SpatialError) -> Self {
        match err {
            SpatialError::Store(inner) => inner,
            SpatialError::Configuration(msg) => {
                StrataError::new(&msg, ErrorKind::ValidationError)
            }
            SpatialError::Decode(msg) => StrataError::new(&msg, ErrorKind::EncodingError),
            other => StrataError::new(
                &other.to_string(),
                ErrorKind::Extension("spatial".to_string()),
            ),
        }
    }
}

/// Result type for spatial operations
pub type SpatialResult<T> = Result<T, SpatialError>;
