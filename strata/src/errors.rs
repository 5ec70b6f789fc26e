use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{shared, Shared};

/// Error kinds for Strata store operations.
///
/// Each kind names one category of failure so callers can match on it
/// instead of parsing messages.
///
/// # Examples
///
/// ```rust
/// use strata::errors::{ErrorKind, StrataError, StrataResult};
///
/// fn example() -> StrataResult<()> {
///     Err(StrataError::new("record #7 not found", ErrorKind::RecordNotFound))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::RecordNotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Record and edge errors
    /// The record does not exist (never created, or deleted)
    RecordNotFound,
    /// The edge does not exist (never created, or deleted)
    EdgeNotFound,
    /// The record still has edges attached and cannot be deleted
    RecordInUse,

    // Transaction errors
    /// A write was attempted outside of a transaction
    NotInTransaction,
    /// The transaction could not be committed or rolled back
    TransactionError,

    // Operation errors
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Generic validation error
    ValidationError,
    /// A property value had an unexpected type
    InvalidDataType,

    // IO and encoding errors
    /// Generic IO error
    IOError,
    /// Error encoding or decoding data
    EncodingError,

    // Lifecycle errors
    /// Store has already been closed
    StoreAlreadyClosed,

    // Extension errors - lets dependent crates surface their own categories.
    // The String names the extension (e.g. "spatial").
    /// Error from an extension crate
    Extension(String),

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::RecordNotFound => write!(f, "Record not found"),
            ErrorKind::EdgeNotFound => write!(f, "Edge not found"),
            ErrorKind::RecordInUse => write!(f, "Record in use"),
            ErrorKind::NotInTransaction => write!(f, "Not in transaction"),
            ErrorKind::TransactionError => write!(f, "Transaction error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::Extension(name) => write!(f, "{} error", name),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type of the Strata store.
///
/// `StrataError` carries a message, an [`ErrorKind`], an optional cause and
/// the backtrace captured at construction.
///
/// # Examples
///
/// ```rust
/// use strata::errors::{ErrorKind, StrataError};
///
/// let cause = StrataError::new("edge #3 not found", ErrorKind::EdgeNotFound);
/// let err = StrataError::new_with_cause("rollback failed", ErrorKind::TransactionError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct StrataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StrataError>>,
    backtrace: Shared<Backtrace>,
}

impl StrataError {
    /// Creates a new `StrataError` with the given message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: shared(Backtrace::new()),
        }
    }

    /// Creates a new `StrataError` chained to the error that caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StrataError) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: shared(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&StrataError> {
        self.cause.as_deref()
    }
}

impl Display for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // message and backtrace, or message followed by the cause chain
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Result type alias used by every fallible store operation.
pub type StrataResult<T> = Result<T, StrataError>;

impl From<std::io::Error> for StrataError {
    fn from(err: std::io::Error) -> Self {
        StrataError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::fmt::Error> for StrataError {
    fn from(err: std::fmt::Error) -> Self {
        StrataError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for StrataError {
    fn from(msg: String) -> Self {
        StrataError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for StrataError {
    fn from(msg: &str) -> Self {
        StrataError::new(msg, ErrorKind::InternalError)
    }
}
