//! Error handling for LumiDB.
//!
//! Every fallible operation returns a [`Result`] carrying an [`Error`] with a
//! status and a human-readable message. Errors propagate by annotation: when
//! an error crosses a layer boundary the outer layer prepends context with
//! [`Error::context`], producing messages like
//! `failed to resolve: function not found: foo`.

use std::fmt;

use thiserror::Error as ThisError;

/// Result type alias for LumiDB operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category.
///
/// These are stable across versions and usable for programmatic handling;
/// the message carries the detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// A regular operational failure.
    Error,
    /// The operation exists but is not implemented in this position.
    NotImplemented,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Error => write!(f, "ERROR"),
            Status::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
        }
    }
}

/// The main error type for LumiDB.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct Error {
    /// Error category.
    pub status: Status,
    /// Human-readable message, annotated with context at each layer.
    pub message: String,
}

impl Error {
    /// Creates a regular error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
        }
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self {
            status: Status::NotImplemented,
            message: message.into(),
        }
    }

    /// Returns a new error with `prefix` prepended to the message.
    ///
    /// The status is preserved.
    #[must_use]
    pub fn context(self, prefix: impl fmt::Display) -> Self {
        Self {
            status: self.status,
            message: format!("{}: {}", prefix, self.message),
        }
    }

    /// Returns the error status.
    pub fn status(&self) -> Status {
        self.status
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(err.to_string())
    }
}
