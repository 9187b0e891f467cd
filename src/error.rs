//! Error types
//!
//! Every failure on the serving path is an [`Error`]. Callers branch on
//! [`Error::kind`] to pick a status code, never on the message text.

use hyper::StatusCode;
use std::io;
use std::time::Duration;

/// Coarse classification used at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The object key does not exist in the bucket
    NotFound,
    /// The request itself is invalid (malformed Range header)
    ClientError,
    /// Storage I/O failed or stalled
    Backend,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("invalid range: {0}")]
    InvalidRange(&'static str),

    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{op} timed out after {}ms", after.as_millis())]
    Timeout { op: &'static str, after: Duration },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn backend(context: impl Into<String>, source: io::Error) -> Self {
        Self::Backend {
            context: context.into(),
            source,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidRange(_) => ErrorKind::ClientError,
            Self::Backend { .. } | Self::Timeout { .. } => ErrorKind::Backend,
        }
    }

    /// Status code sent to the client for this error
    pub const fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ClientError => StatusCode::RANGE_NOT_SATISFIABLE,
            ErrorKind::Backend => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Backend { source, .. } => source,
            Error::Timeout { .. } => Self::new(io::ErrorKind::TimedOut, err),
            other => Self::other(other),
        }
    }
}
