//! Error handling for feature retrieval
//!
//! Errors are `Clone` because a failed retrieval is observed by every caller
//! awaiting the same in-flight request.

use spotlens_core::FormatError;
use thiserror::Error;

/// How callers are expected to react to an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Contract violation between components; never downgraded to a warning
    Programming,
    /// Data is missing or unreadable; logged and treated as "no result"
    Absent,
    /// Network, file or decompression failure of a single request
    Transport,
    /// Condition the user has to resolve
    UserFacing,
}

/// Errors raised by sources, samples and the fetch layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("source `{0}` has no feature names; select by index")]
    NamesUnavailable(String),

    #[error("invalid header for `{source_name}`: {reason}")]
    InvalidHeader { source_name: String, reason: String },

    #[error("malformed row in `{feature}`: {reason}")]
    MalformedRow { feature: String, reason: String },

    #[error("`{0}` used before hydration")]
    NotHydrated(String),

    #[error("annotation has not been started")]
    AnnotationNotStarted,

    #[error("cache key could not be built: {0}")]
    CacheKey(String),

    #[error("invalid parameters for `{name}`: {reason}")]
    InvalidParams { name: String, reason: String },

    #[error("`{name}` has no data: {reason}")]
    MissingData { name: String, reason: String },

    #[error("could not parse `{url}`: {reason}")]
    Parse { url: String, reason: String },

    #[error("request for `{url}` failed: {reason}")]
    Http { url: String, reason: String },

    #[error("I/O error for `{path}`: {reason}")]
    Io { path: String, reason: String },

    #[error("decompression failed: {0}")]
    Decompression(String),

    #[error("local directory unavailable: {0}")]
    LocalDirectoryUnavailable(String),

    #[error("sample `{0}` already exists")]
    SampleExists(String),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSelector(_)
            | Error::NamesUnavailable(_)
            | Error::InvalidHeader { .. }
            | Error::MalformedRow { .. }
            | Error::NotHydrated(_)
            | Error::AnnotationNotStarted
            | Error::CacheKey(_)
            | Error::InvalidParams { .. }
            | Error::Format(_) => ErrorKind::Programming,
            Error::Parse { .. } | Error::MissingData { .. } => ErrorKind::Absent,
            Error::Http { .. } | Error::Io { .. } | Error::Decompression(_) => {
                ErrorKind::Transport
            }
            Error::LocalDirectoryUnavailable(_) | Error::SampleExists(_) => {
                ErrorKind::UserFacing
            }
        }
    }

    /// Whether the UI should surface this error to the user
    pub fn is_user_facing(&self) -> bool {
        self.kind() == ErrorKind::UserFacing
    }

    pub(crate) fn http(url: &str, reason: impl ToString) -> Self {
        Error::Http {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse(url: &str, reason: impl ToString) -> Self {
        Error::Parse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn header(source_name: &str, reason: impl ToString) -> Self {
        Error::InvalidHeader {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn missing(name: &str, reason: impl ToString) -> Self {
        Error::MissingData {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(feature: &str, reason: impl ToString) -> Self {
        Error::MalformedRow {
            feature: feature.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for spotlens operations
pub type Result<T> = std::result::Result<T, Error>;
