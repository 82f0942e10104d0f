use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Network error during {operation} ({stage}): {details}")]
    NetworkError {
        operation: &'static str,
        stage: NetworkStage,
        details: String,
    },

    #[error(transparent)]
    ParseError(#[from] crate::types::VersionParseError),

    #[error("Checksum mismatch for {artifact}: expected {expected}, got {actual}")]
    IntegrityError {
        artifact: String,
        expected: String,
        actual: String,
    },

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("Cannot {action} {target}: {reason}")]
    PreconditionFailed {
        action: &'static str,
        target: String,
        reason: String,
    },

    #[error("IO error ({kind}): {message}")]
    IoError {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Another install is already in progress ({version})")]
    Busy { version: String },

    #[error("Install of {version} was cancelled")]
    Cancelled { version: String },
}

/// Where in a remote exchange a network failure happened. A failure at the
/// `ResponseParse` stage is a malformed upstream response rather than a
/// connectivity problem.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Parse,
    Integrity,
    NotFound,
    Precondition,
    Io,
    Busy,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "NetworkError",
            Self::Parse => "ParseError",
            Self::Integrity => "IntegrityError",
            Self::NotFound => "NotFoundError",
            Self::Precondition => "PreconditionError",
            Self::Io => "IOError",
            Self::Busy => "Busy",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

impl BackendError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkError {
                stage: NetworkStage::Request,
                ..
            } => ErrorKind::Network,
            Self::NetworkError {
                stage: NetworkStage::ResponseParse,
                ..
            }
            | Self::ParseError(_) => ErrorKind::Parse,
            Self::IntegrityError { .. } => ErrorKind::Integrity,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PreconditionFailed { .. } => ErrorKind::Precondition,
            Self::IoError { .. } => ErrorKind::Io,
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub fn network_request(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn network_request_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_request(operation, error.to_string())
    }

    pub fn network_parse(operation: &'static str, details: impl Into<String>) -> Self {
        Self::NetworkError {
            operation,
            stage: NetworkStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn network_parse_from<E>(operation: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::network_parse(operation, error.to_string())
    }

    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    pub fn precondition(
        action: &'static str,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PreconditionFailed {
            action,
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn io_with_context(context: &str, error: &std::io::Error) -> Self {
        Self::IoError {
            kind: error.kind(),
            message: format!("{context}: {error}"),
        }
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
