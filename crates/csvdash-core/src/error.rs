//! Error types for csvdash-core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvdashError {
    /// The backend answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered 2xx but the payload did not have the expected shape.
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Not authenticated - run `csvdash login` first")]
    NotAuthenticated,

    #[error("{filename} is not a CSV file")]
    InvalidFile { filename: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used by views to decide how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, invalid or expired token (401/403).
    Authentication,
    /// Rejected input: bad file type, malformed parameters (other 4xx).
    Validation,
    /// 5xx or a payload the client could not understand.
    Server,
    /// The request never reached the server.
    Network,
    /// Local failures (session file, I/O).
    Local,
}

impl CsvdashError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => ErrorKind::Authentication,
                400..=499 => ErrorKind::Validation,
                _ => ErrorKind::Server,
            },
            Self::NotAuthenticated => ErrorKind::Authentication,
            Self::InvalidFile { .. } => ErrorKind::Validation,
            Self::Decode { .. } => ErrorKind::Server,
            Self::Http(e) if e.is_decode() => ErrorKind::Server,
            Self::Http(_) => ErrorKind::Network,
            Self::Io(_) | Self::Yaml(_) | Self::Other(_) => ErrorKind::Local,
        }
    }

    /// HTTP status carried by the error, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable message without the status prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }
}

pub type Result<T> = std::result::Result<T, CsvdashError>;
