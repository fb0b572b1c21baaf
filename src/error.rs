//! Error type shared by the lineage store and its backends

use thiserror::Error;

/// Failures surfaced by backend calls and response validation.
///
/// A superseded response is not an error: the store drops it silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    /// The request never produced a usable HTTP response
    #[error("network failure: {0}")]
    Network(String),

    /// The entity or pipeline does not exist on the backend
    #[error("not found: {0}")]
    NotFound(String),

    /// The payload is missing required node/edge fields
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Edit-mode changes cannot be persisted without lineage edit permission
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Reading or writing a local catalog file failed
    #[error("io error: {0}")]
    Io(String),

    /// A local catalog file could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

impl LineageError {
    /// Short label used in the status bar
    pub fn kind(&self) -> &'static str {
        match self {
            LineageError::Network(_) => "Network",
            LineageError::NotFound(_) => "Not found",
            LineageError::Malformed(_) => "Malformed",
            LineageError::PermissionDenied(_) => "Permission",
            LineageError::Io(_) => "IO",
            LineageError::Parse(_) => "Parse",
        }
    }
}

impl From<std::io::Error> for LineageError {
    fn from(err: std::io::Error) -> Self {
        LineageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LineageError {
    fn from(err: serde_json::Error) -> Self {
        LineageError::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for LineageError {
    fn from(err: serde_yaml::Error) -> Self {
        LineageError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LineageError>;
