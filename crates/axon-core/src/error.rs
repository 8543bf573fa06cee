use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AxonError>;

/// Error taxonomy for vault operations.
///
/// Per-document failures inside multi-document scans are not surfaced through
/// this type; they are collected as [`crate::model::ItemError`] records in the
/// operation's report while the scan continues.
#[derive(Debug, Error)]
pub enum AxonError {
    /// The addressed note does not exist. Fatal to a single-document
    /// operation, non-fatal inside a batch.
    #[error("note not found: {path}")]
    NotFound { path: String },

    /// Creating or renaming onto a path that is already occupied.
    #[error("note already exists: {path}")]
    AlreadyExists { path: String },

    /// A path or link target that cannot be resolved inside the vault
    /// (absolute input, `..` escaping the root, empty target).
    #[error("invalid target: {target}")]
    InvalidTarget { target: String },

    /// Read/write/permission failure, carrying the offending path.
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid construction-time configuration (non-positive cache limits,
    /// out-of-range thresholds). Raised immediately, never deferred.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl AxonError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            AxonError::NotFound {
                path: path.to_string_lossy().into_owned(),
            }
        } else {
            AxonError::Io { path, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AxonError::NotFound { .. })
    }
}
