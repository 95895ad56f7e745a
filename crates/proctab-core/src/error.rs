//! Error types for proctab core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using proctab Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for proctab operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Container definition carries no command to execute
    #[error("missing execute block for container: {container_id}")]
    MissingExecute { container_id: String },

    /// The OS refused to create the process
    #[error("failed to spawn `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },

    /// A pid file exists but its contents cannot be decoded
    #[error("corrupt process record {}: {source}", path.display())]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No home directory could be determined for the invoking user
    #[error("cannot determine home directory")]
    HomeDirUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
