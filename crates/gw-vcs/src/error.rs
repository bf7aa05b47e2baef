// error.rs — Error types for version-control backends.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving a version-control backend.
#[derive(Debug, Error)]
pub enum VcsError {
    /// The path is not the root of a repository work tree.
    #[error("not a repository: {path}")]
    NotARepository { path: PathBuf },

    /// The backend executable could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The command did not finish within its time budget and was killed.
    #[error("{command} timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// The command ran but reported failure.
    #[error("{command} failed ({}): {stderr}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The remote could not be reached or refused the connection.
    #[error("transport error talking to remote '{remote}': {message}")]
    Transport { remote: String, message: String },

    /// The backend refused the author or committer identity.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// Head moved between reading it and updating it.
    #[error("head moved: expected {expected}")]
    HeadMoved { expected: String },

    /// Backend output could not be understood.
    #[error("unexpected backend output: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, VcsError>;
