// error.rs — Error types for the workspace engine.

use std::fmt;
use std::path::PathBuf;

use gw_changeset::ChangeSetError;
use gw_vcs::VcsError;
use thiserror::Error;

/// Caller-facing classification of a failure.
///
/// Every [`WorkspaceError`] maps to exactly one kind; the HTTP layer turns
/// kinds into status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    BadRequest,
    Conflict,
    Forbidden,
    InternalFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::BadRequest => "bad request",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::InternalFailure => "internal failure",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// No initialized workspace at (owner, name).
    #[error("workspace '{owner}/{name}' not found")]
    NotFound { owner: String, name: String },

    /// The owner has no storage directory at all.
    #[error("owner '{owner}' not found")]
    OwnerNotFound { owner: String },

    #[error("workspace '{owner}/{name}' already exists")]
    AlreadyExists { owner: String, name: String },

    /// An owner, workspace or remote name is not acceptable.
    #[error("invalid {what} '{value}': {reason}")]
    InvalidName {
        what: &'static str,
        value: String,
        reason: &'static str,
    },

    /// A workspace-relative path is absolute, escapes the root or touches
    /// version-control metadata.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// A request field is missing or malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Paths named by a commit request that do not exist where required.
    #[error("paths not found: {}", .paths.join(", "))]
    PathsNotFound { paths: Vec<String> },

    /// The workspace has no remote of this name.
    #[error("remote '{remote}' does not exist")]
    RemoteNotFound { remote: String },

    /// The remote refused the push, the fetch failed, or the fetched
    /// history could not be integrated.
    #[error("sync with remote '{remote}' rejected: {reason}")]
    Rejected { remote: String, reason: String },

    #[error("file not found: '{path}'")]
    FileNotFound { path: String },

    #[error("file already exists: '{path}'")]
    FileExists { path: String },

    /// File operations only apply to regular files.
    #[error("'{path}' is a directory")]
    IsADirectory { path: String },

    /// A per-workspace lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The version-control backend failed.
    #[error("backend error: {0}")]
    Vcs(#[from] VcsError),

    /// The backend reported a diff that does not form a valid changeset.
    #[error("changeset error: {0}")]
    ChangeSet(#[from] ChangeSetError),
}

impl WorkspaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkspaceError::NotFound { .. }
            | WorkspaceError::OwnerNotFound { .. }
            | WorkspaceError::PathsNotFound { .. }
            | WorkspaceError::FileNotFound { .. } => ErrorKind::NotFound,
            WorkspaceError::AlreadyExists { .. } | WorkspaceError::FileExists { .. } => {
                ErrorKind::AlreadyExists
            }
            WorkspaceError::InvalidName { .. }
            | WorkspaceError::InvalidPath { .. }
            | WorkspaceError::InvalidRequest(_) => ErrorKind::BadRequest,
            WorkspaceError::Rejected { .. } => ErrorKind::Conflict,
            WorkspaceError::RemoteNotFound { .. } | WorkspaceError::IsADirectory { .. } => {
                ErrorKind::Forbidden
            }
            WorkspaceError::Vcs(VcsError::InvalidIdentity(_)) => ErrorKind::BadRequest,
            WorkspaceError::Vcs(VcsError::HeadMoved { .. }) => ErrorKind::Conflict,
            WorkspaceError::LockPoisoned(_)
            | WorkspaceError::IoError { .. }
            | WorkspaceError::Vcs(_)
            | WorkspaceError::ChangeSet(_) => ErrorKind::InternalFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
