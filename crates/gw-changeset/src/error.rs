// error.rs — Error types for the changeset model.

use thiserror::Error;

use crate::changeset::ChangeKind;

/// Errors that can occur while assembling a changeset.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// A path was recorded under two different non-untracked categories.
    #[error("path '{path}' already recorded as {existing}, cannot record it as {attempted}")]
    DuplicatePath {
        path: String,
        existing: ChangeKind,
        attempted: ChangeKind,
    },

    /// The record does not carry the paths its kind requires.
    #[error("malformed {kind} record: {reason}")]
    MalformedRecord { kind: ChangeKind, reason: String },

    /// Untracked paths are plain strings, not records.
    #[error("untracked paths must be recorded with ChangeSet::record_untracked")]
    UntrackedRecord,
}
