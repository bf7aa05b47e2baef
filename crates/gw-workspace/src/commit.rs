// commit.rs — Validated, all-or-nothing stage and commit.
//
// Everything about the request is checked before the backend is asked to
// stage anything: the message, every path's shape, then every path's
// existence. Staging itself happens in a private index, so a failure at any
// later step leaves the real index and head as they were.

use gw_vcs::{Identity, SnapshotId};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::registry::Workspace;
use crate::validate;

/// A request to record a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRequest {
    /// Paths to stage from the working tree
    pub add: Vec<String>,
    /// Paths to drop from the stage
    pub remove: Vec<String>,
    pub message: String,
    /// Used as both author and committer. Empty strings are passed through.
    pub author: Identity,
}

impl CommitRequest {
    pub fn new(message: impl Into<String>, author: Identity) -> Self {
        Self {
            add: Vec::new(),
            remove: Vec::new(),
            message: message.into(),
            author,
        }
    }

    pub fn add(mut self, path: impl Into<String>) -> Self {
        self.add.push(path.into());
        self
    }

    pub fn remove(mut self, path: impl Into<String>) -> Self {
        self.remove.push(path.into());
        self
    }

    /// Shape checks that need no filesystem access. Returns the normalized
    /// add and remove lists.
    pub fn validate(&self) -> Result<(Vec<String>, Vec<String>)> {
        if self.message.trim().is_empty() {
            return Err(WorkspaceError::InvalidRequest(
                "commit message must not be empty".to_string(),
            ));
        }
        let add = self
            .add
            .iter()
            .map(|p| validate::relative_path(p))
            .collect::<Result<Vec<_>>>()?;
        let remove = self
            .remove
            .iter()
            .map(|p| validate::relative_path(p))
            .collect::<Result<Vec<_>>>()?;
        Ok((add, remove))
    }
}

impl Workspace {
    /// Stage `request.add` and `request.remove` and record a snapshot on top
    /// of the current head.
    ///
    /// Paths to add must exist on disk; paths to remove must be in the
    /// stage. All missing paths are reported at once and nothing is staged.
    pub fn commit(&self, request: &CommitRequest) -> Result<SnapshotId> {
        let (add, remove) = request.validate()?;

        let _guard = self.lock()?;
        self.ensure_exists()?;

        let mut missing: Vec<String> = add
            .iter()
            .filter(|p| self.root.join(p).symlink_metadata().is_err())
            .cloned()
            .collect();
        missing.extend(self.backend.missing_from_index(&self.root, &remove)?);
        if !missing.is_empty() {
            return Err(WorkspaceError::PathsNotFound { paths: missing });
        }

        let parent = self.backend.head(&self.root)?;
        let staged = self.backend.stage(&self.root, &add, &remove)?;
        let id = self.backend.commit(
            &self.root,
            staged,
            parent.as_ref(),
            &request.message,
            &request.author,
            &request.author,
        )?;

        tracing::info!(
            workspace = %self.key,
            commit = %id.short(),
            parent = parent.as_ref().map(|p| p.short()).unwrap_or("none"),
            added = add.len(),
            removed = remove.len(),
            "committed"
        );
        Ok(id)
    }
}
