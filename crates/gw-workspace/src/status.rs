// status.rs — Head-versus-working-tree change computation.

use std::path::Path;

use gw_changeset::{ChangeKind, ChangeRecord, ChangeSet};
use gw_vcs::{DiffEntry, DiffStatus, VcsBackend, VcsError};

use crate::error::Result;
use crate::registry::Workspace;

impl Workspace {
    /// Changes between the head snapshot and the working directory.
    ///
    /// Without a head snapshot every file on disk is untracked and the
    /// other categories are empty. Read-only.
    pub fn status(&self) -> Result<ChangeSet> {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        compute_status(self.backend.as_ref(), &self.root)
    }
}

pub(crate) fn compute_status(backend: &dyn VcsBackend, root: &Path) -> Result<ChangeSet> {
    let untracked = backend.untracked(root)?;
    if backend.head(root)?.is_none() {
        return Ok(ChangeSet::untracked_only(untracked));
    }

    let mut changes = ChangeSet::new();
    for entry in backend.diff_head(root)? {
        let (kind, record) = classify(entry)?;
        changes.record(kind, record)?;
    }
    for path in untracked {
        changes.record_untracked(path);
    }
    Ok(changes)
}

/// Map a backend diff entry onto a change category.
fn classify(entry: DiffEntry) -> Result<(ChangeKind, ChangeRecord)> {
    let incomplete = || VcsError::Parse(format!("diff entry without required path: {entry:?}"));

    let classified = match entry.status {
        DiffStatus::Added => {
            let path = entry.new_path.clone().ok_or_else(incomplete)?;
            (ChangeKind::Added, ChangeRecord::added(path))
        }
        DiffStatus::Deleted => {
            let path = entry.old_path.clone().ok_or_else(incomplete)?;
            (ChangeKind::Deleted, ChangeRecord::deleted(path))
        }
        // Type changes and unresolved merges are content changes in place.
        DiffStatus::Modified | DiffStatus::TypeChanged | DiffStatus::Unmerged => {
            let path = entry
                .new_path
                .clone()
                .or_else(|| entry.old_path.clone())
                .ok_or_else(incomplete)?;
            (ChangeKind::Modified, ChangeRecord::modified(path))
        }
        DiffStatus::Renamed { .. } => {
            let (Some(from), Some(to)) = (entry.old_path.clone(), entry.new_path.clone()) else {
                return Err(incomplete().into());
            };
            (ChangeKind::Renamed, ChangeRecord::renamed(from, to))
        }
    };
    Ok(classified)
}
