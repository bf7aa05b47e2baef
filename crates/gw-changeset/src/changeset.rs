// changeset.rs — Categorized difference between head and the working tree.
//
// A ChangeSet is transient: it is computed per request and never persisted.
// Records are kept in discovery order within each category. The wire form
// always carries all five category keys so callers can rely on a fixed
// schema, even when every category is empty.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChangeSetError;

/// The category a change falls into.
///
/// Serialized as the single-letter keys used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Staged, present in the working tree, absent from head.
    #[serde(rename = "A")]
    Added,
    /// Present in head and the working tree with different content.
    #[serde(rename = "M")]
    Modified,
    /// Present in head, absent from the working tree.
    #[serde(rename = "D")]
    Deleted,
    /// A deletion paired with a sufficiently similar addition.
    #[serde(rename = "R")]
    Renamed,
    /// On disk, never staged or committed.
    #[serde(rename = "U")]
    Untracked,
}

impl ChangeKind {
    /// Every category, in wire order.
    pub const ALL: [ChangeKind; 5] = [
        ChangeKind::Added,
        ChangeKind::Modified,
        ChangeKind::Deleted,
        ChangeKind::Renamed,
        ChangeKind::Untracked,
    ];
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Untracked => "untracked",
        };
        f.write_str(name)
    }
}

/// One tracked change. `A` is the path in head, `B` the path in the
/// working tree; pure additions and deletions carry only one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "A", default, skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,

    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
}

impl ChangeRecord {
    pub fn added(path: impl Into<String>) -> Self {
        Self {
            old_path: None,
            new_path: Some(path.into()),
        }
    }

    /// In-place change: both paths are identical.
    pub fn modified(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            old_path: Some(path.clone()),
            new_path: Some(path),
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            old_path: Some(path.into()),
            new_path: None,
        }
    }

    pub fn renamed(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            old_path: Some(from.into()),
            new_path: Some(to.into()),
        }
    }

    /// The distinct paths this record touches.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        let new = match (&self.old_path, &self.new_path) {
            (Some(old), Some(new)) if old == new => None,
            (_, new) => new.as_deref(),
        };
        self.old_path.as_deref().into_iter().chain(new)
    }

    /// Check that the record has the shape its kind requires.
    fn validate(&self, kind: ChangeKind) -> Result<(), ChangeSetError> {
        let malformed = |reason: &str| ChangeSetError::MalformedRecord {
            kind,
            reason: reason.to_string(),
        };
        match (kind, &self.old_path, &self.new_path) {
            (ChangeKind::Added, None, Some(_)) => Ok(()),
            (ChangeKind::Added, _, _) => Err(malformed("expected only a new path")),
            (ChangeKind::Deleted, Some(_), None) => Ok(()),
            (ChangeKind::Deleted, _, _) => Err(malformed("expected only an old path")),
            (ChangeKind::Modified, Some(a), Some(b)) if a == b => Ok(()),
            (ChangeKind::Modified, _, _) => Err(malformed("expected identical old and new paths")),
            (ChangeKind::Renamed, Some(a), Some(b)) if a != b => Ok(()),
            (ChangeKind::Renamed, _, _) => Err(malformed("expected distinct old and new paths")),
            (ChangeKind::Untracked, _, _) => Err(ChangeSetError::UntrackedRecord),
        }
    }
}

/// Changes grouped by kind, serialized with the keys `A`, `M`, `D`, `R`, `U`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(rename = "A", default)]
    pub added: Vec<ChangeRecord>,

    #[serde(rename = "M", default)]
    pub modified: Vec<ChangeRecord>,

    #[serde(rename = "D", default)]
    pub deleted: Vec<ChangeRecord>,

    #[serde(rename = "R", default)]
    pub renamed: Vec<ChangeRecord>,

    #[serde(rename = "U", default)]
    pub untracked: Vec<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A changeset for a workspace without history: everything on disk is
    /// untracked and the other categories stay empty.
    pub fn untracked_only(paths: impl IntoIterator<Item = String>) -> Self {
        Self {
            untracked: paths.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Record a tracked change.
    ///
    /// Fails if the record is malformed for `kind`, or if one of its paths is
    /// already recorded under a different category.
    pub fn record(&mut self, kind: ChangeKind, record: ChangeRecord) -> Result<(), ChangeSetError> {
        record.validate(kind)?;

        for path in record.paths() {
            if let Some(existing) = self.kind_of(path) {
                if existing != kind {
                    return Err(ChangeSetError::DuplicatePath {
                        path: path.to_string(),
                        existing,
                        attempted: kind,
                    });
                }
            }
        }

        match kind {
            ChangeKind::Added => self.added.push(record),
            ChangeKind::Modified => self.modified.push(record),
            ChangeKind::Deleted => self.deleted.push(record),
            ChangeKind::Renamed => self.renamed.push(record),
            ChangeKind::Untracked => unreachable!("rejected by validate"),
        }
        Ok(())
    }

    pub fn record_untracked(&mut self, path: impl Into<String>) {
        self.untracked.push(path.into());
    }

    /// The tracked records of one category. Untracked paths are not records;
    /// use the `untracked` field for those.
    pub fn records(&self, kind: ChangeKind) -> &[ChangeRecord] {
        match kind {
            ChangeKind::Added => &self.added,
            ChangeKind::Modified => &self.modified,
            ChangeKind::Deleted => &self.deleted,
            ChangeKind::Renamed => &self.renamed,
            ChangeKind::Untracked => &[],
        }
    }

    /// The non-untracked category a path is recorded under, if any.
    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        ChangeKind::ALL
            .into_iter()
            .filter(|kind| *kind != ChangeKind::Untracked)
            .find(|kind| {
                self.records(*kind)
                    .iter()
                    .any(|record| record.paths().any(|p| p == path))
            })
    }

    /// Total number of entries across all categories.
    pub fn len(&self) -> usize {
        self.added.len()
            + self.modified.len()
            + self.deleted.len()
            + self.renamed.len()
            + self.untracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
