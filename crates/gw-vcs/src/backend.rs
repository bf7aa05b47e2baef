//! Core VcsBackend trait and the value types that cross it

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::report::{FetchReport, PushReport};

/// Content-derived identifier of a snapshot (a commit object id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A named remote and its (opaque) URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// Raw classification reported by the backend for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    /// Rename with the backend-reported similarity score (percent).
    Renamed { similarity: u8 },
    /// File type changed (e.g. regular file to symlink).
    TypeChanged,
    /// Entry has unresolved merge conflicts.
    Unmerged,
}

/// One entry of the head-versus-working-tree diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub status: DiffStatus,
    /// Path in head (absent for additions)
    pub old_path: Option<String>,
    /// Path in the working tree (absent for deletions)
    pub new_path: Option<String>,
}

/// Staged changes that have not been committed yet.
///
/// The backend stages into a private copy of the index. Dropping a
/// `StagedIndex` without committing it discards the staging, leaving the
/// workspace's real index untouched.
#[derive(Debug)]
pub struct StagedIndex {
    pub(crate) index: tempfile::TempPath,
}

impl StagedIndex {
    pub fn path(&self) -> &Path {
        &self.index
    }
}

/// Result of integrating a reference into head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Head now points at this snapshot.
    Merged(SnapshotId),
    /// The merge could not complete; head, index and working tree are
    /// unchanged.
    Conflict(String),
}

/// Pluggable version-control capability used by the workspace engine.
///
/// Every method receives the workspace root. Implementations must be safe
/// to share between threads; callers serialize operations on the same root.
pub trait VcsBackend: Send + Sync {
    /// Backend display name (for logs)
    fn name(&self) -> &str;

    /// Fail with `NotARepository` unless `root` is the top of a work tree.
    fn open(&self, root: &Path) -> Result<()>;

    /// Create `root` (and parents) with empty history. The unborn head
    /// points at `initial_branch`.
    fn init(&self, root: &Path, initial_branch: &str) -> Result<()>;

    /// Current head snapshot, `None` when there is no history yet.
    fn head(&self, root: &Path) -> Result<Option<SnapshotId>>;

    /// Branch head is attached to, `None` when detached.
    fn current_branch(&self, root: &Path) -> Result<Option<String>>;

    /// Configured remotes, in configuration order.
    fn remotes(&self, root: &Path) -> Result<Vec<Remote>>;

    fn add_remote(&self, root: &Path, name: &str, url: &str) -> Result<()>;

    fn remove_remote(&self, root: &Path, name: &str) -> Result<()>;

    /// Files on disk that were never staged or committed, honouring ignore
    /// rules and excluding backend metadata.
    fn untracked(&self, root: &Path) -> Result<Vec<String>>;

    /// Structural diff between the head snapshot's tree and the working
    /// tree, with rename detection. Requires a head.
    fn diff_head(&self, root: &Path) -> Result<Vec<DiffEntry>>;

    /// Which of `paths` are absent from the current stage.
    fn missing_from_index(&self, root: &Path, paths: &[String]) -> Result<Vec<String>>;

    /// Stage additions and removals into a private index.
    fn stage(&self, root: &Path, add: &[String], remove: &[String]) -> Result<StagedIndex>;

    /// Record `staged` as a new snapshot on top of `parent`, advance head and
    /// install the staged index as the workspace's stage.
    fn commit(
        &self,
        root: &Path,
        staged: StagedIndex,
        parent: Option<&SnapshotId>,
        message: &str,
        author: &Identity,
        committer: &Identity,
    ) -> Result<SnapshotId>;

    /// Retrieve history from `remote` into local tracking references.
    fn fetch(&self, root: &Path, remote: &str) -> Result<FetchReport>;

    /// Send `branch` to the same branch on `remote`.
    fn push(&self, root: &Path, remote: &str, branch: &str) -> Result<PushReport>;

    /// Integrate `reference` into head.
    fn merge_into_head(&self, root: &Path, reference: &str) -> Result<MergeOutcome>;

    /// Tracking references held for `remote`, excluding symbolic ones.
    fn tracking_refs(&self, root: &Path, remote: &str) -> Result<Vec<String>>;

    /// Resolve a reference to a snapshot, `None` if it does not exist.
    fn resolve(&self, root: &Path, reference: &str) -> Result<Option<SnapshotId>>;

    /// Snapshots reachable from head but not from `base`.
    fn count_ahead(&self, root: &Path, base: &str) -> Result<u64>;
}
