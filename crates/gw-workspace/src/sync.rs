// sync.rs — Push, pull and divergence against named remotes.
//
// Rejections are terminal for the request: nothing here retries. Every
// push or pull attempt, successful or not, updates the workspace's in-memory
// SyncState under the workspace lock.

use chrono::Utc;
use gw_vcs::{MergeOutcome, SnapshotId, VcsError};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::registry::{SlotState, Workspace};

/// Observed synchronization state of a workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No push or pull has happened since the process started.
    #[default]
    Unsynced,
    /// The last push or pull succeeded and nothing is ahead of the remote.
    InSync,
    /// The last push or pull was rejected, or local history is ahead.
    Diverged,
}

/// How far head is ahead of a remote's primary-branch tracking reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "count", rename_all = "snake_case")]
pub enum Divergence {
    /// The workspace has no head snapshot.
    NoHistory,
    /// No such remote is configured.
    NoRemote,
    /// The remote is configured but its primary branch has no history yet.
    RemoteEmpty,
    Ahead(u64),
}

impl Divergence {
    /// Integer form used by listings. An empty remote counts as one ahead.
    pub fn ahead_count(&self) -> u64 {
        match self {
            Divergence::NoHistory | Divergence::NoRemote => 0,
            Divergence::RemoteEmpty => 1,
            Divergence::Ahead(n) => *n,
        }
    }
}

/// Successful pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullOutcome {
    /// Human-readable fetch diagnostics, one per reference.
    pub notes: Vec<String>,
    pub head: SnapshotId,
}

impl Workspace {
    /// Send the current branch to the same branch on `remote`.
    ///
    /// Any reference the remote rejects makes the whole push `Rejected`.
    /// Head is never moved by a push.
    pub fn push(&self, remote: &str) -> Result<()> {
        let mut state = self.lock()?;
        self.ensure_exists()?;
        self.require_remote(remote)?;

        if self.backend.head(&self.root)?.is_none() {
            return Err(self.reject(&mut state, remote, "workspace has no history to push"));
        }
        let Some(branch) = self.backend.current_branch(&self.root)? else {
            return Err(self.reject(&mut state, remote, "head is detached"));
        };

        let report = match self.backend.push(&self.root, remote, &branch) {
            Ok(report) => report,
            Err(e @ (VcsError::Transport { .. } | VcsError::Timeout { .. })) => {
                return Err(self.reject(&mut state, remote, &e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !report.is_accepted() {
            let reason = report
                .failures()
                .map(|u| format!("{} {}", u.destination, u.summary))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(self.reject(&mut state, remote, &reason));
        }

        self.record_success(&mut state, remote)?;
        tracing::info!(workspace = %self.key, %remote, %branch, "push accepted");
        Ok(())
    }

    /// Fetch from `remote`, then merge its primary-branch tracking reference
    /// (or its first tracking reference) into head.
    pub fn pull(&self, remote: &str) -> Result<PullOutcome> {
        let mut state = self.lock()?;
        self.ensure_exists()?;
        self.require_remote(remote)?;

        let report = match self.backend.fetch(&self.root, remote) {
            Ok(report) => report,
            Err(e @ (VcsError::Transport { .. } | VcsError::Timeout { .. })) => {
                return Err(self.reject(&mut state, remote, &e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if report.has_failures() {
            let reason = report
                .failures()
                .map(|u| format!("{} {}", u.destination, u.summary))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(self.reject(&mut state, remote, &reason));
        }

        let refs = self.backend.tracking_refs(&self.root, remote)?;
        let preferred = self.tracking_ref(remote);
        let Some(source) = refs
            .iter()
            .find(|r| **r == preferred)
            .or_else(|| refs.first())
        else {
            return Err(self.reject(&mut state, remote, "remote has no history"));
        };

        let head = match self.backend.merge_into_head(&self.root, source)? {
            MergeOutcome::Merged(head) => head,
            MergeOutcome::Conflict(reason) => {
                return Err(self.reject(&mut state, remote, &reason));
            }
        };

        self.record_success(&mut state, remote)?;
        tracing::info!(workspace = %self.key, %remote, head = %head.short(), "pull merged");
        Ok(PullOutcome {
            notes: report.notes,
            head,
        })
    }

    /// Divergence of head from `remote`.
    pub fn divergence(&self, remote: &str) -> Result<Divergence> {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        self.divergence_locked(remote)
    }

    /// Integer projection of [`divergence`](Self::divergence).
    pub fn ahead_count(&self, remote: &str) -> Result<u64> {
        Ok(self.divergence(remote)?.ahead_count())
    }

    pub fn sync_state(&self) -> Result<SyncState> {
        let state = self.lock()?;
        Ok(state.sync)
    }

    /// Ahead-count against the first configured remote (0 without remotes).
    pub(crate) fn first_remote_ahead_count(&self) -> Result<u64> {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        let remotes = self.backend.remotes(&self.root)?;
        let divergence = match remotes.first() {
            Some(first) => self.divergence_locked(&first.name)?,
            None => Divergence::NoRemote,
        };
        Ok(divergence.ahead_count())
    }

    fn divergence_locked(&self, remote: &str) -> Result<Divergence> {
        if self.backend.head(&self.root)?.is_none() {
            return Ok(Divergence::NoHistory);
        }
        if !self.remote_map()?.contains_key(remote) {
            return Ok(Divergence::NoRemote);
        }
        let tracking = self.tracking_ref(remote);
        if self.backend.resolve(&self.root, &tracking)?.is_none() {
            return Ok(Divergence::RemoteEmpty);
        }
        Ok(Divergence::Ahead(
            self.backend.count_ahead(&self.root, &tracking)?,
        ))
    }

    fn tracking_ref(&self, remote: &str) -> String {
        format!("refs/remotes/{}/{}", remote, self.primary_branch)
    }

    fn require_remote(&self, remote: &str) -> Result<()> {
        if self.remote_map()?.contains_key(remote) {
            Ok(())
        } else {
            Err(WorkspaceError::RemoteNotFound {
                remote: remote.to_string(),
            })
        }
    }

    fn record_success(&self, state: &mut SlotState, remote: &str) -> Result<()> {
        let ahead = self.divergence_locked(remote)?.ahead_count();
        state.sync = if ahead == 0 {
            SyncState::InSync
        } else {
            SyncState::Diverged
        };
        state.last_sync_at = Some(Utc::now());
        Ok(())
    }

    fn reject(&self, state: &mut SlotState, remote: &str, reason: &str) -> WorkspaceError {
        tracing::warn!(workspace = %self.key, %remote, %reason, "sync rejected");
        state.sync = SyncState::Diverged;
        state.last_sync_at = Some(Utc::now());
        WorkspaceError::Rejected {
            remote: remote.to_string(),
            reason: reason.to_string(),
        }
    }
}
