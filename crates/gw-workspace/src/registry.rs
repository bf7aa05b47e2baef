// registry.rs — Resolves (owner, name) to workspace handles.
//
// The registry owns the storage layout (`<root>/<owner>/<name>`) and the
// lock table: one mutex per workspace key, created on first use and never
// removed, so every handle for the same key serializes on the same lock.
// Operations on different workspaces never contend beyond the brief table
// lookup.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use gw_vcs::{SnapshotId, VcsBackend, VcsError};
use serde::Serialize;

use crate::config::StorageConfig;
use crate::error::{Result, WorkspaceError};
use crate::sync::SyncState;
use crate::validate;

/// Remote name → URL.
pub type RemoteMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// In-memory state guarded by the per-workspace lock.
#[derive(Debug, Default)]
pub(crate) struct SlotState {
    pub sync: SyncState,
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    state: Mutex<SlotState>,
}

/// Sync status as reported by [`Workspace::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// Snapshot of a workspace's head, remotes and sync status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceInfo {
    pub head: Option<SnapshotId>,
    pub remotes: RemoteMap,
    pub sync: SyncStatus,
}

/// Entry point for every workspace operation.
pub struct Registry {
    config: StorageConfig,
    backend: Arc<dyn VcsBackend>,
    slots: Mutex<HashMap<WorkspaceKey, Arc<Slot>>>,
}

impl Registry {
    pub fn new(config: StorageConfig, backend: Arc<dyn VcsBackend>) -> Self {
        tracing::info!(
            storage_root = %config.root.display(),
            backend = backend.name(),
            "workspace registry ready"
        );
        Self {
            config,
            backend,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn key(owner: &str, name: &str) -> Result<WorkspaceKey> {
        validate::segment("owner", owner)?;
        validate::segment("workspace name", name)?;
        Ok(WorkspaceKey {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    fn slot(&self, key: &WorkspaceKey) -> Result<Arc<Slot>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| WorkspaceError::LockPoisoned(format!("lock table: {}", e)))?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// Build a handle without checking that anything exists on disk.
    fn handle(&self, key: WorkspaceKey) -> Result<Workspace> {
        let slot = self.slot(&key)?;
        let root = self.config.root.join(&key.owner).join(&key.name);
        Ok(Workspace {
            key,
            root,
            slot,
            backend: Arc::clone(&self.backend),
            primary_branch: self.config.primary_branch.clone(),
        })
    }

    /// Resolve an existing workspace.
    pub fn open(&self, owner: &str, name: &str) -> Result<Workspace> {
        let workspace = self.handle(Self::key(owner, name)?)?;
        workspace.ensure_exists()?;
        Ok(workspace)
    }

    /// Initialize a workspace with empty history and the given remotes.
    ///
    /// All remote names are validated before anything touches the disk. If
    /// registering a remote fails, the partially created workspace is
    /// removed again.
    pub fn create(&self, owner: &str, name: &str, remotes: &RemoteMap) -> Result<Workspace> {
        let key = Self::key(owner, name)?;
        for remote in remotes.keys() {
            validate::remote_name(remote)?;
        }

        let workspace = self.handle(key)?;
        {
            let _guard = workspace.lock()?;
            if workspace.exists()? {
                return Err(WorkspaceError::AlreadyExists {
                    owner: owner.to_string(),
                    name: name.to_string(),
                });
            }

            let preexisting = workspace.root.exists();
            let result = workspace
                .backend
                .init(&workspace.root, &workspace.primary_branch)
                .and_then(|()| {
                    remotes.iter().try_for_each(|(remote, url)| {
                        workspace.backend.add_remote(&workspace.root, remote, url)
                    })
                });

            if let Err(e) = result {
                tracing::warn!(workspace = %workspace.key, error = %e, "create failed, rolling back");
                let leftover = if preexisting {
                    workspace.root.join(".git")
                } else {
                    workspace.root.clone()
                };
                if let Err(cleanup) = fs::remove_dir_all(&leftover) {
                    tracing::warn!(path = %leftover.display(), error = %cleanup, "rollback incomplete");
                }
                return Err(e.into());
            }
        }
        tracing::info!(workspace = %workspace.key, remotes = remotes.len(), "created workspace");
        Ok(workspace)
    }

    /// Remove a workspace and everything under its root. Irreversible.
    pub fn delete(&self, owner: &str, name: &str) -> Result<()> {
        let workspace = self.handle(Self::key(owner, name)?)?;
        let mut state = workspace.lock()?;
        workspace.ensure_exists()?;

        fs::remove_dir_all(&workspace.root).map_err(|source| WorkspaceError::IoError {
            path: workspace.root.clone(),
            source,
        })?;
        *state = SlotState::default();

        tracing::info!(workspace = %workspace.key, "deleted workspace");
        Ok(())
    }

    /// Every workspace of `owner` with its ahead-count against its first
    /// remote. Entries that cannot be resolved are skipped.
    pub fn list(&self, owner: &str) -> Result<BTreeMap<String, u64>> {
        validate::segment("owner", owner)?;
        let dir = self.config.root.join(owner);
        if !dir.is_dir() {
            return Err(WorkspaceError::OwnerNotFound {
                owner: owner.to_string(),
            });
        }

        let entries = fs::read_dir(&dir).map_err(|source| WorkspaceError::IoError {
            path: dir.clone(),
            source,
        })?;

        let mut listing = BTreeMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(owner = %owner, error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            // Hidden and otherwise unaddressable entries are not workspaces.
            if validate::segment("workspace name", &name).is_err() {
                continue;
            }

            match self
                .open(owner, &name)
                .and_then(|ws| ws.first_remote_ahead_count())
            {
                Ok(count) => {
                    listing.insert(name, count);
                }
                Err(WorkspaceError::NotFound { .. }) => {}
                Err(e) => {
                    tracing::warn!(owner = %owner, workspace = %name, error = %e, "skipping workspace in listing");
                }
            }
        }
        Ok(listing)
    }
}

/// Handle to one existing workspace.
///
/// Every operation takes the workspace lock and re-checks that the
/// workspace still exists, so a handle outliving a concurrent delete fails
/// with `NotFound` instead of touching a half-removed directory.
pub struct Workspace {
    pub(crate) key: WorkspaceKey,
    pub(crate) root: PathBuf,
    slot: Arc<Slot>,
    pub(crate) backend: Arc<dyn VcsBackend>,
    pub(crate) primary_branch: String,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("key", &self.key)
            .field("root", &self.root)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Workspace {
    pub fn key(&self) -> &WorkspaceKey {
        &self.key
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, SlotState>> {
        self.slot
            .state
            .lock()
            .map_err(|e| WorkspaceError::LockPoisoned(format!("{}: {}", self.key, e)))
    }

    fn exists(&self) -> Result<bool> {
        match self.backend.open(&self.root) {
            Ok(()) => Ok(true),
            Err(VcsError::NotARepository { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Fail with `NotFound` unless the workspace is initialized on disk.
    pub(crate) fn ensure_exists(&self) -> Result<()> {
        if self.exists()? {
            Ok(())
        } else {
            Err(WorkspaceError::NotFound {
                owner: self.key.owner.clone(),
                name: self.key.name.clone(),
            })
        }
    }

    pub(crate) fn remote_map(&self) -> Result<RemoteMap> {
        Ok(self
            .backend
            .remotes(&self.root)?
            .into_iter()
            .map(|r| (r.name, r.url))
            .collect())
    }

    /// Head, remotes and sync status.
    pub fn info(&self) -> Result<WorkspaceInfo> {
        let state = self.lock()?;
        self.ensure_exists()?;
        Ok(WorkspaceInfo {
            head: self.backend.head(&self.root)?,
            remotes: self.remote_map()?,
            sync: SyncStatus {
                state: state.sync,
                last_sync_at: state.last_sync_at,
            },
        })
    }

    pub fn remotes(&self) -> Result<RemoteMap> {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        self.remote_map()
    }

    /// Replace the whole remote set: every existing remote is removed, then
    /// `remotes` is added. If adding fails, the previous set is restored.
    pub fn set_remotes(&self, remotes: &RemoteMap) -> Result<()> {
        for remote in remotes.keys() {
            validate::remote_name(remote)?;
        }

        let _guard = self.lock()?;
        self.ensure_exists()?;
        let previous = self.remote_map()?;

        let replaced = self.replace_remotes(&previous, remotes);
        if let Err(e) = replaced {
            tracing::warn!(workspace = %self.key, error = %e, "remote replacement failed, restoring");
            let restored = self
                .remote_map()
                .and_then(|current| self.replace_remotes(&current, &previous));
            if let Err(restore) = restored {
                tracing::warn!(workspace = %self.key, error = %restore, "could not restore remotes");
            }
            return Err(e);
        }

        tracing::info!(workspace = %self.key, remotes = remotes.len(), "replaced remotes");
        Ok(())
    }

    fn replace_remotes(&self, current: &RemoteMap, wanted: &RemoteMap) -> Result<()> {
        for name in current.keys() {
            self.backend.remove_remote(&self.root, name)?;
        }
        for (name, url) in wanted {
            self.backend.add_remote(&self.root, name, url)?;
        }
        Ok(())
    }
}
