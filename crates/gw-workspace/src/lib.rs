//! # gw-workspace
//!
//! The workspace synchronization engine.
//!
//! Each (owner, name) pair is an independently version-controlled directory
//! under the storage root. The [`Registry`] resolves pairs to [`Workspace`]
//! handles; everything else is a method on the handle:
//!
//! - [`Workspace::status`] — head-versus-working-tree [`ChangeSet`](gw_changeset::ChangeSet).
//! - [`Workspace::commit`] — validated, all-or-nothing stage and commit.
//! - [`Workspace::push`] / [`Workspace::pull`] / [`Workspace::divergence`] —
//!   remote synchronization with rejection reporting.
//! - [`Workspace::read_file`] and friends, [`Workspace::tree`] — file access.
//!
//! Operations on one workspace are serialized by a per-workspace lock owned
//! by the registry; different workspaces never block each other.

pub mod commit;
pub mod config;
pub mod error;
pub mod files;
pub mod registry;
pub mod status;
pub mod sync;
pub mod validate;

pub use commit::CommitRequest;
pub use config::StorageConfig;
pub use error::{ErrorKind, Result, WorkspaceError};
pub use files::{Tree, TreeNode};
pub use registry::{Registry, RemoteMap, SyncStatus, Workspace, WorkspaceInfo, WorkspaceKey};
pub use sync::{Divergence, PullOutcome, SyncState};
