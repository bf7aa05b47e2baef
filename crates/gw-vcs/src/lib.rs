//! # gw-vcs
//!
//! Version-control backend for gw workspaces.
//!
//! The workspace engine never talks to a version-control product directly.
//! Everything it needs (open, init, diff, stage, commit, fetch, push, merge)
//! goes through the [`VcsBackend`] trait. [`GitBackend`] implements it by
//! shelling out to the `git` executable with bounded timeouts.

pub mod backend;
pub mod config;
pub mod error;
pub mod git;
pub mod report;

mod command;

pub use backend::{
    DiffEntry, DiffStatus, Identity, MergeOutcome, Remote, SnapshotId, StagedIndex, VcsBackend,
};
pub use config::GitConfig;
pub use error::{Result, VcsError};
pub use git::GitBackend;
pub use report::{FetchReport, PushReport, RefUpdate, RefUpdateFlag};
