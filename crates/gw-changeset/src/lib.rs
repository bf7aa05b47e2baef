//! # gw-changeset
//!
//! The categorized difference between a workspace's head snapshot and its
//! live working directory.
//!
//! A [`ChangeSet`] groups [`ChangeRecord`]s by [`ChangeKind`] and serializes
//! to the fixed wire schema clients rely on:
//!
//! ```json
//! {"A": [{"B": "new.txt"}], "M": [{"A": "f", "B": "f"}], "D": [], "R": [], "U": ["scratch.txt"]}
//! ```

pub mod changeset;
pub mod error;

pub use changeset::{ChangeKind, ChangeRecord, ChangeSet};
pub use error::ChangeSetError;
