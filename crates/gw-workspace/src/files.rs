// files.rs — File CRUD and directory trees inside a workspace.
//
// Paths are validated and normalized first, then resolved against the
// workspace root. Symlinks may not lead outside the workspace. All
// operations hold the workspace lock so they never observe a half-applied
// commit or pull.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::error::{Result, WorkspaceError};
use crate::registry::Workspace;
use crate::validate;

/// One entry of a directory tree. Serializes files as `true` and
/// directories as nested objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File,
    Dir(Tree),
}

pub type Tree = BTreeMap<String, TreeNode>;

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TreeNode::File => serializer.serialize_bool(true),
            TreeNode::Dir(children) => children.serialize(serializer),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> WorkspaceError + '_ {
    move |source| WorkspaceError::IoError {
        path: path.to_path_buf(),
        source,
    }
}

impl Workspace {
    pub fn read_file(&self, path: &str) -> Result<String> {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        let (rel, full) = self.resolve(path)?;
        self.require_file(&rel, &full)?;
        fs::read_to_string(&full).map_err(io_error(&full))
    }

    /// Create a new file, making parent directories as needed.
    pub fn create_file(&self, path: &str, data: &str) -> Result<()> {
        self.create_file_with(path, || Ok(data.to_string()))
    }

    /// Like [`create_file`](Self::create_file), but `data` is only produced
    /// once the target is known to be creatable. An error from `data`
    /// leaves the workspace untouched.
    pub fn create_file_with<F>(&self, path: &str, data: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        let (rel, full) = self.resolve(path)?;
        if full.is_dir() {
            return Err(WorkspaceError::IsADirectory { path: rel });
        }
        if full.symlink_metadata().is_ok() {
            return Err(WorkspaceError::FileExists { path: rel });
        }
        let data = data()?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(io_error(&full))?;
        file.write_all(data.as_bytes()).map_err(io_error(&full))?;

        tracing::info!(workspace = %self.key, path = %rel, bytes = data.len(), "created file");
        Ok(())
    }

    /// Overwrite an existing file.
    pub fn update_file(&self, path: &str, data: &str) -> Result<()> {
        self.update_file_with(path, || Ok(data.to_string()))
    }

    /// Like [`update_file`](Self::update_file), with `data` produced after
    /// the target is known to be an existing file.
    pub fn update_file_with<F>(&self, path: &str, data: F) -> Result<()>
    where
        F: FnOnce() -> Result<String>,
    {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        let (rel, full) = self.resolve(path)?;
        self.require_file(&rel, &full)?;
        let data = data()?;
        fs::write(&full, &data).map_err(io_error(&full))?;

        tracing::info!(workspace = %self.key, path = %rel, bytes = data.len(), "updated file");
        Ok(())
    }

    pub fn delete_file(&self, path: &str) -> Result<()> {
        let _guard = self.lock()?;
        self.ensure_exists()?;
        let (rel, full) = self.resolve(path)?;
        self.require_file(&rel, &full)?;
        fs::remove_file(&full).map_err(io_error(&full))?;

        tracing::info!(workspace = %self.key, path = %rel, "deleted file");
        Ok(())
    }

    /// Directory tree of the workspace, or of `subdir` inside it.
    /// `.git` directories are never listed.
    pub fn tree(&self, subdir: Option<&str>) -> Result<Tree> {
        let _guard = self.lock()?;
        self.ensure_exists()?;

        let (rel, base) = match subdir.filter(|s| !s.trim_matches('/').is_empty()) {
            Some(sub) => self.resolve(sub)?,
            None => (String::new(), self.root.clone()),
        };
        if !base.is_dir() {
            return Err(WorkspaceError::FileNotFound { path: rel });
        }
        walk_dir(&base)
    }

    /// Validate `path` and map it into the workspace.
    fn resolve(&self, path: &str) -> Result<(String, PathBuf)> {
        let rel = validate::relative_path(path)?;
        let full = self.root.join(&rel);

        // Check the deepest existing ancestor so symlinks cannot escape.
        let mut existing = full.as_path();
        while existing.symlink_metadata().is_err() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        let root = self.root.canonicalize().map_err(io_error(&self.root))?;
        let resolved = match existing.canonicalize() {
            Ok(resolved) => resolved,
            // A dangling symlink: judge it by where it points.
            Err(_) => match fs::read_link(existing) {
                Ok(target) => existing
                    .parent()
                    .map(|p| p.join(&target))
                    .unwrap_or(target),
                Err(e) => return Err(io_error(existing)(e)),
            },
        };
        if !resolved.starts_with(&root) {
            return Err(WorkspaceError::InvalidPath {
                path: rel,
                reason: "resolves outside the workspace",
            });
        }
        Ok((rel, full))
    }

    fn require_file(&self, rel: &str, full: &Path) -> Result<()> {
        if full.is_dir() {
            return Err(WorkspaceError::IsADirectory {
                path: rel.to_string(),
            });
        }
        if !full.exists() {
            return Err(WorkspaceError::FileNotFound {
                path: rel.to_string(),
            });
        }
        Ok(())
    }
}

/// Recursively collect a directory into a tree.
fn walk_dir(dir: &Path) -> Result<Tree> {
    let entries = fs::read_dir(dir).map_err(io_error(dir))?;

    let mut tree = Tree::new();
    for entry in entries {
        let entry = entry.map_err(io_error(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ".git" {
            continue;
        }
        let file_type = entry.file_type().map_err(io_error(&entry.path()))?;
        let node = if file_type.is_dir() {
            TreeNode::Dir(walk_dir(&entry.path())?)
        } else {
            TreeNode::File
        };
        tree.insert(name, node);
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gw_vcs::GitBackend;
    use serde_json::json;

    use crate::{Registry, RemoteMap, StorageConfig};

    fn workspace(root: &Path) -> Workspace {
        let reg = Registry::new(StorageConfig::new(root), Arc::new(GitBackend::default()));
        reg.create("alice", "notes", &RemoteMap::new()).unwrap()
    }

    #[test]
    fn create_read_update_delete() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());

        ws.create_file("docs/intro.md", "# Intro\n").unwrap();
        assert_eq!(ws.read_file("docs/intro.md").unwrap(), "# Intro\n");

        let err = ws.create_file("docs/intro.md", "again").unwrap_err();
        assert!(matches!(err, WorkspaceError::FileExists { .. }));

        ws.update_file("docs/intro.md", "# Better intro\n").unwrap();
        assert_eq!(ws.read_file("docs/intro.md").unwrap(), "# Better intro\n");

        ws.delete_file("docs/intro.md").unwrap();
        assert!(matches!(
            ws.read_file("docs/intro.md"),
            Err(WorkspaceError::FileNotFound { .. })
        ));
        assert!(matches!(
            ws.update_file("docs/intro.md", "x"),
            Err(WorkspaceError::FileNotFound { .. })
        ));
        assert!(matches!(
            ws.delete_file("docs/intro.md"),
            Err(WorkspaceError::FileNotFound { .. })
        ));
    }

    #[test]
    fn content_is_produced_after_target_checks() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.create_file("a.txt", "a").unwrap();
        let refuse = || Err(WorkspaceError::InvalidRequest("no content".into()));

        assert!(matches!(
            ws.create_file_with("a.txt", refuse),
            Err(WorkspaceError::FileExists { .. })
        ));
        assert!(matches!(
            ws.update_file_with("missing.txt", refuse),
            Err(WorkspaceError::FileNotFound { .. })
        ));
        assert!(matches!(
            ws.create_file_with("new.txt", refuse),
            Err(WorkspaceError::InvalidRequest(_))
        ));
        assert!(!ws.root().join("new.txt").exists());
        assert!(matches!(
            ws.update_file_with("a.txt", refuse),
            Err(WorkspaceError::InvalidRequest(_))
        ));
        assert_eq!(ws.read_file("a.txt").unwrap(), "a");
    }

    #[test]
    fn directories_are_forbidden_targets() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.create_file("docs/a.md", "a").unwrap();

        for result in [
            ws.read_file("docs").map(|_| ()),
            ws.create_file("docs", "x"),
            ws.update_file("docs", "x"),
            ws.delete_file("docs"),
        ] {
            assert!(matches!(result, Err(WorkspaceError::IsADirectory { .. })));
        }
    }

    #[test]
    fn metadata_and_escapes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        for path in [".git/config", "../other/file", "/etc/hostname"] {
            assert!(matches!(
                ws.read_file(path),
                Err(WorkspaceError::InvalidPath { .. })
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_workspace_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let outside = dir.path().join("secret.txt");
        fs::write(&outside, "secret").unwrap();
        std::os::unix::fs::symlink(&outside, ws.root().join("link")).unwrap();

        assert!(matches!(
            ws.read_file("link"),
            Err(WorkspaceError::InvalidPath { .. })
        ));
        assert!(matches!(
            ws.create_file("link/nested.txt", "x"),
            Err(WorkspaceError::InvalidPath { .. })
        ));
    }

    #[test]
    fn tree_lists_files_as_true_and_skips_git() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        ws.create_file("readme.md", "r").unwrap();
        ws.create_file("src/main.rs", "m").unwrap();
        ws.create_file("src/util/mod.rs", "u").unwrap();

        let tree = ws.tree(None).unwrap();
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({
                "readme.md": true,
                "src": {"main.rs": true, "util": {"mod.rs": true}}
            })
        );

        let sub = ws.tree(Some("src/util")).unwrap();
        assert_eq!(serde_json::to_value(&sub).unwrap(), json!({"mod.rs": true}));

        assert!(matches!(
            ws.tree(Some("nope")),
            Err(WorkspaceError::FileNotFound { .. })
        ));
    }

    #[test]
    fn empty_workspace_tree_is_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        assert_eq!(serde_json::to_value(ws.tree(Some("/")).unwrap()).unwrap(), json!({}));
    }
}
