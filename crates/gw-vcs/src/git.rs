// git.rs — VcsBackend implementation that shells out to the git executable.
//
// Every call is `git -C <root> ...` with a bounded timeout. Commits never go
// through `git commit`: staging happens in a private index (GIT_INDEX_FILE),
// the snapshot is built with write-tree and hash-object, and HEAD is advanced
// with a compare-and-swap update-ref before the private index replaces the
// real one.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::backend::{
    DiffEntry, DiffStatus, Identity, MergeOutcome, Remote, SnapshotId, StagedIndex, VcsBackend,
};
use crate::command::{failed, GitCommand};
use crate::config::GitConfig;
use crate::error::{Result, VcsError};
use crate::report::{parse_fetch_output, parse_push_porcelain, FetchReport, PushReport};

/// Git adapter for the workspace engine.
#[derive(Debug, Clone, Default)]
pub struct GitBackend {
    config: GitConfig,
}

impl GitBackend {
    pub fn new(config: GitConfig) -> Self {
        Self { config }
    }

    /// A local command, bounded by the command timeout.
    fn git(&self, root: &Path) -> GitCommand {
        GitCommand::new(&self.config.executable, root, self.config.command_timeout())
    }

    /// A command that talks to a remote, bounded by the network timeout.
    fn git_network(&self, root: &Path) -> GitCommand {
        GitCommand::new(&self.config.executable, root, self.config.network_timeout())
    }

    fn git_dir(root: &Path) -> PathBuf {
        root.join(".git")
    }

    /// Stage-private command: runs against `index` instead of `.git/index`.
    fn git_with_index(&self, root: &Path, index: &Path) -> GitCommand {
        self.git(root).env("GIT_INDEX_FILE", index)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> VcsError + '_ {
    move |source| VcsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl VcsBackend for GitBackend {
    fn name(&self) -> &str {
        "git"
    }

    fn open(&self, root: &Path) -> Result<()> {
        if !Self::git_dir(root).exists() {
            return Err(VcsError::NotARepository {
                path: root.to_path_buf(),
            });
        }
        let out = self.git(root).args(["rev-parse", "--git-dir"]).run()?;
        if !out.success() {
            return Err(VcsError::NotARepository {
                path: root.to_path_buf(),
            });
        }
        Ok(())
    }

    fn init(&self, root: &Path, initial_branch: &str) -> Result<()> {
        fs::create_dir_all(root).map_err(io_error(root))?;
        self.git(root)
            .args(["init", "-q", "-b", initial_branch])
            .run_checked()?;
        tracing::debug!(root = %root.display(), branch = %initial_branch, "initialized repository");
        Ok(())
    }

    fn head(&self, root: &Path) -> Result<Option<SnapshotId>> {
        let command = self
            .git(root)
            .args(["rev-parse", "--verify", "--quiet", "HEAD^{commit}"]);
        let description = command.describe();
        let out = command.run()?;
        match out.code {
            Some(0) => Ok(Some(SnapshotId::new(out.line()))),
            // Unborn branch.
            Some(1) => Ok(None),
            _ => Err(failed(description, &out)),
        }
    }

    fn current_branch(&self, root: &Path) -> Result<Option<String>> {
        let command = self
            .git(root)
            .args(["symbolic-ref", "--quiet", "--short", "HEAD"]);
        let description = command.describe();
        let out = command.run()?;
        match out.code {
            Some(0) => Ok(Some(out.line().to_string())),
            // Detached head.
            Some(1) => Ok(None),
            _ => Err(failed(description, &out)),
        }
    }

    fn remotes(&self, root: &Path) -> Result<Vec<Remote>> {
        let command = self
            .git(root)
            .args(["config", "-z", "--get-regexp", r"^remote\..*\.url$"]);
        let description = command.describe();
        let out = command.run()?;
        match out.code {
            Some(0) => parse_remote_urls(&out.stdout),
            // No key matched.
            Some(1) => Ok(Vec::new()),
            _ => Err(failed(description, &out)),
        }
    }

    fn add_remote(&self, root: &Path, name: &str, url: &str) -> Result<()> {
        self.git(root)
            .args(["remote", "add", "--", name, url])
            .run_checked()?;
        Ok(())
    }

    fn remove_remote(&self, root: &Path, name: &str) -> Result<()> {
        self.git(root)
            .args(["remote", "remove", name])
            .run_checked()?;
        Ok(())
    }

    fn untracked(&self, root: &Path) -> Result<Vec<String>> {
        let out = self
            .git(root)
            .args(["ls-files", "--others", "--exclude-standard", "-z"])
            .run_checked()?;
        Ok(split_nul(&out.stdout))
    }

    fn diff_head(&self, root: &Path) -> Result<Vec<DiffEntry>> {
        let renames = match self.config.rename_threshold {
            0 => "--no-renames".to_string(),
            t => format!("-M{}%", t.min(100)),
        };
        let out = self
            .git(root)
            .args(["diff", "--no-ext-diff", "--no-color", "--name-status", "-z"])
            .arg(renames)
            .args(["HEAD", "--"])
            .run_checked()?;
        parse_name_status(&out.stdout)
    }

    fn missing_from_index(&self, root: &Path, paths: &[String]) -> Result<Vec<String>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let out = self
            .git(root)
            .args(["ls-files", "-z", "--"])
            .args(paths)
            .run_checked()?;
        let indexed = split_nul(&out.stdout);

        Ok(paths
            .iter()
            .filter(|path| {
                let dir_prefix = format!("{}/", path.trim_end_matches('/'));
                !indexed
                    .iter()
                    .any(|entry| entry == *path || entry.starts_with(&dir_prefix))
            })
            .cloned()
            .collect())
    }

    fn stage(&self, root: &Path, add: &[String], remove: &[String]) -> Result<StagedIndex> {
        let git_dir = Self::git_dir(root);
        let index = NamedTempFile::new_in(&git_dir)
            .map_err(io_error(&git_dir))?
            .into_temp_path();

        let real_index = git_dir.join("index");
        if real_index.exists() {
            fs::copy(&real_index, &index).map_err(io_error(&real_index))?;
        } else {
            // git rejects a zero-length index file; start from nothing or from head.
            fs::remove_file(&index).map_err(io_error(&index))?;
            if self.head(root)?.is_some() {
                self.git_with_index(root, &index)
                    .args(["read-tree", "HEAD"])
                    .run_checked()?;
            }
        }

        if !add.is_empty() {
            self.git_with_index(root, &index)
                .args(["add", "-f", "--"])
                .args(add)
                .run_checked()?;
        }
        if !remove.is_empty() {
            self.git_with_index(root, &index)
                .args(["rm", "--cached", "-q", "-r", "--"])
                .args(remove)
                .run_checked()?;
        }

        tracing::debug!(
            root = %root.display(),
            added = add.len(),
            removed = remove.len(),
            "staged into private index"
        );
        Ok(StagedIndex { index })
    }

    fn commit(
        &self,
        root: &Path,
        staged: StagedIndex,
        parent: Option<&SnapshotId>,
        message: &str,
        author: &Identity,
        committer: &Identity,
    ) -> Result<SnapshotId> {
        let tree = self
            .git_with_index(root, staged.path())
            .arg("write-tree")
            .run_checked()?
            .line()
            .to_string();

        let object = commit_object(
            &tree,
            parent,
            message,
            author,
            committer,
            chrono::Utc::now().timestamp(),
        )?;
        let out = self
            .git(root)
            .args(["hash-object", "-t", "commit", "-w", "--stdin"])
            .input(object)
            .run_checked()?;
        let id = SnapshotId::new(out.line());

        let expected = parent.map(SnapshotId::as_str).unwrap_or("");
        let out = self
            .git(root)
            .args(["update-ref", "-m", message, "HEAD", id.as_str(), expected])
            .run()?;
        if !out.success() {
            tracing::warn!(root = %root.display(), stderr = %out.stderr.trim(), "head update refused");
            return Err(VcsError::HeadMoved {
                expected: parent
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "no history".to_string()),
            });
        }

        // An empty first commit never materializes an index file.
        if staged.path().exists() {
            let real_index = Self::git_dir(root).join("index");
            staged
                .index
                .persist(&real_index)
                .map_err(|e| VcsError::Io {
                    path: real_index.clone(),
                    source: e.error,
                })?;
        }

        tracing::debug!(root = %root.display(), commit = %id.short(), "advanced head");
        Ok(id)
    }

    fn fetch(&self, root: &Path, remote: &str) -> Result<FetchReport> {
        let command = self
            .git_network(root)
            .args(["-c", "fetch.output=full", "fetch", "-v", remote]);
        let out = command.run()?;
        let report = parse_fetch_output(&out.stderr);

        if !out.success() && !report.has_failures() {
            return Err(VcsError::Transport {
                remote: remote.to_string(),
                message: out.stderr.trim().to_string(),
            });
        }
        Ok(report)
    }

    fn push(&self, root: &Path, remote: &str, branch: &str) -> Result<PushReport> {
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let out = self
            .git_network(root)
            .args(["push", "--porcelain", remote, refspec.as_str()])
            .run()?;
        let report = parse_push_porcelain(&out.stdout);

        if !out.success() && report.is_accepted() {
            // Nothing was rejected per-ref, so the remote was never reached.
            return Err(VcsError::Transport {
                remote: remote.to_string(),
                message: out.stderr.trim().to_string(),
            });
        }
        Ok(report)
    }

    fn merge_into_head(&self, root: &Path, reference: &str) -> Result<MergeOutcome> {
        let identity = &self.config.merge_identity;
        let out = self
            .git(root)
            .arg("-c")
            .arg(format!("user.name={}", identity.name))
            .arg("-c")
            .arg(format!("user.email={}", identity.email))
            .args(["merge", "--no-edit", "--no-stat", "--no-verify", "--no-gpg-sign"])
            .arg(reference)
            .run()?;

        if out.success() {
            return match self.head(root)? {
                Some(id) => Ok(MergeOutcome::Merged(id)),
                None => Err(VcsError::Parse(format!(
                    "merge of {reference} succeeded but head is unborn"
                ))),
            };
        }

        let reason = first_line(&out.stdout)
            .or_else(|| first_line(&out.stderr))
            .unwrap_or("merge failed")
            .to_string();
        if Self::git_dir(root).join("MERGE_HEAD").exists() {
            let abort = self.git(root).args(["merge", "--abort"]).run()?;
            if !abort.success() {
                tracing::warn!(root = %root.display(), stderr = %abort.stderr.trim(), "merge --abort failed");
            }
        }
        tracing::debug!(root = %root.display(), %reference, %reason, "merge did not complete");
        Ok(MergeOutcome::Conflict(reason))
    }

    fn tracking_refs(&self, root: &Path, remote: &str) -> Result<Vec<String>> {
        let prefix = format!("refs/remotes/{remote}/");
        let out = self
            .git(root)
            .args(["for-each-ref", "--format=%(refname)", prefix.as_str()])
            .run_checked()?;
        Ok(out
            .stdout
            .lines()
            .filter(|r| !r.is_empty() && !r.ends_with("/HEAD"))
            .map(str::to_string)
            .collect())
    }

    fn resolve(&self, root: &Path, reference: &str) -> Result<Option<SnapshotId>> {
        let command = self
            .git(root)
            .args(["rev-parse", "--verify", "--quiet", "--end-of-options"])
            .arg(format!("{reference}^{{commit}}"));
        let description = command.describe();
        let out = command.run()?;
        match out.code {
            Some(0) => Ok(Some(SnapshotId::new(out.line()))),
            Some(1) => Ok(None),
            _ => Err(failed(description, &out)),
        }
    }

    fn count_ahead(&self, root: &Path, base: &str) -> Result<u64> {
        let out = self
            .git(root)
            .args(["rev-list", "--count"])
            .arg(format!("{base}..HEAD"))
            .arg("--")
            .run_checked()?;
        out.line()
            .parse()
            .map_err(|_| VcsError::Parse(format!("rev-list count: {:?}", out.line())))
    }
}

/// `name <email> seconds +0000` as written into commit headers.
///
/// Empty names and emails are allowed; characters that would break the
/// header are not.
fn signature(identity: &Identity, seconds: i64) -> Result<String> {
    for (field, value) in [("name", &identity.name), ("email", &identity.email)] {
        if value.contains(['<', '>', '\n', '\0']) {
            return Err(VcsError::InvalidIdentity(format!(
                "{field} {value:?} contains '<', '>', a newline or NUL"
            )));
        }
    }
    Ok(format!(
        "{} <{}> {} +0000",
        identity.name.trim(),
        identity.email.trim(),
        seconds
    ))
}

/// Raw commit object for `git hash-object -t commit`.
fn commit_object(
    tree: &str,
    parent: Option<&SnapshotId>,
    message: &str,
    author: &Identity,
    committer: &Identity,
    seconds: i64,
) -> Result<String> {
    let mut object = format!("tree {tree}\n");
    if let Some(parent) = parent {
        object.push_str(&format!("parent {parent}\n"));
    }
    object.push_str(&format!("author {}\n", signature(author, seconds)?));
    object.push_str(&format!("committer {}\n", signature(committer, seconds)?));
    object.push('\n');
    object.push_str(message);
    if !message.ends_with('\n') {
        object.push('\n');
    }
    Ok(object)
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

fn split_nul(text: &str) -> Vec<String> {
    text.split('\0')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `config -z --get-regexp` records (`key\nvalue\0`).
fn parse_remote_urls(text: &str) -> Result<Vec<Remote>> {
    text.split('\0')
        .filter(|record| !record.is_empty())
        .map(|record| {
            let (key, url) = record
                .split_once('\n')
                .ok_or_else(|| VcsError::Parse(format!("config record without value: {record:?}")))?;
            let name = key
                .strip_prefix("remote.")
                .and_then(|k| k.strip_suffix(".url"))
                .ok_or_else(|| VcsError::Parse(format!("unexpected config key: {key}")))?;
            Ok(Remote {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

/// Parse `diff --name-status -z` output. Renames and copies carry two paths.
fn parse_name_status(text: &str) -> Result<Vec<DiffEntry>> {
    let mut tokens = text.split('\0').filter(|t| !t.is_empty());
    let mut entries = Vec::new();

    while let Some(status) = tokens.next() {
        let mut path = || {
            tokens
                .next()
                .map(str::to_string)
                .ok_or_else(|| VcsError::Parse(format!("missing path after status {status}")))
        };
        let (code, score) = status.split_at(1);
        let entry = match code {
            "A" => DiffEntry {
                status: DiffStatus::Added,
                old_path: None,
                new_path: Some(path()?),
            },
            "D" => DiffEntry {
                status: DiffStatus::Deleted,
                old_path: Some(path()?),
                new_path: None,
            },
            "M" | "T" | "U" => {
                let p = path()?;
                let status = match code {
                    "M" => DiffStatus::Modified,
                    "T" => DiffStatus::TypeChanged,
                    _ => DiffStatus::Unmerged,
                };
                DiffEntry {
                    status,
                    old_path: Some(p.clone()),
                    new_path: Some(p),
                }
            }
            "R" => {
                let old = path()?;
                let new = path()?;
                DiffEntry {
                    status: DiffStatus::Renamed {
                        similarity: score.parse().unwrap_or(0),
                    },
                    old_path: Some(old),
                    new_path: Some(new),
                }
            }
            // A copy leaves the source in place; only the destination is new.
            "C" => {
                let _source = path()?;
                DiffEntry {
                    status: DiffStatus::Added,
                    old_path: None,
                    new_path: Some(path()?),
                }
            }
            other => return Err(VcsError::Parse(format!("unknown diff status {other:?}"))),
        };
        entries.push(entry);
    }

    Ok(entries)
}
