// Integration tests for GitBackend against real repositories and local bare remotes.

use std::fs;
use std::path::Path;
use std::process::Command;

use gw_vcs::{
    DiffStatus, GitBackend, GitConfig, Identity, MergeOutcome, RefUpdateFlag, SnapshotId,
    VcsBackend, VcsError,
};

fn bare_remote(dir: &Path) -> String {
    let status = Command::new("git")
        .args(["init", "-q", "--bare"])
        .arg(dir)
        .status()
        .unwrap();
    assert!(status.success());
    dir.to_string_lossy().into_owned()
}

fn author() -> Identity {
    Identity::new("Test User", "test@example.com")
}

fn commit_paths(backend: &GitBackend, root: &Path, add: &[&str], remove: &[&str], msg: &str) -> SnapshotId {
    let add: Vec<String> = add.iter().map(|s| s.to_string()).collect();
    let remove: Vec<String> = remove.iter().map(|s| s.to_string()).collect();
    let parent = backend.head(root).unwrap();
    let staged = backend.stage(root, &add, &remove).unwrap();
    backend
        .commit(root, staged, parent.as_ref(), msg, &author(), &author())
        .unwrap()
}

fn repo(base: &Path, name: &str) -> (GitBackend, std::path::PathBuf) {
    let backend = GitBackend::default();
    let root = base.join(name);
    backend.init(&root, "master").unwrap();
    (backend, root)
}

#[test]
fn first_commit_has_no_parent_and_clears_status() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    fs::write(root.join("readme.md"), "# hello\n").unwrap();

    let id = commit_paths(&backend, &root, &["readme.md"], &[], "initial");
    assert_eq!(backend.head(&root).unwrap(), Some(id.clone()));
    assert!(backend.diff_head(&root).unwrap().is_empty());
    assert!(backend.untracked(&root).unwrap().is_empty());

    let parents = Command::new("git")
        .arg("-C")
        .arg(&root)
        .args(["rev-list", "--parents", "-n", "1", id.as_str()])
        .output()
        .unwrap();
    let line = String::from_utf8_lossy(&parents.stdout);
    assert_eq!(line.split_whitespace().count(), 1, "root commit has no parent");
}

#[test]
fn empty_first_commit_is_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    let id = commit_paths(&backend, &root, &[], &[], "empty");
    assert_eq!(backend.head(&root).unwrap(), Some(id));
}

#[test]
fn diff_classifies_modify_delete_and_rename() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    let body = "line one\nline two\nline three\nline four\nline five\n";
    fs::write(root.join("keep.txt"), "original\n").unwrap();
    fs::write(root.join("drop.txt"), "bye\n").unwrap();
    fs::write(root.join("old-name.txt"), body).unwrap();
    commit_paths(&backend, &root, &["keep.txt", "drop.txt", "old-name.txt"], &[], "seed");

    fs::write(root.join("keep.txt"), "changed\n").unwrap();
    fs::remove_file(root.join("drop.txt")).unwrap();
    // Renames committed through the pipeline leave no trace in the diff.
    fs::rename(root.join("old-name.txt"), root.join("new-name.txt")).unwrap();
    let staged = backend
        .stage(&root, &["new-name.txt".to_string()], &["old-name.txt".to_string()])
        .unwrap();
    let parent = backend.head(&root).unwrap();
    backend
        .commit(&root, staged, parent.as_ref(), "rename", &author(), &author())
        .unwrap();
    fs::write(root.join("fresh.txt"), "new\n").unwrap();

    let entries = backend.diff_head(&root).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().any(|e| e.status == DiffStatus::Modified
        && e.old_path.as_deref() == Some("keep.txt")));
    assert!(entries
        .iter()
        .any(|e| e.status == DiffStatus::Deleted && e.old_path.as_deref() == Some("drop.txt")));
    assert_eq!(backend.untracked(&root).unwrap(), vec!["fresh.txt".to_string()]);
}

#[test]
fn staged_rename_is_detected_against_head() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    let body = "alpha\nbeta\ngamma\ndelta\nepsilon\n";
    fs::write(root.join("a.txt"), body).unwrap();
    commit_paths(&backend, &root, &["a.txt"], &[], "seed");

    Command::new("git")
        .arg("-C")
        .arg(&root)
        .args(["mv", "a.txt", "b.txt"])
        .status()
        .unwrap();

    let entries = backend.diff_head(&root).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(matches!(entries[0].status, DiffStatus::Renamed { similarity: 100 }));
    assert_eq!(entries[0].old_path.as_deref(), Some("a.txt"));
    assert_eq!(entries[0].new_path.as_deref(), Some("b.txt"));
}

#[test]
fn rename_detection_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let backend = GitBackend::new(GitConfig {
        rename_threshold: 0,
        ..GitConfig::default()
    });
    let root = dir.path().join("ws");
    backend.init(&root, "master").unwrap();
    fs::write(root.join("a.txt"), "same content\n").unwrap();
    commit_paths(&backend, &root, &["a.txt"], &[], "seed");
    Command::new("git")
        .arg("-C")
        .arg(&root)
        .args(["mv", "a.txt", "b.txt"])
        .status()
        .unwrap();

    let mut statuses: Vec<_> = backend
        .diff_head(&root)
        .unwrap()
        .into_iter()
        .map(|e| e.status)
        .collect();
    statuses.sort_by_key(|s| format!("{s:?}"));
    assert_eq!(statuses, vec![DiffStatus::Added, DiffStatus::Deleted]);
}

#[test]
fn missing_from_index_reports_unstaged_paths() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/guide.md"), "guide").unwrap();
    fs::write(root.join("top.txt"), "top").unwrap();
    commit_paths(&backend, &root, &["docs/guide.md", "top.txt"], &[], "seed");

    let missing = backend
        .missing_from_index(
            &root,
            &["top.txt".to_string(), "docs".to_string(), "nope.txt".to_string()],
        )
        .unwrap();
    assert_eq!(missing, vec!["nope.txt".to_string()]);
}

#[test]
fn empty_identity_is_recorded_as_is() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    fs::write(root.join("a.txt"), "a").unwrap();
    let staged = backend.stage(&root, &["a.txt".to_string()], &[]).unwrap();
    let nobody = Identity::new("", "");

    let id = backend
        .commit(&root, staged, None, "msg", &nobody, &nobody)
        .unwrap();
    assert_eq!(backend.head(&root).unwrap(), Some(id.clone()));
    assert!(backend.diff_head(&root).unwrap().is_empty());

    let log = Command::new("git")
        .arg("-C")
        .arg(&root)
        .args(["log", "-1", "--format=[%an][%ae][%cn][%ce]", id.as_str()])
        .output()
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&log.stdout).trim(), "[][][][]");
}

#[test]
fn malformed_identity_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    fs::write(root.join("a.txt"), "a").unwrap();
    let staged = backend.stage(&root, &["a.txt".to_string()], &[]).unwrap();
    let broken = Identity::new("Test\nUser", "x@example.com");

    let err = backend
        .commit(&root, staged, None, "msg", &broken, &broken)
        .unwrap_err();
    assert!(matches!(err, VcsError::InvalidIdentity(_)), "{err}");
    assert_eq!(backend.head(&root).unwrap(), None);
    assert!(!root.join(".git/index").exists(), "real index untouched");
}

#[test]
fn commit_refuses_stale_parent() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    fs::write(root.join("a.txt"), "a").unwrap();
    let first = commit_paths(&backend, &root, &["a.txt"], &[], "one");
    fs::write(root.join("a.txt"), "b").unwrap();
    let second = commit_paths(&backend, &root, &["a.txt"], &[], "two");

    fs::write(root.join("a.txt"), "c").unwrap();
    let staged = backend.stage(&root, &["a.txt".to_string()], &[]).unwrap();
    let err = backend
        .commit(&root, staged, Some(&first), "stale", &author(), &author())
        .unwrap_err();
    assert!(matches!(err, VcsError::HeadMoved { .. }));
    assert_eq!(backend.head(&root).unwrap(), Some(second));
}

#[test]
fn remotes_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    backend.add_remote(&root, "origin", "https://example.com/a.git").unwrap();
    backend.add_remote(&root, "backup", "/srv/backup.git").unwrap();

    let remotes = backend.remotes(&root).unwrap();
    let names: Vec<_> = remotes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["origin", "backup"]);

    backend.remove_remote(&root, "origin").unwrap();
    let remotes = backend.remotes(&root).unwrap();
    assert_eq!(remotes.len(), 1);
    assert_eq!(remotes[0].url, "/srv/backup.git");
}

#[test]
fn push_fetch_and_merge_between_workspaces() {
    let dir = tempfile::tempdir().unwrap();
    let url = bare_remote(&dir.path().join("remote.git"));

    let (backend, a) = repo(dir.path(), "a");
    backend.add_remote(&a, "origin", &url).unwrap();
    fs::write(a.join("shared.txt"), "v1\n").unwrap();
    let first = commit_paths(&backend, &a, &["shared.txt"], &[], "v1");

    let report = backend.push(&a, "origin", "master").unwrap();
    assert!(report.is_accepted());
    assert_eq!(report.updates[0].flag, RefUpdateFlag::New);

    let (_, b) = repo(dir.path(), "b");
    backend.add_remote(&b, "origin", &url).unwrap();
    let fetched = backend.fetch(&b, "origin").unwrap();
    assert!(!fetched.has_failures());
    assert!(!fetched.notes.is_empty());
    assert_eq!(
        backend.tracking_refs(&b, "origin").unwrap(),
        vec!["refs/remotes/origin/master".to_string()]
    );

    // Unborn head takes the fetched history.
    let merged = backend
        .merge_into_head(&b, "refs/remotes/origin/master")
        .unwrap();
    assert_eq!(merged, MergeOutcome::Merged(first.clone()));
    assert_eq!(fs::read_to_string(b.join("shared.txt")).unwrap(), "v1\n");
    assert_eq!(backend.count_ahead(&b, "refs/remotes/origin/master").unwrap(), 0);

    fs::write(b.join("shared.txt"), "v2\n").unwrap();
    commit_paths(&backend, &b, &["shared.txt"], &[], "v2");
    assert_eq!(backend.count_ahead(&b, "refs/remotes/origin/master").unwrap(), 1);
    assert_eq!(
        backend.resolve(&b, "refs/remotes/origin/master").unwrap(),
        Some(first)
    );
    assert_eq!(backend.resolve(&b, "refs/remotes/origin/nope").unwrap(), None);
}

#[test]
fn diverged_push_is_rejected_and_conflicting_merge_is_aborted() {
    let dir = tempfile::tempdir().unwrap();
    let url = bare_remote(&dir.path().join("remote.git"));
    let (backend, a) = repo(dir.path(), "a");
    let (_, b) = repo(dir.path(), "b");
    backend.add_remote(&a, "origin", &url).unwrap();
    backend.add_remote(&b, "origin", &url).unwrap();

    fs::write(a.join("f.txt"), "base\n").unwrap();
    commit_paths(&backend, &a, &["f.txt"], &[], "base");
    assert!(backend.push(&a, "origin", "master").unwrap().is_accepted());

    backend.fetch(&b, "origin").unwrap();
    backend.merge_into_head(&b, "refs/remotes/origin/master").unwrap();

    fs::write(a.join("f.txt"), "from a\n").unwrap();
    commit_paths(&backend, &a, &["f.txt"], &[], "a");
    assert!(backend.push(&a, "origin", "master").unwrap().is_accepted());

    fs::write(b.join("f.txt"), "from b\n").unwrap();
    let b_head = commit_paths(&backend, &b, &["f.txt"], &[], "b");

    let report = backend.push(&b, "origin", "master").unwrap();
    assert!(!report.is_accepted());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(backend.head(&b).unwrap(), Some(b_head.clone()));

    backend.fetch(&b, "origin").unwrap();
    let outcome = backend
        .merge_into_head(&b, "refs/remotes/origin/master")
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Conflict(_)));
    assert_eq!(backend.head(&b).unwrap(), Some(b_head));
    assert!(!b.join(".git/MERGE_HEAD").exists());
    assert_eq!(fs::read_to_string(b.join("f.txt")).unwrap(), "from b\n");
}

#[test]
fn unreachable_remote_is_a_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let (backend, root) = repo(dir.path(), "ws");
    let missing = dir.path().join("no-such-remote.git");
    backend
        .add_remote(&root, "origin", &missing.to_string_lossy())
        .unwrap();
    fs::write(root.join("a.txt"), "a").unwrap();
    commit_paths(&backend, &root, &["a.txt"], &[], "a");

    assert!(matches!(
        backend.fetch(&root, "origin"),
        Err(VcsError::Transport { .. })
    ));
    assert!(matches!(
        backend.push(&root, "origin", "master"),
        Err(VcsError::Transport { .. })
    ));
}
