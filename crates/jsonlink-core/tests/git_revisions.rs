//! Revision reads against real git repositories
//!
//! These tests need a `git` binary and return early when none is available.

use std::path::Path;
use std::process::Command;

use jsonlink_core::{Loader, Variables};
use pretty_assertions::assert_eq;
use serde_json::json;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=jsonlink",
            "-c",
            "user.email=jsonlink@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "tag.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {args:?}: {e}"));
    if !output.status.success() {
        panic!(
            "git {args:?} failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Checked-out repository `work` with two commits on `main` (first tagged
/// `v1`), an uncommitted edit, and a bare clone `store.git` next to it.
fn fixture(root: &Path) {
    let work = root.join("work");
    std::fs::create_dir_all(&work).unwrap();

    git(&work, &["init", "-q"]);
    git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    write(&work, "conf/a.json", r#"{"b": "@!b.json", "first": "@!b.json#v1"}"#);
    write(&work, "conf/b.json", r#"{"v": 1}"#);
    git(&work, &["add", "."]);
    git(&work, &["commit", "-q", "-m", "first"]);
    git(&work, &["tag", "v1"]);

    write(&work, "conf/b.json", r#"{"v": 2}"#);
    git(&work, &["commit", "-q", "-am", "second"]);

    // Working tree edits are never read
    write(&work, "conf/b.json", r#"{"v": 3}"#);

    git(root, &["clone", "-q", "--bare", "work", "store.git"]);
}

fn path_str(root: &Path, name: &str) -> String {
    root.join(name).display().to_string()
}

#[tokio::test]
async fn test_checked_out_repository_reads_main_branch() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let value = Loader::new()
        .load(&path_str(dir.path(), "work/conf/a.json"), &Variables::new(), true)
        .await
        .unwrap();

    assert_eq!(value, json!({"b": {"v": 2}, "first": {"v": 1}}));
}

#[tokio::test]
async fn test_checked_out_repository_at_revision() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let value = Loader::new()
        .load(
            &format!("{}#v1", path_str(dir.path(), "work/conf/a.json")),
            &Variables::new(),
            true,
        )
        .await
        .unwrap();

    assert_eq!(value, json!({"b": {"v": 1}, "first": {"v": 1}}));
}

#[tokio::test]
async fn test_bare_repository_revisions_differ() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let loader = Loader::new();
    let b = path_str(dir.path(), "store.git/conf/b.json");

    let old = loader
        .load(&format!("{}#v1", b), &Variables::new(), true)
        .await
        .unwrap();
    let new = loader.load(&b, &Variables::new(), true).await.unwrap();

    assert_eq!(old, json!({"v": 1}));
    assert_eq!(new, json!({"v": 2}));

    let source = loader.source(&b).await.unwrap();
    assert_eq!(source.repository_root(), Some(dir.path().join("store.git").as_path()));
    assert_eq!(source.file_path(), Path::new("conf/b.json"));
}

#[tokio::test]
async fn test_plain_document_references_bare_repository() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    write(
        dir.path(),
        "plain/main.json",
        r#"{"old": "@!../store.git/conf/b.json#${rev}", "new": "@!../store.git/conf/b.json", "gone": "@../store.git/conf/nope.json"}"#,
    );

    let value = Loader::new()
        .load(
            &path_str(dir.path(), "plain/main.json"),
            &Variables::new().with("rev", "v1"),
            true,
        )
        .await
        .unwrap();

    assert_eq!(value, json!({"old": {"v": 1}, "new": {"v": 2}, "gone": null}));
}

#[tokio::test]
async fn test_unknown_revision_reports_git_failure() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());

    let err = Loader::new()
        .load(
            &format!("{}#no-such-branch", path_str(dir.path(), "store.git/conf/b.json")),
            &Variables::new(),
            false,
        )
        .await
        .unwrap_err();

    match err.kind {
        jsonlink_core::ErrorKind::Io(jsonlink_core::IoFailure::Command {
            exit_code,
            stderr,
            ..
        }) => {
            assert_ne!(exit_code, Some(0));
            assert!(!stderr.is_empty());
        }
        other => panic!("unexpected error kind: {:?}", other),
    }
}
