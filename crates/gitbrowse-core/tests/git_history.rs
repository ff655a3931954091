//! End-to-end checks against a real repository built with the `git` binary

use gitbrowse_core::{FileHistory, GitCli};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const VERSIONS: [(&str, &str); 5] = [
    ("First commit", "first\nsecond\nthird\nfourth\nfifth\n"),
    ("Second commit", "first\nfourth\nfifth\n"),
    ("Third commit", "another\nyet another\nfirst\nfourth\nfifth\n"),
    (
        "Fourth commit",
        "another\n\nyet another\nfirst\nfourth\n\nfifth\n",
    ),
    ("Fifth commit", "another\n\nyet another\nfirst\nfourth\nfifth\n"),
];

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Tester",
            "-c",
            "user.email=tester@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .output()
        .expect("run git");
    assert!(
        status.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&status.stderr)
    );
}

fn example_repo() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    git(dir.path(), &["init", "-q"]);
    for (message, contents) in VERSIONS {
        fs::write(dir.path().join("example.txt"), contents).expect("write file");
        git(dir.path(), &["add", "example.txt"]);
        git(dir.path(), &["commit", "-q", "-m", message]);
    }
    dir
}

fn open(dir: &TempDir) -> FileHistory<GitCli> {
    FileHistory::new(GitCli::new(dir.path()), "example.txt", "HEAD").expect("history")
}

#[test]
fn test_commits_and_navigation() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let mut history = open(&repo);

    let messages: Vec<_> = history.commits().iter().map(|c| c.message.clone()).collect();
    assert_eq!(
        messages,
        vec!["Fifth commit", "Fourth commit", "Third commit", "Second commit", "First commit"]
    );
    assert!(history.commits().iter().all(|c| c.author == "Tester"));

    assert!(!history.advance());
    for _ in 0..4 {
        assert!(history.retreat());
    }
    assert_eq!(history.index(), 4);
    assert!(!history.retreat());
    assert_eq!(history.index(), 4);
}

#[test]
fn test_blame_through_history() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let mut history = open(&repo);
    let ids: Vec<_> = history.commits().iter().map(|c| c.id.clone()).collect();
    for _ in 0..4 {
        history.retreat();
    }

    let blame = history.blame().expect("blame");
    let texts: Vec<_> = blame.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["first\n", "second\n", "third\n", "fourth\n", "fifth\n"]);
    assert!(blame.iter().all(|l| l.revision == ids[4] && l.current));

    history.advance();
    let blame = history.blame().expect("blame");
    let texts: Vec<_> = blame.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["first\n", "fourth\n", "fifth\n"]);
    assert!(blame.iter().all(|l| l.revision == ids[4] && !l.current));

    history.advance();
    history.advance();
    let blame = history.blame().expect("blame");
    let authors: Vec<_> = blame
        .iter()
        .map(|l| ids.iter().position(|id| *id == l.revision))
        .collect();
    assert_eq!(
        authors,
        vec![Some(2), Some(1), Some(2), Some(4), Some(4), Some(1), Some(4)]
    );
}

#[test]
fn test_line_mappings() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let mut history = open(&repo);
    let ids: Vec<_> = history.commits().iter().map(|c| c.id.clone()).collect();

    let mapping = history.line_mapping(&ids[4], &ids[3]).expect("mapping");
    let forward: Vec<_> = mapping.forward().collect();
    assert_eq!(
        forward,
        vec![(0, Some(0)), (1, None), (2, None), (3, Some(1)), (4, Some(2)), (5, Some(3))]
    );

    let mapping = history.line_mapping(&ids[1], &ids[2]).expect("mapping");
    let forward: Vec<_> = mapping.forward().collect();
    assert_eq!(
        forward,
        vec![
            (0, Some(0)),
            (1, None),
            (2, Some(1)),
            (3, Some(2)),
            (4, Some(3)),
            (5, None),
            (6, Some(4)),
            (7, Some(5)),
        ]
    );

    let reverse = history.line_mapping(&ids[2], &ids[1]).expect("mapping");
    let forward: Vec<_> = reverse.forward().collect();
    assert_eq!(
        forward,
        vec![(0, Some(0)), (1, Some(2)), (2, Some(3)), (3, Some(4)), (4, Some(6)), (5, Some(7))]
    );

    let identity = history.line_mapping(&ids[0], &ids[0]).expect("mapping");
    assert!((0..=6).all(|line| identity.map_forward(line) == Some(line)));
}

#[test]
fn test_history_follows_rename() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().expect("temp dir");
    let root = dir.path();
    git(root, &["init", "-q"]);
    fs::write(root.join("old.txt"), "alpha\nbeta\ngamma\ndelta\n").expect("write file");
    git(root, &["add", "old.txt"]);
    git(root, &["commit", "-q", "-m", "one"]);
    git(root, &["mv", "old.txt", "new.txt"]);
    git(root, &["commit", "-q", "-m", "rename"]);
    fs::write(root.join("new.txt"), "alpha\nbeta\ninserted\ngamma\ndelta\n").expect("write file");
    git(root, &["commit", "-q", "-a", "-m", "edit"]);

    let mut history = FileHistory::new(GitCli::new(root), "new.txt", "HEAD").expect("history");
    let messages: Vec<_> = history.commits().iter().map(|c| c.message.clone()).collect();
    assert_eq!(messages, vec!["edit", "rename", "one"]);
    assert_eq!(history.commits()[1].path, Path::new("new.txt"));
    assert_eq!(history.commits()[2].path, Path::new("old.txt"));
    let ids: Vec<_> = history.commits().iter().map(|c| c.id.clone()).collect();

    history.retreat();
    history.retreat();
    let blame = history.blame().expect("blame before the rename");
    let texts: Vec<_> = blame.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha\n", "beta\n", "gamma\n", "delta\n"]);
    assert!(blame.iter().all(|l| l.current));

    let mapping = history.line_mapping(&ids[2], &ids[1]).expect("mapping across rename");
    assert!((0..=4).all(|line| mapping.map_forward(line) == Some(line)));

    let mapping = history.line_mapping(&ids[1], &ids[0]).expect("mapping after rename");
    let forward: Vec<_> = mapping.forward().collect();
    assert_eq!(
        forward,
        vec![(0, Some(0)), (1, Some(1)), (2, Some(3)), (3, Some(4)), (4, Some(5))]
    );
    assert_eq!(mapping.map_backward(2), None);
}

#[test]
fn test_missing_path_has_no_history() {
    if !git_available() {
        return;
    }
    let repo = example_repo();
    let result = FileHistory::new(GitCli::new(repo.path()), "missing.txt", "HEAD");
    assert!(result.is_err());
}
