//! Git integration: the queries the history engine issues, and a `git` subprocess backend

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Not a git repository")]
    NotARepo,
    #[error("Git command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Separator written before every commit record of [`Backend::log`]
pub const LOG_RECORD_SEPARATOR: char = '\x1e';

/// A file as it is at one revision. Renames make the path differ between
/// revisions of the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion<'a> {
    pub revision: &'a str,
    pub path: &'a Path,
}

impl FileVersion<'_> {
    /// `<rev>:<path>`, naming the blob directly
    fn object(&self) -> String {
        format!("{}:{}", self.revision, git_path(self.path))
    }
}

/// Text-producing queries against a version-control backend.
///
/// Every method returns the raw output of the backend; parsing is done by
/// the history engine. Paths are relative to the repository root.
pub trait Backend {
    /// Commits touching `path` (following renames) starting at `start`,
    /// newest first. Each record is [`LOG_RECORD_SEPARATOR`] then
    /// `id\nauthor\nsubject\n`, then `--name-status` lines giving the
    /// file's name at that commit.
    fn log(&self, path: &Path, start: &str) -> Result<String, GitError>;

    /// Porcelain blame of the file.
    fn blame(&self, file: FileVersion<'_>) -> Result<String, GitError>;

    /// Porcelain word diff between two versions of the file.
    fn word_diff(&self, start: FileVersion<'_>, finish: FileVersion<'_>)
        -> Result<String, GitError>;

    /// Plain line diff between two versions of the file.
    fn line_diff(&self, start: FileVersion<'_>, finish: FileVersion<'_>)
        -> Result<String, GitError>;

    /// Contents of the file.
    fn file_at(&self, file: FileVersion<'_>) -> Result<String, GitError>;
}

/// Backend that shells out to the `git` binary inside a repository.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_root: PathBuf,
}

impl GitCli {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    fn run(&self, args: &[&str], path: Option<&Path>) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo_root).args(args);
        if let Some(path) = path {
            cmd.arg("--").arg(path);
        }
        debug!(?args, ?path, "running git");

        let output = cmd.output()?;
        if !output.status.success() {
            return Err(GitError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Backend for GitCli {
    fn log(&self, path: &Path, start: &str) -> Result<String, GitError> {
        self.run(
            &[
                "log",
                "--no-color",
                "--follow",
                "--name-status",
                "--pretty=format:%x1e%H%n%an%n%s",
                start,
            ],
            Some(path),
        )
    }

    fn blame(&self, file: FileVersion<'_>) -> Result<String, GitError> {
        self.run(&["blame", "--porcelain", file.revision], Some(file.path))
    }

    fn word_diff(
        &self,
        start: FileVersion<'_>,
        finish: FileVersion<'_>,
    ) -> Result<String, GitError> {
        self.run(
            &[
                "diff",
                "--no-color",
                "--no-ext-diff",
                "--word-diff=porcelain",
                &start.object(),
                &finish.object(),
            ],
            None,
        )
    }

    fn line_diff(
        &self,
        start: FileVersion<'_>,
        finish: FileVersion<'_>,
    ) -> Result<String, GitError> {
        self.run(
            &[
                "diff",
                "--no-color",
                "--no-ext-diff",
                &start.object(),
                &finish.object(),
            ],
            None,
        )
    }

    fn file_at(&self, file: FileVersion<'_>) -> Result<String, GitError> {
        self.run(&["show", "--no-color", &file.object()], None)
    }
}

/// Check if a directory is a git repository
pub fn is_git_repo(path: &Path) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(path)
        .arg("rev-parse")
        .arg("--git-dir")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get the root of the git repository
pub fn get_repo_root(path: &Path) -> Result<PathBuf, GitError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(path)
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()?;

    if !output.status.success() {
        return Err(GitError::NotARepo);
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(root))
}

/// Get the location of `path` inside the repository, relative to its root
pub fn get_repo_relative_path(path: &Path, cwd: &Path) -> Result<PathBuf, GitError> {
    if path.is_absolute() {
        let root = get_repo_root(path.parent().unwrap_or(path))?;
        let canonical_root = root.canonicalize()?;
        let canonical = path
            .parent()
            .map(|parent| parent.canonicalize())
            .transpose()?
            .map(|parent| parent.join(path.file_name().unwrap_or_default()))
            .unwrap_or_else(|| path.to_path_buf());
        return canonical
            .strip_prefix(&canonical_root)
            .map(Path::to_path_buf)
            .map_err(|_| GitError::NotARepo);
    }

    let output = Command::new("git")
        .arg("-C")
        .arg(cwd)
        .arg("rev-parse")
        .arg("--show-prefix")
        .output()?;

    if !output.status.success() {
        return Err(GitError::NotARepo);
    }

    let prefix = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(PathBuf::from(prefix).join(path))
}

/// Resolve a revision expression to a full commit id
pub fn resolve_revision(repo_root: &Path, revision: &str) -> Result<String, GitError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .arg("rev-parse")
        .arg("--verify")
        .arg("--quiet")
        .arg(format!("{}^{{commit}}", revision))
        .output()?;

    if !output.status.success() {
        return Err(GitError::CommandFailed(format!(
            "unknown revision: {}",
            revision
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check whether `path` exists in the tree of `revision`
pub fn path_exists_at(repo_root: &Path, revision: &str, path: &Path) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .arg("cat-file")
        .arg("-e")
        .arg(format!("{}:{}", revision, git_path(path)))
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Repository-relative path in the form git expects after `<rev>:`
fn git_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
