//! Following the history of a single file
//!
//! [`FileHistory`] owns the list of commits that touched a file, a cursor
//! into that list, and caches for blame output and line mappings.

use crate::git::{Backend, FileVersion, LOG_RECORD_SEPARATOR};
use crate::mapping::{build_line_mapping, LineMapping};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("No history for {path}: {reason}")]
    HistoryUnavailable { path: String, reason: String },
    #[error("Unexpected diff output: {0}")]
    CorrespondenceParse(String),
}

impl HistoryError {
    fn unavailable(path: &Path, reason: impl ToString) -> Self {
        HistoryError::HistoryUnavailable {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A commit that touched the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub author: String,
    /// First line of the commit message
    pub message: String,
    /// Name of the file at this commit
    pub path: PathBuf,
    /// True when this commit removed the file
    pub deleted: bool,
}

impl Commit {
    /// The file as this commit left it, or `None` if the commit deleted it
    pub fn version(&self) -> Option<FileVersion<'_>> {
        (!self.deleted).then(|| FileVersion {
            revision: &self.id,
            path: &self.path,
        })
    }

    pub fn short_id(&self, width: usize) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(width)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

/// Blame information for a single line of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameLine {
    /// Revision that last touched this line
    pub revision: String,
    /// Source line, including its trailing newline if it had one
    pub text: String,
    /// True when `revision` is the currently selected commit
    pub current: bool,
    /// Line number (1-based) in the attributing revision
    pub original_line: usize,
    /// Line number (1-based) in the file at the selected commit
    pub final_line: usize,
}

/// Cache key for a line mapping: (start revision, finish revision)
type RevisionPair = (String, String);

/// History of one file, walked one commit at a time
pub struct FileHistory<B: Backend> {
    backend: B,
    path: PathBuf,
    commits: Vec<Commit>,
    index: usize,
    blame_cache: FxHashMap<usize, Vec<BlameLine>>,
    mappings: FxHashMap<RevisionPair, LineMapping>,
}

impl<B: Backend> FileHistory<B> {
    /// Load the commits touching `path`, starting at `start` and going back
    pub fn new(backend: B, path: impl Into<PathBuf>, start: &str) -> Result<Self, HistoryError> {
        let path = path.into();
        let log = backend
            .log(&path, start)
            .map_err(|e| HistoryError::unavailable(&path, e))?;
        let commits = parse_log(&log, &path);

        if commits.is_empty() {
            return Err(HistoryError::unavailable(
                &path,
                format!("no commits touch it at {}", start),
            ));
        }
        info!(path = %path.display(), commits = commits.len(), "loaded file history");

        Ok(Self {
            backend,
            path,
            commits,
            index: 0,
            blame_cache: FxHashMap::default(),
            mappings: FxHashMap::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// All commits touching the file, newest first
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// Position of the current commit in [`Self::commits`]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_commit(&self) -> &Commit {
        &self.commits[self.index]
    }

    /// Move to the next more recent commit.
    /// Returns false if already at the newest commit.
    pub fn advance(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        debug!(index = self.index, "advanced to newer commit");
        true
    }

    /// Move to the next older commit.
    /// Returns false if already at the oldest commit.
    pub fn retreat(&mut self) -> bool {
        if self.index + 1 >= self.commits.len() {
            return false;
        }
        self.index += 1;
        debug!(index = self.index, "retreated to older commit");
        true
    }

    /// Blame for the file at the current commit
    pub fn blame(&mut self) -> Result<&[BlameLine], HistoryError> {
        let index = self.index;
        if !self.blame_cache.contains_key(&index) {
            let commit = &self.commits[index];
            let lines = match commit.version() {
                Some(file) => {
                    let output = self
                        .backend
                        .blame(file)
                        .map_err(|e| HistoryError::unavailable(&commit.path, e))?;
                    parse_blame(&output, &commit.id, &commit.path)?
                }
                None => Vec::new(),
            };
            debug!(
                revision = %commit.id,
                path = %commit.path.display(),
                lines = lines.len(),
                "blame loaded"
            );
            self.blame_cache.insert(index, lines);
        }
        Ok(self
            .blame_cache
            .get(&index)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Blame for the current commit if it has already been fetched
    pub fn cached_blame(&self) -> Option<&[BlameLine]> {
        self.blame_cache.get(&self.index).map(Vec::as_slice)
    }

    /// How lines moved between the file at `start` and at `finish`
    pub fn line_mapping(&mut self, start: &str, finish: &str) -> Result<&LineMapping, HistoryError> {
        let key = (start.to_string(), finish.to_string());
        if !self.mappings.contains_key(&key) {
            let reverse = (finish.to_string(), start.to_string());
            let mapping = match self.mappings.get(&reverse) {
                Some(known) => known.inverted(),
                None => {
                    debug!(start, finish, "line mapping cache miss");
                    let mapping = match self.cached_length(start, finish) {
                        Some(len) => LineMapping::identity(len),
                        None => build_line_mapping(
                            &self.backend,
                            self.version(start),
                            self.version(finish),
                        )?,
                    };
                    self.mappings.insert(reverse, mapping.inverted());
                    mapping
                }
            };
            self.mappings.insert(key.clone(), mapping);
        }
        Ok(&self.mappings[&key])
    }

    /// The file at revision `id`, under the name it had there. Revisions
    /// outside the history are looked up under the requested path.
    fn version<'a>(&'a self, id: &'a str) -> Option<FileVersion<'a>> {
        match self.commits.iter().find(|commit| commit.id == id) {
            Some(commit) => commit.version(),
            None => Some(FileVersion {
                revision: id,
                path: &self.path,
            }),
        }
    }

    /// Line count of the file when `start` and `finish` are the same
    /// commit and its blame is already loaded
    fn cached_length(&self, start: &str, finish: &str) -> Option<usize> {
        if start != finish {
            return None;
        }
        let index = self.commits.iter().position(|commit| commit.id == start)?;
        self.blame_cache.get(&index).map(Vec::len)
    }
}

/// Parse the records of [`Backend::log`].
///
/// The `--name-status` line of each record names the file at that commit,
/// which is the new name for a rename. A record without one keeps the name
/// of the newer commit before it, or `path` for the first record.
pub fn parse_log(output: &str, path: &Path) -> Vec<Commit> {
    let mut commits: Vec<Commit> = Vec::new();

    for record in output.split(LOG_RECORD_SEPARATOR) {
        let mut lines = record.lines();
        let id = match lines.next().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => continue,
        };
        let author = lines.next().unwrap_or_default().to_string();
        let message = lines.next().unwrap_or_default().to_string();

        let (path, deleted) = match lines.find_map(parse_name_status) {
            Some((status, name)) => (PathBuf::from(name), status.starts_with('D')),
            None => {
                let previous = commits.last().map(|commit| commit.path.clone());
                (previous.unwrap_or_else(|| path.to_path_buf()), false)
            }
        };

        commits.push(Commit {
            id,
            author,
            message,
            path,
            deleted,
        });
    }

    commits
}

/// `<status>\t<path>` or `<status>\t<old>\t<new>`
fn parse_name_status(line: &str) -> Option<(&str, &str)> {
    let mut fields = line.split('\t');
    let status = fields.next()?;
    let name = fields.last()?;
    Some((status, name))
}

/// Parse `git blame --porcelain` output.
///
/// Each line starts with a `<sha> <orig> <final>[ <group size>]` header,
/// optionally followed by commit metadata the first time a sha appears,
/// and ends with the source text prefixed by a tab. Output that breaks this
/// shape is reported against `path` rather than skipped.
pub fn parse_blame(
    output: &str,
    current: &str,
    path: &Path,
) -> Result<Vec<BlameLine>, HistoryError> {
    let mut lines = Vec::new();
    let mut header: Option<(String, usize, usize)> = None;

    for line in output.split_inclusive('\n') {
        if let Some(text) = line.strip_prefix('\t') {
            let (revision, original_line, final_line) = header.take().ok_or_else(|| {
                HistoryError::unavailable(
                    path,
                    format!("blame line without a header: {}", line.trim_end()),
                )
            })?;
            lines.push(BlameLine {
                current: revision == current,
                revision,
                text: text.to_string(),
                original_line,
                final_line,
            });
            continue;
        }

        if header.is_some() {
            // metadata: author, committer, summary, filename...
            continue;
        }

        header = Some(parse_blame_header(line).ok_or_else(|| {
            HistoryError::unavailable(path, format!("bad blame header: {}", line.trim_end()))
        })?);
    }

    if let Some((revision, _, final_line)) = header {
        return Err(HistoryError::unavailable(
            path,
            format!("blame of line {} by {} has no content", final_line, revision),
        ));
    }

    Ok(lines)
}

fn parse_blame_header(line: &str) -> Option<(String, usize, usize)> {
    let mut parts = line.split_whitespace();
    let revision = parts
        .next()
        .filter(|rev| rev.chars().all(|c| c.is_ascii_hexdigit()))?;
    let original = parts.next()?.parse().ok()?;
    let final_line = parts.next()?.parse().ok()?;
    Some((revision.to_string(), original, final_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitError;
    use crate::testing::{fixture_history, FixtureBackend, FIXTURE_REVISIONS};
    use std::cell::Cell;

    #[test]
    fn test_parse_log() {
        let output = "\x1eaaa\nAlice\nFix things\n\nM\tsrc/lib.rs\n\x1ebbb\nBob\nAdd things\n\nA\tsrc/lib.rs\n";
        let commits = parse_log(output, Path::new("src/lib.rs"));
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].id, "aaa");
        assert_eq!(commits[0].author, "Alice");
        assert_eq!(commits[0].message, "Fix things");
        assert_eq!(commits[0].path, Path::new("src/lib.rs"));
        assert!(!commits[0].deleted);
        assert_eq!(commits[1].id, "bbb");
        assert_eq!(commits[1].message, "Add things");
    }

    #[test]
    fn test_parse_log_empty_subject() {
        let output = "\x1eaaa\nAlice\n\n\nM\tf.txt\n\x1ebbb\nBob\nSecond\n\nA\tf.txt\n";
        let commits = parse_log(output, Path::new("f.txt"));
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].message, "");
        assert_eq!(commits[1].id, "bbb");
    }

    #[test]
    fn test_parse_log_follows_renames() {
        let output = "\
\x1eccc\nAlice\nEdit\n\nM\tnew.txt\n\
\x1ebbb\nBob\nRename\n\nR087\told.txt\tnew.txt\n\
\x1eaaa\nCarol\nCreate\n\nA\told.txt\n";
        let commits = parse_log(output, Path::new("new.txt"));
        let paths: Vec<_> = commits.iter().map(|c| c.path.as_path()).collect();
        assert_eq!(
            paths,
            vec![Path::new("new.txt"), Path::new("new.txt"), Path::new("old.txt")]
        );
        assert_eq!(
            commits[2].version(),
            Some(FileVersion {
                revision: "aaa",
                path: Path::new("old.txt"),
            })
        );
    }

    #[test]
    fn test_parse_log_marks_deletions() {
        let output = "\x1eccc\nA\nRestore\n\nA\tf.txt\n\x1ebbb\nB\nRemove\n\nD\tf.txt\n\x1eaaa\nC\nCreate\n\nA\tf.txt\n";
        let commits = parse_log(output, Path::new("f.txt"));
        assert!(!commits[0].deleted);
        assert!(commits[1].deleted);
        assert_eq!(commits[1].version(), None);
        assert!(!commits[2].deleted);
    }

    #[test]
    fn test_parse_log_without_status_keeps_newer_name() {
        let output = "\x1eccc\nA\nEdit\n\nM\tnew.txt\n\x1ebbb\nB\nMerge\n";
        let commits = parse_log(output, Path::new("requested.txt"));
        assert_eq!(commits[1].path, Path::new("new.txt"));

        let commits = parse_log("\x1eaaa\nA\nOnly\n", Path::new("requested.txt"));
        assert_eq!(commits[0].path, Path::new("requested.txt"));
    }

    #[test]
    fn test_parse_blame_skips_metadata() {
        let output = "\
abc 1 1 2
author Alice
author-mail <alice@example.com>
summary First
filename example.txt
\tfirst
abc 2 2
\tsecond
def 5 3 1
author Bob
summary Second
filename example.txt
\tthird
";
        let lines = parse_blame(output, "def", Path::new("example.txt")).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].revision, "abc");
        assert_eq!(lines[0].text, "first\n");
        assert!(!lines[0].current);
        assert_eq!(lines[1].text, "second\n");
        assert_eq!(lines[1].final_line, 2);
        assert_eq!(lines[2].revision, "def");
        assert_eq!(lines[2].original_line, 5);
        assert_eq!(lines[2].final_line, 3);
        assert!(lines[2].current);
    }

    #[test]
    fn test_parse_blame_keeps_leading_tabs_in_source() {
        let lines = parse_blame("abc 1 1 1\nfilename x\n\t\tindented\n", "abc", Path::new("x")).unwrap();
        assert_eq!(lines[0].text, "\tindented\n");
    }

    #[test]
    fn test_parse_blame_empty_output() {
        assert_eq!(parse_blame("", "abc", Path::new("x")).unwrap(), Vec::new());
    }

    #[test]
    fn test_parse_blame_rejects_malformed_output() {
        let path = Path::new("x");
        let malformed = [
            // content before any header
            "\tstray\n",
            // metadata where a header should be
            "abc 1 1 1\n\tfine\nauthor Alice\n\tline\n",
            // header without numbers
            "abc one 1\n\tline\n",
            // header with no content line
            "abc 1 1 1\n\tfine\nabc 2 2\nfilename x\n",
        ];
        for output in malformed {
            let result = parse_blame(output, "abc", path);
            assert!(
                matches!(result, Err(HistoryError::HistoryUnavailable { .. })),
                "{:?} parsed as {:?}",
                output,
                result
            );
        }
    }

    #[test]
    fn test_short_id() {
        let commit = Commit {
            id: "0123456789abcdef".to_string(),
            author: String::new(),
            message: String::new(),
            path: PathBuf::from("a.txt"),
            deleted: false,
        };
        assert_eq!(commit.short_id(7), "0123456");
        assert_eq!(commit.short_id(40), "0123456789abcdef");
    }

    #[test]
    fn test_commits_are_newest_first() {
        let history = fixture_history();
        let messages: Vec<_> = history.commits().iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["Fifth", "Fourth", "Third", "Second", "First"]);
    }

    #[test]
    fn test_empty_log_is_unavailable() {
        let backend = FixtureBackend::empty();
        let result = FileHistory::new(backend, "example.txt", "HEAD");
        assert!(matches!(result, Err(HistoryError::HistoryUnavailable { .. })));
    }

    #[test]
    fn test_navigation() {
        let mut history = fixture_history();
        assert_eq!(history.index(), 0);
        assert!(history.retreat());
        assert!(history.retreat());
        assert_eq!(history.current_commit().message, "Third");
        assert!(history.advance());
        assert_eq!(history.current_commit().message, "Fourth");
    }

    #[test]
    fn test_advance_at_newest_is_noop() {
        let mut history = fixture_history();
        assert!(!history.advance());
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn test_retreat_at_oldest_is_noop() {
        let mut history = fixture_history();
        for _ in 0..4 {
            assert!(history.retreat());
        }
        assert_eq!(history.index(), 4);
        assert_eq!(history.current_commit().message, "First");
        assert!(!history.retreat());
        assert_eq!(history.index(), 4);
    }

    #[test]
    fn test_blame_follows_current_commit() {
        let mut history = fixture_history();
        for _ in 0..4 {
            history.retreat();
        }
        let first = FIXTURE_REVISIONS[4];

        let blame = history.blame().unwrap();
        let texts: Vec<_> = blame.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first\n", "second\n", "third\n", "fourth\n", "fifth\n"]);
        assert!(blame.iter().all(|l| l.revision == first && l.current));

        history.advance();
        let blame = history.blame().unwrap();
        let texts: Vec<_> = blame.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["first\n", "fourth\n", "fifth\n"]);
        assert!(blame.iter().all(|l| l.revision == first && !l.current));
    }

    #[test]
    fn test_blame_is_cached_per_commit() {
        let mut history = fixture_history();
        history.blame().unwrap();
        history.retreat();
        history.blame().unwrap();
        history.advance();
        history.blame().unwrap();
        assert_eq!(history.backend().calls("blame"), 2);
    }

    #[test]
    fn test_cached_blame_is_per_commit() {
        let mut history = fixture_history();
        assert!(history.cached_blame().is_none());
        history.blame().unwrap();
        assert_eq!(history.cached_blame().map(<[BlameLine]>::len), Some(6));
        history.retreat();
        assert!(history.cached_blame().is_none());
        history.advance();
        assert!(history.cached_blame().is_some());
    }

    #[test]
    fn test_line_mapping_deleted_lines() {
        let mut history = fixture_history();
        let mapping = history
            .line_mapping(FIXTURE_REVISIONS[4], FIXTURE_REVISIONS[3])
            .unwrap();
        let expected: Vec<(usize, Option<usize>)> =
            vec![(0, Some(0)), (1, None), (2, None), (3, Some(1)), (4, Some(2)), (5, Some(3))];
        assert_eq!(mapping.forward().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_line_mapping_blank_line_deletions() {
        let mut history = fixture_history();
        let mapping = history
            .line_mapping(FIXTURE_REVISIONS[1], FIXTURE_REVISIONS[2])
            .unwrap();
        let expected: Vec<(usize, Option<usize>)> = vec![
            (0, Some(0)),
            (1, None),
            (2, Some(1)),
            (3, Some(2)),
            (4, Some(3)),
            (5, None),
            (6, Some(4)),
            (7, Some(5)),
        ];
        assert_eq!(mapping.forward().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_line_mapping_reverse_is_inverse_and_cached() {
        let mut history = fixture_history();
        let (a, b) = (FIXTURE_REVISIONS[2], FIXTURE_REVISIONS[1]);
        let forward = history.line_mapping(a, b).unwrap().clone();
        let backward = history.line_mapping(b, a).unwrap().clone();

        for (i, j) in forward.forward() {
            if let Some(j) = j {
                assert_eq!(backward.map_forward(j), Some(i));
            }
        }
        for (j, i) in backward.forward() {
            match i {
                Some(i) => assert_eq!(forward.map_forward(i), Some(j)),
                None => assert_eq!(forward.map_backward(j), None),
            }
        }
        assert_eq!(
            forward.backward().collect::<Vec<_>>(),
            backward.forward().collect::<Vec<_>>()
        );
        assert_eq!(history.backend().calls("word_diff"), 1);
    }

    #[test]
    fn test_line_mapping_same_revision_is_identity() {
        let mut history = fixture_history();
        history.blame().unwrap();
        let rev = FIXTURE_REVISIONS[0];
        let mapping = history.line_mapping(rev, rev).unwrap();
        for line in 0..=6 {
            assert_eq!(mapping.map_forward(line), Some(line));
            assert_eq!(mapping.map_backward(line), Some(line));
        }
        assert_eq!(mapping.map_forward(7), None);
        assert_eq!(history.backend().calls("word_diff"), 0);
        assert_eq!(history.backend().calls("file_at"), 0);
    }

    #[test]
    fn test_line_mapping_same_revision_reads_length_once() {
        let mut history = fixture_history();
        let rev = FIXTURE_REVISIONS[3];
        let mapping = history.line_mapping(rev, rev).unwrap();
        assert_eq!(mapping.forward().count(), 4);
        assert_eq!(mapping.map_forward(3), Some(3));
        assert_eq!(history.backend().calls("file_at"), 1);
        assert_eq!(history.backend().calls("word_diff"), 0);
        assert_eq!(history.backend().calls("line_diff"), 0);
    }

    /// History of `f.txt`: created, deleted, then restored
    #[derive(Default)]
    struct DeletionBackend {
        blames: Cell<usize>,
    }

    impl Backend for DeletionBackend {
        fn log(&self, _path: &Path, _start: &str) -> Result<String, GitError> {
            Ok("\x1eccc\nA\nRestore\n\nA\tf.txt\n\x1ebbb\nB\nRemove\n\nD\tf.txt\n\x1eaaa\nC\nCreate\n\nA\tf.txt\n".to_string())
        }

        fn blame(&self, file: FileVersion<'_>) -> Result<String, GitError> {
            self.blames.set(self.blames.get() + 1);
            Ok(format!("{} 1 1 1\nfilename f.txt\n\tback\n", file.revision))
        }

        fn word_diff(&self, _: FileVersion<'_>, _: FileVersion<'_>) -> Result<String, GitError> {
            Err(GitError::CommandFailed("no diff across a deletion".to_string()))
        }

        fn line_diff(&self, _: FileVersion<'_>, _: FileVersion<'_>) -> Result<String, GitError> {
            Err(GitError::CommandFailed("no diff across a deletion".to_string()))
        }

        fn file_at(&self, file: FileVersion<'_>) -> Result<String, GitError> {
            assert_ne!(file.revision, "bbb");
            Ok("back\n".to_string())
        }
    }

    #[test]
    fn test_deleted_file_has_empty_blame() {
        let mut history = FileHistory::new(DeletionBackend::default(), "f.txt", "HEAD").unwrap();
        assert_eq!(history.blame().unwrap().len(), 1);
        history.retreat();
        assert!(history.current_commit().deleted);
        assert!(history.blame().unwrap().is_empty());
        assert_eq!(history.backend().blames.get(), 1);
    }

    #[test]
    fn test_mapping_across_deletion_keeps_no_lines() {
        let mut history = FileHistory::new(DeletionBackend::default(), "f.txt", "HEAD").unwrap();
        let mapping = history.line_mapping("ccc", "bbb").unwrap();
        assert_eq!(mapping.forward().collect::<Vec<_>>(), vec![(0, None), (1, Some(0))]);

        let mapping = history.line_mapping("bbb", "ccc").unwrap();
        assert_eq!(mapping.map_forward(0), Some(1));
        assert_eq!(mapping.map_backward(0), None);
    }
}
