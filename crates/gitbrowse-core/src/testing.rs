//! Canned five-commit history of `example.txt`, served without a repository
//!
//! | commit | message | contents                                                     |
//! |--------|---------|--------------------------------------------------------------|
//! | 4      | First   | first, second, third, fourth, fifth                          |
//! | 3      | Second  | first, fourth, fifth                                         |
//! | 2      | Third   | another, yet another, first, fourth, fifth                   |
//! | 1      | Fourth  | another, (blank), yet another, first, fourth, (blank), fifth |
//! | 0      | Fifth   | another, (blank), yet another, first, fourth, fifth          |

use crate::git::{Backend, FileVersion, GitError};
use crate::history::FileHistory;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::path::Path;

/// Revision ids, newest first
pub const FIXTURE_REVISIONS: [&str; 5] = [
    "5555555555555555555555555555555555555555",
    "4444444444444444444444444444444444444444",
    "3333333333333333333333333333333333333333",
    "2222222222222222222222222222222222222222",
    "1111111111111111111111111111111111111111",
];

const MESSAGES: [&str; 5] = ["Fifth", "Fourth", "Third", "Second", "First"];

/// (text, index of the attributing commit) per line, per commit
const BLAME: [&[(&str, usize)]; 5] = [
    &[
        ("another", 2),
        ("", 1),
        ("yet another", 2),
        ("first", 4),
        ("fourth", 4),
        ("fifth", 4),
    ],
    &[
        ("another", 2),
        ("", 1),
        ("yet another", 2),
        ("first", 4),
        ("fourth", 4),
        ("", 1),
        ("fifth", 4),
    ],
    &[
        ("another", 2),
        ("yet another", 2),
        ("first", 4),
        ("fourth", 4),
        ("fifth", 4),
    ],
    &[("first", 4), ("fourth", 4), ("fifth", 4)],
    &[
        ("first", 4),
        ("second", 4),
        ("third", 4),
        ("fourth", 4),
        ("fifth", 4),
    ],
];

/// (start, finish, word diff, line diff) between neighbouring commits
const DIFFS: &[(usize, usize, &str, &str)] = &[
    (
        4,
        3,
        "@@ -1,5 +1,3 @@\n first\n~\n-second\n~\n-third\n~\n fourth\n~\n fifth\n~\n",
        "@@ -1,5 +1,3 @@\n first\n-second\n-third\n fourth\n fifth\n",
    ),
    (
        3,
        4,
        "@@ -1,3 +1,5 @@\n first\n~\n+second\n~\n+third\n~\n fourth\n~\n fifth\n~\n",
        "@@ -1,3 +1,5 @@\n first\n+second\n+third\n fourth\n fifth\n",
    ),
    (
        3,
        2,
        "@@ -1,3 +1,5 @@\n+another\n~\n+yet another\n~\n first\n~\n fourth\n~\n fifth\n~\n",
        "@@ -1,3 +1,5 @@\n+another\n+yet another\n first\n fourth\n fifth\n",
    ),
    (
        2,
        3,
        "@@ -1,5 +1,3 @@\n-another\n~\n-yet another\n~\n first\n~\n fourth\n~\n fifth\n~\n",
        "@@ -1,5 +1,3 @@\n-another\n-yet another\n first\n fourth\n fifth\n",
    ),
    (
        2,
        1,
        "@@ -1,5 +1,7 @@\n another\n~\n~\n yet another\n~\n first\n~\n fourth\n~\n~\n fifth\n~\n",
        "@@ -1,5 +1,7 @@\n another\n+\n yet another\n first\n fourth\n+\n fifth\n",
    ),
    (
        1,
        2,
        "@@ -1,7 +1,5 @@\n another\n~\n~\n yet another\n~\n first\n~\n fourth\n~\n~\n fifth\n~\n",
        "@@ -1,7 +1,5 @@\n another\n-\n yet another\n first\n fourth\n-\n fifth\n",
    ),
    (
        1,
        0,
        "@@ -3,5 +3,4 @@\n yet another\n~\n first\n~\n fourth\n~\n~\n fifth\n~\n",
        "@@ -3,5 +3,4 @@\n yet another\n first\n fourth\n-\n fifth\n",
    ),
    (
        0,
        1,
        "@@ -3,4 +3,5 @@\n yet another\n~\n first\n~\n fourth\n~\n~\n fifth\n~\n",
        "@@ -3,4 +3,5 @@\n yet another\n first\n fourth\n+\n fifth\n",
    ),
];

/// Backend answering from the tables above and counting the queries it serves
#[derive(Debug, Default)]
pub struct FixtureBackend {
    empty: bool,
    calls: RefCell<FxHashMap<&'static str, usize>>,
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose log is empty, as for a path no commit touched
    pub fn empty() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    /// Number of times the query `name` was issued
    pub fn calls(&self, name: &str) -> usize {
        self.calls.borrow().get(name).copied().unwrap_or(0)
    }

    fn record(&self, name: &'static str) {
        *self.calls.borrow_mut().entry(name).or_insert(0) += 1;
    }

    fn commit_index(revision: &str) -> Result<usize, GitError> {
        FIXTURE_REVISIONS
            .iter()
            .position(|rev| *rev == revision)
            .ok_or_else(|| GitError::CommandFailed(format!("bad revision {}", revision)))
    }

    fn diff(&self, start: &str, finish: &str) -> Result<(&'static str, &'static str), GitError> {
        let start = Self::commit_index(start)?;
        let finish = Self::commit_index(finish)?;
        DIFFS
            .iter()
            .find(|(s, f, _, _)| *s == start && *f == finish)
            .map(|(_, _, word, line)| (*word, *line))
            .ok_or_else(|| GitError::CommandFailed(format!("no diff for {} {}", start, finish)))
    }
}

impl Backend for FixtureBackend {
    fn log(&self, _path: &Path, _start: &str) -> Result<String, GitError> {
        self.record("log");
        if self.empty {
            return Ok(String::new());
        }
        let mut out = String::new();
        for (index, (rev, message)) in FIXTURE_REVISIONS.iter().zip(MESSAGES).enumerate() {
            let status = if index == FIXTURE_REVISIONS.len() - 1 { "A" } else { "M" };
            out.push_str(&format!(
                "\x1e{}\nTester\n{}\n\n{}\texample.txt\n",
                rev, message, status
            ));
        }
        Ok(out)
    }

    fn blame(&self, file: FileVersion<'_>) -> Result<String, GitError> {
        self.record("blame");
        let index = Self::commit_index(file.revision)?;
        let mut seen = Vec::new();
        let mut out = String::new();
        for (line_no, (text, author_index)) in BLAME[index].iter().enumerate() {
            let rev = FIXTURE_REVISIONS[*author_index];
            out.push_str(&format!("{} {} {}\n", rev, line_no + 1, line_no + 1));
            if !seen.contains(author_index) {
                seen.push(*author_index);
                out.push_str("author Tester\n");
                out.push_str(&format!("summary {}\n", MESSAGES[*author_index]));
                out.push_str("filename example.txt\n");
            }
            out.push_str(&format!("\t{}\n", text));
        }
        Ok(out)
    }

    fn word_diff(
        &self,
        start: FileVersion<'_>,
        finish: FileVersion<'_>,
    ) -> Result<String, GitError> {
        self.record("word_diff");
        self.diff(start.revision, finish.revision).map(|(word, _)| word.to_string())
    }

    fn line_diff(
        &self,
        start: FileVersion<'_>,
        finish: FileVersion<'_>,
    ) -> Result<String, GitError> {
        self.record("line_diff");
        self.diff(start.revision, finish.revision).map(|(_, line)| line.to_string())
    }

    fn file_at(&self, file: FileVersion<'_>) -> Result<String, GitError> {
        self.record("file_at");
        let index = Self::commit_index(file.revision)?;
        Ok(BLAME[index]
            .iter()
            .map(|(text, _)| format!("{}\n", text))
            .collect())
    }
}

/// History positioned at the newest commit
pub fn fixture_history() -> FileHistory<FixtureBackend> {
    match FileHistory::new(FixtureBackend::new(), "example.txt", "HEAD") {
        Ok(history) => history,
        Err(err) => panic!("fixture history: {}", err),
    }
}
