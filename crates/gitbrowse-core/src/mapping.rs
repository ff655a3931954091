//! Line correspondence between two revisions of a file
//!
//! The mapping is reconstructed from git's porcelain word diff. Each source
//! line of a hunk ends with a `~` sentinel, so counting the added and removed
//! tokens between sentinels tells whether a line was inserted, deleted or
//! modified in place. A line that only differs by being blank produces an
//! empty group, which says nothing about its direction; those are resolved
//! with the `+`/`-` lines of an ordinary line diff, consumed in order.

use crate::git::{Backend, FileVersion};
use crate::history::HistoryError;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Bidirectional, partial mapping of line numbers between two revisions.
///
/// Lines are zero-based. A forward entry `i -> Some(j)` means line `i` of the
/// start revision is line `j` of the finish revision; `None` means it was
/// deleted. Both maps extend through the line count of their file, so the
/// position just past the last line is mapped as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMapping {
    forward: BTreeMap<usize, Option<usize>>,
    backward: BTreeMap<usize, Option<usize>>,
}

impl LineMapping {
    /// Mapping of a `len` line file onto itself
    pub fn identity(len: usize) -> Self {
        let mut mapping = Self::default();
        for line in 0..=len {
            mapping.pair(line, line);
        }
        mapping
    }

    /// Mapping between two files that share no lines, as when the file is
    /// absent from one of the revisions
    pub fn disjoint(start_len: usize, finish_len: usize) -> Self {
        let mut mapping = Self::default();
        for line in 0..start_len {
            mapping.deleted(line);
        }
        for line in 0..finish_len {
            mapping.inserted(line);
        }
        mapping.pair(start_len, finish_len);
        mapping
    }

    /// Where line `line` of the start revision ended up, if it survived
    pub fn map_forward(&self, line: usize) -> Option<usize> {
        self.forward.get(&line).copied().flatten()
    }

    /// Where line `line` of the finish revision came from, if it existed
    pub fn map_backward(&self, line: usize) -> Option<usize> {
        self.backward.get(&line).copied().flatten()
    }

    /// Every start line, in order, with its correspondent
    pub fn forward(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.forward.iter().map(|(line, target)| (*line, *target))
    }

    /// Every finish line, in order, with its correspondent
    pub fn backward(&self) -> impl Iterator<Item = (usize, Option<usize>)> + '_ {
        self.backward.iter().map(|(line, target)| (*line, *target))
    }

    /// The same correspondence seen from the finish revision
    pub fn inverted(&self) -> Self {
        Self {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
        }
    }

    fn pair(&mut self, start: usize, finish: usize) {
        self.forward.insert(start, Some(finish));
        self.backward.insert(finish, Some(start));
    }

    fn deleted(&mut self, start: usize) {
        self.forward.insert(start, None);
    }

    fn inserted(&mut self, finish: usize) {
        self.backward.insert(finish, None);
    }
}

/// One `@@ -a,b +c,d @@` section of a word diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub start_line: usize,
    pub start_count: usize,
    pub finish_line: usize,
    pub finish_count: usize,
    /// Token lines after the header, `~` included
    pub body: Vec<String>,
}

impl Hunk {
    /// Zero-based `(first, end)` lines covered on the start side
    fn start_range(&self) -> (usize, usize) {
        covered(self.start_line, self.start_count)
    }

    /// Zero-based `(first, end)` lines covered on the finish side
    fn finish_range(&self) -> (usize, usize) {
        covered(self.finish_line, self.finish_count)
    }
}

/// An empty range names the line it follows rather than its first line
fn covered(line: usize, count: usize) -> (usize, usize) {
    let first = if count == 0 {
        line
    } else {
        line.saturating_sub(1)
    };
    (first, first + count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlankLine {
    Added,
    Removed,
}

/// Build the mapping between two versions of a file, querying the backend.
/// `None` stands for a revision where the file does not exist.
pub fn build_line_mapping<B: Backend + ?Sized>(
    backend: &B,
    start: Option<FileVersion<'_>>,
    finish: Option<FileVersion<'_>>,
) -> Result<LineMapping, HistoryError> {
    let (start, finish) = match (start, finish) {
        (Some(start), Some(finish)) => (start, finish),
        (start, finish) => {
            let start_len = start.map(|v| file_length(backend, v)).transpose()?;
            let finish_len = finish.map(|v| file_length(backend, v)).transpose()?;
            debug!(?start_len, ?finish_len, "file absent on one side");
            return Ok(LineMapping::disjoint(
                start_len.unwrap_or(0),
                finish_len.unwrap_or(0),
            ));
        }
    };

    if start.revision == finish.revision {
        return Ok(LineMapping::identity(file_length(backend, start)?));
    }

    let blank_lines = backend
        .line_diff(start, finish)
        .map(|diff| parse_blank_lines(&diff))
        .map_err(|e| HistoryError::CorrespondenceParse(e.to_string()))?;

    let hunks = backend
        .word_diff(start, finish)
        .map_err(|e| HistoryError::CorrespondenceParse(e.to_string()))
        .and_then(|diff| parse_word_diff(&diff))?;

    let start_len = file_length(backend, start)?;
    let finish_len = file_length(backend, finish)?;

    debug!(
        start = start.revision,
        finish = finish.revision,
        hunks = hunks.len(),
        blank_lines = blank_lines.len(),
        "building line mapping"
    );

    compute_mapping(&hunks, blank_lines, start_len, finish_len)
}

fn file_length<B: Backend + ?Sized>(
    backend: &B,
    file: FileVersion<'_>,
) -> Result<usize, HistoryError> {
    backend
        .file_at(file)
        .map(|content| content.lines().count())
        .map_err(|e| HistoryError::CorrespondenceParse(e.to_string()))
}

/// Collect the lines of a unified diff that are wholly `+` or `-`
pub fn parse_blank_lines(diff: &str) -> VecDeque<BlankLine> {
    diff.lines()
        .filter_map(|line| match line.trim_end_matches('\r') {
            "+" => Some(BlankLine::Added),
            "-" => Some(BlankLine::Removed),
            _ => None,
        })
        .collect()
}

/// Split a porcelain word diff into hunks, skipping the file headers
pub fn parse_word_diff(diff: &str) -> Result<Vec<Hunk>, HistoryError> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in diff.lines() {
        if line.starts_with("@@") {
            hunks.push(parse_hunk_header(line)?);
        } else if let Some(hunk) = hunks.last_mut() {
            hunk.body.push(line.trim_end_matches('\r').to_string());
        }
    }

    Ok(hunks)
}

fn parse_hunk_header(line: &str) -> Result<Hunk, HistoryError> {
    let bad_header = || HistoryError::CorrespondenceParse(format!("bad hunk header: {line}"));

    let mut ranges = line.trim_start_matches('@').split_whitespace();
    let start = ranges
        .next()
        .and_then(|r| r.strip_prefix('-'))
        .ok_or_else(bad_header)?;
    let finish = ranges
        .next()
        .and_then(|r| r.strip_prefix('+'))
        .ok_or_else(bad_header)?;

    let (start_line, start_count) = parse_range(start).ok_or_else(bad_header)?;
    let (finish_line, finish_count) = parse_range(finish).ok_or_else(bad_header)?;

    Ok(Hunk {
        start_line,
        start_count,
        finish_line,
        finish_count,
        body: Vec::new(),
    })
}

/// `a,b` or `a` (count defaults to one)
fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((line, count)) => Some((line.parse().ok()?, count.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Walk the hunks and produce the mapping in both directions at once
pub fn compute_mapping(
    hunks: &[Hunk],
    mut blank_lines: VecDeque<BlankLine>,
    start_len: usize,
    finish_len: usize,
) -> Result<LineMapping, HistoryError> {
    let mut mapping = LineMapping::default();
    let mut start_ln = 0usize;
    let mut finish_ln = 0usize;

    for hunk in hunks {
        let (start_first, start_end) = hunk.start_range();
        let (finish_first, finish_end) = hunk.finish_range();
        let location = || {
            format!(
                "-{},{} +{},{}",
                hunk.start_line, hunk.start_count, hunk.finish_line, hunk.finish_count
            )
        };

        // Untouched lines before the hunk
        while start_ln < start_first && finish_ln < finish_first {
            mapping.pair(start_ln, finish_ln);
            start_ln += 1;
            finish_ln += 1;
        }

        let mut group_size = 0usize;
        let mut line_delta = 0isize;

        for token in &hunk.body {
            if token != "~" {
                if token.starts_with('+') {
                    line_delta += 1;
                } else if token.starts_with('-') {
                    line_delta -= 1;
                }
                group_size += 1;
                continue;
            }

            if group_size == 0 {
                match blank_lines.pop_front() {
                    Some(BlankLine::Added) => line_delta += 1,
                    Some(BlankLine::Removed) => line_delta -= 1,
                    None => {
                        return Err(HistoryError::CorrespondenceParse(format!(
                            "ran out of blank-line changes in hunk at {}",
                            location()
                        )))
                    }
                }
            }

            match line_delta {
                1 => {
                    mapping.inserted(finish_ln);
                    finish_ln += 1;
                }
                -1 => {
                    mapping.deleted(start_ln);
                    start_ln += 1;
                }
                _ => {
                    mapping.pair(start_ln, finish_ln);
                    start_ln += 1;
                    finish_ln += 1;
                }
            }

            group_size = 0;
            line_delta = 0;
        }

        if start_ln > start_end || finish_ln > finish_end {
            return Err(HistoryError::CorrespondenceParse(format!(
                "hunk at {} spans more lines than its header",
                location()
            )));
        }

        // A line edited by appending or dropping words reads as one-sided;
        // whatever the body left unclaimed has no correspondent
        while start_ln < start_end {
            mapping.deleted(start_ln);
            start_ln += 1;
        }
        while finish_ln < finish_end {
            mapping.inserted(finish_ln);
            finish_ln += 1;
        }
    }

    // Untouched lines after the last hunk, through one past the end
    while start_ln <= start_len && finish_ln <= finish_len {
        mapping.pair(start_ln, finish_ln);
        start_ln += 1;
        finish_ln += 1;
    }

    Ok(mapping)
}
