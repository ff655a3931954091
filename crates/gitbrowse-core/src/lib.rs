//! gitbrowse-core: the history engine behind gitbrowse
//!
//! Walks the commits that touched one file, serves blame for each of them,
//! and works out how line numbers move between two revisions so a cursor can
//! stay on the same line while the history is browsed.

pub mod git;
pub mod history;
pub mod mapping;

#[cfg(any(test, feature = "test-fixture"))]
pub mod testing;

pub use git::{Backend, FileVersion, GitCli, GitError};
pub use history::{BlameLine, Commit, FileHistory, HistoryError};
pub use mapping::LineMapping;
