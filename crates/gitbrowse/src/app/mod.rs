//! Application state: the modal interface bound to a file's history

use crate::config::KeysConfig;
use crate::modal::{Action, Content, ModalInterface};
use crossterm::event::{KeyCode, KeyEvent};
use gitbrowse_core::{Backend, BlameLine, FileHistory, HistoryError};
use tracing::debug;

mod navigation;


/// Input modes of the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Forward,
    Reverse,
}

const SEARCH_TRIGGERS: [(char, SearchMode); 2] =
    [('/', SearchMode::Forward), ('?', SearchMode::Reverse)];

/// Commands handled by the browser rather than the modal interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BrowserCommand {
    NewerCommit,
    OlderCommit,
}

const COMMAND_BINDINGS: &[(KeyCode, BrowserCommand)] = &[
    (KeyCode::Char(']'), BrowserCommand::NewerCommit),
    (KeyCode::Char('['), BrowserCommand::OlderCommit),
];

/// What to do after the terminal has been restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitAction {
    Quit,
    /// Hand the terminal to `git show <id>`
    ShowCommit(String),
}

/// Exit keys, by what they do on the way out
#[derive(Debug, Clone, Default)]
pub struct ExitKeys {
    pub quit: Vec<KeyCode>,
    pub show_commit: Vec<KeyCode>,
    pub show_line_commit: Vec<KeyCode>,
}

impl From<&KeysConfig> for ExitKeys {
    fn from(config: &KeysConfig) -> Self {
        Self {
            quit: KeysConfig::key_codes(&config.quit),
            show_commit: KeysConfig::key_codes(&config.show_commit),
            show_line_commit: KeysConfig::key_codes(&config.show_line_commit),
        }
    }
}

impl Content for [BlameLine] {
    fn line_count(&self) -> usize {
        self.len()
    }

    fn line_text(&self, index: usize) -> &str {
        &self[index].text
    }
}

/// The main application state
pub struct App<B: Backend> {
    pub history: FileHistory<B>,
    pub modal: ModalInterface<SearchMode>,
    exit_keys: ExitKeys,
    /// Key that ended the session, once one has
    exit_key: Option<KeyCode>,
    /// Characters of the revision id shown per row
    pub id_width: usize,
    /// Columns a tab expands to
    pub tab_width: usize,
}

impl<B: Backend> App<B> {
    pub fn new(history: FileHistory<B>, exit_keys: ExitKeys) -> Self {
        let all_exit_keys = exit_keys
            .quit
            .iter()
            .chain(&exit_keys.show_commit)
            .chain(&exit_keys.show_line_commit)
            .copied()
            .collect();

        Self {
            history,
            modal: ModalInterface::new(SEARCH_TRIGGERS.to_vec(), all_exit_keys),
            exit_keys,
            exit_key: None,
            id_width: 7,
            tab_width: 4,
        }
    }

    /// Fetch the blame for the current commit so it can be drawn
    pub fn load(&mut self) -> Result<(), HistoryError> {
        self.history.blame().map(|_| ())
    }

    /// Blame lines shown right now (empty until loaded)
    pub fn lines(&self) -> &[BlameLine] {
        self.history.cached_blame().unwrap_or_default()
    }

    pub fn exit_key(&self) -> Option<KeyCode> {
        self.exit_key
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Result<(), HistoryError> {
        let action = {
            let content = self.history.blame()?;
            self.modal.handle_key(key, content)
        };

        match action {
            Action::None => {}
            Action::Command { key, count } => {
                let command = COMMAND_BINDINGS
                    .iter()
                    .find(|(code, _)| *code == key)
                    .map(|(_, command)| *command);
                match command {
                    Some(BrowserCommand::NewerCommit) => self.newer_commit(count)?,
                    Some(BrowserCommand::OlderCommit) => self.older_commit(count)?,
                    None => debug!(?key, "unbound key"),
                }
            }
            Action::Input { mode, data } => {
                let content = self.history.blame()?;
                self.modal
                    .begin_search(data, mode == SearchMode::Reverse, content);
            }
            Action::Exit(key) => {
                self.exit_key = Some(key);
            }
        }

        Ok(())
    }

    /// The final action for the key that ended the session
    pub fn exit_action(&self) -> ExitAction {
        let Some(key) = self.exit_key else {
            return ExitAction::Quit;
        };

        if self.exit_keys.show_commit.contains(&key) {
            return ExitAction::ShowCommit(self.history.current_commit().id.clone());
        }
        if self.exit_keys.show_line_commit.contains(&key) {
            let id = self
                .lines()
                .get(self.modal.state.highlight_line)
                .map(|line| line.revision.clone())
                .unwrap_or_else(|| self.history.current_commit().id.clone());
            return ExitAction::ShowCommit(id);
        }
        ExitAction::Quit
    }

    /// `path @ id by author: message` for the current commit, with the
    /// file's name at that commit
    pub fn status_text(&self) -> String {
        let commit = self.history.current_commit();
        format!(
            "{} @ {} by {}: {}",
            commit.path.display(),
            commit.short_id(self.id_width),
            commit.author,
            commit.message,
        )
    }

    /// Position of the current commit, oldest being 1
    pub fn position_text(&self) -> String {
        let total = self.history.commits().len();
        format!("[{}/{}]", total - self.history.index(), total)
    }

    pub fn search_term(&self) -> Option<&str> {
        self.modal
            .state
            .search
            .as_ref()
            .map(|search| search.term.as_str())
            .filter(|term| !term.is_empty())
    }
}
