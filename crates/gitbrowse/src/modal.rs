//! Modal keyboard interface in the style of less
//!
//! In command mode keys are commands, optionally preceded by a count typed
//! as digits. A registered trigger key switches to one of the caller's input
//! modes, where keys are collected into a line until Enter commits it or
//! Escape throws it away. The interface also owns the scroll position and
//! the highlighted row, and keeps the highlight inside the content and on
//! screen whenever it moves.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

/// Lines the interface scrolls over and searches
pub trait Content {
    fn line_count(&self) -> usize;
    fn line_text(&self, index: usize) -> &str;
}

/// Current interface mode; `M` is the caller's set of input modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode<M> {
    Command,
    Input(M),
}

/// Commands the interface runs itself, all taking the count as a repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    LineDown,
    LineUp,
    PageDown,
    PageUp,
    HalfPageDown,
    HalfPageUp,
    /// First line, or line N with a count
    Top,
    /// Last line, or line N with a count
    Bottom,
    /// Repeat the last search in its direction
    NextMatch,
    /// Repeat the last search in the opposite direction
    PrevMatch,
}

const NAV_BINDINGS: &[(KeyCode, KeyModifiers, NavCommand)] = &[
    (KeyCode::Char('j'), KeyModifiers::NONE, NavCommand::LineDown),
    (KeyCode::Down, KeyModifiers::NONE, NavCommand::LineDown),
    (KeyCode::Enter, KeyModifiers::NONE, NavCommand::LineDown),
    (KeyCode::Char('k'), KeyModifiers::NONE, NavCommand::LineUp),
    (KeyCode::Up, KeyModifiers::NONE, NavCommand::LineUp),
    (KeyCode::Char('f'), KeyModifiers::NONE, NavCommand::PageDown),
    (KeyCode::Char('f'), KeyModifiers::CONTROL, NavCommand::PageDown),
    (KeyCode::Char(' '), KeyModifiers::NONE, NavCommand::PageDown),
    (KeyCode::PageDown, KeyModifiers::NONE, NavCommand::PageDown),
    (KeyCode::Char('b'), KeyModifiers::NONE, NavCommand::PageUp),
    (KeyCode::Char('b'), KeyModifiers::CONTROL, NavCommand::PageUp),
    (KeyCode::PageUp, KeyModifiers::NONE, NavCommand::PageUp),
    (KeyCode::Char('d'), KeyModifiers::CONTROL, NavCommand::HalfPageDown),
    (KeyCode::Char('u'), KeyModifiers::CONTROL, NavCommand::HalfPageUp),
    (KeyCode::Char('g'), KeyModifiers::NONE, NavCommand::Top),
    (KeyCode::Home, KeyModifiers::NONE, NavCommand::Top),
    (KeyCode::Char('G'), KeyModifiers::NONE, NavCommand::Bottom),
    (KeyCode::End, KeyModifiers::NONE, NavCommand::Bottom),
    (KeyCode::Char('n'), KeyModifiers::NONE, NavCommand::NextMatch),
    (KeyCode::Char('N'), KeyModifiers::NONE, NavCommand::PrevMatch),
];

fn binding_matches(key: &KeyEvent, code: KeyCode, modifiers: KeyModifiers) -> bool {
    key.code == code
        && key.modifiers.contains(KeyModifiers::CONTROL)
            == modifiers.contains(KeyModifiers::CONTROL)
}

/// What the caller should do after a key was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<M> {
    /// Handled internally (or ignored); just redraw
    None,
    /// A command key the interface doesn't know, with its count
    Command { key: KeyCode, count: usize },
    /// A line committed in an input mode
    Input { mode: M, data: String },
    /// One of the exit keys was pressed
    Exit(KeyCode),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Search {
    pub term: String,
    pub reverse: bool,
}

#[derive(Debug, Clone)]
pub struct InterfaceState<M> {
    /// First visible content row
    pub scroll_line: usize,
    /// Selected content row
    pub highlight_line: usize,
    pub mode: Mode<M>,
    /// Digits typed before a command
    pub numeric_prefix: Option<usize>,
    /// Line being typed in an input mode
    pub input: String,
    /// Rows available for content
    pub viewport_height: usize,
    pub search: Option<Search>,
    bell: bool,
}

impl<M> Default for InterfaceState<M> {
    fn default() -> Self {
        Self {
            scroll_line: 0,
            highlight_line: 0,
            mode: Mode::Command,
            numeric_prefix: None,
            input: String::new(),
            viewport_height: 1,
            search: None,
            bell: false,
        }
    }
}

/// Largest scroll offset that still fills the viewport
pub(crate) fn max_scroll(total_lines: usize, viewport_height: usize) -> usize {
    total_lines.saturating_sub(viewport_height)
}

pub struct ModalInterface<M> {
    pub state: InterfaceState<M>,
    mode_triggers: Vec<(char, M)>,
    exit_keys: Vec<KeyCode>,
}

impl<M: Copy + PartialEq + std::fmt::Debug> ModalInterface<M> {
    pub fn new(mode_triggers: Vec<(char, M)>, exit_keys: Vec<KeyCode>) -> Self {
        Self {
            state: InterfaceState::default(),
            mode_triggers,
            exit_keys,
        }
    }

    pub fn mode(&self) -> Mode<M> {
        self.state.mode
    }

    /// Trigger key of an input mode, for echoing a prompt
    pub fn trigger_for(&self, mode: M) -> Option<char> {
        self.mode_triggers
            .iter()
            .find(|(_, m)| *m == mode)
            .map(|(c, _)| *c)
    }

    pub fn ring_bell(&mut self) {
        self.state.bell = true;
    }

    /// Whether a failure was signalled since the last call
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.state.bell)
    }

    pub fn handle_key<C: Content + ?Sized>(&mut self, key: KeyEvent, content: &C) -> Action<M> {
        match self.state.mode {
            Mode::Command => self.handle_command_key(key, content),
            Mode::Input(mode) => self.handle_input_key(key, mode),
        }
    }

    fn handle_command_key<C: Content + ?Sized>(&mut self, key: KeyEvent, content: &C) -> Action<M> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char(c @ '0'..='9') if !ctrl => {
                self.push_count_digit(c as u8 - b'0');
                return Action::None;
            }
            KeyCode::Backspace => {
                self.state.numeric_prefix = self.state.numeric_prefix.map(|n| n / 10).filter(|n| *n > 0);
                return Action::None;
            }
            KeyCode::Esc => {
                self.reset_count();
                return Action::None;
            }
            _ => {}
        }

        if let KeyCode::Char(c) = key.code {
            if !ctrl {
                if let Some(&(_, mode)) = self.mode_triggers.iter().find(|(t, _)| *t == c) {
                    self.reset_count();
                    self.state.input.clear();
                    self.state.mode = Mode::Input(mode);
                    debug!(?mode, "entered input mode");
                    return Action::None;
                }
            }
        }

        if !ctrl && self.exit_keys.contains(&key.code) {
            self.reset_count();
            return Action::Exit(key.code);
        }

        let explicit = self.state.numeric_prefix.take();
        let count = explicit.unwrap_or(1);

        if let Some(&(_, _, command)) = NAV_BINDINGS
            .iter()
            .find(|(code, modifiers, _)| binding_matches(&key, *code, *modifiers))
        {
            self.run(command, count, explicit, content);
            return Action::None;
        }

        Action::Command {
            key: key.code,
            count,
        }
    }

    fn handle_input_key(&mut self, key: KeyEvent, mode: M) -> Action<M> {
        match key.code {
            KeyCode::Enter => {
                self.state.mode = Mode::Command;
                let data = std::mem::take(&mut self.state.input);
                Action::Input { mode, data }
            }
            KeyCode::Esc => {
                self.state.mode = Mode::Command;
                self.state.input.clear();
                Action::None
            }
            KeyCode::Backspace => {
                self.state.input.pop();
                Action::None
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.state.input.push(c);
                Action::None
            }
            _ => Action::None,
        }
    }

    /// Add a digit to the pending count
    pub fn push_count_digit(&mut self, digit: u8) {
        let current = self.state.numeric_prefix.unwrap_or(0);
        let new_count = current.saturating_mul(10).saturating_add(digit as usize);
        self.state.numeric_prefix = Some(new_count.min(9999));
    }

    pub fn reset_count(&mut self) {
        self.state.numeric_prefix = None;
    }

    pub fn run<C: Content + ?Sized>(
        &mut self,
        command: NavCommand,
        count: usize,
        explicit: Option<usize>,
        content: &C,
    ) {
        let len = content.line_count();
        let height = self.state.viewport_height.max(1);
        let signed = |n: usize| isize::try_from(n).unwrap_or(isize::MAX);

        match command {
            NavCommand::LineDown => {
                self.move_highlight(signed(count), len);
            }
            NavCommand::LineUp => {
                self.move_highlight(-signed(count), len);
            }
            NavCommand::PageDown => {
                self.move_highlight(signed(count.saturating_mul(height)), len);
            }
            NavCommand::PageUp => {
                self.move_highlight(-signed(count.saturating_mul(height)), len);
            }
            NavCommand::HalfPageDown => {
                self.move_highlight(signed(count.saturating_mul((height / 2).max(1))), len);
            }
            NavCommand::HalfPageUp => {
                self.move_highlight(-signed(count.saturating_mul((height / 2).max(1))), len);
            }
            NavCommand::Top => {
                let line = explicit.map(|n| n.saturating_sub(1)).unwrap_or(0);
                self.set_highlight(line, len);
            }
            NavCommand::Bottom => {
                let line = explicit
                    .map(|n| n.saturating_sub(1))
                    .unwrap_or(len.saturating_sub(1));
                self.set_highlight(line, len);
            }
            NavCommand::NextMatch => {
                self.repeat_search(false, count, content);
            }
            NavCommand::PrevMatch => {
                self.repeat_search(true, count, content);
            }
        }
    }

    /// Move the highlight by `delta` rows, stopping at either end.
    /// Rings the bell and returns false if it is already at that end.
    pub fn move_highlight(&mut self, delta: isize, len: usize) -> bool {
        if len == 0 {
            self.ring_bell();
            return false;
        }
        let last = len - 1;
        let current = self.state.highlight_line.min(last);
        let target = current.saturating_add_signed(delta).min(last);
        if target == current && delta != 0 {
            self.ring_bell();
            return false;
        }
        self.set_highlight(target, len);
        true
    }

    /// Put the highlight on `line` (clamped to the content) and scroll so it
    /// stays visible. When it leaves the window the window follows it by the
    /// same number of rows, never scrolling past the last line.
    pub fn set_highlight(&mut self, line: usize, len: usize) {
        let state = &mut self.state;
        if len == 0 {
            state.highlight_line = 0;
            state.scroll_line = 0;
            return;
        }

        let line = line.min(len - 1);
        let height = state.viewport_height.max(1);
        let max = max_scroll(len, height);
        let mut scroll = state.scroll_line;

        if line < scroll || line >= scroll + height {
            let delta = line as isize - state.highlight_line as isize;
            scroll = scroll.saturating_add_signed(delta).min(max);
        }
        if line < scroll {
            scroll = line;
        } else if line >= scroll + height {
            scroll = line + 1 - height;
        }

        state.scroll_line = scroll.min(max);
        state.highlight_line = line;
    }

    /// Update the viewport size, keeping the highlight valid and visible
    pub fn set_viewport_height(&mut self, height: usize, len: usize) {
        self.state.viewport_height = height.max(1);
        let line = self.state.highlight_line;
        self.set_highlight(line, len);
    }

    /// Start a search for `term`. An empty term reuses the previous one.
    pub fn begin_search<C: Content + ?Sized>(
        &mut self,
        term: String,
        reverse: bool,
        content: &C,
    ) -> bool {
        if term.is_empty() {
            match self.state.search.as_mut() {
                Some(search) => search.reverse = reverse,
                None => {
                    self.ring_bell();
                    return false;
                }
            }
        } else {
            self.state.search = Some(Search { term, reverse });
        }
        self.repeat_search(false, 1, content)
    }

    /// Move to the `count`th next match of the active search, without
    /// wrapping. Nothing moves unless every one of the matches exists.
    pub fn repeat_search<C: Content + ?Sized>(
        &mut self,
        opposite: bool,
        count: usize,
        content: &C,
    ) -> bool {
        let found = match self.state.search.as_ref() {
            Some(search) => find_match(
                content,
                &search.term,
                self.state.highlight_line,
                search.reverse != opposite,
                count,
            ),
            None => None,
        };

        match found {
            Some(line) => {
                self.set_highlight(line, content.line_count());
                true
            }
            None => {
                self.ring_bell();
                false
            }
        }
    }
}

fn find_match<C: Content + ?Sized>(
    content: &C,
    term: &str,
    from: usize,
    backward: bool,
    count: usize,
) -> Option<usize> {
    let mut line = from;
    for _ in 0..count {
        line = if backward {
            (0..line.min(content.line_count()))
                .rev()
                .find(|&i| content.line_text(i).contains(term))?
        } else {
            (line + 1..content.line_count()).find(|&i| content.line_text(i).contains(term))?
        };
    }
    Some(line)
}
