//! Configuration file support for gitbrowse
//!
//! Config file location: `~/.config/gitbrowse/config.toml` (XDG_CONFIG_HOME)
//!
//! Example config:
//! ```toml
//! [ui]
//! bell = true
//! id_width = 7
//! tab_width = 4
//!
//! [keys]
//! quit = ["q"]
//! show_commit = ["s"]
//! show_line_commit = ["S"]
//!
//! [log]
//! file = "/tmp/gitbrowse.log"
//! ```

use crossterm::event::KeyCode;
use serde::Deserialize;
use std::path::PathBuf;

/// UI configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Ring the terminal bell when a move or search fails
    pub bell: bool,
    /// Characters of the revision id shown on each line
    pub id_width: usize,
    /// Columns a tab expands to
    pub tab_width: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            bell: true,
            id_width: 7,
            tab_width: 4,
        }
    }
}

/// Keys that end the session
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Just quit
    pub quit: Vec<String>,
    /// Quit and run `git show` on the current commit
    pub show_commit: Vec<String>,
    /// Quit and run `git show` on the commit of the highlighted line
    pub show_line_commit: Vec<String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            quit: vec!["q".to_string()],
            show_commit: vec!["s".to_string()],
            show_line_commit: vec!["S".to_string()],
        }
    }
}

impl KeysConfig {
    /// Parse key names: a single character, or one of `esc`, `tab`, `enter`
    pub fn key_codes(keys: &[String]) -> Vec<KeyCode> {
        keys.iter().filter_map(|key| parse_key(key)).collect()
    }
}

fn parse_key(key: &str) -> Option<KeyCode> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(KeyCode::Char(c)),
        _ => match key.to_ascii_lowercase().as_str() {
            "esc" | "escape" => Some(KeyCode::Esc),
            "tab" => Some(KeyCode::Tab),
            "enter" | "return" => Some(KeyCode::Enter),
            _ => {
                eprintln!("Warning: Ignoring unknown key in config: {}", key);
                None
            }
        },
    }
}

/// Logging configuration; logging itself is switched on with `GITBROWSE_LOG`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Where to write the log (defaults to the user cache dir)
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file.clone().or_else(|| {
            dirs::cache_dir().map(|dir| dir.join("gitbrowse").join("gitbrowse.log"))
        })
    }
}

/// Root configuration
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub ui: UiConfig,
    pub keys: KeysConfig,
    pub log: LogConfig,
}

impl Config {
    /// Get all possible config file paths in priority order
    fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG_CONFIG_HOME (if set)
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("gitbrowse").join("config.toml"));
        }

        // 2. ~/.config/gitbrowse/config.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("gitbrowse").join("config.toml"));
        }

        // 3. Platform-specific config dir (~/Library/Application Support on macOS)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("gitbrowse").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        paths
    }

    /// Get the first existing config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_paths().into_iter().find(|p| p.exists())
    }

    /// Load config from the first config path found.
    /// Returns default config if file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| std::fs::read_to_string(&path).ok())
            .and_then(|content| {
                Self::parse(&content)
                    .map_err(|e| {
                        eprintln!("Warning: Failed to parse config: {}", e);
                        e
                    })
                    .ok()
            })
            .unwrap_or_default()
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
