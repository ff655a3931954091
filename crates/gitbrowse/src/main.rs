//! gitbrowse - browse the blame of a file through its history

mod app;
mod config;
mod modal;
mod ui;

use anyhow::{Context, Result};
use app::{App, ExitAction, ExitKeys};
use clap::Parser;
use config::Config;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gitbrowse_core::{git, FileHistory, GitCli};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::File;
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gitbrowse")]
#[command(author, version, about = "Browse the blame of a file through its git history")]
struct Args {
    /// File to browse
    path: PathBuf,

    /// Revision to start from
    #[arg(default_value = "HEAD")]
    revision: String,
}

/// Environment variable holding the log filter; logging is off without it
const LOG_ENV: &str = "GITBROWSE_LOG";

fn init_logging(config: &Config) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let Ok(filter) = std::env::var(LOG_ENV) else {
        return Ok(());
    };
    let Some(path) = config.log.file_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(EnvFilter::new(filter))
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(())
}

/// Repository root, repository-relative path and resolved start commit
fn locate(path: &Path, revision: &str) -> Result<(PathBuf, PathBuf, String)> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let search_from = if path.is_absolute() {
        path.parent().unwrap_or(path).to_path_buf()
    } else {
        cwd.clone()
    };

    if !git::is_git_repo(&search_from) {
        anyhow::bail!("Not in a git repository: {}", search_from.display());
    }
    let root = git::get_repo_root(&search_from).context("Failed to get git repository root")?;
    let relative = git::get_repo_relative_path(path, &cwd)
        .with_context(|| format!("{} is outside the repository", path.display()))?;
    let commit = git::resolve_revision(&root, revision)
        .with_context(|| format!("Invalid revision: {}", revision))?;

    if !git::path_exists_at(&root, &commit, &relative) {
        anyhow::bail!(
            "{} does not exist at revision {}",
            relative.display(),
            revision
        );
    }

    Ok((root, relative, commit))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load();
    init_logging(&config)?;

    let (root, relative, commit) = locate(&args.path, &args.revision)?;
    info!(root = %root.display(), path = %relative.display(), %commit, "starting");

    let history = FileHistory::new(GitCli::new(&root), &relative, &commit)
        .with_context(|| format!("Failed to read history of {}", relative.display()))?;

    let mut app = App::new(history, ExitKeys::from(&config.keys));
    app.id_width = config.ui.id_width;
    app.tab_width = config.ui.tab_width;
    app.load()
        .with_context(|| format!("Failed to blame {}", relative.display()))?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app, config.ui.bell);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {:#}", err);
        return Err(err);
    }

    match app.exit_action() {
        ExitAction::Quit => Ok(()),
        ExitAction::ShowCommit(id) => show_commit(&root, &id),
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App<GitCli>,
    bell: bool,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            app.handle_key(key)?;

            if app.modal.take_bell() && bell {
                let backend = terminal.backend_mut();
                backend.write_all(b"\x07")?;
                backend.flush()?;
            }
            if app.exit_key().is_some() {
                return Ok(());
            }
        }
    }
}

/// Replace this process with `git show <id>`
#[cfg(unix)]
fn show_commit(root: &Path, id: &str) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let err = Command::new("git").arg("-C").arg(root).arg("show").arg(id).exec();
    Err(err).context("Failed to run git show")
}

#[cfg(not(unix))]
fn show_commit(root: &Path, id: &str) -> Result<()> {
    let status = Command::new("git")
        .arg("-C")
        .arg(root)
        .arg("show")
        .arg(id)
        .status()
        .context("Failed to run git show")?;
    std::process::exit(status.code().unwrap_or(1));
}
