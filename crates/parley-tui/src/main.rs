use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use parley_config::{ConfigManager, LogLevel};
use parley_core::{FileTokenStorage, MemoryTokenStorage, SessionStore};
use parley_observability::{LogManager, LogTarget};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{error, info};

mod app;
mod ui;

use app::{App, AppEvent, Flow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_manager = match std::env::var("PARLEY_CONFIG") {
        Ok(path) => ConfigManager::load(Path::new(&path)).await,
        Err(_) => ConfigManager::load_default().await,
    }
    .context("Failed to load configuration")?;
    let config = config_manager.snapshot().await;

    // The terminal is ours while the UI runs, so logs go to a file
    let log_path = config
        .logging
        .resolved_file()
        .context("Could not resolve log file path")?;
    let debug = std::env::args().any(|arg| arg == "--debug");
    let _log = LogManager::init(
        &config.logging,
        LogTarget::File(log_path),
        debug.then(|| LogLevel::Debug.to_string()).as_deref(),
    )?;

    let session = match config.session.resolved_token_path() {
        Some(path) => SessionStore::open(FileTokenStorage::new(path)),
        None => SessionStore::open(MemoryTokenStorage::new()),
    };
    let backend = parley_core::connect(
        &config.backend.base_url,
        session.clone(),
        config.backend.timeout_seconds.map(Duration::from_secs),
    )?;
    info!("Starting parley-tui against {}", config.backend.base_url);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut app = App::new(
        &config.backend.base_url,
        Arc::clone(&backend),
        session.clone(),
        tx,
    );

    let res = run_app(&mut terminal, &mut app, rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("UI loop failed: {:?}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut results: mpsc::UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut session_changes = app.session().subscribe();
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    app.start();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key) == Flow::Quit {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            Some(event) = results.recv() => app.on_event(event),
            changed = session_changes.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                app.on_session_changed();
            }
            _ = tick.tick() => app.on_tick(),
        }
    }
}
