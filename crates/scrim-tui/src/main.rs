//! scrim - an interactive launcher that turns script output into a
//! live, filterable, selectable list in the terminal.
//!
//! The render loop is single-threaded and cooperative: it blocks on the
//! next key press, ticker tick, or engine event, applies it, recomputes
//! the active selection, and redraws. Script execution happens on
//! engine tasks that only talk back through the event channel.

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use scrim_core::config::{Config, Directories};
use scrim_core::{Engine, EngineEvent, Error, Registry, TriggerKind, TriggerTable};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod app;
mod cli;
mod render;

use app::App;
use cli::{Cli, Commands};

/// How often interval staleness is re-checked without user input.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// The closed set of things that can wake the render loop.
enum LoopEvent {
    Term(Event),
    Tick,
    Engine(EngineEvent),
    Terminate,
}

/// Set up logging with file output. The TUI must log to a file since it
/// owns the terminal.
fn setup_logging(debug_flag: bool) {
    let level = if debug_flag || cfg!(debug_assertions) {
        "debug"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("scrim-{timestamp}.log");
    let log_path = std::path::Path::new("/tmp").join(&log_filename);

    let symlink_path = std::path::Path::new("/tmp/scrim.log");
    let _ = std::fs::remove_file(symlink_path);
    let _ = std::os::unix::fs::symlink(&log_path, symlink_path);

    let file_appender = tracing_appender::rolling::never("/tmp", &log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    std::mem::forget(guard);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.debug);

    let config_path = cli
        .config
        .unwrap_or_else(|| Directories::new().config_file);
    let conf = Config::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;

    let registry = Arc::new(Registry::from_config(&conf)?);
    let table = Arc::new(TriggerTable::from_config(&conf)?);

    tracing::info!(
        config = %config_path.display(),
        scripts = registry.len(),
        "configuration loaded"
    );

    match cli.command {
        Some(Commands::Check) => {
            print_check(&conf);
            Ok(())
        }
        Some(Commands::Tui) | None => run_tui(registry, table).await,
    }
}

/// Non-interactive config inspection.
fn print_check(conf: &Config) {
    println!("\nConfigured Scripts:\n===================\n");

    if conf.scripts.is_empty() {
        println!("No scripts configured.");
    }
    for sconf in &conf.scripts {
        println!("  {:<16} {}", sconf.name, sconf.path.display());
        for raw in &sconf.triggers {
            // Parsing already succeeded at startup
            if let Ok(kind) = TriggerKind::parse(raw) {
                println!("                   {kind:?}");
            }
        }
    }
    println!();
}

// Event loop with terminal setup/teardown - per-event logic lives in
// the handlers below
#[allow(clippy::too_many_lines)]
async fn run_tui(registry: Arc<Registry>, table: Arc<TriggerTable>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (mut engine, mut engine_rx) = Engine::new(Arc::clone(&registry), table);
    let mut app = App::new();
    let mut fatal: Option<Error> = None;

    engine.start_initial_loads();
    app.refresh(&mut engine);

    let mut term_events = EventStream::new();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        terminal.draw(|f| render::render_ui(f, &mut app, &registry, engine.busy()))?;

        let event = tokio::select! {
            maybe = term_events.next() => match maybe {
                Some(Ok(ev)) => LoopEvent::Term(ev),
                Some(Err(e)) => {
                    tracing::error!("event stream error: {e}");
                    continue;
                }
                None => break,
            },
            _ = ticker.tick() => LoopEvent::Tick,
            maybe = engine_rx.recv() => match maybe {
                Some(ev) => LoopEvent::Engine(ev),
                None => break,
            },
            _ = sigterm.recv() => LoopEvent::Terminate,
        };

        match event {
            LoopEvent::Term(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                handle_key(&mut app, &engine, key);
            }
            LoopEvent::Term(_) => {}
            LoopEvent::Tick => app.tick(),
            LoopEvent::Engine(ev) => handle_engine_event(&mut app, &mut engine, &mut fatal, ev),
            LoopEvent::Terminate => app.should_quit = true,
        }

        // Drain remaining engine events before recomputing and drawing,
        // so every completed run is visible in this frame
        while let Ok(ev) = engine_rx.try_recv() {
            handle_engine_event(&mut app, &mut engine, &mut fatal, ev);
        }

        if fatal.is_some() || app.should_quit {
            break;
        }

        app.refresh(&mut engine);
    }

    engine.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(err) = fatal {
        tracing::error!(error = %err, "quit due to error");
        return Err(err.into());
    }
    Ok(())
}

fn handle_key(app: &mut App, engine: &Engine, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    app.status_message = None;

    match key.code {
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if ctrl => app.should_quit = true,
        KeyCode::Down => app.select_next(),
        KeyCode::Up => app.select_previous(),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),
        KeyCode::PageDown => app.page_down(),
        KeyCode::PageUp => app.page_up(),
        KeyCode::Right => {
            // Manual refresh of the selected line's script
            if let Some(line) = app.active_line() {
                let name = line.script.clone();
                engine.reload(&name);
            }
        }
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Enter => {
            let Some(line) = app.active_line() else {
                return;
            };
            let name = line.script.clone();
            let text = line.text.clone();
            let stay_open = shift
                || engine
                    .registry()
                    .get(&name)
                    .is_some_and(|s| s.conf().stay_open);
            tracing::debug!(script = %name, stay_open, "item selected");
            engine.run_selected(&name, text, app.selection.query.clone(), stay_open);
        }
        KeyCode::Backspace => app.delete_char(),
        KeyCode::Char(c) if !ctrl && !alt => app.enter_char(c),
        _ => {}
    }
}

fn handle_engine_event(
    app: &mut App,
    engine: &mut Engine,
    fatal: &mut Option<Error>,
    event: EngineEvent,
) {
    match event {
        EngineEvent::Apply(apply) => apply(),
        EngineEvent::Refire { scripts, query } => engine.refire(&scripts, &query),
        EngineEvent::ItemRunFailed { script, error } => {
            tracing::warn!(script = %script, error = %error, "item invocation failed");
            app.status_message = Some(error.to_string());
        }
        EngineEvent::Fatal(error) => *fatal = Some(error),
        EngineEvent::Quit => app.should_quit = true,
    }
}
