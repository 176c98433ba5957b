mod fixture;
mod state;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dlview_inspect::{Backend, Inspector, InspectorConfig};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dlview", about = "Inspect goroutines, stacks and variables of a stopped program")]
struct Args {
    /// Snapshot to replay as the debugging backend.
    #[arg(long, default_value = "fixtures/sample.json")]
    fixture: PathBuf,
    /// Append logs to this file instead of discarding them.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Redraw interval in milliseconds.
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let backend = fixture::FixtureBackend::load(&args.fixture)?;
    let state = backend.state()?;
    let config = InspectorConfig::from_env();
    info!(
        event = "startup",
        fixture = %args.fixture.display(),
        stack_depth = config.stack_depth
    );
    let mut inspector = Inspector::new(config);
    inspector.attach(Arc::new(backend) as Arc<dyn Backend>, state);
    let mut app = state::App::new(inspector);

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms.max(16))).await;
    restore_terminal(&mut terminal)?;
    result
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_enabled = std::env::var("DLVIEW_LOG_STDOUT")
        .ok()
        .and_then(|value| dlview_inspect::config::parse_bool_flag(&value))
        .unwrap_or(false);
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut state::App,
    tick: Duration,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(tick);

    loop {
        terminal.draw(|f| ui::render(f, app))?;

        tokio::select! {
            _ = ticker.tick() => {}
            _ = app.inspector.changed() => {}
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                            app.handle_key(key);
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err).context("read terminal event"),
                    None => break,
                }
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}
