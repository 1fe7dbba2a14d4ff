//! admitsync - Terminal Admission Form
//!
//! A terminal front end for a multi-step admission application. Drafts are
//! autosaved to the portal with a debounce, kept on this device when the
//! portal is unreachable, and locked once the application is submitted.

use std::env;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use admitsync::application::{App, AppConfig, AppMode, SystemClock, WizardSession};
use admitsync::domain::AdmissionService;
use admitsync::infrastructure::{FileStore, HttpAdmissionService, KeyValueStore, LoopbackAdmissionService};
use admitsync::presentation::{render_ui, InputHandler};

/// Longest wait for input when no sync deadline is pending.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// How long quitting waits for a last save to reach the portal.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Entry point for the admitsync terminal application.
///
/// Reads configuration from the environment, starts the user's session and
/// runs the event loop until the user quits. The portal is asked about an
/// existing application and draft in the background, so the first frame
/// already shows any submission cached on this device.
///
/// # Errors
///
/// Returns an error if the log file or local data directory cannot be
/// opened, the HTTP client cannot be built, or terminal setup fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = env::var_os("ADMITSYNC_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| AppConfig::default().log_file);
    init_logging(&log_file)?;

    let config = AppConfig::from_env();
    let service: Box<dyn AdmissionService> = match config.http_config() {
        Some(http) => {
            info!(base_url = %http.base_url, "using portal API");
            Box::new(HttpAdmissionService::new(http)?)
        }
        None => {
            info!("ADMITSYNC_API_URL not set, using in-process admission service");
            Box::new(LoopbackAdmissionService::new())
        }
    };
    let storage = FileStore::open(&config.data_dir)?;

    let mut session = WizardSession::new(service, storage, Box::new(SystemClock::new()), config.sync);
    session.start(&config.user_id);
    let mut app = App::new(session);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn init_logging(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Main application event loop.
///
/// Waits for input no longer than the next sync deadline, or the result
/// poll interval while remote calls are running, so saves start on time and
/// their results show promptly. Continues until the user presses 'q' in
/// normal mode.
///
/// # Errors
///
/// Returns an IO error if terminal operations fail.
fn run_app<B, S, K>(terminal: &mut Terminal<B>, app: &mut App<S, K>) -> io::Result<()>
where
    B: Backend,
    S: AdmissionService + 'static,
    K: KeyValueStore,
{
    loop {
        terminal.draw(|f| render_ui(f, app))?;

        let timeout = app.session.next_wakeup().map_or(IDLE_POLL, |due| due.min(IDLE_POLL));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if matches!(app.mode, AppMode::Normal) => {
                            app.session.shutdown(QUIT_GRACE);
                            info!("quit");
                            return Ok(());
                        }
                        _ => InputHandler::handle_key_event(app, key.code, key.modifiers),
                    }
                }
            }
        }

        app.tick();
    }
}
