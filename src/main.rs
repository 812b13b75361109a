//! ambientui - procedurally varying ambient soundscapes in the terminal.
//!
//! Plays a soundscape of looping base layers with randomly timed
//! foreground events, and lets you start/stop it and adjust how busy it
//! sounds.
//!
//! # Usage
//!
//! ```bash
//! cargo run                                # South Lake Union preset from ./assets
//! cargo run -- --config scene.json         # Custom soundscape
//! cargo run -- --headless --duration 600   # No UI, stop after ten minutes
//! ```

use ambientui::{ui, App, AppConfig, BackendPreference, EngineFactory};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::fs::File;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line options for the application.
struct CliOptions {
    /// JSON config with soundscape, asset paths, intensity and backend.
    config: Option<PathBuf>,
    intensity: Option<f32>,
    backend: Option<BackendPreference>,
    /// Directory holding `<id>.mp3` assets.
    assets: Option<PathBuf>,
    /// Play without the terminal UI.
    headless: bool,
    /// Headless run time in seconds.
    duration: Option<u64>,
    /// Write logs here instead of stderr.
    log_file: Option<PathBuf>,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `--config <path>` or `-c <path>`: Load a JSON config file
    /// - `--intensity <0.1-1.0>` or `-i <value>`: Initial intensity
    /// - `--backend <auto|buffer|streaming>` or `-b <name>`: Playback backend
    /// - `--assets <dir>` or `-a <dir>`: Asset directory
    /// - `--headless`: Play without the terminal UI
    /// - `--duration <secs>` or `-d <secs>`: Stop a headless run after this long
    /// - `--log-file <path>`: Write logs to a file
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self {
            config: None,
            intensity: None,
            backend: None,
            assets: None,
            headless: false,
            duration: None,
            log_file: None,
        };
        let mut i = 1;

        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    options.config = Some(PathBuf::from(value_for(&args, &mut i)?));
                }
                "--intensity" | "-i" => {
                    let raw = value_for(&args, &mut i)?;
                    let intensity: f32 = raw
                        .parse()
                        .with_context(|| format!("Invalid intensity: {}", raw))?;
                    options.intensity = Some(intensity);
                }
                "--backend" | "-b" => {
                    let raw = value_for(&args, &mut i)?;
                    options.backend = Some(raw.parse().map_err(anyhow::Error::msg)?);
                }
                "--assets" | "-a" => {
                    options.assets = Some(PathBuf::from(value_for(&args, &mut i)?));
                }
                "--headless" => options.headless = true,
                "--duration" | "-d" => {
                    let raw = value_for(&args, &mut i)?;
                    let secs: u64 = raw
                        .parse()
                        .with_context(|| format!("Invalid duration: {}", raw))?;
                    options.duration = Some(secs);
                }
                "--log-file" => {
                    options.log_file = Some(PathBuf::from(value_for(&args, &mut i)?));
                }
                "--help" | "-h" => {
                    print_help(args.first().map(String::as_str).unwrap_or("ambientui"));
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Ok(options)
    }
}

/// Returns the argument following the flag at `i`, advancing `i`.
fn value_for<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str> {
    let flag = &args[*i];
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.as_str()),
        None => bail!("{} requires a value", flag),
    }
}

fn print_help(program: &str) {
    eprintln!("ambientui - Ambient soundscape player");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config PATH       Load soundscape and assets from a JSON config");
    eprintln!("  -i, --intensity VALUE   Initial intensity, 0.1 to 1.0 (default 0.7)");
    eprintln!("  -b, --backend NAME      auto, buffer or streaming (default auto)");
    eprintln!("  -a, --assets DIR        Directory with <id>.mp3 files (default ./assets)");
    eprintln!("      --headless          Play without the terminal UI");
    eprintln!("  -d, --duration SECS     Stop a headless run after SECS seconds");
    eprintln!("      --log-file PATH     Write logs to PATH (filter with RUST_LOG)");
    eprintln!("  -h, --help              Print this help message");
}

/// Installs the tracing subscriber.
///
/// The terminal UI owns the screen, so logs go to a file when one is given.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::from_default_env();
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;
    init_logging(cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(intensity) = cli.intensity {
        config.intensity = intensity;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(dir) = cli.assets {
        config.asset_dir = Some(dir);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("ambientui-worker")
        .build()
        .context("Failed to start async runtime")?;

    let factory = EngineFactory::with_default_output(config.asset_map(), config.backend);
    let mut app = App::new(factory.engine(), config.soundscape(), config.intensity);

    if cli.headless {
        return runtime.block_on(run_headless(&mut app, cli.duration));
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;
    let result = run_app(&mut terminal, &mut app, &runtime);
    runtime.block_on(app.stop());
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    result
}

/// Plays until Ctrl-C or until `duration` seconds have passed.
async fn run_headless(app: &mut App, duration: Option<u64>) -> Result<()> {
    app.start().await;
    if let Some(error) = &app.last_error {
        bail!("Could not start playback: {}", error);
    }
    eprintln!(
        "Playing {} at intensity {:.0}% (Ctrl-C to stop)",
        app.soundscape().name,
        app.intensity * 100.0
    );

    match duration {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(secs, "Duration elapsed");
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
        }
    }

    app.stop().await;
    info!(fired = app.engine().events_fired(), "Headless run finished");
    Ok(())
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
///
/// Engine calls that await run on `runtime`; the scheduler and voice
/// cleanup keep running on its worker threads between frames.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    runtime: &Runtime,
) -> Result<()> {
    loop {
        app.clear_expired_status();
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            app.should_quit = true;
                        }
                        KeyCode::Char(' ') | KeyCode::Enter => runtime.block_on(app.toggle()),
                        KeyCode::Left | KeyCode::Char('h') | KeyCode::Down => {
                            app.adjust_intensity(-1);
                        }
                        KeyCode::Right | KeyCode::Char('l') | KeyCode::Up => {
                            app.adjust_intensity(1);
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
