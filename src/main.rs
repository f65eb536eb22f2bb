// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Use library instead of local modules
use rate_board::config::DEFAULT_CONFIG_PATH;
use rate_board::display::{format_clock, format_last_updated, render_plain};
use rate_board::{
    build_view, export_board, BoardConfig, BoardController, BoardView, KeyValueStore,
    MemoryStore, NullRenderer, Renderer, SqliteStore,
};

/// Foreign exchange and interest rate board
#[derive(Parser)]
#[command(name = "rate-board")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive board (default)
    Tui,

    /// Print the board once as plain text
    Show,

    /// Write the board as displayed to CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BoardConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?
        .with_env_override();
    config.validate().context("Invalid configuration")?;

    let command = cli.command.unwrap_or(Commands::Tui);
    init_tracing(&config, matches!(command, Commands::Tui))?;

    info!(version = rate_board::VERSION, config = %cli.config.display(), "rate board starting");

    match command {
        Commands::Tui => run_ui_mode(config),
        Commands::Show => run_show(config),
        Commands::Export { output } => run_export(config, output),
    }
}

/// The terminal UI owns stdout, so it logs to a file; everything else to stderr
fn init_tracing(config: &BoardConfig, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log filter")?;

    if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
            .with(filter)
            .try_init()
            .context("Failed to initialise logging")?;
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .try_init()
            .context("Failed to initialise logging")?;
    }

    Ok(())
}

/// SQLite when it opens, otherwise an in-memory store for this session
fn open_store(config: &BoardConfig) -> Box<dyn KeyValueStore> {
    match SqliteStore::open(&config.database_path) {
        Ok(store) => {
            info!(path = %config.database_path.display(), "opened rate store");
            Box::new(store)
        }
        Err(e) => {
            warn!(
                path = %config.database_path.display(),
                "rate store unavailable, overrides will not survive restart: {}", e
            );
            Box::new(MemoryStore::new())
        }
    }
}

fn start_board<R: Renderer>(config: &BoardConfig, renderer: R) -> Result<BoardController<R>> {
    let reference = config
        .reference_data()
        .context("Failed to build reference tables")?;

    Ok(BoardController::start(
        reference,
        open_store(config),
        config.passphrase_digest(),
        renderer,
    ))
}

fn current_view<R: Renderer>(controller: &BoardController<R>) -> BoardView {
    build_view(
        controller.reference(),
        &controller.current_rates(),
        controller.overrides(),
        &controller.snapshot().changes(),
    )
}

fn run_show(config: BoardConfig) -> Result<()> {
    let controller = start_board(&config, NullRenderer)?;
    let (date, time) = format_clock(Utc::now(), config.utc_offset());

    println!("FOREIGN EXCHANGE & INTEREST RATES");
    let updated = format_last_updated(controller.snapshot().resolved_at, config.utc_offset());
    println!("{}  {}  (offline mode, {})", date, time, updated);
    if controller.is_locked() {
        println!("Page is locked");
    }
    println!();
    print!("{}", render_plain(&current_view(&controller)));

    Ok(())
}

fn run_export(config: BoardConfig, output: Option<PathBuf>) -> Result<()> {
    let controller = start_board(&config, NullRenderer)?;
    let view = current_view(&controller);

    let rows = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            export_board(&view, file)?
        }
        None => export_board(&view, io::stdout().lock())?,
    };

    info!(rows, "board exported");
    if let Some(path) = output {
        eprintln!("✓ Exported {} rows to {}", rows, path.display());
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: BoardConfig) -> Result<()> {
    let renderer = ui::TuiRenderer::new(config.highlight_duration(), config.toast_duration());
    let controller = start_board(&config, renderer)?;

    let mut app = ui::App::new(controller, config.utc_offset());
    ui::run_ui(&mut app)?;

    info!("board closed");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: BoardConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print the board once: rate-board show");
    std::process::exit(1);
}
