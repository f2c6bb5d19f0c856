//! songline - resumable lyrics and audio archiver
//!
//! Reads a catalog of song page URLs and saves each song's lyrics and audio
//! file, recording progress in a ledger so interrupted runs can resume.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use songline_core::shutdown_flag;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "songline")]
#[command(about = "Resumable lyrics and audio archiver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./songline.toml or ~/.config/songline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Download lyrics, then audio, for every song in a catalog
    Run(cmd::run::RunArgs),
    /// Show ledger counts and recent failures
    Status(cmd::status::StatusArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(songline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    songline_core::init_logging(quiet, cli.debug, multi);

    let config = match cli.config {
        Some(path) => Config::from_file(&path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match cli.command {
        Command::Run(args) => {
            setup_signal_handler();
            cmd::run::run(args, &config, cli.max_retries, &progress)
        }
        Command::Status(args) => cmd::status::run(args, &config),
        Command::Config => {
            print_config(&config, cli.max_retries);
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn setup_signal_handler() {
    // First signal: set graceful shutdown flag
    // Second signal: force exit
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        let registered = unsafe {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
        };
        if let Err(e) = registered {
            log::warn!("Cannot register handler for signal {signal}: {e}");
        }
    }
}

fn print_config(config: &Config, max_retries: Option<u32>) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let root = config.output_root(None);
    let http = config.http_config(max_retries);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Output directory", &root.display().to_string()]);
    table.add_row(vec![
        "Ledger",
        &config.ledger_path(&root, None).display().to_string(),
    ]);
    table.add_row(vec!["User agent", &http.user_agent]);
    table.add_row(vec![
        "Page timeout",
        &format!("{}s", http.page_timeout.as_secs()),
    ]);
    table.add_row(vec![
        "Download timeout",
        &format!("{}s", http.download_timeout.as_secs()),
    ]);
    table.add_row(vec![
        "Probe timeout",
        &format!("{}s", http.probe_timeout.as_secs()),
    ]);
    table.add_row(vec![
        "Connect timeout",
        &format!("{}s", http.connect_timeout.as_secs()),
    ]);
    table.add_row(vec!["Max retries", &http.retry.max_retries.to_string()]);
    table.add_row(vec![
        "Backoff base",
        &format!("{}ms", http.retry.backoff_base.as_millis()),
    ]);
    table.add_row(vec!["Pool size", &http.pool_size.to_string()]);
    table.add_row(vec![
        "Request delay",
        &format!("{}ms", config.pipeline.request_delay_ms),
    ]);
    table.add_row(vec![
        "Chunk size",
        &format!("{} bytes", config.pipeline.chunk_size),
    ]);
    table.add_row(vec!["Workers", &config.pipeline.workers.to_string()]);

    eprintln!("\n{table}");
}
