//! Run subcommand: both phases over a catalog file

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, ValueEnum};
use songline_core::{SharedProgress, is_shutdown_requested, shutdown_flag};
use songline_scrape::{HttpSource, Phase, ProgressStore, load_catalog};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Catalog JSON file (array of {title, artists, url, event?})
    pub catalog: PathBuf,

    /// Output root directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Progress ledger path (default: <output>/scraper_progress.json)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Phase(s) to run
    #[arg(long, value_enum, default_value_t = PhaseArg::All)]
    pub phase: PhaseArg,

    /// Parallel workers per phase (1 = sequential)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Pause after each fetched item, in milliseconds
    #[arg(long)]
    pub request_delay_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PhaseArg {
    Lyrics,
    Audio,
    All,
}

impl PhaseArg {
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Self::Lyrics => &[Phase::Lyrics],
            Self::Audio => &[Phase::Audio],
            Self::All => Phase::all(),
        }
    }
}

pub fn run(
    args: RunArgs,
    config: &Config,
    max_retries: Option<u32>,
    progress: &SharedProgress,
) -> Result<ExitCode> {
    log::info!("Loading songs from '{}'", args.catalog.display());
    let items = match load_catalog(&args.catalog) {
        Ok(items) => items,
        Err(e) => {
            log::error!("{e:#}");
            return Ok(ExitCode::from(2));
        }
    };
    if items.is_empty() {
        log::warn!("No songs found in '{}'", args.catalog.display());
        return Ok(ExitCode::SUCCESS);
    }
    log::info!("Loaded {} songs", items.len());

    let root = config.output_root(args.output);
    let ledger = config.ledger_path(&root, args.ledger);
    let pipeline = config.pipeline_config(root, ledger, args.workers, args.request_delay_ms);

    let source = match HttpSource::new(config.http_config(max_retries), pipeline.chunk_size) {
        Ok(source) => source,
        Err(e) => {
            log::error!("Cannot build HTTP client: {e}");
            return Ok(ExitCode::from(2));
        }
    };

    let mut store = ProgressStore::load(&pipeline.ledger_path);
    let summary = songline_scrape::run(
        &items,
        args.phase.phases(),
        &source,
        &mut store,
        &pipeline,
        progress,
        shutdown_flag(),
    )?;

    // A signal during the last item still counts as an interruption
    if summary.interrupted() || is_shutdown_requested() {
        log::warn!("Process interrupted. Progress saved. Run again to resume.");
        return Ok(ExitCode::from(130));
    }

    if summary.lyrics.is_some() && summary.audio.is_some() {
        if progress.is_tty() {
            summary.print();
        } else {
            summary.log();
        }
    }
    log::info!("Files saved to '{}'", pipeline.output_dir.display());
    log::info!(
        "Progress saved to '{}' - run again to retry failed items",
        pipeline.ledger_path.display()
    );
    Ok(ExitCode::SUCCESS)
}
