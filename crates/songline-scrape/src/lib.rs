//! Songline Scrape - resumable two-phase lyrics and audio pipeline
//!
//! For each catalog item the lyrics phase saves `lyrics.txt` and the audio
//! phase downloads the song file. Every per-item outcome is written through
//! to a JSON ledger, so an interrupted run picks up where it stopped.

pub mod catalog;
pub mod config;
pub mod download;
pub mod extract;
pub mod layout;
pub mod ledger;
pub mod runner;
pub mod source;
pub mod state;
pub mod stats;
pub mod worker;

pub use catalog::load_catalog;
pub use config::PipelineConfig;
pub use download::{DownloadResult, Downloader};
pub use ledger::{LedgerStats, ProgressStore};
pub use runner::{run, run_phase};
pub use source::{HttpSource, PageSource};
pub use state::{Item, Phase};
pub use stats::{FinalSummary, ItemOutcome, PhaseResult};
