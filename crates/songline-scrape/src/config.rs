//! Phase runner configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::download::DEFAULT_CHUNK_SIZE;

/// Ledger file name inside the output root when none is given
pub const DEFAULT_LEDGER_NAME: &str = "scraper_progress.json";

/// Runtime configuration for one run of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the `<title - artist>/` folders
    pub output_dir: PathBuf,
    pub ledger_path: PathBuf,
    /// Pause after each item that touched the network
    pub request_delay: Duration,
    pub chunk_size: usize,
    /// 1 = sequential
    pub workers: usize,
}

impl PipelineConfig {
    /// Defaults rooted at `output_dir`, ledger inside it
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            ledger_path: output_dir.join(DEFAULT_LEDGER_NAME),
            output_dir,
            request_delay: Duration::from_millis(200),
            chunk_size: DEFAULT_CHUNK_SIZE,
            workers: 1,
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }
}
