//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use songline_core::{HttpConfig, RetryPolicy};
use songline_scrape::PipelineConfig;
use songline_scrape::config::DEFAULT_LEDGER_NAME;

/// Global configuration for songline
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub http: HttpSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    /// Defaults to `<root>/scraper_progress.json`
    pub ledger: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./downloads"),
            ledger: None,
        }
    }
}

/// `[http]` section. Durations are whole seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: Option<String>,
    pub page_timeout: u64,
    pub download_timeout: u64,
    pub probe_timeout: u64,
    pub connect_timeout: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub pool_size: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            page_timeout: 15,
            download_timeout: 120,
            probe_timeout: 5,
            connect_timeout: 30,
            max_retries: 2,
            backoff_ms: 500,
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub request_delay_ms: u64,
    pub chunk_size: usize,
    pub workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_delay_ms: 200,
            chunk_size: songline_scrape::download::DEFAULT_CHUNK_SIZE,
            workers: 1,
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./songline.toml (current directory)
    /// 2. ~/.config/songline/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("songline.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "songline") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Output root, CLI value first
    pub fn output_root(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.unwrap_or_else(|| self.output.root.clone())
    }

    /// Ledger path: CLI value, then config, then inside `root`
    pub fn ledger_path(&self, root: &Path, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.output.ledger.clone())
            .unwrap_or_else(|| root.join(DEFAULT_LEDGER_NAME))
    }

    /// Transport settings; `max_retries` overrides the file value.
    pub fn http_config(&self, max_retries: Option<u32>) -> HttpConfig {
        let h = &self.http;
        let defaults = HttpConfig::default();
        HttpConfig {
            user_agent: h.user_agent.clone().unwrap_or(defaults.user_agent),
            page_timeout: Duration::from_secs(h.page_timeout),
            download_timeout: Duration::from_secs(h.download_timeout),
            probe_timeout: Duration::from_secs(h.probe_timeout),
            connect_timeout: Duration::from_secs(h.connect_timeout),
            stall_timeout: Duration::from_secs(h.page_timeout),
            pool_size: h.pool_size,
            retry: RetryPolicy {
                max_retries: max_retries.unwrap_or(h.max_retries),
                backoff_base: Duration::from_millis(h.backoff_ms),
                ..RetryPolicy::default()
            },
        }
    }

    /// Runner settings with CLI overrides applied
    pub fn pipeline_config(
        &self,
        root: PathBuf,
        ledger: PathBuf,
        workers: Option<usize>,
        request_delay_ms: Option<u64>,
    ) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            output_dir: root,
            ledger_path: ledger,
            request_delay: Duration::from_millis(request_delay_ms.unwrap_or(p.request_delay_ms)),
            chunk_size: p.chunk_size.max(1),
            workers: workers.unwrap_or(p.workers).max(1),
        }
    }
}
