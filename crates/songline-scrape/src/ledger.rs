//! Persisted per-URL progress ledger that makes runs resumable.
//!
//! On-disk format:
//! ```text
//! {
//!   "completed": { "<url>": {"lyrics": bool, "audio": bool, "timestamp": secs} },
//!   "failed":    { "<url>": {"reason": "...", "timestamp": secs} }
//! }
//! ```
//! `completed` and `failed` are independent: a URL whose lyrics phase
//! succeeded and whose audio phase failed appears in both.
//!
//! Every mutation is written through to disk (tmp file + rename) before it
//! returns, so a crash loses at most the item in flight.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::state::Phase;

/// Phase-level success flags for one URL
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletedEntry {
    #[serde(default)]
    pub lyrics: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub timestamp: f64,
}

/// Most recent failure reason for one URL
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailedEntry {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub timestamp: f64,
}

/// Serialized ledger contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    #[serde(default)]
    pub completed: BTreeMap<String, CompletedEntry>,
    #[serde(default)]
    pub failed: BTreeMap<String, FailedEntry>,
}

/// Map sizes, not phase-aware, plus per-phase done counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub completed: usize,
    pub failed: usize,
    pub lyrics_done: usize,
    pub audio_done: usize,
}

/// In-memory mirror of the ledger file. Single writer per run.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    state: LedgerState,
}

fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

impl ProgressStore {
    /// Load the ledger at `path`. A missing or unreadable file yields an
    /// empty ledger; this never fails.
    pub fn load(path: &Path) -> Self {
        let state = match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<LedgerState>(&content) {
                Ok(state) => state,
                Err(e) => {
                    log::warn!(
                        "Ledger {} is corrupt ({e}), starting fresh",
                        path.display()
                    );
                    LedgerState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No ledger at {}, starting fresh", path.display());
                LedgerState::default()
            }
            Err(e) => {
                log::warn!("Cannot read ledger {} ({e}), starting fresh", path.display());
                LedgerState::default()
            }
        };
        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// True unless a `completed` entry already has `lyrics = true`
    pub fn needs_lyrics(&self, url: &str) -> bool {
        !self.state.completed.get(url).is_some_and(|e| e.lyrics)
    }

    /// True unless a `completed` entry already has `audio = true`
    pub fn needs_audio(&self, url: &str) -> bool {
        !self.state.completed.get(url).is_some_and(|e| e.audio)
    }

    pub fn needs(&self, phase: Phase, url: &str) -> bool {
        match phase {
            Phase::Lyrics => self.needs_lyrics(url),
            Phase::Audio => self.needs_audio(url),
        }
    }

    /// True iff any phase ever completed for `url`
    pub fn is_completed(&self, url: &str) -> bool {
        self.state.completed.contains_key(url)
    }

    pub fn completed(&self, url: &str) -> Option<&CompletedEntry> {
        self.state.completed.get(url)
    }

    pub fn failure(&self, url: &str) -> Option<&FailedEntry> {
        self.state.failed.get(url)
    }

    /// Record phase success for `url` and persist.
    ///
    /// Flags are OR-ed with whatever was stored before, so a later phase can
    /// never clear an earlier phase's success. The timestamp is refreshed.
    pub fn mark_completed(
        &mut self,
        url: &str,
        has_lyrics: bool,
        has_audio: bool,
    ) -> anyhow::Result<()> {
        let prior = self.state.completed.get(url).copied().unwrap_or_default();
        self.state.completed.insert(
            url.to_string(),
            CompletedEntry {
                lyrics: has_lyrics || prior.lyrics,
                audio: has_audio || prior.audio,
                timestamp: now_secs(),
            },
        );
        self.persist()
    }

    /// Record a failure reason for `url` and persist. `completed` is untouched.
    pub fn mark_failed(&mut self, url: &str, reason: &str) -> anyhow::Result<()> {
        self.state.failed.insert(
            url.to_string(),
            FailedEntry {
                reason: reason.to_string(),
                timestamp: now_secs(),
            },
        );
        self.persist()
    }

    pub fn stats(&self) -> LedgerStats {
        let completed = &self.state.completed;
        LedgerStats {
            completed: completed.len(),
            failed: self.state.failed.len(),
            lyrics_done: completed.values().filter(|e| e.lyrics).count(),
            audio_done: completed.values().filter(|e| e.audio).count(),
        }
    }

    /// Failures ordered newest first, at most `limit`
    pub fn recent_failures(&self, limit: usize) -> Vec<(&str, &FailedEntry)> {
        let mut failures: Vec<(&str, &FailedEntry)> = self
            .state
            .failed
            .iter()
            .map(|(url, e)| (url.as_str(), e))
            .collect();
        failures.sort_by(|a, b| b.1.timestamp.total_cmp(&a.1.timestamp));
        failures.truncate(limit);
        failures
    }

    /// Write the whole ledger to `<path>.tmp`, then rename over `<path>`.
    fn persist(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create ledger dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.state).context("Cannot encode ledger")?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).with_context(|| format!("Cannot write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("Cannot replace ledger {}", self.path.display())
        })?;
        Ok(())
    }
}
