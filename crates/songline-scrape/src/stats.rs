//! Per-phase statistics and reporting.
//!
//! - Item-level: `ItemOutcome`, produced by the worker for one catalog entry
//! - Phase-level: `PhaseResult`, one per complete pass over the catalog
//! - Final: `FinalSummary`, both phases together

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::state::Phase;

/// What happened to one item in one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Ledger already had this phase done; nothing was fetched
    Skipped,
    Saved {
        lyrics: bool,
        audio: bool,
        message: String,
    },
    Failed {
        reason: String,
    },
}

impl ItemOutcome {
    /// Build a failure from the messages collected while processing.
    pub fn failed_with(messages: &[String]) -> Self {
        let reason = if messages.is_empty() {
            "Unknown error".to_string()
        } else {
            messages.join(", ")
        };
        Self::Failed { reason }
    }
}

/// Aggregate result of one phase pass. Reported, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseResult {
    pub phase: Phase,
    pub total: usize,
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    pub lyrics_saved: usize,
    pub audio_saved: usize,
    /// `"title: reason"`, in catalog order
    pub errors: Vec<String>,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
}

impl PhaseResult {
    pub fn new(phase: Phase, total: usize) -> Self {
        Self {
            phase,
            total,
            success: 0,
            skipped: 0,
            failed: 0,
            lyrics_saved: 0,
            audio_saved: 0,
            errors: Vec::new(),
            interrupted: false,
        }
    }

    pub fn record(&mut self, title: &str, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Saved { lyrics, audio, .. } => {
                self.success += 1;
                self.lyrics_saved += usize::from(*lyrics);
                self.audio_saved += usize::from(*audio);
            }
            ItemOutcome::Failed { reason } => {
                self.failed += 1;
                self.errors.push(format!("{title}: {reason}"));
            }
        }
    }

    /// Items that were neither skipped nor finished before a shutdown
    pub fn not_reached(&self) -> usize {
        self.total
            .saturating_sub(self.success + self.skipped + self.failed)
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(format!("{} Phase Summary", self.phase.title()))
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Count").fg(Color::Cyan),
            ]);

        table.add_row(vec![Cell::new("Total Songs"), Cell::new(self.total)]);
        table.add_row(vec![
            Cell::new("Successfully Downloaded").fg(Color::Green),
            Cell::new(self.success).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Skipped (Already Done)"),
            Cell::new(self.skipped),
        ]);
        let failed_color = if self.failed > 0 {
            Color::Red
        } else {
            Color::Reset
        };
        table.add_row(vec![
            Cell::new("Failed").fg(failed_color),
            Cell::new(self.failed).fg(failed_color),
        ]);
        if self.interrupted {
            table.add_row(vec![
                Cell::new("Not Reached (Interrupted)").fg(Color::Yellow),
                Cell::new(self.not_reached()).fg(Color::Yellow),
            ]);
        }

        let mut out = format!("\n{table}");
        if self.failed > 0 {
            out.push_str(&format!("\n  {} errors in this phase", self.errors.len()));
        }
        out
    }

    /// Print table on stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "{} phase complete: {} total, {} saved, {} skipped, {} failed{}",
            self.phase.title(),
            self.total,
            self.success,
            self.skipped,
            self.failed,
            if self.interrupted { " (interrupted)" } else { "" }
        );
        for error in &self.errors {
            log::info!("  {error}");
        }
    }
}

/// Totals across both phases
#[derive(Debug)]
pub struct FinalSummary {
    pub total_items: usize,
    pub lyrics: Option<PhaseResult>,
    pub audio: Option<PhaseResult>,
}

impl FinalSummary {
    pub fn lyrics_saved(&self) -> usize {
        self.lyrics.as_ref().map_or(0, |r| r.lyrics_saved)
    }

    pub fn audio_saved(&self) -> usize {
        self.audio.as_ref().map_or(0, |r| r.audio_saved)
    }

    pub fn total_errors(&self) -> usize {
        self.phases().map(|r| r.failed).sum()
    }

    pub fn interrupted(&self) -> bool {
        self.phases().any(|r| r.interrupted)
    }

    fn phases(&self) -> impl Iterator<Item = &PhaseResult> {
        self.lyrics.iter().chain(self.audio.iter())
    }

    /// Format final summary table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Final Summary")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Count").fg(Color::Cyan),
            ]);
        table.add_row(vec![Cell::new("Total Songs"), Cell::new(self.total_items)]);
        table.add_row(vec![
            Cell::new("Lyrics Downloaded").fg(Color::Green),
            Cell::new(self.lyrics_saved()).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Audio Downloaded").fg(Color::Green),
            Cell::new(self.audio_saved()).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Total Errors"),
            Cell::new(self.total_errors()),
        ]);
        format!("\n{table}")
    }

    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    pub fn log(&self) {
        log::info!(
            "Done: {} songs, {} lyrics, {} audio, {} errors",
            self.total_items,
            self.lyrics_saved(),
            self.audio_saved(),
            self.total_errors()
        );
    }
}
