//! Terminal progress: one item counter per phase, one byte counter per
//! audio download. Off a terminal every bar is hidden and log lines carry
//! the progress instead.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Longest title shown in the phase bar message
const TITLE_WIDTH: usize = 35;

/// Longest file name shown as a download bar prefix
const FILE_WIDTH: usize = 30;

const PHASE_TEMPLATE: &str =
    "{spinner:.green} {prefix:<8.cyan.bold} {bar:30.magenta/dim} {pos}/{len} [{elapsed}] {wide_msg}";
const SIZED_TEMPLATE: &str =
    "  {prefix:<30.dim} {bar:30.green/dim} {binary_bytes:>9}/{binary_total_bytes:9} {eta:>4}";
const UNSIZED_TEMPLATE: &str = "  {prefix:<30.dim} {binary_bytes:>9} {spinner:.dim}";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).expect("invalid template")
}

/// Give a download bar a length once the server reports one.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_style(style(SIZED_TEMPLATE).progress_chars("=> "));
    pb.set_length(total);
}

/// `({idx}/{total}) {title}` with the title cut to a fixed width
pub fn item_message(idx: usize, total: usize, title: &str) -> String {
    let mut chars = title.chars();
    let short: String = chars.by_ref().take(TITLE_WIDTH).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("({idx}/{total}) {short}{ellipsis}")
}

/// Owns the `MultiProgress` all bars of a run are drawn into.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Bars are drawn only when stderr is a terminal.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Bars are never drawn (tests, piped output).
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Item counter for one pass of `phase` over `total` items.
    pub fn phase_bar(&self, phase: &str, total: usize) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(style(PHASE_TEMPLATE).progress_chars("━╸ "));
        pb.set_prefix(phase.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Byte counter for one download; unsized until [`upgrade_to_bar`].
    pub fn download_bar(&self, file_name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::no_length());
        pb.set_style(style(UNSIZED_TEMPLATE));
        pb.set_prefix(file_name.chars().take(FILE_WIDTH).collect::<String>());
        pb
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// For the log bridge, which suspends bars while printing
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared across the CLI and phase workers
pub type SharedProgress = Arc<ProgressContext>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_message_short_title() {
        assert_eq!(item_message(1, 3, "Grace"), "(1/3) Grace");
    }

    #[test]
    fn item_message_truncates_long_title() {
        let title = "x".repeat(50);
        let msg = item_message(2, 9, &title);
        assert_eq!(msg, format!("(2/9) {}...", "x".repeat(35)));
        assert_eq!(item_message(1, 1, &"y".repeat(35)), format!("(1/1) {}", "y".repeat(35)));
    }

    #[test]
    fn hidden_context_hands_out_hidden_bars() {
        let ctx = ProgressContext::hidden();
        assert!(!ctx.is_tty());
        assert!(ctx.phase_bar("lyrics", 10).is_hidden());
        assert!(ctx.download_bar("song.mp3").is_hidden());
    }

    #[test]
    fn upgrade_sets_length() {
        let pb = ProgressBar::hidden();
        upgrade_to_bar(&pb, 1024);
        assert_eq!(pb.length(), Some(1024));
    }
}
