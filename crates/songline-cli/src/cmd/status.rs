//! Status subcommand: what the ledger says has been done

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use songline_scrape::ProgressStore;

use crate::config::Config;

/// Failures listed, newest first
const MAX_FAILURES: usize = 20;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Progress ledger path (default: <output>/scraper_progress.json)
    #[arg(long)]
    pub ledger: Option<PathBuf>,

    /// Output root the ledger lives in
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<ExitCode> {
    let root = config.output_root(args.output);
    let ledger = config.ledger_path(&root, args.ledger);
    if !ledger.exists() {
        eprintln!("No ledger at {}", ledger.display());
        return Ok(ExitCode::SUCCESS);
    }
    let store = ProgressStore::load(&ledger);
    eprintln!("{}", format_status(&store));
    Ok(ExitCode::SUCCESS)
}

fn format_status(store: &ProgressStore) -> String {
    let stats = store.stats();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(format!("Ledger {}", store.path().display()))
                .fg(Color::Cyan)
                .add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Count").fg(Color::Cyan),
        ]);
    table.add_row(vec![Cell::new("Completed"), Cell::new(stats.completed)]);
    table.add_row(vec![Cell::new("  Lyrics done"), Cell::new(stats.lyrics_done)]);
    table.add_row(vec![Cell::new("  Audio done"), Cell::new(stats.audio_done)]);
    table.add_row(vec![Cell::new("Failed"), Cell::new(stats.failed)]);
    let mut out = format!("\n{table}");

    let failures = store.recent_failures(MAX_FAILURES);
    if !failures.is_empty() {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("URL").fg(Color::Cyan),
                Cell::new("Reason").fg(Color::Cyan),
                Cell::new("When (UTC)").fg(Color::Cyan),
            ]);
        for (url, entry) in &failures {
            table.add_row(vec![
                Cell::new(url),
                Cell::new(&entry.reason).fg(Color::Red),
                Cell::new(fmt_timestamp(entry.timestamp)),
            ]);
        }
        out.push_str(&format!("\n{table}"));
        if stats.failed > failures.len() {
            out.push_str(&format!(
                "\n  ... and {} older failures",
                stats.failed - failures.len()
            ));
        }
    }
    out
}

fn fmt_timestamp(secs: f64) -> String {
    chrono::DateTime::from_timestamp_millis((secs * 1000.0) as i64)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
