//! Phase orchestration over the whole catalog

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use indicatif::ProgressBar;
use songline_core::progress::item_message;
use songline_core::{ProgressContext, WorkQueue};

use crate::config::PipelineConfig;
use crate::ledger::ProgressStore;
use crate::source::PageSource;
use crate::state::{Item, Phase};
use crate::stats::{FinalSummary, ItemOutcome, PhaseResult};
use crate::worker::evaluate_item;

/// Run the given phases in order over the catalog.
///
/// Each phase is a complete pass; an interrupted phase stops the run.
/// Returns `Err` only when the output root cannot be created or the ledger
/// cannot be persisted.
pub fn run<S: PageSource + ?Sized>(
    items: &[Item],
    phases: &[Phase],
    source: &S,
    store: &mut ProgressStore,
    config: &PipelineConfig,
    progress: &ProgressContext,
    cancel: &AtomicBool,
) -> anyhow::Result<FinalSummary> {
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("Cannot create output directory {}", config.output_dir.display())
    })?;

    let prev = store.stats();
    if prev.completed > 0 {
        log::info!(
            "Found previous progress: {} completed, {} failed",
            prev.completed,
            prev.failed
        );
        log::info!("Resuming from where we left off");
    } else {
        log::info!("Starting fresh download");
    }

    let mut summary = FinalSummary {
        total_items: items.len(),
        lyrics: None,
        audio: None,
    };

    for (n, &phase) in phases.iter().enumerate() {
        log::info!("Phase {}: downloading {phase}", n + 1);
        let result = run_phase(items, phase, source, store, config, progress, cancel)?;
        if progress.is_tty() {
            result.print();
        } else {
            result.log();
        }
        let interrupted = result.interrupted;
        match phase {
            Phase::Lyrics => summary.lyrics = Some(result),
            Phase::Audio => summary.audio = Some(result),
        }
        if interrupted {
            log::warn!("Shutdown requested, stopping after {phase} phase. Progress saved.");
            break;
        }
    }

    Ok(summary)
}

/// One complete pass of `phase` over `items`.
///
/// Items run one at a time unless `config.workers > 1`. `cancel` is checked
/// before each item; items already recorded keep their ledger entries.
pub fn run_phase<S: PageSource + ?Sized>(
    items: &[Item],
    phase: Phase,
    source: &S,
    store: &mut ProgressStore,
    config: &PipelineConfig,
    progress: &ProgressContext,
    cancel: &AtomicBool,
) -> anyhow::Result<PhaseResult> {
    let pb = progress.phase_bar(phase.name(), items.len());
    let result = if config.is_parallel() {
        run_parallel(items, phase, source, store, config, progress, cancel, &pb)
    } else {
        run_sequential(items, phase, source, store, config, progress, cancel, &pb)
    };
    pb.finish_and_clear();
    result
}

#[allow(clippy::too_many_arguments)]
fn run_sequential<S: PageSource + ?Sized>(
    items: &[Item],
    phase: Phase,
    source: &S,
    store: &mut ProgressStore,
    config: &PipelineConfig,
    progress: &ProgressContext,
    cancel: &AtomicBool,
    pb: &ProgressBar,
) -> anyhow::Result<PhaseResult> {
    let total = items.len();
    let mut result = PhaseResult::new(phase, total);

    for (idx, item) in items.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            result.interrupted = true;
            break;
        }
        pb.set_message(item_message(idx + 1, total, &item.title));

        let needs = store.needs(phase, &item.url);
        let outcome = evaluate_item(item, phase, needs, source, config, progress);
        record_outcome(store, item, phase, &outcome)?;
        report(item, phase, &outcome);
        result.record(&item.title, &outcome);
        pb.inc(1);

        std::thread::sleep(config.request_delay);
    }

    Ok(result)
}

/// Items spread over `config.workers` threads. Ledger access is serialized
/// by a mutex; outcomes are folded back in catalog order.
#[allow(clippy::too_many_arguments)]
fn run_parallel<S: PageSource + ?Sized>(
    items: &[Item],
    phase: Phase,
    source: &S,
    store: &mut ProgressStore,
    config: &PipelineConfig,
    progress: &ProgressContext,
    cancel: &AtomicBool,
    pb: &ProgressBar,
) -> anyhow::Result<PhaseResult> {
    let total = items.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .build()
        .context("Failed to create thread pool")?;

    let queue = WorkQueue::new(items);
    let store = Mutex::new(store);
    let outcomes: Mutex<Vec<(usize, ItemOutcome)>> = Mutex::new(Vec::with_capacity(total));
    let ledger_error: Mutex<Option<anyhow::Error>> = Mutex::new(None);
    let abort = AtomicBool::new(false);

    pool.scope(|s| {
        for _ in 0..config.workers {
            s.spawn(|_| {
                while let Some((idx, item)) = queue.next() {
                    if cancel.load(Ordering::Relaxed) || abort.load(Ordering::Relaxed) {
                        break;
                    }
                    pb.set_message(item_message(idx + 1, total, &item.title));

                    let needs = store
                        .lock()
                        .expect("worker thread panicked")
                        .needs(phase, &item.url);
                    let outcome = evaluate_item(item, phase, needs, source, config, progress);

                    let recorded = {
                        let mut guard = store.lock().expect("worker thread panicked");
                        record_outcome(&mut guard, item, phase, &outcome)
                    };
                    if let Err(e) = recorded {
                        ledger_error
                            .lock()
                            .expect("worker thread panicked")
                            .get_or_insert(e);
                        abort.store(true, Ordering::Relaxed);
                        break;
                    }

                    report(item, phase, &outcome);
                    pb.inc(1);
                    outcomes
                        .lock()
                        .expect("worker thread panicked")
                        .push((idx, outcome));

                    std::thread::sleep(config.request_delay);
                }
            });
        }
    });

    if let Some(e) = ledger_error.into_inner().expect("worker thread panicked") {
        return Err(e);
    }

    let mut outcomes = outcomes.into_inner().expect("worker thread panicked");
    outcomes.sort_by_key(|(idx, _)| *idx);

    let mut result = PhaseResult::new(phase, total);
    for (idx, outcome) in &outcomes {
        result.record(&items[*idx].title, outcome);
    }
    result.interrupted = outcomes.len() < total && cancel.load(Ordering::Relaxed);
    Ok(result)
}

/// Write the outcome through to the ledger. Skips write nothing; so does a
/// failure without a URL, since the URL is the ledger key.
fn record_outcome(
    store: &mut ProgressStore,
    item: &Item,
    phase: Phase,
    outcome: &ItemOutcome,
) -> anyhow::Result<()> {
    let url = item.url.as_str();
    let written = match outcome {
        ItemOutcome::Skipped => Ok(()),
        ItemOutcome::Saved { lyrics, audio, .. } => {
            let has_lyrics = *lyrics || !store.needs_lyrics(url);
            let has_audio = *audio || !store.needs_audio(url);
            store.mark_completed(url, has_lyrics, has_audio)
        }
        ItemOutcome::Failed { .. } if !item.has_url() => Ok(()),
        ItemOutcome::Failed { reason } => store.mark_failed(url, reason),
    };
    written.with_context(|| format!("Cannot record {phase} progress for {url}"))
}

fn report(item: &Item, phase: Phase, outcome: &ItemOutcome) {
    match outcome {
        ItemOutcome::Skipped => log::debug!("{}: {phase} already done, skipped", item.title),
        ItemOutcome::Saved { message, .. } => log::debug!("{}: {message}", item.title),
        ItemOutcome::Failed { reason } => log::warn!("{}: {reason}", item.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use crate::download::DownloadResult;
    use songline_core::{FetchError, Page};

    const LYRICS_PAGE: &str = r#"<div class="entry-content"><p>Amen</p></div>"#;

    /// Serves the same page for every URL and counts requests
    struct CountingSource {
        body: &'static str,
        requests: AtomicUsize,
        /// Raise the cancel flag after this many requests
        cancel_after: Option<(usize, &'static AtomicBool)>,
    }

    impl CountingSource {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                requests: AtomicUsize::new(0),
                cancel_after: None,
            }
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl PageSource for CountingSource {
        fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
            let n = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((limit, flag)) = self.cancel_after {
                if n >= limit {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            Ok(Page {
                url: url.to_string(),
                status: 200,
                body: self.body.to_string(),
            })
        }

        fn download(&self, _url: &str, _dest: &Path, _pb: &ProgressBar) -> DownloadResult {
            DownloadResult::failed("unused")
        }
    }

    fn catalog(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(&format!("Song {i}"), "X", &format!("http://site/{i}")))
            .collect()
    }

    fn config(dir: &tempfile::TempDir, workers: usize) -> PipelineConfig {
        PipelineConfig {
            request_delay: Duration::ZERO,
            workers,
            ..PipelineConfig::new(dir.path().join("out"))
        }
    }

    #[test]
    fn second_lyrics_pass_is_all_skips() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 1);
        let items = catalog(3);
        let mut store = ProgressStore::load(&config.ledger_path);
        let cancel = AtomicBool::new(false);
        let progress = ProgressContext::hidden();

        let source = CountingSource::new(LYRICS_PAGE);
        let first = run_phase(&items, Phase::Lyrics, &source, &mut store, &config, &progress, &cancel)
            .unwrap();
        assert_eq!((first.success, first.skipped), (3, 0));

        let again = CountingSource::new(LYRICS_PAGE);
        let second = run_phase(&items, Phase::Lyrics, &again, &mut store, &config, &progress, &cancel)
            .unwrap();
        assert_eq!((second.success, second.skipped), (0, 3));
        assert_eq!(again.requests(), 0);
    }

    #[test]
    fn delay_follows_skipped_items_too() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            request_delay: Duration::from_millis(60),
            ..config(&dir, 1)
        };
        let items = catalog(3);
        let mut store = ProgressStore::load(&config.ledger_path);
        for item in &items {
            store.mark_completed(&item.url, true, false).unwrap();
        }

        let source = CountingSource::new(LYRICS_PAGE);
        let start = std::time::Instant::now();
        let result = run_phase(
            &items,
            Phase::Lyrics,
            &source,
            &mut store,
            &config,
            &ProgressContext::hidden(),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(result.skipped, 3);
        assert_eq!(source.requests(), 0);
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[test]
    fn missing_url_fails_without_ledger_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 1);
        let items = vec![Item::new("Nameless", "X", "")];
        let mut store = ProgressStore::load(&config.ledger_path);
        let source = CountingSource::new(LYRICS_PAGE);

        let result = run_phase(
            &items,
            Phase::Lyrics,
            &source,
            &mut store,
            &config,
            &ProgressContext::hidden(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors, vec!["Nameless: No URL provided".to_string()]);
        assert_eq!(source.requests(), 0);
        assert_eq!(store.stats().failed, 0);
    }

    #[test]
    fn cancel_stops_between_items() {
        static CANCEL: AtomicBool = AtomicBool::new(false);
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 1);
        let items = catalog(5);
        let mut store = ProgressStore::load(&config.ledger_path);
        let source = CountingSource {
            cancel_after: Some((2, &CANCEL)),
            ..CountingSource::new(LYRICS_PAGE)
        };

        let result = run_phase(
            &items,
            Phase::Lyrics,
            &source,
            &mut store,
            &config,
            &ProgressContext::hidden(),
            &CANCEL,
        )
        .unwrap();
        assert!(result.interrupted);
        assert_eq!(result.success, 2);
        assert_eq!(result.not_reached(), 3);

        // Both finished items survive on disk
        let reloaded = ProgressStore::load(&config.ledger_path);
        assert!(!reloaded.needs_lyrics("http://site/0"));
        assert!(!reloaded.needs_lyrics("http://site/1"));
        assert!(reloaded.needs_lyrics("http://site/2"));
    }

    #[test]
    fn parallel_pass_matches_sequential_counts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 4);
        let items = catalog(20);
        let mut store = ProgressStore::load(&config.ledger_path);
        let source = CountingSource::new("<p>no container</p>");

        let result = run_phase(
            &items,
            Phase::Lyrics,
            &source,
            &mut store,
            &config,
            &ProgressContext::hidden(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(result.failed, 20);
        assert_eq!(source.requests(), 20);
        assert!(!result.interrupted);
        // Errors come back in catalog order
        let expected: Vec<String> = (0..20)
            .map(|i| format!("Song {i}: No lyrics found"))
            .collect();
        assert_eq!(result.errors, expected);
        assert_eq!(store.stats().failed, 20);
    }

    #[test]
    fn ledger_failure_aborts_phase() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let config = PipelineConfig {
            ledger_path: blocker.join("ledger.json"),
            ..config(&dir, 1)
        };
        let mut store = ProgressStore::load(&config.ledger_path);

        let err = run_phase(
            &catalog(2),
            Phase::Lyrics,
            &CountingSource::new(LYRICS_PAGE),
            &mut store,
            &config,
            &ProgressContext::hidden(),
            &AtomicBool::new(false),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Cannot record lyrics progress"));
    }

    #[test]
    fn interrupted_lyrics_phase_skips_audio() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 1);
        let mut store = ProgressStore::load(&config.ledger_path);
        let cancel = AtomicBool::new(true);

        let summary = run(
            &catalog(2),
            Phase::all(),
            &CountingSource::new(LYRICS_PAGE),
            &mut store,
            &config,
            &ProgressContext::hidden(),
            &cancel,
        )
        .unwrap();
        assert!(summary.interrupted());
        assert!(summary.audio.is_none());
        assert!(config.output_dir.is_dir());
    }
}
