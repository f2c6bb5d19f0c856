//! Processing of a single catalog item for one phase

use std::path::Path;

use reqwest::Url;
use songline_core::{ProgressContext, excerpt};

use crate::config::PipelineConfig;
use crate::extract::{extract_audio_url, extract_lyrics, parse_page};
use crate::layout::{audio_file_name, song_folder, write_lyrics};
use crate::source::PageSource;
use crate::state::{Item, Phase};
use crate::stats::ItemOutcome;

/// Characters of an unexpected error kept in the failure reason
const EXCERPT_CHARS: usize = 50;

/// Decide and run one item: missing URL, ledger skip, or real work.
///
/// `needs` is the ledger's answer for this phase and URL.
pub fn evaluate_item<S: PageSource + ?Sized>(
    item: &Item,
    phase: Phase,
    needs: bool,
    source: &S,
    config: &PipelineConfig,
    progress: &ProgressContext,
) -> ItemOutcome {
    if !item.has_url() {
        return ItemOutcome::failed_with(&["No URL provided".to_string()]);
    }
    if !needs {
        return ItemOutcome::Skipped;
    }
    process_item(item, phase, source, config, progress)
}

/// Fetch the item's page and produce this phase's artifact.
///
/// Every failure is folded into [`ItemOutcome::Failed`]; nothing escapes.
pub fn process_item<S: PageSource + ?Sized>(
    item: &Item,
    phase: Phase,
    source: &S,
    config: &PipelineConfig,
    progress: &ProgressContext,
) -> ItemOutcome {
    let page = match source.fetch_page(&item.url) {
        Ok(page) => page,
        Err(e) if e.is_timeout() => {
            return ItemOutcome::failed_with(&["Request timeout".to_string()]);
        }
        Err(e) => {
            return ItemOutcome::failed_with(&[format!("Error: {}", excerpt(&e, EXCERPT_CHARS))]);
        }
    };
    if !page.is_success() {
        return ItemOutcome::failed_with(&[format!("HTTP {}", page.status)]);
    }

    let folder = song_folder(&config.output_dir, item);
    match phase {
        Phase::Lyrics => {
            let lyrics = extract_lyrics(&parse_page(&page.body));
            save_lyrics(item, lyrics.as_deref(), &folder)
        }
        Phase::Audio => {
            let audio_url = extract_audio_url(&parse_page(&page.body));
            match audio_url {
                Some(raw) => {
                    let url = resolve_media_url(&page.url, &raw);
                    save_audio(item, &url, &folder, source, progress)
                }
                None => ItemOutcome::failed_with(&["No audio URL found".to_string()]),
            }
        }
    }
}

fn save_lyrics(item: &Item, lyrics: Option<&str>, folder: &Path) -> ItemOutcome {
    let Some(lyrics) = lyrics else {
        return ItemOutcome::failed_with(&["No lyrics found".to_string()]);
    };
    match write_lyrics(folder, item, lyrics) {
        Ok(_) => ItemOutcome::Saved {
            lyrics: true,
            audio: false,
            message: "✓ Lyrics saved".to_string(),
        },
        Err(e) => {
            log::warn!("{}: {e:#}", item.title);
            ItemOutcome::failed_with(&["Failed to save lyrics".to_string()])
        }
    }
}

fn save_audio<S: PageSource + ?Sized>(
    item: &Item,
    url: &str,
    folder: &Path,
    source: &S,
    progress: &ProgressContext,
) -> ItemOutcome {
    if let Err(e) = std::fs::create_dir_all(folder) {
        return ItemOutcome::failed_with(&[format!("Error: {}", excerpt(&e, EXCERPT_CHARS))]);
    }
    let file_name = audio_file_name(item, url);
    let dest = folder.join(&file_name);

    let pb = progress.download_bar(&file_name);
    let result = source.download(url, &dest, &pb);
    pb.finish_and_clear();

    if !result.success {
        return ItemOutcome::failed_with(&[format!("Audio failed: {}", result.message)]);
    }
    let size_mb = std::fs::metadata(&dest)
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);
    ItemOutcome::Saved {
        lyrics: false,
        audio: true,
        message: format!("✓ {file_name} saved ({size_mb:.1} MB)"),
    }
}

/// Resolve a possibly relative media URL against the page it came from.
pub fn resolve_media_url(page_url: &str, raw: &str) -> String {
    match Url::parse(page_url).and_then(|base| base.join(raw)) {
        Ok(url) => url.to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DownloadResult;
    use indicatif::ProgressBar;
    use songline_core::{FetchError, Page};

    /// Serves one canned page and writes fixed bytes on download
    struct StaticSource {
        status: u16,
        body: String,
        download_ok: bool,
    }

    impl StaticSource {
        fn page(body: &str) -> Self {
            Self {
                status: 200,
                body: body.to_string(),
                download_ok: true,
            }
        }
    }

    impl PageSource for StaticSource {
        fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
            Ok(Page {
                url: url.to_string(),
                status: self.status,
                body: self.body.clone(),
            })
        }

        fn download(&self, _url: &str, dest: &Path, _pb: &ProgressBar) -> DownloadResult {
            if !self.download_ok {
                return DownloadResult::failed("Download timeout exceeded");
            }
            std::fs::write(dest, vec![0u8; 1024 * 1024]).unwrap();
            DownloadResult::ok()
        }
    }

    struct TimeoutSource;

    impl PageSource for TimeoutSource {
        fn fetch_page(&self, _url: &str) -> Result<Page, FetchError> {
            Err(FetchError::Timeout("operation timed out".into()))
        }

        fn download(&self, _url: &str, _dest: &Path, _pb: &ProgressBar) -> DownloadResult {
            unreachable!("no download without a page")
        }
    }

    const LYRICS_PAGE: &str = r#"<div class="entry-content"><p>Holy<br>Holy</p></div>"#;
    const AUDIO_PAGE: &str = r#"<figure><audio src="/media/grace.mp3"></audio></figure>"#;

    fn item() -> Item {
        Item::new("Grace", "Choir", "http://site/grace")
    }

    fn run(phase: Phase, source: &impl PageSource, dir: &tempfile::TempDir) -> ItemOutcome {
        let config = PipelineConfig::new(dir.path());
        process_item(&item(), phase, source, &config, &ProgressContext::hidden())
    }

    #[test]
    fn lyrics_hit_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(Phase::Lyrics, &StaticSource::page(LYRICS_PAGE), &dir);
        assert!(matches!(
            outcome,
            ItemOutcome::Saved {
                lyrics: true,
                audio: false,
                ..
            }
        ));
        let text = std::fs::read_to_string(dir.path().join("Grace - Choir/lyrics.txt")).unwrap();
        assert!(text.starts_with("Title: Grace\nArtist: Choir\nSource: http://site/grace\n"));
        assert!(text.ends_with("Holy\nHoly"));
    }

    #[test]
    fn lyrics_miss() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(Phase::Lyrics, &StaticSource::page("<p>nothing</p>"), &dir);
        assert_eq!(outcome, ItemOutcome::failed_with(&["No lyrics found".into()]));
    }

    #[test]
    fn error_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource {
            status: 404,
            ..StaticSource::page(LYRICS_PAGE)
        };
        let outcome = run(Phase::Lyrics, &source, &dir);
        assert_eq!(outcome, ItemOutcome::failed_with(&["HTTP 404".into()]));
    }

    #[test]
    fn timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(Phase::Audio, &TimeoutSource, &dir);
        assert_eq!(outcome, ItemOutcome::failed_with(&["Request timeout".into()]));
    }

    #[test]
    fn audio_hit_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(Phase::Audio, &StaticSource::page(AUDIO_PAGE), &dir);
        assert_eq!(
            outcome,
            ItemOutcome::Saved {
                lyrics: false,
                audio: true,
                message: "✓ Grace.mp3 saved (1.0 MB)".into(),
            }
        );
        assert!(dir.path().join("Grace - Choir/Grace.mp3").exists());
    }

    #[test]
    fn audio_download_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = StaticSource {
            download_ok: false,
            ..StaticSource::page(AUDIO_PAGE)
        };
        let outcome = run(Phase::Audio, &source, &dir);
        assert_eq!(
            outcome,
            ItemOutcome::failed_with(&["Audio failed: Download timeout exceeded".into()])
        );
    }

    #[test]
    fn audio_miss() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run(Phase::Audio, &StaticSource::page(LYRICS_PAGE), &dir);
        assert_eq!(outcome, ItemOutcome::failed_with(&["No audio URL found".into()]));
    }

    #[test]
    fn missing_url_and_skip_do_not_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::new(dir.path());
        let progress = ProgressContext::hidden();
        let no_url = Item::new("A", "X", "");

        let outcome = evaluate_item(&no_url, Phase::Lyrics, true, &TimeoutSource, &config, &progress);
        assert_eq!(outcome, ItemOutcome::failed_with(&["No URL provided".into()]));

        let outcome = evaluate_item(&item(), Phase::Lyrics, false, &TimeoutSource, &config, &progress);
        assert_eq!(outcome, ItemOutcome::Skipped);
    }

    #[test]
    fn media_urls_resolve_against_page() {
        assert_eq!(
            resolve_media_url("http://site/songs/grace/", "/media/a.mp3"),
            "http://site/media/a.mp3"
        );
        assert_eq!(
            resolve_media_url("http://site/songs/grace/", "a.mp3"),
            "http://site/songs/grace/a.mp3"
        );
        assert_eq!(
            resolve_media_url("http://site/x", "https://cdn/a.mp3"),
            "https://cdn/a.mp3"
        );
        assert_eq!(resolve_media_url("not a url", "a.mp3"), "a.mp3");
    }
}
