//! Output tree layout: `<root>/<title - artist>/{lyrics.txt, <title><ext>}`

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::state::Item;

pub const LYRICS_FILE: &str = "lyrics.txt";

/// Width of the `=` rule between the header block and the lyrics
pub const SEPARATOR_WIDTH: usize = 60;

/// Upper bound on a sanitized path segment, in characters
pub const MAX_NAME_CHARS: usize = 200;

/// Used when the audio URL carries no usable extension
pub const DEFAULT_AUDIO_EXT: &str = ".mp3";

const RESERVED: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Make `name` safe as a single path segment.
///
/// Reserved characters are removed, whitespace runs collapse to one space,
/// and the result is cut to [`MAX_NAME_CHARS`].
pub fn sanitize_filename(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| !RESERVED.contains(c)).collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Folder for one item. Items that sanitize alike share a folder.
pub fn song_folder(root: &Path, item: &Item) -> PathBuf {
    root.join(sanitize_filename(&format!("{} - {}", item.title, item.artists)))
}

/// Extension (with dot) from the last path segment of `url`, else `.mp3`
pub fn audio_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{ext}")
        }
        _ => DEFAULT_AUDIO_EXT.to_string(),
    }
}

/// Audio file name for an item, e.g. `Grace.mp3`
pub fn audio_file_name(item: &Item, audio_url: &str) -> String {
    format!("{}{}", sanitize_filename(&item.title), audio_extension(audio_url))
}

/// Header block, rule, blank line, body
pub fn format_lyrics(item: &Item, lyrics: &str) -> String {
    format!(
        "Title: {}\nArtist: {}\nSource: {}\n\n{}\n\n{}",
        item.title,
        item.artists,
        item.url,
        "=".repeat(SEPARATOR_WIDTH),
        lyrics
    )
}

/// Write `<folder>/lyrics.txt`, creating the folder if needed.
pub fn write_lyrics(folder: &Path, item: &Item, lyrics: &str) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(folder)
        .with_context(|| format!("Cannot create {}", folder.display()))?;
    let path = folder.join(LYRICS_FILE);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("Cannot create {}", path.display()))?;
    file.write_all(format_lyrics(item, lyrics).as_bytes())
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item::new("Grace", "Choir", "http://site/grace")
    }

    #[test]
    fn sanitize_removes_reserved_characters() {
        let name = sanitize_filename(r#"A/B\C*D?E:F"G<H>I|J"#);
        assert_eq!(name, "ABCDEFGHIJ");
    }

    #[test]
    fn sanitize_collapses_whitespace() {
        assert_eq!(sanitize_filename("  Oh   Lord\t\nMy God  "), "Oh Lord My God");
    }

    #[test]
    fn sanitize_is_bounded() {
        let long = format!("{}?{}", "a".repeat(150), "b ".repeat(100));
        let name = sanitize_filename(&long);
        assert!(name.chars().count() <= MAX_NAME_CHARS);
        assert!(!name.contains(RESERVED));
        assert!(!name.ends_with(' '));
    }

    #[test]
    fn sanitize_counts_characters_not_bytes() {
        let name = sanitize_filename(&"é".repeat(300));
        assert_eq!(name.chars().count(), MAX_NAME_CHARS);
    }

    #[test]
    fn folder_joins_title_and_artist() {
        let folder = song_folder(Path::new("/out"), &Item::new("Who: Me?", "X", "u"));
        assert_eq!(folder, Path::new("/out/Who Me - X"));
    }

    #[test]
    fn extension_from_url() {
        assert_eq!(audio_extension("https://cdn/x/song.m4a"), ".m4a");
        assert_eq!(audio_extension("https://cdn/x/song.WAV?dl=1"), ".WAV");
        assert_eq!(audio_extension("https://cdn/x/stream"), ".mp3");
        assert_eq!(audio_extension("https://cdn.example.com/play"), ".mp3");
        assert_eq!(audio_extension("https://cdn/x/.hidden"), ".mp3");
        assert_eq!(audio_extension("https://cdn/x/song.mp3-128k"), ".mp3");
    }

    #[test]
    fn audio_name_uses_sanitized_title() {
        let item = Item::new("Is It You?", "X", "u");
        assert_eq!(audio_file_name(&item, "https://cdn/a.mp3"), "Is It You.mp3");
    }

    #[test]
    fn lyrics_file_format() {
        let text = format_lyrics(&item(), "line one\nline two");
        let expected = format!(
            "Title: Grace\nArtist: Choir\nSource: http://site/grace\n\n{}\n\nline one\nline two",
            "=".repeat(60)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn write_lyrics_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let folder = song_folder(dir.path(), &item());
        let path = write_lyrics(&folder, &item(), "hello").unwrap();
        assert_eq!(path, folder.join(LYRICS_FILE));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.ends_with("\n\nhello"));
    }
}
