//! Content extraction from parsed song pages.
//!
//! Two ordered strategy chains, each a list of pure probes
//! `(&Html) -> Option<String>`. The first probe that returns a value wins.

use std::sync::LazyLock;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Paragraphs starting with these are page chrome, not lyrics
const BOILERPLATE_PREFIXES: [&str; 3] = ["Download", "Listen", "Share"];

/// Link targets recognised by the anchor probe (compared lowercase)
const AUDIO_EXTENSIONS: [&str; 3] = [".mp3", ".wav", ".m4a"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

static PRIMARY_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| selector("div.entry-content.entry.clearfix"));
static GENERIC_CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div.entry-content"));
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static FIGURE: LazyLock<Selector> = LazyLock::new(|| selector("figure"));
static AUDIO: LazyLock<Selector> = LazyLock::new(|| selector("audio"));
static SOURCE: LazyLock<Selector> = LazyLock::new(|| selector("source"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

/// A probe for one kind of artifact
pub type Probe = fn(&Html) -> Option<String>;

/// Audio probes in precedence order
pub const AUDIO_PROBES: [(&str, Probe); 3] = [
    ("figure audio", figure_audio_src),
    ("audio element", any_audio_src),
    ("download link", audio_link_href),
];

/// Parse a page body. Parsing is lenient and never fails.
pub fn parse_page(body: &str) -> Html {
    Html::parse_document(body)
}

// ---------------------------------------------------------------------------
// Lyrics
// ---------------------------------------------------------------------------

/// Lyric text from the post body, paragraphs separated by a blank line.
///
/// `<br>` inside a paragraph becomes a newline. Empty paragraphs and
/// boilerplate ("Download…", "Listen…", "Share…") are dropped.
pub fn extract_lyrics(doc: &Html) -> Option<String> {
    let container = content_container(doc)?;
    let sections: Vec<String> = container
        .select(&PARAGRAPH)
        .map(paragraph_text)
        .filter(|text| !text.is_empty() && !is_boilerplate(text))
        .collect();

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

/// Specific class combination first, then the generic one
fn content_container(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&PRIMARY_CONTAINER)
        .next()
        .or_else(|| doc.select(&GENERIC_CONTAINER).next())
}

fn paragraph_text(p: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in p.descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "br" => text.push('\n'),
            _ => {}
        }
    }
    text.trim().to_string()
}

fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE_PREFIXES.iter().any(|p| text.starts_with(p))
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// First audio URL found by [`AUDIO_PROBES`], untouched (may be relative).
pub fn extract_audio_url(doc: &Html) -> Option<String> {
    AUDIO_PROBES.iter().find_map(|(name, probe)| {
        let found = probe(doc);
        if let Some(url) = &found {
            log::trace!("audio url via {name}: {url}");
        }
        found
    })
}

/// `src` of the first `<audio>` inside the first `<figure>`
pub fn figure_audio_src(doc: &Html) -> Option<String> {
    let figure = doc.select(&FIGURE).next()?;
    let audio = figure.select(&AUDIO).next()?;
    non_empty_attr(audio, "src")
}

/// First `<audio>` in the document: its `src`, else a nested `<source src>`
pub fn any_audio_src(doc: &Html) -> Option<String> {
    let audio = doc.select(&AUDIO).next()?;
    non_empty_attr(audio, "src").or_else(|| {
        audio
            .select(&SOURCE)
            .next()
            .and_then(|source| non_empty_attr(source, "src"))
    })
}

/// First `<a href>` whose target ends in a known audio extension
pub fn audio_link_href(doc: &Html) -> Option<String> {
    doc.select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| has_audio_extension(href))
        .map(str::to_string)
}

fn has_audio_extension(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn non_empty_attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
