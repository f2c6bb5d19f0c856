use songline_scrape::extract::{extract_audio_url, extract_lyrics, parse_page};
use songline_scrape::layout::sanitize_filename;

fn synthetic_page(paragraphs: usize) -> String {
    let mut body = String::from(r#"<html><body><div class="entry-content entry clearfix">"#);
    for i in 0..paragraphs {
        body.push_str(&format!("<p>Verse {i} line one<br>line two<br>line three</p>"));
    }
    body.push_str("<p>Download Mp3</p></div>");
    body.push_str(r#"<a href="/files/song.mp3">Download</a></body></html>"#);
    body
}

#[divan::bench(args = [10, 50, 200])]
fn lyrics_chain(bencher: divan::Bencher, paragraphs: usize) {
    let html = synthetic_page(paragraphs);
    bencher.bench(|| {
        let doc = parse_page(&html);
        extract_lyrics(&doc)
    });
}

#[divan::bench(args = [10, 50, 200])]
fn audio_chain_falls_through(bencher: divan::Bencher, paragraphs: usize) {
    // No audio element, so every probe runs before the link matches
    let html = synthetic_page(paragraphs);
    bencher.bench(|| {
        let doc = parse_page(&html);
        extract_audio_url(&doc)
    });
}

#[divan::bench]
fn sanitize_long_title(bencher: divan::Bencher) {
    let title = "Great Is Thy Faithfulness: O God <My Father> ".repeat(8);
    bencher.bench(|| sanitize_filename(&title));
}

fn main() {
    divan::main();
}
