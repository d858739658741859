//! Audio and video references on a page.

use crate::links::sanitize_file_name;
use crate::scan::PageScan;
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

pub const MEDIA_EXTENSIONS: &[&str] = &["mp3", "mp4", "m4a", "wav", "ogg", "webm", "aac", "flac"];

static SCRIPT_MEDIA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"["'](https?://[^"'\s]+?\.(?:mp3|mp4|m4a|wav|ogg|webm|aac|flac)(?:\?[^"'\s]*)?)["']"#)
        .ok()
});

/// True when the URL path ends in a known media extension. The query is
/// ignored.
///
/// ```
/// use docarchive_web::media::is_media_url;
///
/// assert!(is_media_url("https://cdn.test/ep1.MP3?sig=abc"));
/// assert!(!is_media_url("https://cdn.test/mp3/index.html"));
/// ```
pub fn is_media_url(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or_default();
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        MEDIA_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

/// Media URLs referenced by the page, resolved against `base`: element
/// sources first, then media links, then absolute URLs quoted inside inline
/// scripts. Deduplicated, first occurrence wins.
pub fn media_urls(scan: &PageScan, base: &Url) -> Vec<Url> {
    let mut out: Vec<Url> = Vec::new();
    let mut add = |raw: &str| match base.join(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            if !out.contains(&url) {
                out.push(url);
            }
        }
        _ => tracing::debug!(raw = %raw, "media.unusable_reference"),
    };

    for src in &scan.media_sources {
        add(src);
    }
    for href in scan.anchors.iter().filter(|h| is_media_url(h)) {
        add(href);
    }
    if let Some(re) = SCRIPT_MEDIA.as_ref() {
        for script in &scan.scripts {
            let unescaped = script.replace("\\/", "/");
            for cap in re.captures_iter(&unescaped) {
                if let Some(m) = cap.get(1) {
                    add(m.as_str());
                }
            }
        }
    }
    out
}

/// Local file name for a media URL: its decoded last path segment, or
/// `media_<index>.mp3` when the path has none.
///
/// ```
/// use docarchive_web::media::media_file_name;
/// use url::Url;
///
/// let url = Url::parse("https://cdn.test/audio/Lesson%201.mp3?t=9").unwrap();
/// assert_eq!(media_file_name(&url, 0), "Lesson 1.mp3");
/// ```
pub fn media_file_name(url: &Url, index: usize) -> String {
    let last = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .filter(|s| !s.is_empty())
        .map(|s| {
            urlencoding::decode(s)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| s.to_string())
        });
    match last {
        Some(name) => sanitize_file_name(&name),
        None => format!("media_{index}.mp3"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_page;

    fn base() -> Url {
        Url::parse("https://site.test/lessons/1").unwrap()
    }

    #[test]
    fn recognises_extensions_case_insensitively() {
        for ok in ["a.mp3", "b.M4A", "/x/y.webm?x=1", "c.flac#t=3"] {
            assert!(is_media_url(ok), "{ok}");
        }
        for no in ["a.mp3.html", "mp4", "/video/", "a.txt?f=b.mp3"] {
            assert!(!is_media_url(no), "{no}");
        }
    }

    #[test]
    fn gathers_sources_links_and_script_urls() {
        let scan = scan_page(
            r#"
<audio controls><source src="/media/intro.mp3"></audio>
<video src="clip.mp4"></video>
<a href="/media/intro.mp3">again</a>
<a href="notes.pdf">notes</a>
<a href="https://cdn.test/ep2.ogg?dl=1">ep2</a>
<script>player.load({"src":"https:\/\/cdn.test\/ep3.m4a","poster":"https://cdn.test/p.jpg"});</script>
"#,
        );
        let urls: Vec<String> = media_urls(&scan, &base()).into_iter().map(String::from).collect();
        assert_eq!(
            urls,
            [
                "https://site.test/media/intro.mp3",
                "https://site.test/lessons/clip.mp4",
                "https://cdn.test/ep2.ogg?dl=1",
                "https://cdn.test/ep3.m4a",
            ]
        );
    }

    #[test]
    fn non_http_sources_are_ignored() {
        let scan = scan_page(r#"<audio src="data:audio/mp3;base64,AAAA"></audio>"#);
        assert!(media_urls(&scan, &base()).is_empty());
    }

    #[test]
    fn file_names_fall_back_to_an_index() {
        let url = Url::parse("https://cdn.test/stream/").unwrap();
        assert_eq!(media_file_name(&url, 3), "media_3.mp3");
        let url = Url::parse("https://cdn.test/a/b%3Fc.wav").unwrap();
        assert_eq!(media_file_name(&url, 0), "b_c.wav");
    }
}
