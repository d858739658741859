//! Same-site document links, page titles and archive paths for crawled pages.

use crate::scan::PageScan;
use url::Url;

/// Which anchors count as documentation pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFilter {
    /// Hrefs containing any of these substrings are dropped.
    pub exclude: Vec<String>,
}

impl Default for LinkFilter {
    fn default() -> Self {
        Self {
            exclude: ["download", "api", "release-notes"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl LinkFilter {
    fn accepts_href(&self, href: &str) -> bool {
        let href = href.trim();
        !href.is_empty()
            && !href.starts_with('#')
            && !self
                .exclude
                .iter()
                .any(|needle| !needle.is_empty() && href.contains(needle.as_str()))
    }
}

/// Resolve the page's anchors against `start` and keep the same-host
/// document links, without fragments, deduplicated in document order.
/// `start` itself is never returned.
///
/// ```
/// use docarchive_web::links::{LinkFilter, document_links};
/// use docarchive_web::scan::scan_page;
/// use url::Url;
///
/// let start = Url::parse("https://code.example.com/docs/").unwrap();
/// let scan = scan_page(r#"<a href="setup">Setup</a><a href="https://other.test/x">x</a>"#);
/// let links = document_links(&scan, &start, &LinkFilter::default());
/// assert_eq!(links[0].as_str(), "https://code.example.com/docs/setup");
/// assert_eq!(links.len(), 1);
/// ```
pub fn document_links(scan: &PageScan, start: &Url, filter: &LinkFilter) -> Vec<Url> {
    let mut out: Vec<Url> = Vec::new();
    for href in &scan.anchors {
        if !filter.accepts_href(href) {
            continue;
        }
        let Ok(mut url) = start.join(href.trim()) else {
            tracing::debug!(href = %href, "links.unparseable");
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") || url.host_str() != start.host_str() {
            continue;
        }
        url.set_fragment(None);
        if same_page(&url, start) || out.contains(&url) {
            continue;
        }
        out.push(url);
    }
    out
}

fn same_page(a: &Url, b: &Url) -> bool {
    let trim = |u: &Url| {
        let mut u = u.clone();
        u.set_fragment(None);
        u.as_str().trim_end_matches('/').to_string()
    };
    trim(a) == trim(b)
}

/// Title for a crawled page: first `<h1>`, then `<title>` up to its last
/// `|`, then `og:title`, then the last URL segment.
pub fn page_title(scan: &PageScan, url: &Url) -> String {
    let from_title = scan.title.as_deref().map(|t| match t.rfind('|') {
        Some(idx) => t[..idx].trim().to_string(),
        None => t.trim().to_string(),
    });

    [scan.h1.clone(), from_title, scan.og_title.clone()]
        .into_iter()
        .flatten()
        .find(|t| !t.is_empty())
        .or_else(|| title_from_url(url))
        .unwrap_or_else(|| "Document".to_string())
}

fn title_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let decoded = urlencoding::decode(last).map(|c| c.into_owned()).ok()?;
    let title = decoded.replace(['-', '_'], " ").trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// Replace characters that are not portable in file names and cap the length.
///
/// ```
/// use docarchive_web::links::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("Setup: a/b?"), "Setup_ a_b_");
/// assert_eq!(sanitize_file_name("   "), "document");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed: String = replaced.trim().chars().take(200).collect();
    match trimmed.trim() {
        "" | "." | ".." => "document".to_string(),
        t => t.to_string(),
    }
}

/// Archive-relative `.txt` path mirroring the URL path. Index-like pages
/// (empty path or a trailing `docs` segment) are named after `title`.
///
/// ```
/// use docarchive_web::links::archive_path_for;
/// use url::Url;
///
/// let url = Url::parse("https://code.example.com/docs/en/hooks").unwrap();
/// assert_eq!(archive_path_for(&url, "Hooks"), "docs/en/hooks.txt");
/// ```
pub fn archive_path_for(url: &Url, title: &str) -> String {
    let segments: Vec<String> = url
        .path_segments()
        .map(|s| {
            s.filter(|p| !p.is_empty())
                .map(|p| {
                    urlencoding::decode(p)
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| p.to_string())
                })
                .collect()
        })
        .unwrap_or_default();

    let Some((last, dirs)) = segments.split_last() else {
        return format!("{}.txt", sanitize_file_name(title));
    };

    let mut parts: Vec<String> = dirs.iter().map(|d| sanitize_file_name(d)).collect();
    let stem = if last == "docs" { title } else { last.as_str() };
    parts.push(format!("{}.txt", sanitize_file_name(stem)));
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_page;

    fn start() -> Url {
        Url::parse("https://code.example.com/docs/").unwrap()
    }

    #[test]
    fn keeps_only_same_host_document_links() {
        let scan = scan_page(
            r##"
<a href="#intro">skip</a>
<a href="setup#install">Setup</a>
<a href="/docs/setup">Setup again</a>
<a href="https://code.example.com/docs/api/reference">API</a>
<a href="/download/linux">Download</a>
<a href="release-notes/v1">Notes</a>
<a href="https://elsewhere.test/docs/x">Elsewhere</a>
<a href="mailto:team@example.com">Mail</a>
<a href="/docs">Home</a>
<a href="editor/keys">Keys</a>
"##,
        );
        let links: Vec<String> = document_links(&scan, &start(), &LinkFilter::default())
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            links,
            [
                "https://code.example.com/docs/setup",
                "https://code.example.com/docs/editor/keys"
            ]
        );
    }

    #[test]
    fn exclusions_are_configurable() {
        let scan = scan_page(r#"<a href="/docs/api">API</a><a href="/docs/beta/x">Beta</a>"#);
        let filter = LinkFilter {
            exclude: vec!["beta".into()],
        };
        let links = document_links(&scan, &start(), &filter);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].path(), "/docs/api");
    }

    #[test]
    fn title_prefers_heading_then_title_then_og() {
        let url = Url::parse("https://e.test/docs/getting-started").unwrap();

        let scan = scan_page("<title>T | Site</title><h1>Heading</h1>");
        assert_eq!(page_title(&scan, &url), "Heading");

        let scan = scan_page("<title>Editing | Code | Site</title>");
        assert_eq!(page_title(&scan, &url), "Editing | Code");

        let scan = scan_page(r#"<title>| Site</title><meta property="og:title" content="OG">"#);
        assert_eq!(page_title(&scan, &url), "OG");

        let scan = scan_page("<p>nothing</p>");
        assert_eq!(page_title(&scan, &url), "getting started");

        let root = Url::parse("https://e.test/").unwrap();
        assert_eq!(page_title(&scan, &root), "Document");
    }

    #[test]
    fn paths_mirror_the_url() {
        let url = Url::parse("https://e.test/docs/editor/keys?x=1").unwrap();
        assert_eq!(archive_path_for(&url, "Keys"), "docs/editor/keys.txt");

        let url = Url::parse("https://e.test/docs/").unwrap();
        assert_eq!(archive_path_for(&url, "Overview"), "Overview.txt");

        let url = Url::parse("https://e.test/").unwrap();
        assert_eq!(archive_path_for(&url, "Home: Start"), "Home_ Start.txt");

        let url = Url::parse("https://e.test/guide/docs").unwrap();
        assert_eq!(archive_path_for(&url, "Guide"), "guide/Guide.txt");

        let url = Url::parse("https://e.test/a%20b/c..d").unwrap();
        assert_eq!(archive_path_for(&url, "x"), "a b/c..d.txt");
    }

    #[test]
    fn sanitized_names_are_bounded() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_file_name(&long).len(), 200);
        assert_eq!(sanitize_file_name(".."), "document");
        assert_eq!(sanitize_file_name(r#"a<b>c"d\e*f"#), "a_b_c_d_e_f");
    }
}
