//! Single-pass inventory of a page: anchors, media sources, title candidates
//! and inline script bodies.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

/// Raw attribute values as they appear in the document, in document order.
/// Nothing is resolved or filtered here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    /// Non-empty `href`s of `<a>` elements.
    pub anchors: Vec<String>,
    /// `src` of `<audio>`/`<video>` and of `<source>` nested in them.
    pub media_sources: Vec<String>,
    /// Text of the first `<h1>`, whitespace-collapsed.
    pub h1: Option<String>,
    pub title: Option<String>,
    /// `<meta property="og:title" content="...">`.
    pub og_title: Option<String>,
    /// Bodies of inline `<script>` elements.
    pub scripts: Vec<String>,
}

/// ```
/// use docarchive_web::scan::scan_page;
///
/// let scan = scan_page(r#"<title>Hooks | Docs</title><h1>Hooks <em>guide</em></h1>
/// <a href="/docs/en/mcp">MCP</a><audio src="intro.mp3"></audio>"#);
/// assert_eq!(scan.title.as_deref(), Some("Hooks | Docs"));
/// assert_eq!(scan.h1.as_deref(), Some("Hooks guide"));
/// assert_eq!(scan.anchors, ["/docs/en/mcp"]);
/// assert_eq!(scan.media_sources, ["intro.mp3"]);
/// ```
pub fn scan_page(html: &str) -> PageScan {
    let mut tokenizer = Tokenizer::new(ScanSink::default(), TokenizerOpts::default());
    let mut input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(html));
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();

    let scan = tokenizer.sink.scan;
    tracing::trace!(
        anchors = scan.anchors.len(),
        media = scan.media_sources.len(),
        scripts = scan.scripts.len(),
        "scan.page"
    );
    scan
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Heading,
    Title,
    Script,
}

#[derive(Default)]
struct ScanSink {
    scan: PageScan,
    capture: Option<(Capture, String)>,
    /// Open `<audio>`/`<video>` elements.
    media_depth: usize,
}

fn attr<'t>(tag: &'t Tag, name: &str) -> Option<&'t str> {
    tag.attrs
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| &*a.value)
        .filter(|v| !v.trim().is_empty())
}

fn collapse_whitespace(text: &str) -> Option<String> {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!joined.is_empty()).then_some(joined)
}

impl ScanSink {
    fn start(&mut self, tag: &Tag) -> Option<RawKind> {
        let name: &str = &tag.name;
        match name {
            "a" => {
                if let Some(href) = attr(tag, "href") {
                    self.scan.anchors.push(href.to_string());
                }
            }
            "audio" | "video" => {
                if let Some(src) = attr(tag, "src") {
                    self.scan.media_sources.push(src.to_string());
                }
                if !tag.self_closing {
                    self.media_depth += 1;
                }
            }
            "source" if self.media_depth > 0 => {
                if let Some(src) = attr(tag, "src") {
                    self.scan.media_sources.push(src.to_string());
                }
            }
            "meta" if self.scan.og_title.is_none() => {
                if attr(tag, "property").is_some_and(|p| p.eq_ignore_ascii_case("og:title")) {
                    self.scan.og_title = attr(tag, "content").and_then(collapse_whitespace);
                }
            }
            "h1" if self.scan.h1.is_none() && self.capture.is_none() => {
                self.capture = Some((Capture::Heading, String::new()));
            }
            "title" if !tag.self_closing => {
                if self.scan.title.is_none() {
                    self.capture = Some((Capture::Title, String::new()));
                }
                return Some(RawKind::Rcdata);
            }
            "script" if !tag.self_closing => {
                self.capture = Some((Capture::Script, String::new()));
                return Some(RawKind::ScriptData);
            }
            "style" if !tag.self_closing => return Some(RawKind::Rawtext),
            _ => {}
        }
        None
    }

    fn end(&mut self, name: &str) {
        let closes = match name {
            "audio" | "video" => {
                self.media_depth = self.media_depth.saturating_sub(1);
                None
            }
            "h1" => Some(Capture::Heading),
            "title" => Some(Capture::Title),
            "script" => Some(Capture::Script),
            _ => None,
        };

        let Some(kind) = closes else { return };
        if !matches!(&self.capture, Some((open, _)) if *open == kind) {
            return;
        }
        if let Some((_, text)) = self.capture.take() {
            match kind {
                Capture::Heading => self.scan.h1 = collapse_whitespace(&text),
                Capture::Title => self.scan.title = collapse_whitespace(&text),
                Capture::Script => {
                    if !text.trim().is_empty() {
                        self.scan.scripts.push(text);
                    }
                }
            }
        }
    }
}

impl TokenSink for ScanSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::CharacterTokens(text) => {
                if let Some((_, buf)) = self.capture.as_mut() {
                    buf.push_str(&text);
                }
            }
            Token::TagToken(tag) => match tag.kind {
                TagKind::StartTag => {
                    if let Some(kind) = self.start(&tag) {
                        return TokenSinkResult::RawData(kind);
                    }
                }
                TagKind::EndTag => self.end(&tag.name),
            },
            _ => {}
        }
        TokenSinkResult::Continue
    }
}
