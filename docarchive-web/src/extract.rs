//! Markup-to-text extraction.
//!
//! The extractor is an accumulator over a stream of [`MarkupEvent`]s. Each
//! call to [`html_to_text`] tokenizes the document with html5ever and folds
//! the resulting events into a fresh [`ExtractionState`]; nothing is shared
//! between calls.
//!
//! Output rules:
//!
//! - text inside skip elements (`script`, `style`, `head`, ...) is dropped;
//! - block elements start a new line;
//! - an anchor with an `href` inserts ` (href) ` where it opens, even inside a
//!   skipped region;
//! - every text run is trimmed and followed by one space;
//! - lines are trimmed and blank runs collapse to a single blank line.
//!
//! ```
//! use docarchive_web::extract::html_to_text;
//!
//! let text = html_to_text(r#"<h1>Title</h1><p>Read <a href="/docs">the docs</a>.</p>"#);
//! assert_eq!(text, "Title\nRead  (/docs) the docs .");
//! ```

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};

use crate::tags::{TagClass, is_raw_text};

/// One parse event, with tag names in any case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupEvent {
    Start {
        name: String,
        href: Option<String>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

impl MarkupEvent {
    pub fn start(name: impl Into<String>) -> Self {
        Self::Start {
            name: name.into(),
            href: None,
            self_closing: false,
        }
    }

    pub fn anchor(href: impl Into<String>) -> Self {
        Self::Start {
            name: "a".into(),
            href: Some(href.into()),
            self_closing: false,
        }
    }

    pub fn end(name: impl Into<String>) -> Self {
        Self::End { name: name.into() }
    }

    pub fn text(data: impl Into<String>) -> Self {
        Self::Text(data.into())
    }
}

/// Accumulated output of a single extraction run.
#[derive(Debug, Default)]
pub struct ExtractionState {
    fragments: Vec<String>,
    skip_depth: usize,
}

impl ExtractionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of skip elements currently open.
    pub fn skip_depth(&self) -> usize {
        self.skip_depth
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn apply(&mut self, event: MarkupEvent) {
        match event {
            MarkupEvent::Start {
                name,
                href,
                self_closing,
            } => {
                self.start_tag(&name, href.as_deref());
                if self_closing {
                    self.end_tag(&name);
                }
            }
            MarkupEvent::End { name } => self.end_tag(&name),
            MarkupEvent::Text(data) => self.text(&data),
        }
    }

    fn start_tag(&mut self, name: &str, href: Option<&str>) {
        match TagClass::of(name) {
            TagClass::Skip => self.skip_depth += 1,
            TagClass::Block => self.break_line(),
            _ => {}
        }

        if name.eq_ignore_ascii_case("a") {
            if let Some(target) = href.filter(|h| !h.is_empty()) {
                self.fragments.push(format!(" ({target}) "));
            }
        }
    }

    fn end_tag(&mut self, name: &str) {
        match TagClass::of(name) {
            TagClass::Skip => {
                self.skip_depth = self.skip_depth.saturating_sub(1);
            }
            TagClass::Block => self.break_line(),
            _ => {}
        }
    }

    fn text(&mut self, data: &str) {
        if self.skip_depth > 0 {
            return;
        }
        let trimmed = data.trim();
        if !trimmed.is_empty() {
            self.fragments.push(format!("{trimmed} "));
        }
    }

    fn break_line(&mut self) {
        if let Some(last) = self.fragments.last() {
            if !last.ends_with('\n') {
                self.fragments.push("\n".into());
            }
        }
    }

    /// Concatenate the fragments and normalise blank lines.
    pub fn finish(self) -> String {
        collapse_blank_lines(&self.fragments.concat())
    }
}

/// Fold a sequence of events into plain text.
///
/// ```
/// use docarchive_web::extract::{MarkupEvent, extract_events};
///
/// let text = extract_events([
///     MarkupEvent::start("p"),
///     MarkupEvent::text(" A "),
///     MarkupEvent::end("p"),
///     MarkupEvent::start("p"),
///     MarkupEvent::text("B"),
///     MarkupEvent::end("p"),
/// ]);
/// assert_eq!(text, "A\nB");
/// ```
pub fn extract_events<I>(events: I) -> String
where
    I: IntoIterator<Item = MarkupEvent>,
{
    let mut state = ExtractionState::new();
    for event in events {
        state.apply(event);
    }
    state.finish()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0b}' | '\u{0c}' | '\u{1c}' | '\u{1d}' | '\u{1e}' | '\u{85}' | '\u{2028}'
            | '\u{2029}'
    )
}

/// Trim every line and keep at most one blank line between non-blank lines.
/// Trailing blank lines are dropped, so applying this twice is a no-op.
///
/// ```
/// use docarchive_web::extract::collapse_blank_lines;
///
/// let once = collapse_blank_lines("  a \n\n\n\n b\n \n");
/// assert_eq!(once, "a\n\nb");
/// assert_eq!(collapse_blank_lines(&once), once);
/// ```
pub fn collapse_blank_lines(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n");
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    for line in normalized.split(is_line_break) {
        let s = line.trim();
        if s.is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                lines.push("");
            }
        } else {
            lines.push(s);
            blank_run = 0;
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Bridges html5ever tokens to [`MarkupEvent`]s.
///
/// Character tokens are buffered so that the text between two tags reaches
/// the state as one event.
#[derive(Default)]
struct EventSink {
    state: ExtractionState,
    pending_text: String,
}

impl EventSink {
    fn flush_text(&mut self) {
        if !self.pending_text.is_empty() {
            let text = std::mem::take(&mut self.pending_text);
            self.state.apply(MarkupEvent::Text(text));
        }
    }
}

impl TokenSink for EventSink {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            Token::CharacterTokens(text) => self.pending_text.push_str(&text),
            Token::TagToken(tag) => {
                self.flush_text();
                let name: &str = &tag.name;
                match tag.kind {
                    TagKind::StartTag => {
                        let href = tag
                            .attrs
                            .iter()
                            .find(|attr| &*attr.name.local == "href")
                            .map(|attr| attr.value.to_string());
                        let raw = !tag.self_closing && is_raw_text(name);
                        self.state.apply(MarkupEvent::Start {
                            name: name.to_string(),
                            href,
                            self_closing: tag.self_closing,
                        });
                        if raw {
                            let kind = if name == "script" {
                                RawKind::ScriptData
                            } else {
                                RawKind::Rawtext
                            };
                            return TokenSinkResult::RawData(kind);
                        }
                    }
                    TagKind::EndTag => self.state.apply(MarkupEvent::end(name)),
                }
            }
            Token::CommentToken(_) | Token::DoctypeToken(_) | Token::EOFToken => self.flush_text(),
            Token::NullCharacterToken | Token::ParseError(_) => {}
        }
        TokenSinkResult::Continue
    }
}

/// Convert an HTML document into normalised plain text.
///
/// Never fails: malformed markup degrades to text.
pub fn html_to_text(html: &str) -> String {
    let mut tokenizer = Tokenizer::new(EventSink::default(), TokenizerOpts::default());
    let mut input = BufferQueue::default();
    input.push_back(StrTendril::from_slice(html));
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();

    let mut sink = tokenizer.sink;
    sink.flush_text();
    let fragments = sink.state.fragments().len();
    let text = sink.state.finish();
    tracing::trace!(
        html_len = html.len(),
        fragments,
        text_len = text.len(),
        "extract.html_to_text"
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_document() {
        let html = "<html><head><style>.x{color:red}</style></head><body><h1>Title</h1>\
<p>Hello <a href=\"https://e.com\">world</a>.</p></body></html>";
        assert_eq!(html_to_text(html), "Title\nHello  (https://e.com) world .");
    }

    #[test]
    fn adjacent_paragraphs_are_one_line_apart() {
        let text = html_to_text("<p>A</p><p>B</p>");
        assert_eq!(text.lines().collect::<Vec<_>>(), ["A", "B"]);
    }

    #[test]
    fn script_contents_never_appear() {
        let text = html_to_text(
            "<p>before</p><script>var secret = '<p>not a tag</p>'; if (a < b) {}</script><p>after</p>",
        );
        assert!(!text.contains("secret"));
        assert!(!text.contains("not a tag"));
        assert_eq!(text, "before\nafter");
    }

    #[test]
    fn wholly_skipped_document_is_empty() {
        assert_eq!(html_to_text("<script>alert('x')</script>"), "");
        assert_eq!(html_to_text("<style>p { color: red }</style>"), "");
        assert_eq!(html_to_text("<noscript>enable js</noscript>"), "");
    }

    #[test]
    fn link_annotation_keeps_target_and_label() {
        let text = html_to_text(r#"<a href="https://x.test/p">label</a>"#);
        assert!(text.contains("https://x.test/p"));
        assert!(text.contains("label"));
        assert_eq!(text, "(https://x.test/p) label");
    }

    #[test]
    fn empty_href_is_not_annotated() {
        assert_eq!(html_to_text(r#"<a href="">x</a><a name="n">y</a>"#), "x y");
    }

    #[test]
    fn unmatched_close_tag_still_emits_text() {
        assert_eq!(html_to_text("<div>text</p>"), "text");
    }

    #[test]
    fn unmatched_skip_close_is_clamped() {
        let mut state = ExtractionState::new();
        state.apply(MarkupEvent::end("script"));
        assert_eq!(state.skip_depth(), 0);
        state.apply(MarkupEvent::text("text"));
        assert_eq!(state.finish(), "text");

        assert_eq!(html_to_text("</script>text"), "text");
    }

    #[test]
    fn nested_skip_regions_unwind() {
        let mut state = ExtractionState::new();
        state.apply(MarkupEvent::start("head"));
        state.apply(MarkupEvent::start("noscript"));
        assert_eq!(state.skip_depth(), 2);
        state.apply(MarkupEvent::text("hidden"));
        state.apply(MarkupEvent::end("noscript"));
        state.apply(MarkupEvent::text("still hidden"));
        state.apply(MarkupEvent::end("head"));
        state.apply(MarkupEvent::text("shown"));
        assert_eq!(state.skip_depth(), 0);
        assert_eq!(state.finish(), "shown");
    }

    #[test]
    fn link_inside_skipped_region_is_still_annotated() {
        let text = html_to_text(r#"<noscript><a href="https://x.test/js">enable</a></noscript>"#);
        assert_eq!(text, "(https://x.test/js)");
    }

    #[test]
    fn unclosed_metadata_keeps_skipping() {
        let mut state = ExtractionState::new();
        state.apply(MarkupEvent::start("meta"));
        assert_eq!(state.skip_depth(), 1);
        state.apply(MarkupEvent::start("p"));
        state.apply(MarkupEvent::text("x"));
        state.apply(MarkupEvent::end("p"));
        assert_eq!(state.skip_depth(), 1);
        assert_eq!(state.finish(), "");

        assert_eq!(html_to_text(r#"<meta charset="utf-8"><p>x</p>"#), "");
        assert_eq!(html_to_text(r#"<link rel="icon" href="i.png"><p>y</p>"#), "");
    }

    #[test]
    fn self_closed_metadata_nets_zero() {
        let mut state = ExtractionState::new();
        state.apply(MarkupEvent::Start {
            name: "meta".into(),
            href: None,
            self_closing: true,
        });
        assert_eq!(state.skip_depth(), 0);
        assert_eq!(html_to_text(r#"<meta charset="utf-8"/><p>Body text</p>"#), "Body text");
    }

    #[test]
    fn block_boundaries_do_not_stack() {
        let text = html_to_text("<div><div><section><p>deep</p></section></div></div><div>next</div>");
        assert_eq!(text, "deep\nnext");
    }

    #[test]
    fn line_breaks_split_lines() {
        assert_eq!(html_to_text("one<br>two<br/>three<hr>four"), "one\ntwo\nthree\nfour");
    }

    #[test]
    fn inline_tags_join_with_spaces() {
        assert_eq!(
            html_to_text("<p>run <code>cargo</code> <em>now</em></p>"),
            "run cargo now"
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(html_to_text("<p>a &amp; b &lt;c&gt;</p>"), "a & b <c>");
        assert_eq!(
            html_to_text(r#"<a href="/s?a=1&amp;b=2">q</a>"#),
            "(/s?a=1&b=2) q"
        );
    }

    #[test]
    fn comments_split_text_runs() {
        assert_eq!(html_to_text("<p>a<!-- note -->b</p>"), "a b");
    }

    #[test]
    fn internal_blank_lines_collapse() {
        let text = html_to_text("<pre>line one\n\n\n\nline two</pre>");
        assert_eq!(text, "line one\n\nline two");
    }

    #[test]
    fn uppercase_tags_are_classified() {
        assert_eq!(html_to_text("<P>A</P><SCRIPT>x</SCRIPT><P>B</P>"), "A\nB");

        let mut state = ExtractionState::new();
        state.apply(MarkupEvent::start("STYLE"));
        assert_eq!(state.skip_depth(), 1);
    }

    #[test]
    fn text_before_first_block_gets_a_break() {
        assert_eq!(html_to_text("intro<p>para</p>"), "intro\npara");
    }

    #[test]
    fn empty_and_garbage_input_are_total() {
        assert_eq!(html_to_text(""), "");
        assert_eq!(html_to_text("<<<>>>"), "<<<>>>");
        assert_eq!(html_to_text("<p"), "");
        assert_eq!(html_to_text("plain words"), "plain words");
    }

    #[test]
    fn collapse_is_idempotent() {
        let samples = [
            "",
            "\n",
            "a",
            "a\n\n\n\nb",
            "\n\n a \n \n \n b \n\n\n",
            "x\r\n\r\n\r\ny",
            "p\u{2028}\u{2028}q",
        ];
        for raw in samples {
            let once = collapse_blank_lines(raw);
            assert_eq!(collapse_blank_lines(&once), once, "{raw:?}");
        }
    }

    #[test]
    fn collapse_keeps_single_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n   \n\t\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("\n\na"), "\na");
    }

    #[test]
    fn fragments_follow_the_event_rules() {
        let mut state = ExtractionState::new();
        state.apply(MarkupEvent::start("p"));
        assert!(state.fragments().is_empty());
        state.apply(MarkupEvent::text("  Hello  "));
        state.apply(MarkupEvent::anchor("https://e.com"));
        state.apply(MarkupEvent::text("world"));
        state.apply(MarkupEvent::end("p"));
        state.apply(MarkupEvent::end("p"));
        assert_eq!(
            state.fragments(),
            ["Hello ", " (https://e.com) ", "world ", "\n"]
        );
    }
}
