//! Tag classification used by the text extractor.

/// How an element affects extracted text.
///
/// ```
/// use docarchive_web::tags::TagClass;
///
/// assert_eq!(TagClass::of("script"), TagClass::Skip);
/// assert_eq!(TagClass::of("H2"), TagClass::Block);
/// assert_eq!(TagClass::of("span"), TagClass::Inline);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    /// Text inside is never emitted: scripts, styles, metadata, the document head.
    Skip,
    /// Opening or closing forces a line break.
    Block,
    /// No effect on layout.
    Inline,
}

impl TagClass {
    pub fn of(name: &str) -> Self {
        let lower;
        let name = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            lower = name.to_ascii_lowercase();
            lower.as_str()
        } else {
            name
        };

        match name {
            "script" | "style" | "noscript" | "head" | "meta" | "link" => Self::Skip,
            "p" | "div" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "tr" | "br" | "hr"
            | "section" | "article" | "header" | "footer" | "nav" | "aside" | "pre"
            | "blockquote" => Self::Block,
            _ => Self::Inline,
        }
    }
}

/// Elements whose body is read verbatim, with no markup recognised inside.
pub fn is_raw_text(name: &str) -> bool {
    matches!(name.to_ascii_lowercase().as_str(), "script" | "style")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_heading_is_a_block() {
        for level in 1..=6 {
            assert_eq!(TagClass::of(&format!("h{level}")), TagClass::Block);
        }
        assert_eq!(TagClass::of("h7"), TagClass::Inline);
    }

    #[test]
    fn classes_are_disjoint() {
        let skip = ["script", "style", "noscript", "head", "meta", "link"];
        let block = [
            "p", "div", "li", "tr", "br", "hr", "section", "article", "header", "footer", "nav",
            "aside", "pre", "blockquote",
        ];
        for t in skip {
            assert_eq!(TagClass::of(t), TagClass::Skip, "{t}");
        }
        for t in block {
            assert_eq!(TagClass::of(t), TagClass::Block, "{t}");
        }
        for t in ["a", "span", "em", "table", "td", "ul", "body", "html", "title"] {
            assert_eq!(TagClass::of(t), TagClass::Inline, "{t}");
        }
    }

    #[test]
    fn raw_text_set() {
        assert!(is_raw_text("script"));
        assert!(is_raw_text("Style"));
        assert!(!is_raw_text("noscript"));
    }
}
