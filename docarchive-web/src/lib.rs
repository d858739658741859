//! Page acquisition and text extraction.
//!
//! - Tag classification (`tags`)
//! - Streaming markup-to-text extractor (`extract`)
//! - Page inventory for crawling and media discovery (`scan`, `links`, `media`)
//! - `PageSource` trait and HTTP-backed implementation (`fetch`)

pub mod extract;
pub mod fetch;
pub mod links;
pub mod media;
pub mod scan;
pub mod tags;

pub use extract::{ExtractionState, MarkupEvent, collapse_blank_lines, extract_events, html_to_text};
pub use fetch::{HttpPageSource, PageCapture, PageSource};
pub use links::{LinkFilter, archive_path_for, document_links, page_title, sanitize_file_name};
pub use media::{is_media_url, media_file_name, media_urls};
pub use scan::{PageScan, scan_page};
