//! Archive batches over a local directory.
//!
//! - `store`: path resolution and file I/O under the archive root
//! - `download`: fetch, extract and save manifest pages with fallback
//! - `crawl`: archive the document pages linked from a start page
//! - `media`: download audio and video referenced by pages
//! - `append`: add translation lines to archived files
//! - `status`: offline view of what is on disk
//! - `report`: per-item outcomes and batch summaries

pub mod append;
pub mod crawl;
pub mod download;
pub mod media;
pub mod report;
pub mod status;
pub mod store;

pub use append::append_translations;
pub use crawl::{CrawlOptions, Crawler};
pub use download::{DownloadJob, DownloadOptions, Downloader, plan_downloads};
pub use media::{MediaFetcher, MediaOptions};
pub use report::{
    AppendOutcome, AppendReport, BatchReport, DownloadOutcome, DownloadReport, ItemReport,
    MediaOutcome, MediaReport, SkipReason, Summary, UrlSource,
};
pub use status::{ArchiveStatus, EntryStatus, FileState, archive_status};
pub use store::{AppendResult, ArchiveStore};
