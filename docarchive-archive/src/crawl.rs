use crate::download::DownloadOptions;
use crate::report::{DownloadOutcome, DownloadReport, SkipReason, UrlSource};
use crate::store::ArchiveStore;
use docarchive_common::Result;
use docarchive_config::{ArchiveConfig, CrawlSettings};
use docarchive_web::{
    LinkFilter, PageScan, PageSource, archive_path_for, document_links, html_to_text, page_title,
    scan_page,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub filter: LinkFilter,
    /// Archive subdirectory for crawled pages.
    pub dir: String,
    pub max_pages: Option<usize>,
    pub download: DownloadOptions,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            filter: LinkFilter::default(),
            dir: "crawl".into(),
            max_pages: None,
            download: DownloadOptions::default(),
        }
    }
}

impl CrawlOptions {
    pub fn from_config(cfg: &ArchiveConfig, crawl: &CrawlSettings) -> Self {
        Self {
            filter: LinkFilter {
                exclude: crawl.exclude.clone(),
            },
            dir: crawl.dir.clone(),
            max_pages: crawl.max_pages,
            download: DownloadOptions::from_config(cfg),
        }
    }
}

/// Archives every document page linked from a start page, one level deep.
pub struct Crawler {
    source: Arc<dyn PageSource>,
    store: ArchiveStore,
    opts: CrawlOptions,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(source: Arc<dyn PageSource>, store: ArchiveStore, opts: CrawlOptions) -> Self {
        Self {
            source,
            store,
            opts,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fails only when the start page itself cannot be fetched. Linked
    /// pages are handled like manifest pages: existing files above the
    /// size threshold are kept, short text is a failure, and one bad page
    /// never stops the batch.
    pub async fn run(&self, start: &Url) -> Result<DownloadReport> {
        let index = self.source.capture(start).await?;
        let mut links = document_links(&scan_page(&index.html), &index.url, &self.opts.filter);
        links.retain(|link| link != start);
        if let Some(max) = self.opts.max_pages {
            links.truncate(max);
        }

        let mut report = DownloadReport::begin();
        tracing::info!(run_id = %report.run_id, start = %start, links = links.len(), "crawl.start");

        let mut claimed = HashSet::new();
        for (idx, link) in links.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(remaining = links.len() - idx, "crawl.cancelled");
                report.cancelled = true;
                break;
            }

            let (path, outcome) = self.process(link, &mut claimed).await;
            tracing::info!(url = %link, path = %path, outcome = %outcome, "crawl.item");
            report.push(&path, outcome);

            let delay = self.opts.download.delay;
            if idx + 1 < links.len() && !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let report = report.finish();
        tracing::info!(run_id = %report.run_id, summary = %report.summary(), "crawl.done");
        Ok(report)
    }

    async fn process(&self, url: &Url, claimed: &mut HashSet<String>) -> (String, DownloadOutcome) {
        let page = match self.source.capture(url).await {
            Ok(page) => page,
            Err(e) => {
                let title = page_title(&PageScan::default(), url);
                return (
                    self.in_dir(&archive_path_for(url, &title)),
                    DownloadOutcome::Failed {
                        reason: format!("{e:#}"),
                    },
                );
            }
        };

        let title = page_title(&scan_page(&page.html), url);
        let path = claim_path(self.in_dir(&archive_path_for(url, &title)), claimed);

        let min_existing = self.opts.download.min_existing_bytes;
        match self.store.existing_len(&path).await {
            Ok(Some(bytes)) if bytes > min_existing => {
                let reason = SkipReason::AlreadyPresent { bytes };
                return (path, DownloadOutcome::Skipped { reason });
            }
            Ok(_) => {}
            Err(e) => {
                let reason = e.to_string();
                return (path, DownloadOutcome::Failed { reason });
            }
        }

        let text = html_to_text(&page.html);
        let chars = text.trim().chars().count();
        if chars <= self.opts.download.min_text_chars {
            let reason = format!("only {chars} characters of text at {url}");
            return (path, DownloadOutcome::Failed { reason });
        }

        let outcome = match self.store.save(&path, &text).await {
            Ok(_) => DownloadOutcome::Saved {
                source: UrlSource::Primary,
                url: url.to_string(),
                chars: text.chars().count(),
                checksum: blake3::hash(text.as_bytes()).to_hex().to_string(),
            },
            Err(e) => DownloadOutcome::Failed {
                reason: format!("saving {path}: {e}"),
            },
        };
        (path, outcome)
    }

    fn in_dir(&self, rel: &str) -> String {
        let dir = self.opts.dir.trim_end_matches(['/', '\\']);
        if dir.is_empty() {
            rel.to_string()
        } else {
            format!("{dir}/{rel}")
        }
    }
}

/// Reserve `candidate` for this run, numbering it `name_1.ext`, `name_2.ext`
/// and so on when an earlier item already took it.
pub(crate) fn claim_path(candidate: String, claimed: &mut HashSet<String>) -> String {
    if claimed.insert(candidate.clone()) {
        return candidate;
    }
    let name_start = candidate.rfind('/').map_or(0, |i| i + 1);
    let (stem, ext) = match candidate[name_start..].rfind('.') {
        Some(dot) if dot > 0 => candidate.split_at(name_start + dot),
        _ => (candidate.as_str(), ""),
    };
    let mut n = 1;
    loop {
        let next = format!("{stem}_{n}{ext}");
        if claimed.insert(next.clone()) {
            return next;
        }
        n += 1;
    }
}
