use crate::crawl::claim_path;
use crate::report::{MediaOutcome, MediaReport, SkipReason};
use crate::store::ArchiveStore;
use docarchive_config::ArchiveConfig;
use docarchive_web::{PageSource, media_file_name, media_urls, scan_page};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Clone)]
pub struct MediaOptions {
    /// Archive subdirectory media files are written to.
    pub dir: String,
    pub delay: Duration,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self {
            dir: "media".into(),
            delay: Duration::from_millis(500),
        }
    }
}

impl MediaOptions {
    pub fn from_config(cfg: &ArchiveConfig) -> Self {
        Self {
            dir: cfg.media.dir.clone(),
            delay: Duration::from_millis(cfg.request.delay_ms),
        }
    }
}

/// Downloads the audio and video referenced by a list of pages.
pub struct MediaFetcher {
    source: Arc<dyn PageSource>,
    store: ArchiveStore,
    opts: MediaOptions,
    cancel: CancellationToken,
}

impl MediaFetcher {
    pub fn new(source: Arc<dyn PageSource>, store: ArchiveStore, opts: MediaOptions) -> Self {
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

    /// One item per media file. A page that cannot be fetched is recorded
    /// as a failed item under its URL and the batch moves on.
    pub async fn run(&self, pages: &[Url]) -> MediaReport {
        let mut report = MediaReport::begin();
        tracing::info!(run_id = %report.run_id, pages = pages.len(), "media.start");

        let mut claimed = HashSet::new();
        'pages: for page in pages {
            let found = match self.source.capture(page).await {
                Ok(capture) => media_urls(&scan_page(&capture.html), &capture.url),
                Err(e) => {
                    tracing::warn!(page = %page, error = %format!("{e:#}"), "media.page_failed");
                    let reason = format!("{e:#}");
                    report.push(page.as_str(), MediaOutcome::Failed { reason });
                    continue;
                }
            };
            tracing::info!(page = %page, found = found.len(), "media.page");

            for (idx, url) in found.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    tracing::warn!(page = %page, "media.cancelled");
                    report.cancelled = true;
                    break 'pages;
                }

                let path = claim_path(self.in_dir(&media_file_name(url, idx)), &mut claimed);
                let outcome = self.process(url, &path).await;
                let touched_network = !matches!(outcome, MediaOutcome::Skipped { .. });
                tracing::info!(url = %url, path = %path, outcome = %outcome, "media.item");
                report.push(&path, outcome);

                if touched_network && !self.opts.delay.is_zero() {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {}
                        _ = tokio::time::sleep(self.opts.delay) => {}
                    }
                }
            }
        }

        let report = report.finish();
        tracing::info!(run_id = %report.run_id, summary = %report.summary(), "media.done");
        report
    }

    async fn process(&self, url: &Url, path: &str) -> MediaOutcome {
        match self.store.existing_len(path).await {
            Ok(Some(bytes)) if bytes > 0 => {
                return MediaOutcome::Skipped {
                    reason: SkipReason::AlreadyPresent { bytes },
                };
            }
            Ok(_) => {}
            Err(e) => {
                return MediaOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        let body = match self.source.fetch_bytes(url).await {
            Ok(body) if body.is_empty() => {
                return MediaOutcome::Failed {
                    reason: format!("empty body from {url}"),
                };
            }
            Ok(body) => body,
            Err(e) => {
                return MediaOutcome::Failed {
                    reason: format!("{e:#}"),
                };
            }
        };

        match self.store.save_bytes(path, &body).await {
            Ok(_) => MediaOutcome::Saved {
                url: url.to_string(),
                bytes: body.len() as u64,
                checksum: blake3::hash(&body).to_hex().to_string(),
            },
            Err(e) => MediaOutcome::Failed {
                reason: format!("saving {path}: {e}"),
            },
        }
    }

    fn in_dir(&self, name: &str) -> String {
        let dir = self.opts.dir.trim_end_matches(['/', '\\']);
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{dir}/{name}")
        }
    }
}
