use crate::report::{DownloadOutcome, DownloadReport, SkipReason, UrlSource};
use crate::store::ArchiveStore;
use docarchive_common::{ArchiveError, Result};
use docarchive_config::ArchiveConfig;
use docarchive_web::{PageSource, html_to_text};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One resolved manifest page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub path: String,
    pub url: Url,
    pub fallback: Option<Url>,
}

/// Resolve every manifest page into a job, preserving manifest order.
pub fn plan_downloads(cfg: &ArchiveConfig) -> Result<Vec<DownloadJob>> {
    cfg.pages
        .iter()
        .map(|page| {
            let url = cfg
                .resolve_url(&page.url)
                .map_err(|e| ArchiveError::Config(format!("{}: {e}", page.path)))?;
            let fallback = cfg
                .fallback_for(page, &url)
                .map_err(|e| ArchiveError::Config(format!("{}: {e}", page.path)))?;
            Ok(DownloadJob {
                path: page.path.clone(),
                url,
                fallback,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Existing files strictly larger than this are left alone.
    pub min_existing_bytes: u64,
    /// Extracted text must have strictly more characters than this.
    pub min_text_chars: usize,
    /// Pause after every job that touched the network.
    pub delay: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            min_existing_bytes: 100,
            min_text_chars: 50,
            delay: Duration::from_millis(500),
        }
    }
}

impl DownloadOptions {
    pub fn from_config(cfg: &ArchiveConfig) -> Self {
        Self {
            min_existing_bytes: cfg.thresholds.min_existing_bytes,
            min_text_chars: cfg.thresholds.min_text_chars,
            delay: Duration::from_millis(cfg.request.delay_ms),
        }
    }
}

pub struct Downloader {
    source: Arc<dyn PageSource>,
    store: ArchiveStore,
    opts: DownloadOptions,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(source: Arc<dyn PageSource>, store: ArchiveStore, opts: DownloadOptions) -> Self {
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

    /// Process jobs one at a time, in order. A failed item never stops the
    /// batch; cancellation does, between items.
    pub async fn run(&self, jobs: &[DownloadJob]) -> DownloadReport {
        let mut report = DownloadReport::begin();
        tracing::info!(run_id = %report.run_id, jobs = jobs.len(), "download.start");

        for (idx, job) in jobs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::warn!(remaining = jobs.len() - idx, "download.cancelled");
                report.cancelled = true;
                break;
            }

            let outcome = self.process(job).await;
            let touched_network = !matches!(outcome, DownloadOutcome::Skipped { .. });
            tracing::info!(path = %job.path, outcome = %outcome, "download.item");
            report.push(&job.path, outcome);

            if touched_network && idx + 1 < jobs.len() && !self.opts.delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.opts.delay) => {}
                }
            }
        }

        let report = report.finish();
        tracing::info!(run_id = %report.run_id, summary = %report.summary(), "download.done");
        report
    }

    async fn process(&self, job: &DownloadJob) -> DownloadOutcome {
        match self.store.existing_len(&job.path).await {
            Ok(Some(bytes)) if bytes > self.opts.min_existing_bytes => {
                return DownloadOutcome::Skipped {
                    reason: SkipReason::AlreadyPresent { bytes },
                };
            }
            Ok(_) => {}
            Err(e) => {
                return DownloadOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        if let Some(text) = self.fetch_text(&job.url).await {
            return self.save(job, &job.url, UrlSource::Primary, text).await;
        }

        let Some(fallback) = &job.fallback else {
            return DownloadOutcome::Failed {
                reason: format!("no usable text from {}", job.url),
            };
        };

        tracing::info!(path = %job.path, fallback = %fallback, "download.fallback");
        match self.fetch_text(fallback).await {
            Some(text) => self.save(job, fallback, UrlSource::Fallback, text).await,
            None => DownloadOutcome::Failed {
                reason: format!("no usable text from {} or {}", job.url, fallback),
            },
        }
    }

    /// Fetch and extract; `None` when the request fails or the text is too
    /// short to count as a page.
    async fn fetch_text(&self, url: &Url) -> Option<String> {
        let page = match self.source.capture(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url = %url, error = %format!("{e:#}"), "download.fetch_failed");
                return None;
            }
        };

        let text = html_to_text(&page.html);
        let chars = text.trim().chars().count();
        if chars > self.opts.min_text_chars {
            Some(text)
        } else {
            tracing::warn!(url = %url, chars, min = self.opts.min_text_chars, "download.too_short");
            None
        }
    }

    async fn save(
        &self,
        job: &DownloadJob,
        url: &Url,
        source: UrlSource,
        text: String,
    ) -> DownloadOutcome {
        match self.store.save(&job.path, &text).await {
            Ok(_) => DownloadOutcome::Saved {
                source,
                url: url.to_string(),
                chars: text.chars().count(),
                checksum: blake3::hash(text.as_bytes()).to_hex().to_string(),
            },
            Err(e) => DownloadOutcome::Failed {
                reason: format!("saving {}: {e}", job.path),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docarchive_config::ArchiveConfigLoader;

    #[test]
    fn plan_resolves_relative_urls_and_rewrites() {
        let cfg = ArchiveConfigLoader::new()
            .with_yaml_str(
                r#"
base_dir: /tmp/archive
base_url: https://code.example.com/
fallback_rewrite:
  from: https://code.example.com/docs/en/
  to: https://old.example.com/en/code/
pages:
  - path: docs/en/hooks.txt
    url: docs/en/hooks
  - path: blog/post.txt
    url: https://blog.example.com/post
  - path: docs/en/mcp.txt
    url: docs/en/mcp
    fallback: https://mirror.example.com/mcp
"#,
            )
            .load()
            .unwrap();

        let jobs = plan_downloads(&cfg).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].url.as_str(), "https://code.example.com/docs/en/hooks");
        assert_eq!(
            jobs[0].fallback.as_ref().map(Url::as_str),
            Some("https://old.example.com/en/code/hooks")
        );
        assert_eq!(jobs[1].fallback, None);
        assert_eq!(
            jobs[2].fallback.as_ref().map(Url::as_str),
            Some("https://mirror.example.com/mcp")
        );
    }

    #[test]
    fn options_follow_config() {
        let cfg = ArchiveConfigLoader::new()
            .with_yaml_str(
                "base_dir: /a\nrequest:\n  delay_ms: 0\nthresholds:\n  min_existing_bytes: 10\n",
            )
            .load()
            .unwrap();
        let opts = DownloadOptions::from_config(&cfg);
        assert_eq!(opts.delay, Duration::ZERO);
        assert_eq!(opts.min_existing_bytes, 10);
        assert_eq!(opts.min_text_chars, 50);
    }
}
