use anyhow::{Context, Result};
use docarchive_archive::{
    ArchiveStore, CrawlOptions, Crawler, DownloadOptions, Downloader, MediaFetcher, MediaOptions,
};
use docarchive_config::{ArchiveConfig, CrawlSettings};
use docarchive_http::HttpClient;
use docarchive_web::{HttpPageSource, PageSource};
use std::sync::Arc;
use std::time::Duration;

// Every manifest URL is absolute once resolved, so the client base only
// matters when none is configured.
const DETACHED_BASE: &str = "about:blank";

pub fn build_http_client(cfg: &ArchiveConfig) -> Result<HttpClient> {
    let base = cfg
        .base_url
        .as_ref()
        .map(|u| u.as_str())
        .unwrap_or(DETACHED_BASE);
    let req = &cfg.request;

    let client = HttpClient::new(base)?
        .with_timeout(Duration::from_secs(req.timeout_secs))
        .with_retries(req.retries)
        .with_header("user-agent", &req.user_agent)?
        .with_header("accept", &req.accept)?
        .with_header("accept-language", &req.accept_language)?;
    Ok(client)
}

pub fn build_page_source(cfg: &ArchiveConfig) -> Result<Arc<dyn PageSource>> {
    let http = build_http_client(cfg).context("building http client")?;
    Ok(Arc::new(HttpPageSource::new(http)))
}

pub fn build_store(cfg: &ArchiveConfig) -> ArchiveStore {
    ArchiveStore::new(cfg.base_dir())
}

pub fn build_downloader(cfg: &ArchiveConfig) -> Result<Downloader> {
    Ok(Downloader::new(
        build_page_source(cfg)?,
        build_store(cfg),
        DownloadOptions::from_config(cfg),
    ))
}

pub fn build_crawler(cfg: &ArchiveConfig, crawl: &CrawlSettings) -> Result<Crawler> {
    Ok(Crawler::new(
        build_page_source(cfg)?,
        build_store(cfg),
        CrawlOptions::from_config(cfg, crawl),
    ))
}

pub fn build_media_fetcher(cfg: &ArchiveConfig) -> Result<MediaFetcher> {
    Ok(MediaFetcher::new(
        build_page_source(cfg)?,
        build_store(cfg),
        MediaOptions::from_config(cfg),
    ))
}
