use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use anyhow::bail;
use docarchive_archive::{
    BatchReport, append_translations, archive_status, plan_downloads, report::Outcome,
};
use docarchive_common::observability::{LogConfig, LogFormat, init_logging};
use docarchive_config::{ArchiveConfig, ArchiveConfigLoader, CrawlSettings};
use docarchive_runtime::ArchiveRuntime;
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
mod wiring;

/// Archive documentation pages as plain text.
#[derive(Parser, Debug)]
#[command(name = "docarchive", version)]
struct Cli {
    /// Manifest to load
    #[arg(short, long, env = "DOCARCHIVE_CONFIG", default_value = "docarchive.yaml")]
    config: PathBuf,

    /// Directory for log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log encoding: text or json
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,

    /// Mirror log events to stderr
    #[arg(long)]
    stderr: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Fetch every manifest page that is not already archived
    Download {
        /// Print the resolved jobs without fetching
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Archive every document page linked from the crawl start page
    Crawl {
        /// Start page; overrides `crawl.start_url`
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Download audio and video referenced by pages
    Media {
        /// Pages to scan; defaults to `media.pages`
        urls: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Append translation lines to archived files
    Append {
        #[arg(long)]
        json: bool,
    },
    /// Show what is on disk for every manifest entry
    Status {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging(LogConfig {
        log_dir: cli.log_dir.clone(),
        emit_stderr: cli.stderr,
        format: cli.log_format,
        default_filter: if cli.verbose { "debug" } else { "info" },
        ..LogConfig::default()
    })?;

    let cfg = ArchiveConfigLoader::new()
        .with_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::info!(
        config = %cli.config.display(),
        log = %log_path.display(),
        base_dir = %cfg.base_dir().display(),
        pages = cfg.pages.len(),
        translations = cfg.translations.len(),
        "docarchive.start"
    );

    let runtime = ArchiveRuntime::build("docarchive", None)?;
    let result = runtime.run_batch(|cancel| run(cli.command, cfg, cancel));
    runtime.shutdown(Duration::from_millis(250));
    result
}

async fn run(command: Command, cfg: ArchiveConfig, cancel: CancellationToken) -> Result<()> {
    match command {
        Command::Download { dry_run: true, json } => {
            let jobs = plan_downloads(&cfg)?;
            if json {
                let plan: Vec<_> = jobs
                    .iter()
                    .map(|j| {
                        serde_json::json!({
                            "path": j.path,
                            "url": j.url.as_str(),
                            "fallback": j.fallback.as_ref().map(|u| u.as_str()),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                for job in &jobs {
                    match &job.fallback {
                        Some(fb) => println!("{} <- {} (fallback {fb})", job.path, job.url),
                        None => println!("{} <- {}", job.path, job.url),
                    }
                }
                println!("{} pages planned", jobs.len());
            }
        }
        Command::Download { dry_run: false, json } => {
            let jobs = plan_downloads(&cfg)?;
            let downloader = wiring::build_downloader(&cfg)?.with_cancellation(cancel);
            let report = downloader.run(&jobs).await;
            print_report(&report, jobs.len(), json)?;
        }
        Command::Crawl { start, json } => {
            let settings = match (start, cfg.crawl.clone()) {
                (Some(start_url), Some(configured)) => CrawlSettings {
                    start_url,
                    ..configured
                },
                (Some(start_url), None) => CrawlSettings::starting_at(start_url),
                (None, Some(configured)) => configured,
                (None, None) => bail!("no crawl start page: set crawl.start_url or pass --start"),
            };
            let start = cfg.resolve_url(&settings.start_url)?;
            let crawler = wiring::build_crawler(&cfg, &settings)?.with_cancellation(cancel);
            let report = crawler.run(&start).await?;
            let planned = report.items.len();
            print_report(&report, planned, json)?;
        }
        Command::Media { urls, json } => {
            let raw = if urls.is_empty() { cfg.media.pages.clone() } else { urls };
            if raw.is_empty() {
                bail!("no pages to scan: set media.pages or pass URLs");
            }
            let pages = raw
                .iter()
                .map(|u| cfg.resolve_url(u))
                .collect::<Result<Vec<_>, _>>()?;
            let fetcher = wiring::build_media_fetcher(&cfg)?.with_cancellation(cancel);
            let report = fetcher.run(&pages).await;
            let planned = report.items.len();
            print_report(&report, planned, json)?;
        }
        Command::Append { json } => {
            let store = wiring::build_store(&cfg);
            let report = append_translations(&store, &cfg.translations).await;
            print_report(&report, cfg.translations.len(), json)?;
        }
        Command::Status { json } => {
            let store = wiring::build_store(&cfg);
            let status = archive_status(&store, &cfg).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("archive: {}", status.root);
                for entry in &status.pages {
                    println!("  page {}: {}", entry.path, entry.state);
                }
                for entry in &status.translations {
                    println!("  translation target {}: {}", entry.path, entry.state);
                }
                println!(
                    "{} of {} pages archived",
                    status.pages_present(),
                    status.pages.len()
                );
            }
        }
    }
    Ok(())
}

fn print_report<O>(report: &BatchReport<O>, planned: usize, json: bool) -> Result<()>
where
    O: Outcome + Display + serde::Serialize,
{
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let width = planned.to_string().len();
    for (idx, item) in report.items.iter().enumerate() {
        println!("[{:>width$}/{planned}] {}: {}", idx + 1, item.path, item.outcome);
    }
    if report.cancelled {
        println!(
            "cancelled after {} of {planned} items",
            report.items.len()
        );
    }
    println!("done: {}", report.summary());
    Ok(())
}
