//! Per-item outcomes and batch reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Succeeded / skipped / failed counts for a batch.
///
/// ```
/// use docarchive_archive::Summary;
///
/// let s = Summary { succeeded: 2, skipped: 1, failed: 0 };
/// assert_eq!(s.to_string(), "2 succeeded, 1 skipped, 0 failed");
/// assert_eq!(s.total(), 3);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} skipped, {} failed",
            self.succeeded, self.skipped, self.failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Succeeded,
    Skipped,
    Failed,
}

/// Anything that can be counted in a [`Summary`].
pub trait Outcome {
    fn tally(&self) -> Tally;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Target already holds more than the configured number of bytes.
    AlreadyPresent { bytes: u64 },
    /// Append target does not exist.
    MissingFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyPresent { bytes } => write!(f, "already present ({bytes} bytes)"),
            Self::MissingFile => f.write_str("file missing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadOutcome {
    Saved {
        source: UrlSource,
        url: String,
        chars: usize,
        /// blake3 of the saved text, hex encoded.
        checksum: String,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        reason: String,
    },
}

impl Outcome for DownloadOutcome {
    fn tally(&self) -> Tally {
        match self {
            Self::Saved { .. } => Tally::Succeeded,
            Self::Skipped { .. } => Tally::Skipped,
            Self::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved {
                source: UrlSource::Primary,
                chars,
                ..
            } => write!(f, "saved ({chars} chars)"),
            Self::Saved {
                source: UrlSource::Fallback,
                url,
                chars,
                ..
            } => write!(f, "saved via fallback {url} ({chars} chars)"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AppendOutcome {
    Appended,
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

impl Outcome for AppendOutcome {
    fn tally(&self) -> Tally {
        match self {
            Self::Appended => Tally::Succeeded,
            Self::Skipped { .. } => Tally::Skipped,
            Self::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for AppendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Appended => f.write_str("appended"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MediaOutcome {
    Saved {
        url: String,
        bytes: u64,
        checksum: String,
    },
    Skipped {
        reason: SkipReason,
    },
    Failed {
        reason: String,
    },
}

impl Outcome for MediaOutcome {
    fn tally(&self) -> Tally {
        match self {
            Self::Saved { .. } => Tally::Succeeded,
            Self::Skipped { .. } => Tally::Skipped,
            Self::Failed { .. } => Tally::Failed,
        }
    }
}

impl fmt::Display for MediaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved { url, bytes, .. } => write!(f, "saved {url} ({bytes} bytes)"),
            Self::Skipped { reason } => write!(f, "skipped: {reason}"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemReport<O> {
    pub path: String,
    pub outcome: O,
}

/// Ordered record of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<O> {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when the run stopped before reaching every item.
    pub cancelled: bool,
    pub items: Vec<ItemReport<O>>,
}

pub type DownloadReport = BatchReport<DownloadOutcome>;
pub type AppendReport = BatchReport<AppendOutcome>;
pub type MediaReport = BatchReport<MediaOutcome>;

impl<O: Outcome> BatchReport<O> {
    pub(crate) fn begin() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            cancelled: false,
            items: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, path: &str, outcome: O) {
        self.items.push(ItemReport {
            path: path.to_string(),
            outcome,
        });
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn summary(&self) -> Summary {
        self.items
            .iter()
            .fold(Summary::default(), |mut acc, item| {
                match item.outcome.tally() {
                    Tally::Succeeded => acc.succeeded += 1,
                    Tally::Skipped => acc.skipped += 1,
                    Tally::Failed => acc.failed += 1,
                }
                acc
            })
    }
}
