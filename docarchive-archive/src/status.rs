use crate::store::ArchiveStore;
use docarchive_config::ArchiveConfig;
use serde::Serialize;
use std::fmt;

/// What is on disk for a manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FileState {
    Missing,
    /// Present but small enough that a download would overwrite it.
    Stub { bytes: u64 },
    Present { bytes: u64 },
    Invalid { reason: String },
}

impl FileState {
    fn classify(len: Option<u64>, min_existing_bytes: u64) -> Self {
        match len {
            None => Self::Missing,
            Some(bytes) if bytes > min_existing_bytes => Self::Present { bytes },
            Some(bytes) => Self::Stub { bytes },
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Stub { bytes } => write!(f, "stub ({bytes} bytes)"),
            Self::Present { bytes } => write!(f, "present ({bytes} bytes)"),
            Self::Invalid { reason } => write!(f, "invalid: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryStatus {
    pub path: String,
    #[serde(flatten)]
    pub state: FileState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveStatus {
    pub root: String,
    pub pages: Vec<EntryStatus>,
    /// Append targets, one per translation entry.
    pub translations: Vec<EntryStatus>,
}

impl ArchiveStatus {
    /// Number of pages a download run would skip.
    pub fn pages_present(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.state, FileState::Present { .. }))
            .count()
    }
}

/// Inspect the archive without touching the network.
pub async fn archive_status(store: &ArchiveStore, cfg: &ArchiveConfig) -> ArchiveStatus {
    let min = cfg.thresholds.min_existing_bytes;

    let mut pages = Vec::with_capacity(cfg.pages.len());
    for page in &cfg.pages {
        pages.push(EntryStatus {
            path: page.path.clone(),
            state: inspect(store, &page.path, min).await,
        });
    }

    let mut translations = Vec::with_capacity(cfg.translations.len());
    for tr in &cfg.translations {
        translations.push(EntryStatus {
            path: tr.path.clone(),
            state: inspect(store, &tr.path, min).await,
        });
    }

    ArchiveStatus {
        root: store.root().display().to_string(),
        pages,
        translations,
    }
}

async fn inspect(store: &ArchiveStore, path: &str, min: u64) -> FileState {
    match store.existing_len(path).await {
        Ok(len) => FileState::classify(len, min),
        Err(e) => FileState::Invalid {
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        assert_eq!(FileState::classify(None, 100), FileState::Missing);
        assert_eq!(FileState::classify(Some(100), 100), FileState::Stub { bytes: 100 });
        assert_eq!(
            FileState::classify(Some(101), 100),
            FileState::Present { bytes: 101 }
        );
    }

    #[test]
    fn entry_status_serializes_flat() {
        let entry = EntryStatus {
            path: "a.txt".into(),
            state: FileState::Stub { bytes: 3 },
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["path"], "a.txt");
        assert_eq!(v["state"], "stub");
        assert_eq!(v["bytes"], 3);
    }
}
