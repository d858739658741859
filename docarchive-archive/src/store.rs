use docarchive_common::{ArchiveError, Result};
use docarchive_config::relative_components;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Result of appending to an archive file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    Appended(PathBuf),
    Missing(PathBuf),
}

/// Files under a single archive root, addressed by manifest-style relative
/// paths (`/` or `\` separated).
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path onto the root, refusing anything that would
    /// escape it.
    pub fn resolve(&self, rel: &str) -> Result<PathBuf> {
        let parts = relative_components(rel).map_err(ArchiveError::InvalidPath)?;
        let mut path = self.root.clone();
        path.extend(parts);
        Ok(path)
    }

    /// Size of an existing regular file, `None` if there is none.
    pub async fn existing_len(&self, rel: &str) -> Result<Option<u64>> {
        let path = self.resolve(rel)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `text` verbatim, creating parent directories as needed.
    pub async fn save(&self, rel: &str, text: &str) -> Result<PathBuf> {
        self.save_bytes(rel, text.as_bytes()).await
    }

    pub async fn save_bytes(&self, rel: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "store.saved");
        Ok(path)
    }

    /// Append `line` on its own line to an existing file. Missing files are
    /// reported, never created.
    pub async fn append_line(&self, rel: &str, line: &str) -> Result<AppendResult> {
        let path = self.resolve(rel)?;
        let mut file = match tokio::fs::OpenOptions::new().append(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AppendResult::Missing(path)),
            Err(e) => return Err(e.into()),
        };
        file.write_all(format!("\n{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(AppendResult::Appended(path))
    }
}
