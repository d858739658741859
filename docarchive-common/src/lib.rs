//! Common types shared across the docarchive crates.
//!
//! This crate holds the shared error type and the observability helpers. It
//! stays dependency-light so every other crate in the workspace can pull it
//! in without dragging along the HTTP or parsing stacks.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`ArchiveError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use docarchive_common::ArchiveError;
//!
//! let err = ArchiveError::InvalidPath("../escape.txt".into());
//! assert_eq!(err.to_string(), "Invalid archive path: ../escape.txt");
//! ```

pub mod observability;

/// Error types used across the docarchive system.
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    /// Reading or writing an archive file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A relative archive path was empty, absolute, or escaped the root.
    #[error("Invalid archive path: {0}")]
    InvalidPath(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Fetching a page failed.
    #[error("Fetch error: {0}")]
    Fetch(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`ArchiveError`].
pub type Result<T> = std::result::Result<T, ArchiveError>;
