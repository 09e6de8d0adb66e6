//! Error Types for Leakstore
//!
//! This module defines the error taxonomy shared across the storage-side
//! crates.
//!
//! ## Error Categories
//!
//! ### Missing data
//! - `NotFound`: a referenced bucket, part file, or info record does not
//!   exist on disk
//!
//! ### Data quality
//! - `MalformedInput`: a metadata or stats line failed to parse; the line is
//!   skipped and counted, processing continues
//! - `CorruptPointer`: a resolved offset does not land on a valid line start
//!   (past end-of-file, or mid-line); isolated to the single pointer
//!
//! ### I/O
//! - `Io`: file system operations, converted via `#[from]`
//!
//! ## Usage
//!
//! All fallible core operations return `Result<T>` which is aliased to
//! `Result<T, Error>`, so callers propagate with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed input line {line}: {reason}")]
    MalformedInput { line: u64, reason: String },

    #[error("Corrupt pointer {bucket}/part{part}@{offset}: {reason}")]
    CorruptPointer {
        bucket: String,
        part: u32,
        offset: u64,
        reason: String,
    },
}

impl Error {
    /// True for per-item failures that are recovered locally (skipped and
    /// counted) rather than aborting the surrounding batch.
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            Error::MalformedInput { .. } | Error::CorruptPointer { .. }
        )
    }
}
