//! Storage Error Types
//!
//! ## Error Categories
//!
//! - `Core`: the shared taxonomy (`NotFound`, `MalformedInput`,
//!   `CorruptPointer`) bubbling up from leakstore-core
//! - `Io`: file system failures
//! - `BucketFailed`: a whole-bucket failure inside a batch run, carrying the
//!   bucket id so the caller can resume
//! - `Join`: a worker task panicked or was aborted
//!
//! All storage operations return `Result<T>` aliased to `Result<T, Error>`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] leakstore_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bucket {bucket} failed: {reason}")]
    BucketFailed { bucket: String, reason: String },

    #[error("Worker task failed: {0}")]
    Join(String),
}

impl Error {
    pub fn bucket_failed(bucket: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::BucketFailed {
            bucket: bucket.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_passthrough_display() {
        let err: Error = leakstore_core::Error::NotFound("x/part0".to_string()).into();
        assert_eq!(format!("{}", err), "Not found: x/part0");
    }

    #[test]
    fn test_bucket_failed_display() {
        let err = Error::bucket_failed("acme", "no metadata stream");
        assert_eq!(format!("{}", err), "Bucket acme failed: no metadata stream");
    }
}
