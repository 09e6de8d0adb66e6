//! Part Store - File Access for Bucket Directories
//!
//! `PartStore` is the single place that opens files under the data root. It
//! owns no state beyond the layout; every handle it returns is scoped to the
//! caller and closed on drop, whatever the exit path.
//!
//! ## Contract
//!
//! - `open_part(bucket, part)` fails with `NotFound` if no file matches the
//!   `*.part<N>` convention
//! - `canonical_name(bucket)` never fails: a missing or malformed info
//!   record falls back to the `"unknown"` sentinel
//! - `list_parts(bucket)` returns the sorted part numbers present on disk
//!
//! Part files are written once by the out-of-scope ingestion step and only
//! read here; concurrent readers never contend because each opens its own
//! handle.

use std::path::PathBuf;

use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};

use leakstore_core::layout::{self, BucketLayout, UNKNOWN_FILENAME};
use leakstore_core::Error as CoreError;

use crate::error::Result;

/// Read access to bucket directories under one data root.
#[derive(Debug, Clone)]
pub struct PartStore {
    layout: BucketLayout,
}

impl PartStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: BucketLayout::new(root),
        }
    }

    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// All bucket directory names under the data root, sorted.
    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let mut buckets = Vec::new();
        let mut entries = fs::read_dir(self.layout.root()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    buckets.push(name.to_string());
                }
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    /// Sorted part numbers physically present in the bucket directory.
    pub async fn list_parts(&self, bucket: &str) -> Result<Vec<u32>> {
        let mut parts = Vec::new();
        let mut entries = fs::read_dir(self.layout.bucket_dir(bucket)).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(part) = layout::part_number(name) {
                    parts.push(part);
                }
            }
        }
        parts.sort_unstable();
        parts.dedup();
        Ok(parts)
    }

    /// Path of the part file for `part`, located via the `*.part<N>` naming
    /// convention (the part file name embeds the canonical filename, which
    /// callers may not know yet).
    pub async fn part_path(&self, bucket: &str, part: u32) -> Result<PathBuf> {
        let suffix = layout::part_suffix(part);
        let mut entries = fs::read_dir(self.layout.bucket_dir(bucket)).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(&suffix) && layout::part_number(name) == Some(part) {
                    return Ok(entry.path());
                }
            }
        }
        Err(CoreError::NotFound(format!("{bucket}/part{part}")).into())
    }

    /// Open the part file for random-access reads.
    pub async fn open_part(&self, bucket: &str, part: u32) -> Result<File> {
        let path = self.part_path(bucket, part).await?;
        Ok(File::open(path).await?)
    }

    /// Canonical display filename for a bucket: the first field of the first
    /// line of `_info.csv`. Missing or malformed info records resolve to the
    /// `"unknown"` sentinel rather than failing.
    pub async fn canonical_name(&self, bucket: &str) -> String {
        let path = self.layout.info_path(bucket);
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) => {
                tracing::debug!(bucket = %bucket, error = %e, "info record missing, using sentinel");
                return UNKNOWN_FILENAME.to_string();
            }
        };

        let mut line = String::new();
        if BufReader::new(file).read_line(&mut line).await.is_err() {
            tracing::debug!(bucket = %bucket, "info record unreadable, using sentinel");
            return UNKNOWN_FILENAME.to_string();
        }

        let name = line
            .split(',')
            .next()
            .map(str::trim)
            .unwrap_or_default();
        if name.is_empty() {
            UNKNOWN_FILENAME.to_string()
        } else {
            name.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn fixture_bucket(root: &std::path::Path, bucket: &str) {
        let dir = root.join(bucket);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("_info.csv"), "dump.txt,2024-01-01\n")
            .await
            .unwrap();
        tokio::fs::write(dir.join("dump.txt.part0"), "alpha\nbeta\n")
            .await
            .unwrap();
        tokio::fs::write(dir.join("dump.txt.part1"), "gamma\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_buckets_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fixture_bucket(dir.path(), "zulu").await;
        fixture_bucket(dir.path(), "acme").await;
        // A stray file at the root must not show up as a bucket.
        tokio::fs::write(dir.path().join("_stats.csv"), "com,1\n")
            .await
            .unwrap();

        let store = PartStore::new(dir.path());
        assert_eq!(store.list_buckets().await.unwrap(), vec!["acme", "zulu"]);
    }

    #[tokio::test]
    async fn test_list_parts() {
        let dir = tempfile::tempdir().unwrap();
        fixture_bucket(dir.path(), "acme").await;

        let store = PartStore::new(dir.path());
        assert_eq!(store.list_parts("acme").await.unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_open_part_reads_contents() {
        let dir = tempfile::tempdir().unwrap();
        fixture_bucket(dir.path(), "acme").await;

        let store = PartStore::new(dir.path());
        let mut file = store.open_part("acme", 1).await.unwrap();
        let mut contents = String::new();
        file.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "gamma\n");
    }

    #[tokio::test]
    async fn test_open_missing_part_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fixture_bucket(dir.path(), "acme").await;

        let store = PartStore::new(dir.path());
        let err = store.open_part("acme", 7).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Core(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_canonical_name() {
        let dir = tempfile::tempdir().unwrap();
        fixture_bucket(dir.path(), "acme").await;

        let store = PartStore::new(dir.path());
        assert_eq!(store.canonical_name("acme").await, "dump.txt");
    }

    #[tokio::test]
    async fn test_canonical_name_sentinel_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("bare"))
            .await
            .unwrap();

        let store = PartStore::new(dir.path());
        assert_eq!(store.canonical_name("bare").await, "unknown");
    }

    #[tokio::test]
    async fn test_canonical_name_sentinel_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("empty");
        tokio::fs::create_dir_all(&bucket).await.unwrap();
        tokio::fs::write(bucket.join("_info.csv"), "\n").await.unwrap();

        let store = PartStore::new(dir.path());
        assert_eq!(store.canonical_name("empty").await, "unknown");
    }
}
