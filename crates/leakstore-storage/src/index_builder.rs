//! Offset Index Builder
//!
//! Consumes each bucket's pre-sorted metadata stream
//! (`_metadata.csv.sorted`, lines of `key,part,offset`) and fans the
//! entries out into one offset index file per part
//! (`_metadata/part<N>.csv`, lines of `key,offset`).
//!
//! ## Algorithm
//!
//! Per bucket:
//! 1. Count the physical part files to fix the fan-out width
//! 2. Open one buffered output writer per part number `0..count`
//! 3. Stream the sorted input line by line, appending `key,offset` to the
//!    writer matching the line's part number
//! 4. Flush and close every writer before reporting done
//!
//! Within a bucket processing is strictly sequential - the output handles
//! are exclusively owned by the bucket's worker, and the input order must
//! be preserved per part file. Across buckets, a bounded worker pool runs
//! the fan-out in parallel with no ordering guarantee (none is needed).
//!
//! ## Failure policy
//!
//! - Malformed metadata line (wrong field count, non-numeric part/offset,
//!   part number out of range): skipped and counted, bucket continues
//! - Output handle open failure: fatal for that bucket only
//! - The batch run ends with a summary and the list of failed buckets

use std::sync::Arc;

use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use leakstore_core::Error as CoreError;

use crate::error::{Error, Result};
use crate::pool::{self, CancelFlag, DEFAULT_MAX_WORKERS};
use crate::store::PartStore;

/// Outcome of indexing one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketIndexSummary {
    pub bucket: String,
    /// Number of physical parts the fan-out targeted.
    pub parts: u32,
    pub lines_indexed: u64,
    pub lines_skipped: u64,
}

/// Outcome of a whole index-building run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub buckets: Vec<BucketIndexSummary>,
    /// Buckets that failed entirely, with the reason.
    pub failures: Vec<(String, String)>,
}

impl IndexReport {
    pub fn lines_indexed(&self) -> u64 {
        self.buckets.iter().map(|b| b.lines_indexed).sum()
    }

    pub fn lines_skipped(&self) -> u64 {
        self.buckets.iter().map(|b| b.lines_skipped).sum()
    }
}

/// Builds per-part offset index files from sorted metadata streams.
pub struct IndexBuilder {
    store: Arc<PartStore>,
    max_workers: usize,
}

impl IndexBuilder {
    pub fn new(store: Arc<PartStore>) -> Self {
        Self {
            store,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Index every bucket under the data root that carries a sorted
    /// metadata stream. Buckets without one are silently skipped (they have
    /// nothing to index yet).
    pub async fn build_all(&self, cancel: &CancelFlag) -> Result<IndexReport> {
        let mut candidates = Vec::new();
        for bucket in self.store.list_buckets().await? {
            let stream = self.store.layout().sorted_metadata_path(&bucket);
            if fs::try_exists(&stream).await.unwrap_or(false) {
                candidates.push(bucket);
            }
        }

        tracing::info!(buckets = candidates.len(), "starting index build");

        let store = Arc::clone(&self.store);
        let results = pool::for_each_bucket(candidates, self.max_workers, cancel, move |bucket| {
            let store = Arc::clone(&store);
            async move { build_bucket(&store, &bucket).await }
        })
        .await;

        let mut report = IndexReport::default();
        for (bucket, result) in results {
            match result {
                Ok(summary) => {
                    tracing::debug!(
                        bucket = %bucket,
                        indexed = summary.lines_indexed,
                        skipped = summary.lines_skipped,
                        "bucket indexed"
                    );
                    report.buckets.push(summary);
                }
                Err(e) => {
                    tracing::error!(bucket = %bucket, error = %e, "bucket index failed");
                    report.failures.push((bucket, e.to_string()));
                }
            }
        }

        tracing::info!(
            indexed = report.lines_indexed(),
            skipped = report.lines_skipped(),
            failed_buckets = report.failures.len(),
            "index build finished"
        );
        Ok(report)
    }
}

/// Fan one bucket's sorted metadata stream out into per-part index files.
///
/// Sequential by design: the writers are exclusively owned here and the
/// input order must carry through to each part file.
pub async fn build_bucket(store: &PartStore, bucket: &str) -> Result<BucketIndexSummary> {
    let layout = store.layout();
    let parts = store.list_parts(bucket).await?;
    let part_count = parts.len() as u32;

    let input = File::open(layout.sorted_metadata_path(bucket))
        .await
        .map_err(|e| Error::bucket_failed(bucket, format!("metadata stream: {e}")))?;

    fs::create_dir_all(layout.metadata_dir(bucket)).await?;

    let mut writers = Vec::with_capacity(part_count as usize);
    for part in 0..part_count {
        let out = File::create(layout.part_index_path(bucket, part))
            .await
            .map_err(|e| Error::bucket_failed(bucket, format!("index file part{part}: {e}")))?;
        writers.push(BufWriter::new(out));
    }

    let mut summary = BucketIndexSummary {
        bucket: bucket.to_string(),
        parts: part_count,
        lines_indexed: 0,
        lines_skipped: 0,
    };

    // Raw byte lines: keys are near-arbitrary text and must not abort the
    // stream when they are not valid UTF-8.
    let mut lines = BufReader::new(input).split(b'\n');
    let mut line_no: u64 = 0;
    while let Some(line) = lines.next_segment().await? {
        line_no += 1;
        if line.is_empty() {
            continue;
        }
        match parse_metadata_line(&line, line_no, part_count) {
            Ok((key, part, offset)) => {
                let writer = &mut writers[part as usize];
                writer.write_all(key).await?;
                writer.write_all(b",").await?;
                writer.write_all(offset.to_string().as_bytes()).await?;
                writer.write_all(b"\n").await?;
                summary.lines_indexed += 1;
            }
            Err(e) => {
                tracing::warn!(bucket = %bucket, error = %e, "skipping malformed metadata line");
                summary.lines_skipped += 1;
            }
        }
    }

    // Flushed and closed before the worker reports done.
    for mut writer in writers {
        writer.flush().await?;
        writer.into_inner().sync_all().await?;
    }

    Ok(summary)
}

/// Parse `key,part,offset`. Returns the borrowed key plus the numeric
/// fields, or a `MalformedInput` naming the line and what was wrong with
/// it.
fn parse_metadata_line(line: &[u8], line_no: u64, part_count: u32) -> Result<(&[u8], u32, u64)> {
    let malformed = |reason: &str| {
        Error::from(CoreError::MalformedInput {
            line: line_no,
            reason: reason.to_string(),
        })
    };

    // The key itself may not contain commas; part and offset are the last
    // two fields.
    let mut fields = line.splitn(3, |&b| b == b',');
    let (key, part, offset) = match (fields.next(), fields.next(), fields.next()) {
        (Some(key), Some(part), Some(offset)) => (key, part, offset),
        _ => return Err(malformed("expected key,part,offset")),
    };
    if key.is_empty() {
        return Err(malformed("empty key"));
    }

    let part: u32 = std::str::from_utf8(part)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| malformed("part is not a number"))?;
    let offset: u64 = std::str::from_utf8(offset)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| malformed("offset is not a number"))?;
    if part >= part_count {
        return Err(malformed("part number out of fan-out range"));
    }
    Ok((key, part, offset))
}
