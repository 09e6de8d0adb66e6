//! Frequency Statistics
//!
//! Two passes over the derived artifacts:
//!
//! 1. **Build**: per bucket, stream every offset index entry, derive the
//!    lowercase last dot-label of the key, and count occurrences into a
//!    per-bucket table written as `<bucket>/_stats.csv`.
//! 2. **Merge**: sum all per-bucket tables into one global table written as
//!    `<root>/_stats.csv`. The sum is order-independent and the emission
//!    order is deterministic (count descending, key ascending), so the
//!    global artifact is byte-identical regardless of bucket processing
//!    order or worker interleaving.
//!
//! Buckets build in parallel on the bounded worker pool; the merge is a
//! single sequential pass over the per-bucket artifacts.

use std::sync::Arc;

use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};

use leakstore_core::{derive_tld, FrequencyTable};

use crate::error::{Error, Result};
use crate::pool::{self, CancelFlag, DEFAULT_MAX_WORKERS};
use crate::store::PartStore;

/// Outcome of one stats build or merge run.
#[derive(Debug, Default)]
pub struct StatsReport {
    /// `(bucket, distinct keys)` per bucket processed.
    pub buckets: Vec<(String, usize)>,
    /// Entries skipped because the index line failed to parse.
    pub lines_skipped: u64,
    /// Buckets that failed entirely, with the reason.
    pub failures: Vec<(String, String)>,
    /// Merged table, when the run included the merge pass.
    pub global: Option<FrequencyTable>,
}

/// Builds per-bucket frequency tables and merges them into a global one.
pub struct StatsAggregator {
    store: Arc<PartStore>,
    max_workers: usize,
}

impl StatsAggregator {
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

    /// Build `_stats.csv` for every bucket that has an offset index.
    pub async fn build_all(&self, cancel: &CancelFlag) -> Result<StatsReport> {
        let mut candidates = Vec::new();
        for bucket in self.store.list_buckets().await? {
            let dir = self.store.layout().metadata_dir(&bucket);
            if fs::try_exists(&dir).await.unwrap_or(false) {
                candidates.push(bucket);
            }
        }

        tracing::info!(buckets = candidates.len(), "starting stats build");

        let store = Arc::clone(&self.store);
        let results = pool::for_each_bucket(candidates, self.max_workers, cancel, move |bucket| {
            let store = Arc::clone(&store);
            async move { build_bucket(&store, &bucket).await }
        })
        .await;

        let mut report = StatsReport::default();
        for (bucket, result) in results {
            match result {
                Ok((table, skipped)) => {
                    report.buckets.push((bucket, table.len()));
                    report.lines_skipped += skipped;
                }
                Err(e) => {
                    tracing::error!(bucket = %bucket, error = %e, "bucket stats failed");
                    report.failures.push((bucket, e.to_string()));
                }
            }
        }

        tracing::info!(
            buckets = report.buckets.len(),
            skipped = report.lines_skipped,
            failed_buckets = report.failures.len(),
            "stats build finished"
        );
        Ok(report)
    }

    /// Sum every per-bucket `_stats.csv` into the global one at the data
    /// root. Buckets without a stats artifact are skipped.
    pub async fn merge_global(&self) -> Result<StatsReport> {
        let mut report = StatsReport::default();
        let mut global = FrequencyTable::new();

        for bucket in self.store.list_buckets().await? {
            let path = self.store.layout().bucket_stats_path(&bucket);
            if !fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }
            match load_table(&path).await {
                Ok((table, skipped)) => {
                    global.merge(&table);
                    report.buckets.push((bucket, table.len()));
                    report.lines_skipped += skipped;
                }
                Err(e) => {
                    tracing::error!(bucket = %bucket, error = %e, "stats artifact unreadable");
                    report.failures.push((bucket, e.to_string()));
                }
            }
        }

        fs::write(self.store.layout().global_stats_path(), global.to_csv()).await?;
        tracing::info!(
            keys = global.len(),
            total = global.total(),
            "global stats written"
        );
        report.global = Some(global);
        Ok(report)
    }
}

/// Count derived keys across every offset index file of one bucket and
/// write the table as the bucket's `_stats.csv`. Returns the table and the
/// number of skipped index lines.
pub async fn build_bucket(store: &PartStore, bucket: &str) -> Result<(FrequencyTable, u64)> {
    let layout = store.layout();
    let mut table = FrequencyTable::new();
    let mut skipped = 0u64;

    for part in store.list_parts(bucket).await? {
        let path = layout.part_index_path(bucket, part);
        let file = File::open(&path)
            .await
            .map_err(|e| Error::bucket_failed(bucket, format!("index file part{part}: {e}")))?;

        let mut lines = BufReader::new(file).split(b'\n');
        while let Some(line) = lines.next_segment().await? {
            if line.is_empty() {
                continue;
            }
            // key,offset - only the key matters here.
            let key = line.split(|&b| b == b',').next().unwrap_or(&[]);
            if key.is_empty() || key.len() == line.len() {
                skipped += 1;
                continue;
            }
            table.increment(&derive_tld(&String::from_utf8_lossy(key)));
        }
    }

    fs::write(layout.bucket_stats_path(bucket), table.to_csv()).await?;
    Ok((table, skipped))
}

/// Load a `key,count` table from disk. Malformed lines are skipped and
/// counted.
async fn load_table(path: &std::path::Path) -> Result<(FrequencyTable, u64)> {
    let file = File::open(path).await?;
    let mut table = FrequencyTable::new();
    let mut skipped = 0u64;

    let mut lines = BufReader::new(file).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        match FrequencyTable::parse_line(&line) {
            Some((key, count)) => table.add(key, count),
            None => skipped += 1,
        }
    }
    Ok((table, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fixture(root: &std::path::Path, bucket: &str, indexes: &[&str]) {
        let dir = root.join(bucket);
        let meta = dir.join("_metadata");
        tokio::fs::create_dir_all(&meta).await.unwrap();
        tokio::fs::write(dir.join("_info.csv"), "dump.txt\n").await.unwrap();
        for (i, content) in indexes.iter().enumerate() {
            tokio::fs::write(dir.join(format!("dump.txt.part{i}")), "data\n")
                .await
                .unwrap();
            tokio::fs::write(meta.join(format!("part{i}.csv")), content)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_build_bucket_counts_derived_keys() {
        let dir = tempfile::tempdir().unwrap();
        fixture(
            dir.path(),
            "x",
            &["a.com,0\nmail.b.COM,10\n", "c.org,0\n"],
        )
        .await;

        let store = PartStore::new(dir.path());
        let (table, skipped) = build_bucket(&store, "x").await.unwrap();

        assert_eq!(skipped, 0);
        assert_eq!(table.get("com"), 2);
        assert_eq!(table.get("org"), 1);

        let written = tokio::fs::read_to_string(dir.path().join("x").join("_stats.csv"))
            .await
            .unwrap();
        assert_eq!(written, "com,2\norg,1\n");
    }

    #[tokio::test]
    async fn test_build_bucket_skips_malformed_index_lines() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "x", &["nocomma\n,5\na.com,0\n"]).await;

        let store = PartStore::new(dir.path());
        let (table, skipped) = build_bucket(&store, "x").await.unwrap();

        assert_eq!(skipped, 2);
        assert_eq!(table.total(), 1);
    }

    #[tokio::test]
    async fn test_merge_global_is_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "a", &["x.com,0\n"]).await;
        fixture(dir.path(), "b", &["y.com,0\nz.org,5\n"]).await;

        let store = Arc::new(PartStore::new(dir.path()));
        let agg = StatsAggregator::new(Arc::clone(&store));
        agg.build_all(&CancelFlag::new()).await.unwrap();

        let report = agg.merge_global().await.unwrap();
        let global = report.global.unwrap();
        assert_eq!(global.get("com"), 2);
        assert_eq!(global.get("org"), 1);

        let written = tokio::fs::read_to_string(dir.path().join("_stats.csv"))
            .await
            .unwrap();
        assert_eq!(written, "com,2\norg,1\n");
    }

    #[tokio::test]
    async fn test_build_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path(), "good", &["a.com,0\n"]).await;
        // "bad" has a part file but its index file is a directory.
        let bad = dir.path().join("bad");
        tokio::fs::create_dir_all(bad.join("_metadata").join("part0.csv"))
            .await
            .unwrap();
        tokio::fs::write(bad.join("dump.part0"), "data\n").await.unwrap();

        let store = Arc::new(PartStore::new(dir.path()));
        let report = StatsAggregator::new(store)
            .build_all(&CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.buckets.len(), 1);
        assert_eq!(report.buckets[0].0, "good");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "bad");
    }
}
