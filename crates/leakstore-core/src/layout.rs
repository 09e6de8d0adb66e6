//! Bucket Directory Layout
//!
//! Naming conventions for everything stored under the data root. A bucket is
//! one directory:
//!
//! ```text
//! <root>/<bucket>/
//!     _info.csv              first field = canonical display filename
//!     <name>.part0           immutable part files
//!     <name>.part1
//!     _metadata.csv.sorted   pre-sorted metadata stream (key,part,offset)
//!     _metadata/part0.csv    derived offset index (key,offset)
//!     _metadata/part1.csv
//!     _stats.csv             per-bucket frequency table (key,count)
//! <root>/_stats.csv          merged global frequency table
//! ```
//!
//! Search indices are named `bucket-<bucket>`; stripping that prefix from a
//! hit's index identifier recovers the bucket name.
//!
//! This module is purely path and naming conventions - no file handles, no
//! logic. Components that open files build on [`BucketLayout`] so the
//! conventions live in exactly one place.

use std::path::{Path, PathBuf};

/// File holding the canonical display filename as its first CSV field.
pub const INFO_FILE: &str = "_info.csv";

/// Per-bucket pre-sorted metadata stream consumed by the index builder.
pub const SORTED_METADATA_FILE: &str = "_metadata.csv.sorted";

/// Directory holding per-part offset index files.
pub const METADATA_DIR: &str = "_metadata";

/// Per-bucket (and global) frequency table artifact.
pub const STATS_FILE: &str = "_stats.csv";

/// Prefix mapping bucket names to search index names.
pub const INDEX_PREFIX: &str = "bucket-";

/// Sentinel canonical filename when the info record is missing or malformed.
pub const UNKNOWN_FILENAME: &str = "unknown";

/// Search index name for a bucket.
pub fn index_name(bucket: &str) -> String {
    format!("{INDEX_PREFIX}{bucket}")
}

/// Bucket name recovered from a search index identifier, or `None` if the
/// identifier does not carry the expected prefix.
pub fn bucket_from_index(index: &str) -> Option<&str> {
    index.strip_prefix(INDEX_PREFIX)
}

/// File-name suffix of part number `part` (`.part<N>`).
pub fn part_suffix(part: u32) -> String {
    format!(".part{part}")
}

/// Part number parsed from a part file name, or `None` if the name does not
/// follow the `<name>.part<N>` convention.
pub fn part_number(file_name: &str) -> Option<u32> {
    let (_, num) = file_name.rsplit_once(".part")?;
    num.parse().ok()
}

/// Path conventions rooted at one data directory.
#[derive(Debug, Clone)]
pub struct BucketLayout {
    root: PathBuf,
}

impl BucketLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    pub fn info_path(&self, bucket: &str) -> PathBuf {
        self.bucket_dir(bucket).join(INFO_FILE)
    }

    pub fn sorted_metadata_path(&self, bucket: &str) -> PathBuf {
        self.bucket_dir(bucket).join(SORTED_METADATA_FILE)
    }

    pub fn metadata_dir(&self, bucket: &str) -> PathBuf {
        self.bucket_dir(bucket).join(METADATA_DIR)
    }

    /// Offset index file for one part (`_metadata/part<N>.csv`).
    pub fn part_index_path(&self, bucket: &str, part: u32) -> PathBuf {
        self.metadata_dir(bucket).join(format!("part{part}.csv"))
    }

    pub fn bucket_stats_path(&self, bucket: &str) -> PathBuf {
        self.bucket_dir(bucket).join(STATS_FILE)
    }

    pub fn global_stats_path(&self) -> PathBuf {
        self.root.join(STATS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name_round_trip() {
        assert_eq!(index_name("acme-2019"), "bucket-acme-2019");
        assert_eq!(bucket_from_index("bucket-acme-2019"), Some("acme-2019"));
    }

    #[test]
    fn test_bucket_from_foreign_index() {
        assert_eq!(bucket_from_index("logstash-2024"), None);
        assert_eq!(bucket_from_index(""), None);
    }

    #[test]
    fn test_part_number_parsing() {
        assert_eq!(part_number("dump.part0"), Some(0));
        assert_eq!(part_number("dump.csv.part12"), Some(12));
        assert_eq!(part_number("dump.partx"), None);
        assert_eq!(part_number("_info.csv"), None);
        assert_eq!(part_number("part3"), None);
    }

    #[test]
    fn test_layout_paths() {
        let layout = BucketLayout::new("/data");
        assert_eq!(
            layout.info_path("x"),
            PathBuf::from("/data/x/_info.csv")
        );
        assert_eq!(
            layout.sorted_metadata_path("x"),
            PathBuf::from("/data/x/_metadata.csv.sorted")
        );
        assert_eq!(
            layout.part_index_path("x", 4),
            PathBuf::from("/data/x/_metadata/part4.csv")
        );
        assert_eq!(
            layout.global_stats_path(),
            PathBuf::from("/data/_stats.csv")
        );
    }
}
