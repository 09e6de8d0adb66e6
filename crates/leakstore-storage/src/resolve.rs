//! Read Path - Hit Grouping and Pointer Resolution
//!
//! Raw search hits arrive as flat `(index, part, offset)` records, one per
//! matched document, in whatever order the backend returned them. Resolving
//! them naively would reopen the same part file per hit and re-read the same
//! info record per hit. The read path instead runs in two stages:
//!
//! 1. [`ResultAggregator`] groups the hits by bucket, then by part, and
//!    resolves each bucket's canonical display filename exactly once per
//!    pass. Hits from indices outside the bucket namespace are dropped and
//!    counted.
//! 2. [`PointerResolver`] walks the groups, opens each part file exactly
//!    once, and for every offset seeks and reads back the original line.
//!
//! ## Pointer validity
//!
//! A pointer is only valid if its offset lands on a line start: strictly
//! inside the file, and either at byte zero or directly after a newline. An
//! invalid pointer is reported as corrupt and resolution continues with the
//! next one; a part file that cannot be opened fails only its own group.

use std::collections::BTreeMap;
use std::io::SeekFrom;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, BufReader};

use leakstore_core::{Error as CoreError, Pointer, SearchHit};

use crate::store::PartStore;

/// Search hits grouped by bucket and part, ready for resolution.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HitGroups {
    pub buckets: Vec<BucketHits>,
    /// Hits dropped because their index is outside the bucket namespace.
    pub skipped: u64,
}

/// All hits that landed in one bucket.
#[derive(Debug, PartialEq, Eq)]
pub struct BucketHits {
    pub bucket: String,
    /// Canonical display filename, resolved once for the whole group.
    pub file_name: String,
    pub parts: Vec<PartHits>,
}

/// All offsets hit within one part file.
#[derive(Debug, PartialEq, Eq)]
pub struct PartHits {
    pub part: u32,
    pub offsets: Vec<u64>,
}

/// Groups raw search hits for batch resolution.
pub struct ResultAggregator<'a> {
    store: &'a PartStore,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(store: &'a PartStore) -> Self {
        Self { store }
    }

    /// Group `hits` by bucket and part. Buckets and parts come out sorted;
    /// offsets keep the hit order within their part.
    pub async fn group(&self, hits: &[SearchHit]) -> HitGroups {
        let mut by_bucket: BTreeMap<String, BTreeMap<u32, Vec<u64>>> = BTreeMap::new();
        let mut skipped = 0u64;

        for hit in hits {
            match hit.pointer() {
                Some(pointer) => {
                    by_bucket
                        .entry(pointer.bucket)
                        .or_default()
                        .entry(pointer.part)
                        .or_default()
                        .push(pointer.offset);
                }
                None => {
                    tracing::warn!(index = %hit.index, "hit from foreign index, skipping");
                    skipped += 1;
                }
            }
        }

        let mut groups = HitGroups {
            buckets: Vec::with_capacity(by_bucket.len()),
            skipped,
        };
        for (bucket, parts) in by_bucket {
            let file_name = self.store.canonical_name(&bucket).await;
            groups.buckets.push(BucketHits {
                bucket,
                file_name,
                parts: parts
                    .into_iter()
                    .map(|(part, offsets)| PartHits { part, offsets })
                    .collect(),
            });
        }
        groups
    }
}

/// One resolved pointer: the offset it came from and the line found there,
/// or `None` if the pointer was corrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub offset: u64,
    pub text: Option<String>,
}

/// Lines resolved from one part file, aligned with the group's offsets.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedPart {
    pub part: u32,
    pub lines: Vec<ResolvedLine>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedBucket {
    pub bucket: String,
    pub file_name: String,
    pub parts: Vec<ResolvedPart>,
}

/// Outcome of resolving one batch of grouped hits.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResolveOutput {
    pub buckets: Vec<ResolvedBucket>,
    /// Pointers that did not land on a valid line start.
    pub corrupt: u64,
    /// `(bucket/partN, reason)` for part files that could not be opened.
    /// Their groups are dropped entirely; other groups are unaffected.
    pub failures: Vec<(String, String)>,
}

/// Resolves grouped pointers back into the original lines.
pub struct PointerResolver<'a> {
    store: &'a PartStore,
}

impl<'a> PointerResolver<'a> {
    pub fn new(store: &'a PartStore) -> Self {
        Self { store }
    }

    /// Resolve every pointer in `groups`. Each part file is opened once.
    pub async fn resolve(&self, groups: &HitGroups) -> ResolveOutput {
        let mut output = ResolveOutput::default();

        for bucket_hits in &groups.buckets {
            let mut resolved = ResolvedBucket {
                bucket: bucket_hits.bucket.clone(),
                file_name: bucket_hits.file_name.clone(),
                parts: Vec::with_capacity(bucket_hits.parts.len()),
            };

            for part_hits in &bucket_hits.parts {
                let mut file = match self.store.open_part(&bucket_hits.bucket, part_hits.part).await
                {
                    Ok(f) => f,
                    Err(e) => {
                        tracing::error!(
                            bucket = %bucket_hits.bucket,
                            part = part_hits.part,
                            error = %e,
                            "part file unavailable, dropping its group"
                        );
                        output.failures.push((
                            format!("{}/part{}", bucket_hits.bucket, part_hits.part),
                            e.to_string(),
                        ));
                        continue;
                    }
                };

                let len = match file.metadata().await {
                    Ok(m) => m.len(),
                    Err(e) => {
                        output.failures.push((
                            format!("{}/part{}", bucket_hits.bucket, part_hits.part),
                            e.to_string(),
                        ));
                        continue;
                    }
                };

                let mut lines = Vec::with_capacity(part_hits.offsets.len());
                for &offset in &part_hits.offsets {
                    let pointer = Pointer::new(&bucket_hits.bucket, part_hits.part, offset);
                    match read_line_at(&mut file, len, &pointer).await {
                        Ok(text) => lines.push(ResolvedLine {
                            offset,
                            text: Some(text),
                        }),
                        Err(e) if e.is_data_quality() => {
                            tracing::warn!(pointer = %pointer, error = %e, "corrupt pointer");
                            output.corrupt += 1;
                            lines.push(ResolvedLine { offset, text: None });
                        }
                        Err(e) => {
                            tracing::error!(pointer = %pointer, error = %e, "read failed");
                            output
                                .failures
                                .push((pointer.to_string(), e.to_string()));
                            lines.push(ResolvedLine { offset, text: None });
                        }
                    }
                }
                resolved.parts.push(ResolvedPart {
                    part: part_hits.part,
                    lines,
                });
            }

            output.buckets.push(resolved);
        }

        output
    }
}

/// Seek to `pointer.offset` and read one line, validating the offset is a
/// line start first.
async fn read_line_at(
    file: &mut tokio::fs::File,
    len: u64,
    pointer: &Pointer,
) -> std::result::Result<String, CoreError> {
    let corrupt = |reason: &str| CoreError::CorruptPointer {
        bucket: pointer.bucket.clone(),
        part: pointer.part,
        offset: pointer.offset,
        reason: reason.to_string(),
    };

    if pointer.offset >= len {
        return Err(corrupt("offset past end of file"));
    }
    if pointer.offset > 0 {
        file.seek(SeekFrom::Start(pointer.offset - 1)).await?;
        let mut prev = [0u8; 1];
        file.read_exact(&mut prev).await?;
        if prev[0] != b'\n' {
            return Err(corrupt("offset is not a line start"));
        }
    } else {
        file.seek(SeekFrom::Start(0)).await?;
    }

    let mut buf = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut buf).await?;
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    // Part files are near-arbitrary text; a stray invalid byte must not
    // discard the whole line.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(index: &str, part: u32, offset: u64) -> SearchHit {
        SearchHit {
            index: index.to_string(),
            part,
            offset,
            fragment: String::new(),
            tld: String::new(),
        }
    }

    async fn fixture(root: &std::path::Path) {
        let dir = root.join("acme");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("_info.csv"), "dump.txt,2024\n")
            .await
            .unwrap();
        tokio::fs::write(dir.join("dump.txt.part0"), "first line\nsecond line\n")
            .await
            .unwrap();
        tokio::fs::write(dir.join("dump.txt.part1"), "other part\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_group_by_bucket_and_part() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path()).await;
        let store = PartStore::new(dir.path());

        let hits = vec![
            hit("bucket-acme", 1, 0),
            hit("bucket-acme", 0, 11),
            hit("bucket-acme", 0, 0),
            hit("kibana-internal", 0, 0),
        ];
        let groups = ResultAggregator::new(&store).group(&hits).await;

        assert_eq!(groups.skipped, 1);
        assert_eq!(groups.buckets.len(), 1);
        let b = &groups.buckets[0];
        assert_eq!(b.bucket, "acme");
        assert_eq!(b.file_name, "dump.txt");
        // Parts come out sorted; offsets keep hit order.
        assert_eq!(b.parts[0].part, 0);
        assert_eq!(b.parts[0].offsets, vec![11, 0]);
        assert_eq!(b.parts[1].part, 1);
        assert_eq!(b.parts[1].offsets, vec![0]);
    }

    #[tokio::test]
    async fn test_group_uses_sentinel_for_missing_info() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("bare");
        tokio::fs::create_dir_all(&bucket).await.unwrap();
        tokio::fs::write(bucket.join("data.part0"), "x\n").await.unwrap();
        let store = PartStore::new(dir.path());

        let groups = ResultAggregator::new(&store)
            .group(&[hit("bucket-bare", 0, 0)])
            .await;
        assert_eq!(groups.buckets[0].file_name, "unknown");
    }

    #[tokio::test]
    async fn test_resolve_reads_lines_back() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path()).await;
        let store = PartStore::new(dir.path());

        let hits = vec![hit("bucket-acme", 0, 0), hit("bucket-acme", 0, 11)];
        let groups = ResultAggregator::new(&store).group(&hits).await;
        let output = PointerResolver::new(&store).resolve(&groups).await;

        assert_eq!(output.corrupt, 0);
        assert!(output.failures.is_empty());
        let lines = &output.buckets[0].parts[0].lines;
        assert_eq!(lines[0].text.as_deref(), Some("first line"));
        assert_eq!(lines[1].text.as_deref(), Some("second line"));
    }

    #[tokio::test]
    async fn test_resolve_flags_mid_line_offset_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path()).await;
        let store = PartStore::new(dir.path());

        // Offset 5 is inside "first line", not at a line start.
        let hits = vec![hit("bucket-acme", 0, 5), hit("bucket-acme", 0, 11)];
        let groups = ResultAggregator::new(&store).group(&hits).await;
        let output = PointerResolver::new(&store).resolve(&groups).await;

        assert_eq!(output.corrupt, 1);
        let lines = &output.buckets[0].parts[0].lines;
        assert_eq!(lines[0], ResolvedLine { offset: 5, text: None });
        assert_eq!(lines[1].text.as_deref(), Some("second line"));
    }

    #[tokio::test]
    async fn test_resolve_flags_past_eof_offset_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path()).await;
        let store = PartStore::new(dir.path());

        let groups = ResultAggregator::new(&store)
            .group(&[hit("bucket-acme", 1, 9999)])
            .await;
        let output = PointerResolver::new(&store).resolve(&groups).await;

        assert_eq!(output.corrupt, 1);
        assert_eq!(output.buckets[0].parts[0].lines[0].text, None);
    }

    #[tokio::test]
    async fn test_missing_part_fails_only_its_group() {
        let dir = tempfile::tempdir().unwrap();
        fixture(dir.path()).await;
        let store = PartStore::new(dir.path());

        let hits = vec![hit("bucket-acme", 7, 0), hit("bucket-acme", 0, 0)];
        let groups = ResultAggregator::new(&store).group(&hits).await;
        let output = PointerResolver::new(&store).resolve(&groups).await;

        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.failures[0].0, "acme/part7");
        // The part 0 group still resolved.
        let parts = &output.buckets[0].parts;
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].lines[0].text.as_deref(), Some("first line"));
    }
}
