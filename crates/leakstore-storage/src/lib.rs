//! Leakstore Storage Layer
//!
//! This crate implements the disk side of leakstore: the part store, the
//! offset index pipeline, pointer resolution, and frequency statistics.
//!
//! ## Architecture Overview
//!
//! ```text
//! sorted metadata stream (key,part,offset per bucket)
//!        │
//!        ▼
//! ┌───────────────┐   per-part offset index
//! │ IndexBuilder  │ ──── _metadata/partN.csv ────┐
//! └───────────────┘                              │
//!                                                ▼
//!                                      ┌─────────────────┐
//!        search backend hits           │ StatsAggregator │ ── _stats.csv
//!        │                             └─────────────────┘
//!        ▼
//! ┌──────────────────┐   grouped pointers   ┌─────────────────┐
//! │ ResultAggregator │ ───────────────────► │ PointerResolver │ ── lines
//! └──────────────────┘                      └─────────────────┘
//!         │                                        │
//!         └──────────── PartStore (part files, _info.csv) ◄───┘
//! ```
//!
//! ## Main Components
//!
//! ### PartStore
//! Path and handle conventions for bucket directories: open a part file,
//! list part numbers, resolve the canonical display filename (with the
//! `"unknown"` sentinel fallback).
//!
//! ### IndexBuilder
//! Fans each bucket's pre-sorted metadata stream out into one offset index
//! file per part. Buckets run on a bounded worker pool; within a bucket
//! processing is strictly sequential so input order is preserved per part.
//!
//! ### ResultAggregator / PointerResolver
//! The read path. The aggregator groups raw search hits by bucket and part
//! (caching the canonical filename once per bucket per pass) so the
//! resolver can open each part file exactly once, then seek to every offset
//! and read back the original line.
//!
//! ### StatsAggregator
//! Streams every offset index entry, derives a key per entry (lowercase
//! last dot-label) and counts occurrences; per-bucket tables merge into a
//! deterministic global table.
//!
//! ## Failure policy
//!
//! Per-item failures (one malformed line, one bad pointer) are recovered
//! locally and aggregated into a report. Whole-bucket failures are isolated:
//! other buckets continue, and the batch ends with a summary plus the list
//! of failed buckets. Nothing is dropped without being counted.

pub mod error;
pub mod index_builder;
pub mod pool;
pub mod resolve;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
pub use index_builder::{BucketIndexSummary, IndexBuilder, IndexReport};
pub use pool::CancelFlag;
pub use resolve::{HitGroups, PointerResolver, ResolveOutput, ResultAggregator};
pub use stats::{StatsAggregator, StatsReport};
pub use store::PartStore;
