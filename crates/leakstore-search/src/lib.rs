//! Leakstore Search Layer
//!
//! This crate owns everything that talks to the search backend: the query
//! client, cursor-paged scans, retry behavior, and zero-downtime index
//! migration.
//!
//! ## Main Components
//!
//! ### SearchClient
//! HTTP client over the backend's REST API. Term searches run over the
//! bucket index namespace (`bucket-*`) and return [`SearchHit`]s the
//! storage layer resolves back into lines. Read requests retry with
//! exponential backoff; admin mutations are single-attempt so a failed
//! migration step surfaces instead of being blindly reapplied.
//!
//! ### Scan
//! Resumable paginated retrieval of a term's full result set via an opaque
//! backend cursor. A failed page fetch retries from the same cursor.
//!
//! ### IndexMigrator
//! Corrects a live index's mappings without query downtime: create the
//! corrected target, bulk-copy, then repoint the query-facing alias in one
//! atomic request. Deleting the old index is a separate explicit step.
//!
//! [`SearchHit`]: leakstore_core::SearchHit

pub mod client;
pub mod config;
pub mod error;
pub mod migrator;
pub mod retry;

pub use client::{Scan, SearchClient};
pub use config::{Auth, SearchConfig};
pub use error::{Result, SearchError};
pub use migrator::{
    AdminApi, AliasAction, CreateOutcome, IndexMigrator, MigrationOutcome, MigrationReport,
    MigrationState, MigrationUnit,
};
pub use retry::{retry_with_backoff, retry_with_jittered_backoff, RetryPolicy};
