//! Zero-Downtime Index Migration
//!
//! Corrects a live index's field mappings and settings without a query
//! outage. The backend cannot change mappings in place, so the migration
//! materializes a corrected copy and repoints the query-facing alias:
//!
//! ```text
//! ┌─────────┐  create   ┌───────────────────┐
//! │ source  │ ────────► │ source_corrected  │   (empty, corrected schema)
//! └─────────┘           └───────────────────┘
//!      │   bulk copy              ▲
//!      └──────────────────────────┘
//!                │
//!                ▼
//!      alias ──swap──► source_corrected     (single atomic request)
//!                │
//!                ▼
//!      source deleted                       (explicit, never automatic)
//! ```
//!
//! ## State machine
//!
//! `Created → Populated → Swapped → (Retired)`. Every step is independently
//! retryable:
//!
//! - create against an existing target reports [`CreateOutcome::AlreadyExists`]
//!   and the run resumes at the copy step
//! - the bulk copy is a full re-materialization keyed by document id, so
//!   re-running it against a partially populated target converges instead of
//!   duplicating
//! - the alias swap is one multi-action request the backend applies
//!   atomically; at no instant does the alias resolve to zero or two indices
//! - retirement (deleting the source) is a separate opt-in call, never
//!   chained onto a successful swap

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::SearchClient;
use crate::error::{Result, SearchError};

/// Suffix appended to a source index name to form its corrected target.
pub const CORRECTED_SUFFIX: &str = "_corrected";

/// Administrative surface of the search backend, as much of it as migration
/// needs. Implemented by [`SearchClient`](crate::client::SearchClient);
/// tests swap in an in-memory fake.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn index_exists(&self, index: &str) -> Result<bool>;
    async fn create_index(&self, index: &str, body: &Value) -> Result<()>;
    async fn reindex(&self, source: &str, dest: &str) -> Result<u64>;
    async fn update_aliases(&self, actions: &[Value]) -> Result<()>;
    async fn delete_index(&self, index: &str) -> Result<()>;
    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl AdminApi for SearchClient {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        SearchClient::index_exists(self, index).await
    }
    async fn create_index(&self, index: &str, body: &Value) -> Result<()> {
        SearchClient::create_index(self, index, body).await
    }
    async fn reindex(&self, source: &str, dest: &str) -> Result<u64> {
        SearchClient::reindex(self, source, dest).await
    }
    async fn update_aliases(&self, actions: &[Value]) -> Result<()> {
        SearchClient::update_aliases(self, actions).await
    }
    async fn delete_index(&self, index: &str) -> Result<()> {
        SearchClient::delete_index(self, index).await
    }
    async fn list_indices(&self, pattern: &str) -> Result<Vec<String>> {
        SearchClient::list_indices(self, pattern).await
    }
}

/// One alias mutation, half of an atomic swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn to_value(&self) -> Value {
        match self {
            AliasAction::Add { index, alias } => {
                json!({ "add": { "index": index, "alias": alias } })
            }
            AliasAction::Remove { index, alias } => {
                json!({ "remove": { "index": index, "alias": alias } })
            }
        }
    }
}

/// Lifecycle position of one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MigrationState {
    /// Target index exists with the corrected schema, still empty.
    Created,
    /// Bulk copy finished.
    Populated,
    /// Alias points only at the target.
    Swapped,
    /// Source index deleted.
    Retired,
}

/// Outcome of the create step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The target was already there; the run resumes at the copy step.
    AlreadyExists,
}

/// One in-flight schema correction: source index, corrected target, and the
/// stable query-facing alias being repointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationUnit {
    pub source: String,
    pub target: String,
    pub alias: String,
}

impl MigrationUnit {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            alias: alias.into(),
        }
    }

    /// Standard unit for `source`: the target is `<source>_corrected` and
    /// the alias keeps the source's name as the stable query-facing name.
    pub fn for_source(source: impl Into<String>) -> Self {
        let source = source.into();
        let target = format!("{source}{CORRECTED_SUFFIX}");
        let alias = source.clone();
        Self {
            source,
            target,
            alias,
        }
    }

    /// True when this name is itself a corrected target, not a source.
    pub fn is_corrected_name(name: &str) -> bool {
        name.ends_with(CORRECTED_SUFFIX)
    }
}

/// Result of running the automatic steps for one unit.
#[derive(Debug)]
pub struct MigrationOutcome {
    pub unit: MigrationUnit,
    pub state: MigrationState,
    pub create: CreateOutcome,
    /// Documents the bulk copy reported moving.
    pub copied: u64,
}

/// Outcome of migrating a whole index namespace.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub migrated: Vec<MigrationOutcome>,
    pub failures: Vec<(String, String)>,
}

/// Drives schema corrections against the backend's admin surface.
pub struct IndexMigrator {
    admin: Arc<dyn AdminApi>,
}

impl IndexMigrator {
    pub fn new(admin: Arc<dyn AdminApi>) -> Self {
        Self { admin }
    }

    /// Settings and mappings for corrected indices: request-cache enabled,
    /// location fields stored as unsigned integers.
    pub fn corrected_body() -> Value {
        json!({
            "settings": {
                "index": {
                    "requests": { "cache": { "enable": true } }
                }
            },
            "mappings": {
                "properties": {
                    "part":   { "type": "unsigned_long" },
                    "offset": { "type": "unsigned_long" }
                }
            }
        })
    }

    /// Step 1: create the corrected target. An existing target is reported,
    /// not raised, so interrupted runs resume.
    pub async fn create_corrected(&self, unit: &MigrationUnit) -> Result<CreateOutcome> {
        match self
            .admin
            .create_index(&unit.target, &Self::corrected_body())
            .await
        {
            Ok(()) => {
                tracing::info!(target = %unit.target, "corrected index created");
                Ok(CreateOutcome::Created)
            }
            Err(SearchError::AlreadyExists(_)) => {
                tracing::info!(target = %unit.target, "corrected index already exists, resuming");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e),
        }
    }

    /// Step 2: copy every document from source to target. Safe to re-run;
    /// the copy is keyed by document id.
    pub async fn bulk_copy(&self, unit: &MigrationUnit) -> Result<u64> {
        let copied = self.admin.reindex(&unit.source, &unit.target).await?;
        tracing::info!(
            source = %unit.source,
            target = %unit.target,
            copied,
            "bulk copy complete"
        );
        Ok(copied)
    }

    /// Step 3: repoint the alias from source to target in one atomic
    /// request. The query path never observes an unresolved alias.
    pub async fn swap_alias(&self, unit: &MigrationUnit) -> Result<()> {
        let actions = [
            AliasAction::Remove {
                index: unit.source.clone(),
                alias: unit.alias.clone(),
            }
            .to_value(),
            AliasAction::Add {
                index: unit.target.clone(),
                alias: unit.alias.clone(),
            }
            .to_value(),
        ];
        self.admin.update_aliases(&actions).await?;
        tracing::info!(alias = %unit.alias, target = %unit.target, "alias swapped");
        Ok(())
    }

    /// Step 4, opt-in: delete the source index. Never called by
    /// [`migrate`](Self::migrate); the operator verifies the swap first.
    pub async fn retire_source(&self, unit: &MigrationUnit) -> Result<()> {
        self.admin.delete_index(&unit.source).await?;
        tracing::info!(source = %unit.source, "source index retired");
        Ok(())
    }

    /// Run create, copy and swap for one unit. Retirement stays manual.
    pub async fn migrate(&self, unit: MigrationUnit) -> Result<MigrationOutcome> {
        if !self.admin.index_exists(&unit.source).await? {
            return Err(SearchError::Config(format!(
                "source index {} does not exist",
                unit.source
            )));
        }

        let create = self.create_corrected(&unit).await?;
        let copied = self.bulk_copy(&unit).await?;
        self.swap_alias(&unit).await?;

        Ok(MigrationOutcome {
            unit,
            state: MigrationState::Swapped,
            create,
            copied,
        })
    }

    /// Migrate every index matching `pattern`, skipping names that are
    /// themselves corrected targets. One index's failure never stops the
    /// others.
    pub async fn migrate_all(&self, pattern: &str) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();

        for name in self.admin.list_indices(pattern).await? {
            if MigrationUnit::is_corrected_name(&name) {
                continue;
            }
            match self.migrate(MigrationUnit::for_source(&name)).await {
                Ok(outcome) => report.migrated.push(outcome),
                Err(e) => {
                    tracing::error!(index = %name, error = %e, "migration failed");
                    report.failures.push((name, e.to_string()));
                }
            }
        }

        tracing::info!(
            migrated = report.migrated.len(),
            failed = report.failures.len(),
            "namespace migration finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    /// In-memory backend: indices hold document-id sets, aliases resolve to
    /// index names, and every alias batch is applied under one lock.
    #[derive(Default)]
    struct MockAdmin {
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        indices: BTreeMap<String, BTreeSet<String>>,
        aliases: BTreeMap<String, String>,
        alias_batches: Vec<Vec<Value>>,
    }

    impl MockAdmin {
        fn with_index(self, name: &str, docs: &[&str]) -> Self {
            self.state.lock().unwrap().indices.insert(
                name.to_string(),
                docs.iter().map(|d| d.to_string()).collect(),
            );
            self
        }

        fn with_alias(self, alias: &str, index: &str) -> Self {
            self.state
                .lock()
                .unwrap()
                .aliases
                .insert(alias.to_string(), index.to_string());
            self
        }

        fn docs(&self, index: &str) -> BTreeSet<String> {
            self.state.lock().unwrap().indices[index].clone()
        }

        fn alias_target(&self, alias: &str) -> Option<String> {
            self.state.lock().unwrap().aliases.get(alias).cloned()
        }
    }

    #[async_trait]
    impl AdminApi for MockAdmin {
        async fn index_exists(&self, index: &str) -> Result<bool> {
            Ok(self.state.lock().unwrap().indices.contains_key(index))
        }

        async fn create_index(&self, index: &str, _body: &Value) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.indices.contains_key(index) {
                return Err(SearchError::AlreadyExists(
                    "resource_already_exists_exception".to_string(),
                ));
            }
            state.indices.insert(index.to_string(), BTreeSet::new());
            Ok(())
        }

        async fn reindex(&self, source: &str, dest: &str) -> Result<u64> {
            let mut state = self.state.lock().unwrap();
            let docs = state
                .indices
                .get(source)
                .cloned()
                .ok_or_else(|| SearchError::Backend {
                    status: 404,
                    body: format!("no such index {source}"),
                })?;
            let count = docs.len() as u64;
            state
                .indices
                .get_mut(dest)
                .ok_or_else(|| SearchError::Backend {
                    status: 404,
                    body: format!("no such index {dest}"),
                })?
                .extend(docs);
            Ok(count)
        }

        async fn update_aliases(&self, actions: &[Value]) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.alias_batches.push(actions.to_vec());
            for action in actions {
                if let Some(remove) = action.get("remove") {
                    let alias = remove["alias"].as_str().unwrap();
                    state.aliases.remove(alias);
                }
                if let Some(add) = action.get("add") {
                    let alias = add["alias"].as_str().unwrap().to_string();
                    let index = add["index"].as_str().unwrap().to_string();
                    state.aliases.insert(alias, index);
                }
            }
            Ok(())
        }

        async fn delete_index(&self, index: &str) -> Result<()> {
            self.state.lock().unwrap().indices.remove(index);
            Ok(())
        }

        async fn list_indices(&self, _pattern: &str) -> Result<Vec<String>> {
            Ok(self.state.lock().unwrap().indices.keys().cloned().collect())
        }
    }

    fn migrator(admin: MockAdmin) -> (Arc<MockAdmin>, IndexMigrator) {
        let admin = Arc::new(admin);
        let migrator = IndexMigrator::new(Arc::clone(&admin) as Arc<dyn AdminApi>);
        (admin, migrator)
    }

    #[test]
    fn test_unit_naming() {
        let unit = MigrationUnit::for_source("bucket-acme");
        assert_eq!(unit.target, "bucket-acme_corrected");
        assert_eq!(unit.alias, "bucket-acme");
        assert!(MigrationUnit::is_corrected_name("bucket-acme_corrected"));
        assert!(!MigrationUnit::is_corrected_name("bucket-acme"));
    }

    #[test]
    fn test_corrected_body_mappings() {
        let body = IndexMigrator::corrected_body();
        assert_eq!(
            body.pointer("/mappings/properties/offset/type"),
            Some(&json!("unsigned_long"))
        );
        assert_eq!(
            body.pointer("/settings/index/requests/cache/enable"),
            Some(&json!(true))
        );
    }

    #[tokio::test]
    async fn test_full_migration_leaves_source_intact() {
        let (admin, migrator) = migrator(
            MockAdmin::default()
                .with_index("bucket-x", &["d1", "d2"])
                .with_alias("leaks-x", "bucket-x"),
        );

        let outcome = migrator
            .migrate(MigrationUnit::new("bucket-x", "bucket-x_corrected", "leaks-x"))
            .await
            .unwrap();

        assert_eq!(outcome.state, MigrationState::Swapped);
        assert_eq!(outcome.create, CreateOutcome::Created);
        assert_eq!(outcome.copied, 2);
        assert_eq!(admin.docs("bucket-x_corrected").len(), 2);
        assert_eq!(
            admin.alias_target("leaks-x").as_deref(),
            Some("bucket-x_corrected")
        );
        // Source still exists until retired explicitly.
        assert!(admin.state.lock().unwrap().indices.contains_key("bucket-x"));
    }

    #[tokio::test]
    async fn test_swap_is_one_atomic_batch() {
        let (admin, migrator) = migrator(
            MockAdmin::default()
                .with_index("bucket-x", &["d1"])
                .with_index("bucket-x_corrected", &["d1"]),
        );

        migrator
            .swap_alias(&MigrationUnit::for_source("bucket-x"))
            .await
            .unwrap();

        let batches = admin.state.lock().unwrap().alias_batches.clone();
        // Remove and add arrive in a single request, never two.
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert!(batches[0][0].get("remove").is_some());
        assert!(batches[0][1].get("add").is_some());
    }

    #[tokio::test]
    async fn test_create_is_resumable() {
        let (_, migrator) = migrator(
            MockAdmin::default()
                .with_index("bucket-x", &["d1"])
                .with_index("bucket-x_corrected", &[]),
        );

        let outcome = migrator
            .create_corrected(&MigrationUnit::for_source("bucket-x"))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_recopy_does_not_duplicate() {
        let (admin, migrator) = migrator(
            MockAdmin::default()
                .with_index("bucket-x", &["d1", "d2", "d3"])
                .with_index("bucket-x_corrected", &["d1"]),
        );
        let unit = MigrationUnit::for_source("bucket-x");

        migrator.bulk_copy(&unit).await.unwrap();
        migrator.bulk_copy(&unit).await.unwrap();

        assert_eq!(admin.docs("bucket-x_corrected").len(), 3);
    }

    #[tokio::test]
    async fn test_migrate_missing_source_fails() {
        let (_, migrator) = migrator(MockAdmin::default());
        let err = migrator
            .migrate(MigrationUnit::for_source("bucket-gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[tokio::test]
    async fn test_retire_deletes_source() {
        let (admin, migrator) = migrator(
            MockAdmin::default()
                .with_index("bucket-x", &["d1"])
                .with_index("bucket-x_corrected", &["d1"]),
        );

        migrator
            .retire_source(&MigrationUnit::for_source("bucket-x"))
            .await
            .unwrap();
        assert!(!admin.state.lock().unwrap().indices.contains_key("bucket-x"));
    }

    #[tokio::test]
    async fn test_migrate_all_skips_corrected_and_isolates_failures() {
        let (_, migrator) = migrator(
            MockAdmin::default()
                .with_index("bucket-a", &["d1"])
                .with_index("bucket-a_corrected", &[])
                .with_index("bucket-b", &["d1", "d2"]),
        );

        let report = migrator.migrate_all("bucket-*").await.unwrap();

        // bucket-a resumes into its existing target, bucket-b creates one;
        // bucket-a_corrected is never treated as a source.
        assert_eq!(report.migrated.len(), 2);
        assert!(report.failures.is_empty());
        let sources: Vec<&str> = report
            .migrated
            .iter()
            .map(|o| o.unit.source.as_str())
            .collect();
        assert_eq!(sources, vec!["bucket-a", "bucket-b"]);
        assert_eq!(report.migrated[0].create, CreateOutcome::AlreadyExists);
        assert_eq!(report.migrated[1].create, CreateOutcome::Created);
    }
}
