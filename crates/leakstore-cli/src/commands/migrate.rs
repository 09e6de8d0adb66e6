//! Index migration commands.

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;

use leakstore_search::{IndexMigrator, MigrationUnit, SearchClient};

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Create the corrected index, bulk-copy and swap the alias for one
    /// source index, or for every index in the bucket namespace
    Run {
        /// Source index to migrate; omit to migrate the whole namespace
        index: Option<String>,
    },
    /// Delete a migrated source index. Never run automatically; verify the
    /// swap first
    Retire {
        /// Source index to delete
        index: String,
    },
}

pub async fn handle_migrate_command(client: SearchClient, command: MigrateCommands) -> Result<()> {
    let migrator = IndexMigrator::new(Arc::new(client));

    match command {
        MigrateCommands::Run { index: Some(index) } => {
            let outcome = migrator.migrate(MigrationUnit::for_source(index)).await?;
            println!(
                "Migrated {} -> {} ({} documents copied, alias {} swapped)",
                outcome.unit.source, outcome.unit.target, outcome.copied, outcome.unit.alias
            );
            println!(
                "Source index kept; run `leakctl migrate retire {}` after verifying",
                outcome.unit.source
            );
        }
        MigrateCommands::Run { index: None } => {
            let report = migrator.migrate_all("bucket-*").await?;
            println!("Migrated {} indices:", report.migrated.len());
            for outcome in &report.migrated {
                println!(
                    "  {} -> {} ({} documents)",
                    outcome.unit.source, outcome.unit.target, outcome.copied
                );
            }
            if !report.failures.is_empty() {
                println!("Failed ({}):", report.failures.len());
                for (index, reason) in &report.failures {
                    println!("  {index}: {reason}");
                }
                anyhow::bail!("{} migration(s) failed", report.failures.len());
            }
        }
        MigrateCommands::Retire { index } => {
            migrator
                .retire_source(&MigrationUnit::for_source(&index))
                .await?;
            println!("Retired source index {index}");
        }
    }

    Ok(())
}
