//! Offset index commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;

use leakstore_storage::{IndexBuilder, PartStore};

#[derive(Subcommand)]
pub enum IndexCommands {
    /// Build per-part offset index files from each bucket's sorted
    /// metadata stream
    Build,
}

pub async fn handle_index_command(
    command: IndexCommands,
    data_dir: &Path,
    workers: usize,
) -> Result<()> {
    match command {
        IndexCommands::Build => {
            let store = Arc::new(PartStore::new(data_dir));
            let cancel = super::cancel_on_ctrl_c();

            let report = IndexBuilder::new(store)
                .with_max_workers(workers)
                .build_all(&cancel)
                .await?;

            println!("Indexed {} buckets:", report.buckets.len());
            for summary in &report.buckets {
                println!(
                    "  {} ({} parts, {} lines, {} skipped)",
                    summary.bucket, summary.parts, summary.lines_indexed, summary.lines_skipped
                );
            }
            println!(
                "Total: {} lines indexed, {} skipped",
                report.lines_indexed(),
                report.lines_skipped()
            );

            if !report.failures.is_empty() {
                println!("Failed buckets ({}):", report.failures.len());
                for (bucket, reason) in &report.failures {
                    println!("  {bucket}: {reason}");
                }
                anyhow::bail!("{} bucket(s) failed", report.failures.len());
            }
        }
    }

    Ok(())
}
