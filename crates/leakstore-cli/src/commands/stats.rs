//! Frequency statistics commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;

use leakstore_storage::{PartStore, StatsAggregator};

#[derive(Subcommand)]
pub enum StatsCommands {
    /// Build each bucket's frequency table from its offset index
    Build,
    /// Merge every per-bucket table into the global one at the data root
    Merge,
    /// Build all per-bucket tables, then merge
    All,
}

pub async fn handle_stats_command(
    command: StatsCommands,
    data_dir: &Path,
    workers: usize,
) -> Result<()> {
    let store = Arc::new(PartStore::new(data_dir));
    let aggregator = StatsAggregator::new(store).with_max_workers(workers);

    match command {
        StatsCommands::Build => {
            build(&aggregator).await?;
        }
        StatsCommands::Merge => {
            merge(&aggregator).await?;
        }
        StatsCommands::All => {
            build(&aggregator).await?;
            merge(&aggregator).await?;
        }
    }

    Ok(())
}

async fn build(aggregator: &StatsAggregator) -> Result<()> {
    let cancel = super::cancel_on_ctrl_c();
    let report = aggregator.build_all(&cancel).await?;

    println!("Built stats for {} buckets:", report.buckets.len());
    for (bucket, keys) in &report.buckets {
        println!("  {bucket} ({keys} distinct keys)");
    }
    if report.lines_skipped > 0 {
        println!("Skipped {} malformed index lines", report.lines_skipped);
    }
    fail_on_bucket_errors(&report.failures)
}

async fn merge(aggregator: &StatsAggregator) -> Result<()> {
    let report = aggregator.merge_global().await?;

    if let Some(global) = &report.global {
        println!(
            "Merged {} buckets into global table ({} keys, {} entries)",
            report.buckets.len(),
            global.len(),
            global.total()
        );
        for (key, count) in global.sorted_entries().into_iter().take(10) {
            println!("  {key}: {count}");
        }
    }
    fail_on_bucket_errors(&report.failures)
}

fn fail_on_bucket_errors(failures: &[(String, String)]) -> Result<()> {
    if failures.is_empty() {
        return Ok(());
    }
    println!("Failed buckets ({}):", failures.len());
    for (bucket, reason) in failures {
        println!("  {bucket}: {reason}");
    }
    anyhow::bail!("{} bucket(s) failed", failures.len())
}
