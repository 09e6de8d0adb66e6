//! Search and scan commands: query the backend, then resolve every hit
//! back to its original line through the part store.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use leakstore_core::SearchHit;
use leakstore_search::SearchClient;
use leakstore_storage::{PartStore, PointerResolver, ResultAggregator};

#[derive(Args)]
pub struct SearchArgs {
    /// Term to search for (exact match on the stored fragment)
    pub term: String,

    /// Maximum hits to fetch
    #[arg(short, long, default_value = "100")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Term to scan for
    pub term: String,

    /// Hits per page fetched from the backend
    #[arg(long, default_value = "1000")]
    pub page_size: usize,

    /// Stop after this many hits (0 = the whole result set)
    #[arg(short, long, default_value = "0")]
    pub limit: usize,
}

pub async fn handle_search(client: &SearchClient, data_dir: &Path, args: SearchArgs) -> Result<()> {
    let hits = client
        .search(&args.term, args.limit)
        .await
        .context("search failed")?;
    resolve_and_print(data_dir, &hits).await
}

pub async fn handle_scan(client: &SearchClient, data_dir: &Path, args: ScanArgs) -> Result<()> {
    let mut scan = client
        .scan(&args.term, args.page_size)
        .await
        .context("scan failed")?;
    if let Some(total) = scan.total() {
        println!("Backend reports {total} total hits");
    }

    let mut hits = Vec::new();
    let mut truncated = false;
    while let Some(hit) = scan.next_hit().await.context("scan page fetch failed")? {
        hits.push(hit);
        if args.limit > 0 && hits.len() >= args.limit {
            truncated = true;
            break;
        }
    }
    if truncated {
        scan.close().await;
    }
    resolve_and_print(data_dir, &hits).await
}

async fn resolve_and_print(data_dir: &Path, hits: &[SearchHit]) -> Result<()> {
    if hits.is_empty() {
        println!("No hits");
        return Ok(());
    }

    let store = PartStore::new(data_dir);
    let groups = ResultAggregator::new(&store).group(hits).await;
    let output = PointerResolver::new(&store).resolve(&groups).await;

    let mut resolved = 0usize;
    for bucket in &output.buckets {
        for part in &bucket.parts {
            for line in &part.lines {
                match &line.text {
                    Some(text) => {
                        println!(
                            "{}/{} part{}@{}: {}",
                            bucket.bucket, bucket.file_name, part.part, line.offset, text
                        );
                        resolved += 1;
                    }
                    None => println!(
                        "{}/{} part{}@{}: <corrupt pointer>",
                        bucket.bucket, bucket.file_name, part.part, line.offset
                    ),
                }
            }
        }
    }

    println!();
    println!("{} hits, {} resolved, {} corrupt", hits.len(), resolved, output.corrupt);
    if groups.skipped > 0 {
        println!("{} hits skipped (foreign index)", groups.skipped);
    }
    if !output.failures.is_empty() {
        println!("Unreadable part files ({}):", output.failures.len());
        for (location, reason) in &output.failures {
            println!("  {location}: {reason}");
        }
    }
    Ok(())
}
