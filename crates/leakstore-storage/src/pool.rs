//! Bounded Bucket Worker Pool
//!
//! Batch operations (index building, stats) process independent buckets in
//! parallel, but with a fixed concurrency cap so memory and file-descriptor
//! use stay bounded no matter how many buckets exist. No bucket's work is
//! ever split across workers; within a bucket everything is sequential.
//!
//! ## Cancellation
//!
//! Cancellation is cooperative: once the [`CancelFlag`] is set, no new
//! bucket jobs are submitted, and in-flight buckets run to completion so
//! their output handles are flushed and closed before the call returns.
//!
//! ## Results
//!
//! Each worker produces one result; the pool collects them in submission
//! order so callers can build a deterministic report. A panicking worker is
//! converted into an `Error::Join` result for its bucket instead of taking
//! the batch down.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Error, Result};

/// Default worker cap for bucket fan-out.
pub const DEFAULT_MAX_WORKERS: usize = 32;

/// Shared cooperative cancellation flag.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Run `job` for every bucket with at most `max_workers` buckets in flight.
///
/// Returns one `(bucket, result)` pair per *submitted* bucket, in submission
/// order. Buckets skipped because the flag was set before submission do not
/// appear in the output.
pub async fn for_each_bucket<F, Fut, T>(
    buckets: Vec<String>,
    max_workers: usize,
    cancel: &CancelFlag,
    job: F,
) -> Vec<(String, Result<T>)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut handles = Vec::with_capacity(buckets.len());

    for bucket in buckets {
        if cancel.is_cancelled() {
            tracing::warn!(bucket = %bucket, "cancelled, not submitting further buckets");
            break;
        }

        // Acquiring before spawning bounds the number of live tasks, not
        // just the number of running ones.
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .expect("semaphore never closed");

        let fut = job(bucket.clone());
        let handle = tokio::spawn(async move {
            let result = fut.await;
            drop(permit);
            result
        });
        handles.push((bucket, handle));
    }

    let mut results = Vec::with_capacity(handles.len());
    for (bucket, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Join(format!("bucket {bucket}: {e}"))),
        };
        results.push((bucket, result));
    }
    results
}
