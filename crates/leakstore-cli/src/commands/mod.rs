//! Command handlers for leakctl.

pub mod index;
pub mod migrate;
pub mod search;
pub mod stats;

pub use index::IndexCommands;
pub use migrate::MigrateCommands;
pub use stats::StatsCommands;

use leakstore_storage::CancelFlag;

/// Cancel flag wired to Ctrl-C: the first interrupt stops submitting new
/// bucket jobs and lets in-flight ones finish cleanly.
pub fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt received, finishing in-flight buckets...");
            flag.cancel();
        }
    });
    cancel
}
