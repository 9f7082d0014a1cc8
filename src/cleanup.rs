//! Scheduled cleanup of expired revocation entries.

use crate::db::Database;
use crate::jwt::unix_now;
use std::time::Duration;
use tracing::{error, info};

/// Interval between cleanup runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all cleanup tasks once.
///
/// A revoked refresh token that has expired is rejected by expiry alone, so its
/// revocation row can go.
pub async fn run_cleanup(db: &Database) {
    match db.revoked_tokens().delete_expired(unix_now()).await {
        Ok(count) if count > 0 => info!("Cleaned up {} expired token revocations", count),
        Ok(_) => {}
        Err(e) => error!("Failed to clean up token revocations: {}", e),
    }
}

/// Spawn a background task that runs cleanup periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(db: Database) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        // The first tick completes immediately and startup already ran a pass.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_cleanup(&db).await;
        }
    })
}
