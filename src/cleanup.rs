//! Hourly sweep of stale transfer directories. Disk only; the in-memory
//! transfer records are left to explicit deletes.

use std::time::Duration;

use log::{error, info};

use crate::storage::Storage;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

pub async fn run(storage: Storage, max_age_hours: u64) {
    let max_age = Duration::from_secs(max_age_hours * 3600);
    info!("cleanup task started (transfers older than {max_age_hours}h will be deleted)");

    let mut tick = tokio::time::interval(SWEEP_INTERVAL);
    tick.tick().await; // immediate first sweep
    loop {
        match storage.sweep_older_than(max_age).await {
            Ok(0) => {}
            Ok(removed) => info!("cleanup removed {removed} stale transfers"),
            Err(e) => error!("cleanup sweep failed: {e}"),
        }
        tick.tick().await;
    }
}
