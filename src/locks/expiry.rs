use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::manager::LockManager;

/// Configuration for the background expiry sweep
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// How often to scan for lapsed locks
    pub sweep_interval: Duration,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Runs the expiry sweep forever. Reads treat a lapsed lock as FREE already;
/// this task is the correctness backstop that actually flips the slot,
/// cancels the pending booking and broadcasts the delta.
#[instrument(skip(lock_manager))]
pub async fn start_expiry_task(lock_manager: Arc<LockManager>, config: ExpiryConfig) {
    info!(
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        "Starting lock expiry background task"
    );

    let mut sweep_interval = interval(config.sweep_interval);

    loop {
        sweep_interval.tick().await;

        let freed = lock_manager.sweep_expired(Utc::now()).await;
        if freed > 0 {
            info!(freed = freed, "Expiry sweep freed seats");
        } else {
            debug!("Expiry sweep found nothing to free");
        }
    }
}
