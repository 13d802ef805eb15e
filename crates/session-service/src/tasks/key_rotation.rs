//! Signing key rotation background task.
//!
//! Rotation also happens lazily on the issuance path. This task keeps the
//! key fresh on instances that issue rarely and purges keys whose
//! verification window has closed.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is triggered, after finishing
//! any in-flight iteration.

use crate::observability::metrics;
use crate::observability::ErrorCategory;
use crate::services::SigningKeyManager;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Start the key rotation task. Returns when `cancel_token` is cancelled.
#[instrument(skip_all, name = "session.task.key_rotation")]
pub async fn start_key_rotation_task(
    manager: Arc<SigningKeyManager>,
    check_interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "session.task.key_rotation",
        check_interval_ms = check_interval.as_millis() as u64,
        "Starting key rotation task"
    );

    // tokio::time::interval rejects a zero period.
    let mut interval = tokio::time::interval(check_interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_iteration(&manager).await;
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "session.task.key_rotation",
                    "Key rotation task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "session.task.key_rotation", "Key rotation task stopped");
}

/// One rotation check plus purge. Errors are logged and the loop continues;
/// the store may recover.
async fn run_iteration(manager: &SigningKeyManager) {
    if let Err(e) = manager.get_signing_key().await {
        error!(
            target: "session.task.key_rotation",
            error = %e,
            transient = e.is_transient(),
            "Failed to refresh signing key"
        );
        return;
    }

    if let Err(e) = manager.purge_retired_keys().await {
        error!(
            target: "session.task.key_rotation",
            error = %e,
            "Failed to purge retired signing keys"
        );
        metrics::record_error("purge_retired_keys", ErrorCategory::from(&e).as_str());
    }
}
