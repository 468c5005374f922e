//! Periodic removal of expired resumption tokens.

use std::sync::Arc;
use std::time::Duration;

use oai_harvest::token::TokenStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest accepted sweep interval.
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Start the sweeper on the current runtime.
pub fn spawn_sweeper(
    tokens: Arc<TokenStore>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_sweeper(tokens, every, cancel))
}

/// Sweep once immediately, then every `every`, until `cancel` fires.
///
/// A sweep in progress always runs to completion.
pub async fn run_sweeper(tokens: Arc<TokenStore>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every.max(MIN_INTERVAL));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(interval = ?every, "starting token sweeper");

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!("stopping token sweeper");
                break;
            }
            _ = interval.tick() => {}
        }

        let store = Arc::clone(&tokens);
        match tokio::task::spawn_blocking(move || store.sweep()).await {
            Ok(deleted) => tracing::debug!(deleted, "token sweep finished"),
            Err(e) => tracing::error!(error = %e, "token sweep task failed"),
        }
    }
}
