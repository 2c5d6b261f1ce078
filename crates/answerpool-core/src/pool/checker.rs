//! Background health check.
//!
//! Every `period` the checker sends a test question through each key of every
//! active provider. Outcomes land in the key health tracker like regular
//! traffic, so keys that recovered while idle come back into rotation and
//! dead keys go into cooldown before a real request hits them.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::dispatch::AnswerDispatcher;

/// Run periodic checks until `cancel` fires.
///
/// The first check happens one full `period` after start. A check in
/// progress is abandoned on cancellation.
pub async fn run_health_checks(
    dispatcher: Arc<AnswerDispatcher>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    tracing::info!(period_ms = period.as_millis() as u64, "Health checker started");
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            results = dispatcher.check_active_providers() => results,
        };
        for result in &results {
            let healthy = result.healthy_count();
            if healthy < result.keys.len() {
                tracing::warn!(
                    provider = %result.provider,
                    healthy,
                    total = result.keys.len(),
                    "Health check found failing keys"
                );
            } else {
                tracing::debug!(provider = %result.provider, healthy, "Health check passed");
            }
        }
    }
    tracing::info!("Health checker stopped");
}
