//! Periodic background sweep: reaping is driven by this interval task in
//! addition to the opportunistic reap on every `/trigger` call.
use super::server::TriggerState;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Graceful-shutdown drain ceiling: wait up to this long for outstanding
/// scripts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub async fn run(state: Arc<TriggerState>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        state.slots.reap_dead();
        state.slots.reap_timed_out(state.run_timeout);
    }
}

/// Stops accepting new runs and waits for outstanding ones to finish, up to
/// [`DRAIN_TIMEOUT`], then force-kills any survivor. Re-entry is a no-op.
pub async fn drain(state: Arc<TriggerState>) -> bool {
    if state.shutting_down.swap(true, Ordering::SeqCst) {
        return true;
    }
    info!("shutting down: waiting for outstanding workflow cycles to finish");
    let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        state.slots.reap_dead();
        if state.slots.count() == 0 {
            info!("all workflow cycles finished, exiting cleanly");
            return true;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
    let survivors = state.slots.snapshot();
    if !survivors.is_empty() {
        tracing::warn!(count = survivors.len(), "drain timeout reached, force-killing survivors");
        state.slots.reap_timed_out(Duration::from_secs(0));
    }
    survivors.is_empty()
}
