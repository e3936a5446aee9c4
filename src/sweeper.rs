use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::ratelimit::RateLimiter;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long after its window ends a counter may sit untouched before it is
/// dropped. Keeps the counter map bounded by recently-active clients.
const COUNTER_IDLE: Duration = Duration::from_secs(300);

/// Background task that periodically prunes idle rate-limit counters.
pub async fn run_sweeper(limiter: Arc<RateLimiter>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        let removed = limiter.prune_idle(COUNTER_IDLE);
        if removed > 0 {
            debug!("pruned {removed} idle rate-limit counters");
        }
    }
}
