use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Spaces outbound API calls and absorbs server-side throttling.
///
/// `wait()` reserves the next send slot under a lock, so concurrent callers
/// are serialized at least `min_interval` apart. When the server signals
/// throttling, the next slot is pushed out by the server's `Retry-After`
/// hint or by an exponentially growing default, capped at `max_backoff`.
/// The backoff level resets after the next successful call. State lives
/// only for the duration of one pipeline run.
pub struct RateLimiter {
    state: Mutex<State>,
    min_interval: Duration,
    base_backoff: Duration,
    max_backoff: Duration,
}

struct State {
    next_allowed: Instant,
    throttle_level: u32,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, base_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                next_allowed: Instant::now(),
                throttle_level: 0,
            }),
            min_interval,
            base_backoff,
            max_backoff,
        }
    }

    /// Blocks until it is safe to issue the next request.
    pub async fn wait(&self) {
        let slot = {
            let mut state = self.state.lock().await;
            let slot = state.next_allowed.max(Instant::now());
            state.next_allowed = slot + self.min_interval;
            slot
        };
        sleep_until(slot).await;
    }

    /// Called when the API signals rate limiting. The next `wait()` will
    /// block for at least `retry_after` if the server provided one, or an
    /// exponentially increasing default otherwise. The ceiling applies only
    /// to the default: a server hint is honored in full, however large.
    pub async fn report_throttled(&self, retry_after: Option<Duration>) {
        let mut state = self.state.lock().await;
        state.throttle_level += 1;
        let delay = retry_after.unwrap_or_else(|| {
            (self.base_backoff * 2u32.saturating_pow(state.throttle_level - 1))
                .min(self.max_backoff)
        });
        debug!(level = state.throttle_level, ?delay, "throttled, backing off");
        state.next_allowed = state.next_allowed.max(Instant::now() + delay);
    }

    /// Called after a successful API call; resets the backoff ladder.
    pub async fn record_success(&self) {
        self.state.lock().await.throttle_level = 0;
    }
}
