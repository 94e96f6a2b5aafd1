use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::constants::BACKOFF_TIME_MULTIPLE;
use crate::metrics::SCHEDULER_RETRIES;
use crate::BackoffPolicy;

/// Runs `task` until it succeeds, `should_retry` rejects its error or the
/// policy's attempt budget is spent. The last observed error is returned.
///
/// Delays grow from the policy's starting delay by doubling, capped at
/// `max_delay`. The first attempt only waits when `delay_first_attempt` is set.
pub(crate) async fn task_with_exponential_backoff<F, Fut, T, E, R>(
    stage: &'static str,
    policy: &BackoffPolicy,
    mut task: F,
    should_retry: R,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Debug,
    R: Fn(&E, usize) -> bool,
{
    let max_attempts = policy.num_of_attempts.max(1);
    let max_delay = policy.max_delay();
    let mut delay = policy.starting_delay();
    let mut attempt = 0;

    loop {
        if attempt > 0 || policy.delay_first_attempt {
            sleep(delay).await;
            delay = next_delay(delay, max_delay);
        }
        attempt += 1;

        match task().await {
            Ok(r) => return Ok(r),
            Err(e) => {
                if attempt >= max_attempts {
                    warn!(stage, attempt, "task failed after max attempts: {:?}", &e);
                    return Err(e);
                }
                if !should_retry(&e, attempt) {
                    warn!(stage, attempt, "task failed with non-retryable error: {:?}", &e);
                    return Err(e);
                }
                SCHEDULER_RETRIES.with_label_values(&[stage]).inc();
                warn!(stage, attempt, next_delay = ?delay, "failed with error: {:?}", &e);
            }
        }
    }
}

fn next_delay(
    current: Duration,
    max_delay: Duration,
) -> Duration {
    current
        .checked_mul(BACKOFF_TIME_MULTIPLE)
        .map(|d| d.min(max_delay))
        .unwrap_or(max_delay)
}
