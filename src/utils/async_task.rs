use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::BackoffPolicy;
use crate::DispatchError;
use crate::Error;
use crate::Result;

/// Runs `task` until it succeeds or `policy.max_retries` attempts are used.
///
/// Every attempt is bounded by `policy.timeout()`. Between attempts the delay
/// starts at `policy.base_delay()`, doubles each time and is capped at
/// `policy.max_delay()`, with up to 10% random jitter on top.
///
/// Once `cancel` fires no new attempt is started; an attempt already running
/// is allowed to finish.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
    cancel: &CancellationToken,
) -> Result<P>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P>>,
{
    let max_retries = policy.max_retries.max(1);
    let timeout_duration = policy.timeout();
    let mut delay = policy.base_delay();
    let mut last_error = String::new();

    for attempt in 1..=max_retries {
        if cancel.is_cancelled() {
            return Err(cancelled(attempt - 1));
        }

        match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => {
                warn!(attempt, "task failed: {}", error);
                last_error = error.to_string();
            }
            Err(_) => {
                warn!(attempt, "task timed out after {:?}", timeout_duration);
                last_error = DispatchError::Timeout(timeout_duration).to_string();
            }
        }

        if attempt < max_retries {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(attempt)),
                _ = sleep(with_jitter(delay)) => {}
            }
            delay = (delay * 2).min(policy.max_delay());
        }
    }

    Err(Error::Dispatch(DispatchError::RetriesExhausted {
        attempts: max_retries,
        last_error,
    }))
}

fn cancelled(attempts: usize) -> Error {
    debug!(attempts, "retries abandoned after cancellation");
    Error::Dispatch(DispatchError::Cancelled { attempts })
}

fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 10;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}
