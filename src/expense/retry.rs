//! A bounded retry loop for storage mutations.

use std::time::Duration;

use crate::Error;

/// The maximum number of times a storage mutation is attempted.
pub(crate) const MAX_RETRIES: u32 = 3;

/// Execute `operation` with up to [MAX_RETRIES] attempts.
///
/// Only [Error::StorageBusy] is retried: it marks transient conditions that
/// are expected to clear on their own. After a failed attempt the task sleeps
/// for `2^(attempt - 1)` seconds (1s, then 2s) before trying again. The sleep
/// suspends only this task, never the runtime's worker threads, so one slow
/// retry sequence cannot stall unrelated requests.
///
/// A constraint conflict is never retried, since retrying cannot resolve a
/// uniqueness violation and the caller has a dedicated recovery path for it.
///
/// # Errors
/// Returns [Error::RetriesExhausted] if every attempt failed with
/// [Error::StorageBusy], or the operation's own error for anything else.
pub(crate) async fn execute_with_retry<T, F>(mut operation: F) -> Result<T, Error>
where
    F: FnMut() -> Result<T, Error>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation() {
            Ok(value) => return Ok(value),
            Err(Error::StorageBusy) => {
                if attempt == MAX_RETRIES {
                    return Err(Error::RetriesExhausted(attempt));
                }

                let delay = Duration::from_secs(1 << (attempt - 1));
                tracing::warn!(
                    "storage busy on attempt {attempt}/{MAX_RETRIES}, retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod retry_tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::Error;

    use super::{MAX_RETRIES, execute_with_retry};

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_delay_on_first_attempt() {
        let start = Instant::now();

        let result = execute_with_retry(|| Ok(42)).await;

        assert_eq!(result, Ok(42));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_exponential_backoff() {
        let start = Instant::now();
        let mut attempts = 0;

        let result = execute_with_retry(|| {
            attempts += 1;
            if attempts < 3 {
                Err(Error::StorageBusy)
            } else {
                Ok(attempts)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        // 1s after the first failure, 2s after the second.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_exhausting_all_attempts() {
        let start = Instant::now();
        let mut attempts = 0;

        let result: Result<(), Error> = execute_with_retry(|| {
            attempts += 1;
            Err(Error::StorageBusy)
        })
        .await;

        assert_eq!(result, Err(Error::RetriesExhausted(MAX_RETRIES)));
        assert_eq!(attempts, MAX_RETRIES);
        // No sleep after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_constraint_conflicts() {
        let mut attempts = 0;

        let result: Result<(), Error> = execute_with_retry(|| {
            attempts += 1;
            Err(Error::DuplicateIdempotencyKey)
        })
        .await;

        assert_eq!(result, Err(Error::DuplicateIdempotencyKey));
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_unexpected_errors() {
        let mut attempts = 0;

        let result: Result<(), Error> = execute_with_retry(|| {
            attempts += 1;
            Err(Error::NotFound)
        })
        .await;

        assert_eq!(result, Err(Error::NotFound));
        assert_eq!(attempts, 1);
    }
}
