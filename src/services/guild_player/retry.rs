use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Backoff {
    Fixed(Duration),
    /// Waits `step * n` after the n-th failed attempt.
    Linear(Duration),
}

#[derive(Clone, Debug)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) backoff: Backoff,
    pub(crate) attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_secs(1)),
            attempt_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AttemptError<E> {
    #[error("Attempt timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Failed(E),
}

#[derive(Debug)]
pub(crate) struct Attempted<T> {
    pub(crate) value: T,
    pub(crate) failed_attempts: u32,
}

#[derive(Debug)]
pub(crate) struct Exhausted<E> {
    pub(crate) attempts: u32,
    pub(crate) last_error: AttemptError<E>,
}

impl RetryPolicy {
    /// Delay after the given 1-based failed attempt.
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step * attempt,
        }
    }

    /// Runs `operation` until it succeeds or `max_attempts` attempts have failed.
    /// Every attempt is bounded by `attempt_timeout`; a timeout counts as a failed attempt.
    pub(crate) async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<Attempted<T>, Exhausted<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match tokio::time::timeout(self.attempt_timeout, operation(attempt)).await {
                Ok(Ok(value)) => {
                    return Ok(Attempted {
                        value,
                        failed_attempts: attempt - 1,
                    })
                }
                Ok(Err(error)) => AttemptError::Failed(error),
                Err(_) => AttemptError::TimedOut(self.attempt_timeout),
            };

            warn!(attempt, max_attempts, %error, "Attempt failed");

            if attempt >= max_attempts {
                return Err(Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }

            tokio::time::sleep(self.delay_for(attempt)).await;
            attempt += 1;
        }
    }
}
