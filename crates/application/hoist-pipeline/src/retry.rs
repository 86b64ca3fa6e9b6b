use std::time::{Duration, Instant};

/// Retry budget for one job. The budget counts attempts, not failures:
/// a job that always fails runs exactly `budget` times.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub budget: u32,
    pub backoff: Duration,
    /// Failures further apart than this restore the full budget, so a
    /// long-running job is not killed by occasional unrelated blips.
    pub reset_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: 5,
            backoff: Duration::from_secs(5),
            reset_after: Duration::from_secs(200),
        }
    }
}

/// Classifies errors for the retry loop. Non-retryable errors abort the
/// job on first sight.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum JobError<E>
where
    E: std::error::Error + 'static,
{
    /// The budget ran out; carries the most recent failure.
    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },
    /// The job failed in a way a retry cannot fix.
    #[error(transparent)]
    Fatal(E),
}

/// Runs `job` until it succeeds or the budget is spent. Every retry
/// restarts the whole job from scratch; nothing is resumed mid-way.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut job: F,
) -> Result<T, JobError<E>>
where
    E: std::error::Error + Retryable + 'static,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut retries_remaining = policy.budget;
    let mut attempts: u32 = 0;
    let mut window_start: Option<Instant> = None;
    let mut earlier_errors: Vec<E> = Vec::new();

    loop {
        attempts += 1;
        match job().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_retryable() => return Err(JobError::Fatal(err)),
            Err(err) => {
                tracing::warn!("Attempt {} failed: {}", attempts, err);

                let now = Instant::now();
                match window_start {
                    None => window_start = Some(now),
                    Some(start) if now.duration_since(start) > policy.reset_after => {
                        retries_remaining = policy.budget;
                        window_start = Some(now);
                    }
                    Some(_) => {}
                }

                retries_remaining = retries_remaining.saturating_sub(1);
                if retries_remaining == 0 {
                    for earlier in &earlier_errors {
                        tracing::error!("Earlier failure: {}", earlier);
                    }
                    tracing::error!("Final failure: {}", err);
                    return Err(JobError::Exhausted {
                        attempts,
                        source: err,
                    });
                }

                earlier_errors.push(err);
                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}
