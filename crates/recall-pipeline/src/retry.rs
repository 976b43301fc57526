use std::future::Future;

use recall_core::Result;

/// Fixed attempt count, retried immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy { pub attempts: u32 }

impl Default for RetryPolicy {
    fn default() -> Self { Self { attempts: 3 } }
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self { Self { attempts: attempts.max(1) } }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. Every failed attempt is logged.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, stage: &'static str, image: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(stage, image, attempt, error = %e, "stage failed, retrying");
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(stage, image, attempt, error = %e, "stage failed");
                return Err(e);
            }
        }
    }
}
