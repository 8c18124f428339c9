use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How a failed call should be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Provider throttling (HTTP 429, "limit exceeded" RPC codes) - longest delays
    RateLimit,
    /// Connection resets, 5xx responses - medium delays
    Transient,
    /// Call did not finish within its deadline - short delays
    Timeout,
    /// Anything else - fail immediately
    Fatal,
}

/// Errors that know which retry class they belong to
pub trait Retryable {
    fn retry_class(&self) -> RetryClass;
}

/// Backoff schedule per retry class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt
    pub max_retries: u32,
    pub rate_limit_delays_ms: Vec<u64>,
    pub transient_delays_ms: Vec<u64>,
    pub timeout_delays_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_delays_ms: vec![1000, 2000, 4000],
            transient_delays_ms: vec![300, 600, 1200],
            timeout_delays_ms: vec![500, 1000],
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            rate_limit_delays_ms: Vec::new(),
            transient_delays_ms: Vec::new(),
            timeout_delays_ms: Vec::new(),
        }
    }

    /// Delay before retry number `retry` (0-indexed), if the schedule has one
    pub fn delay_for(&self, retry: u32, class: RetryClass) -> Option<Duration> {
        let delays = match class {
            RetryClass::RateLimit => &self.rate_limit_delays_ms,
            RetryClass::Transient => &self.transient_delays_ms,
            RetryClass::Timeout => &self.timeout_delays_ms,
            RetryClass::Fatal => return None,
        };

        delays
            .get(retry as usize)
            .map(|&delay_ms| Duration::from_millis(delay_ms))
    }
}

/// Run `operation` until it succeeds, fails with a fatal error, or the
/// schedule in `config` runs out.
///
/// `label` only shows up in log lines so that retries of different calls can
/// be told apart.
///
/// # Example
/// ```ignore
/// let logs = retry_with_backoff("eth_getLogs", &RetryConfig::default(), || {
///     client.get_logs(&params)
/// })
/// .await?;
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    label: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut retry = 0u32;

    loop {
        let e = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    debug!("✅ {} succeeded after {} retries", label, retry);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let class = e.retry_class();
        if class == RetryClass::Fatal {
            error!("❌ {} failed with non-retryable error: {}", label, e);
            return Err(e);
        }

        if retry >= config.max_retries {
            error!(
                "❌ {} failed after {} attempts (retries exhausted): {}",
                label,
                retry + 1,
                e
            );
            return Err(e);
        }

        let Some(delay) = config.delay_for(retry, class) else {
            error!("❌ {} has no {:?} delay for retry {}, giving up", label, class, retry);
            return Err(e);
        };

        warn!(
            "⚠️  {} failed (attempt {}/{}): {} - retrying in {}ms ({:?})",
            label,
            retry + 1,
            config.max_retries + 1,
            e,
            delay.as_millis(),
            class
        );

        tokio::time::sleep(delay).await;
        retry += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestError(RetryClass);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {:?}", self.0)
        }
    }

    impl Retryable for TestError {
        fn retry_class(&self) -> RetryClass {
            self.0
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            rate_limit_delays_ms: vec![5, 10, 15],
            transient_delays_ms: vec![5, 10, 15],
            timeout_delays_ms: vec![5],
        }
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let result = retry_with_backoff("ok", &RetryConfig::default(), || async {
            Ok::<_, TestError>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let mut attempts = 0;
        let result = retry_with_backoff("fatal", &fast_config(3), || {
            attempts += 1;
            async { Err::<i32, _>(TestError(RetryClass::Fatal)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let mut attempts = 0;
        let result = retry_with_backoff("flaky", &fast_config(3), || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(TestError(RetryClass::Transient))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries() {
        let mut attempts = 0;
        let result = retry_with_backoff("throttled", &fast_config(2), || {
            attempts += 1;
            async { Err::<i32, _>(TestError(RetryClass::RateLimit)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_short_schedule_stops_early() {
        // only one timeout delay is configured even though 3 retries are allowed
        let mut attempts = 0;
        let result = retry_with_backoff("slow", &fast_config(3), || {
            attempts += 1;
            async { Err::<i32, _>(TestError(RetryClass::Timeout)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_none_policy_never_retries() {
        let mut attempts = 0;
        let result = retry_with_backoff("once", &RetryConfig::none(), || {
            attempts += 1;
            async { Err::<i32, _>(TestError(RetryClass::Transient)) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_delay_lookup() {
        let config = RetryConfig::default();
        assert_eq!(
            config.delay_for(0, RetryClass::RateLimit),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(config.delay_for(2, RetryClass::Timeout), None);
        assert_eq!(config.delay_for(0, RetryClass::Fatal), None);
    }
}
