//! Retry with exponential backoff for idempotent requests

use std::time::Duration;

use reqwest::Method;

use crate::error::FetchError;

/// Status codes the source site uses for rate limiting and transient outages
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Upper bound for a server-supplied `Retry-After`
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Retry policy injected into [`crate::Transport`].
///
/// `max_retries` counts retries, not attempts: 2 retries = up to 3 requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub retryable_statuses: Vec<u16>,
    pub methods: Vec<Method>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            methods: vec![Method::GET, Method::HEAD, Method::OPTIONS],
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Exponential backoff before retry `attempt` (1-based): base, 2·base, 4·base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }

    /// Delay before retry `attempt`, preferring the server's `Retry-After`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(d) => d.min(MAX_RETRY_AFTER),
            None => self.backoff(attempt),
        }
    }

    fn retries_for(&self, method: &Method) -> u32 {
        if self.allows_method(method) {
            self.max_retries
        } else {
            0
        }
    }
}

/// Result of one request attempt as seen by the retry loop.
#[derive(Debug)]
pub enum Outcome<T> {
    /// Final value, returned as-is
    Done(T),
    /// Retryable response. `last` is returned if the retry budget is spent.
    Retry {
        last: T,
        retry_after: Option<Duration>,
        reason: String,
    },
}

/// Run `attempt_fn` until it yields a final value or the policy runs out.
///
/// Retryable responses are retried with backoff; when the budget is spent the
/// last response is handed back so the caller can report its status.
/// Transient errors (no response at all) are retried under the same budget.
pub fn retry_with_backoff<T>(
    label: &str,
    policy: &RetryPolicy,
    method: &Method,
    mut attempt_fn: impl FnMut() -> Result<Outcome<T>, FetchError>,
) -> Result<T, FetchError> {
    let max_retries = policy.retries_for(method);
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(Outcome::Done(v)) => return Ok(v),
            Ok(Outcome::Retry {
                last,
                retry_after,
                reason,
            }) => {
                if attempt >= max_retries {
                    log::debug!("{label}: {reason}, retries exhausted");
                    return Ok(last);
                }
                attempt += 1;
                let delay = policy.delay_for(attempt, retry_after);
                log::debug!("{label}: {reason}, retry {attempt}/{max_retries} in {delay:?}");
                drop(last);
                std::thread::sleep(delay);
            }
            Err(e) if attempt < max_retries && e.is_transient() => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                log::debug!("{label}: {e}, retry {attempt}/{max_retries} in {delay:?}");
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}
