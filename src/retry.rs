use std::collections::BTreeSet;
use std::time::Duration;

use crate::{AirtableError, Result};

/// Status codes retried when no override is given.
pub const DEFAULT_RETRIABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];
/// Exponential backoff multiplier in seconds.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 0.3;
/// Maximum number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: usize = 5;
/// Upper bound for a single backoff sleep.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(120);
/// Idempotent methods retried when no override is given.
pub const DEFAULT_ALLOWED_METHODS: [&str; 6] =
    ["HEAD", "GET", "PUT", "DELETE", "OPTIONS", "TRACE"];

/// Immutable retry configuration consumed by [`RetryingSession`](crate::RetryingSession).
///
/// `total` counts retries, not requests: `0` disables retrying and `1`
/// sends at most two requests.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    status_forcelist: BTreeSet<u16>,
    backoff_factor: f64,
    total: usize,
    backoff_max: Duration,
    retry_transport_errors: bool,
    respect_retry_after: bool,
    allowed_methods: BTreeSet<String>,
}

impl RetryPolicy {
    /// Starts a builder pre-loaded with the default values.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Status codes that trigger a retry.
    pub fn status_forcelist(&self) -> &BTreeSet<u16> {
        &self.status_forcelist
    }

    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }

    pub fn retry_transport_errors(&self) -> bool {
        self.retry_transport_errors
    }

    pub fn respect_retry_after(&self) -> bool {
        self.respect_retry_after
    }

    /// Methods eligible for status and read-error retries, upper-cased.
    pub fn allowed_methods(&self) -> &BTreeSet<String> {
        &self.allowed_methods
    }

    /// Returns `true` if a request with this method may be sent again after
    /// the server has seen it.
    pub fn is_method_retriable(&self, method: &str) -> bool {
        self.allowed_methods.contains(&method.to_ascii_uppercase())
    }

    /// Returns `true` if a response with this status should be retried.
    pub fn is_retry_status(&self, status: u16) -> bool {
        self.status_forcelist.contains(&status)
    }

    /// Returns `true` while `retries_done` has not yet used up the budget.
    pub fn can_retry(&self, retries_done: usize) -> bool {
        retries_done < self.total
    }

    /// Sleep before retry number `retry` (1-based).
    ///
    /// The first retry is immediate; after that the delay doubles:
    /// `backoff_factor * 2^(retry - 1)` seconds, capped at `backoff_max`.
    pub fn backoff_for(&self, retry: usize) -> Duration {
        if retry <= 1 || self.backoff_factor == 0.0 {
            return Duration::ZERO;
        }
        let exp = (retry - 1).min(32) as i32;
        let secs = self.backoff_factor * 2f64.powi(exp);
        let max = self.backoff_max.as_secs_f64();
        Duration::try_from_secs_f64(secs.min(max)).unwrap_or(self.backoff_max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            status_forcelist: DEFAULT_RETRIABLE_STATUS_CODES.into_iter().collect(),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            total: DEFAULT_MAX_RETRIES,
            backoff_max: DEFAULT_BACKOFF_MAX,
            retry_transport_errors: true,
            respect_retry_after: true,
            allowed_methods: DEFAULT_ALLOWED_METHODS
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Builds a [`RetryPolicy`] from optional overrides.
#[derive(Clone, Debug)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
        }
    }
}

impl RetryPolicyBuilder {
    /// Replaces the set of status codes that trigger a retry.
    pub fn status_forcelist<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = u16>,
    {
        self.policy.status_forcelist = codes.into_iter().collect();
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.policy.backoff_factor = factor;
        self
    }

    /// Maximum number of retries. `0` means no retries.
    pub fn total(mut self, total: usize) -> Self {
        self.policy.total = total;
        self
    }

    pub fn backoff_max(mut self, max: Duration) -> Self {
        self.policy.backoff_max = max;
        self
    }

    /// Whether connect errors and timeouts are retried like retriable statuses.
    pub fn retry_transport_errors(mut self, enabled: bool) -> Self {
        self.policy.retry_transport_errors = enabled;
        self
    }

    /// Whether a `Retry-After` header on 429/503 overrides the computed backoff.
    pub fn respect_retry_after(mut self, enabled: bool) -> Self {
        self.policy.respect_retry_after = enabled;
        self
    }

    /// Replaces the methods retried after a retriable status or read error.
    ///
    /// Connect failures are retried for every method since the server never
    /// saw the request.
    pub fn allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.allowed_methods = methods
            .into_iter()
            .map(|method| method.as_ref().trim().to_ascii_uppercase())
            .collect();
        self
    }

    /// Validates the configuration and freezes it.
    pub fn build(self) -> Result<RetryPolicy> {
        let policy = self.policy;
        if !policy.backoff_factor.is_finite() || policy.backoff_factor < 0.0 {
            return Err(AirtableError::Configuration(format!(
                "backoff_factor must be a finite number >= 0, got {}",
                policy.backoff_factor
            )));
        }
        if let Some(code) = policy
            .status_forcelist
            .iter()
            .find(|code| !(100..=599).contains(*code))
        {
            return Err(AirtableError::Configuration(format!(
                "status_forcelist contains invalid HTTP status {code}"
            )));
        }
        Ok(policy)
    }
}

/// Creates a retry policy with the Airtable defaults applied to any
/// option left unset.
///
/// ```
/// let policy = airtable_orm::retry_strategy().total(2).build().unwrap();
/// assert_eq!(policy.total(), 2);
/// ```
pub fn retry_strategy() -> RetryPolicyBuilder {
    RetryPolicy::builder()
}
