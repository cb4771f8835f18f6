use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::{AirtableError, Result, RetryPolicy, SessionOptions};

/// Retry-aware transport mounted on a URL prefix of a [`RetryingSession`].
///
/// Adapters are cheap to clone; clones share the same policy.
#[derive(Clone, Debug)]
pub struct RetryAdapter {
    policy: Arc<RetryPolicy>,
}

impl RetryAdapter {
    pub fn new(policy: Arc<RetryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

/// HTTP session that retries failed requests according to a [`RetryPolicy`].
///
/// One adapter is mounted for `https://` and one for `http://`, both bound
/// to the same policy. Requests are routed to the adapter with the longest
/// matching prefix.
#[derive(Clone)]
pub struct RetryingSession {
    http: reqwest::Client,
    adapters: Vec<(String, RetryAdapter)>,
    authorization: Option<String>,
    options: SessionOptions,
}

impl fmt::Debug for RetryingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefixes: Vec<&str> = self.adapters.iter().map(|(p, _)| p.as_str()).collect();
        f.debug_struct("RetryingSession")
            .field("adapters", &prefixes)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("options", &self.options)
            .finish()
    }
}

impl RetryingSession {
    /// Creates a session with one retrying adapter per URL scheme.
    pub fn new(policy: RetryPolicy) -> Self {
        let adapter = RetryAdapter::new(Arc::new(policy));
        let mut session = Self {
            http: reqwest::Client::new(),
            adapters: Vec::with_capacity(2),
            authorization: None,
            options: SessionOptions::default(),
        };
        session.mount("https://", adapter.clone());
        session.mount("http://", adapter);
        session
    }

    /// Creates a session from environment variables.
    ///
    /// Reads:
    /// - `AIRTABLE_API_KEY` — personal access token (Bearer prefix optional)
    /// - `AIRTABLE_API_URL` — optional endpoint override
    ///
    /// The default [`RetryPolicy`] is used.
    pub fn from_env() -> Result<Self> {
        let key = std::env::var("AIRTABLE_API_KEY").map_err(|_| {
            AirtableError::Configuration(
                "missing AIRTABLE_API_KEY environment variable".to_owned(),
            )
        })?;
        if key.trim().is_empty() {
            return Err(AirtableError::Configuration(
                "AIRTABLE_API_KEY is set but empty".to_owned(),
            ));
        }

        let mut options = SessionOptions::default();
        if let Ok(url) = std::env::var("AIRTABLE_API_URL") {
            if !url.trim().is_empty() {
                options.api_url = url.trim().trim_end_matches('/').to_owned();
            }
        }

        Ok(Self::new(RetryPolicy::default())
            .with_api_key(key)
            .with_options(options))
    }

    /// Sets the API key sent as `Authorization: Bearer <key>`.
    ///
    /// If the key already carries the `Bearer ` prefix it is kept as is.
    pub fn with_api_key(mut self, key: impl AsRef<str>) -> Self {
        self.authorization = Some(normalize_bearer_authorization(key.as_ref()));
        self
    }

    /// Applies session options such as timeout and endpoint.
    pub fn with_options(mut self, opts: SessionOptions) -> Self {
        self.options = opts;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Mounts `adapter` for every URL starting with `prefix`, replacing an
    /// adapter already mounted on the same prefix.
    pub fn mount(&mut self, prefix: impl Into<String>, adapter: RetryAdapter) {
        let prefix = prefix.into().to_ascii_lowercase();
        match self.adapters.iter_mut().find(|(p, _)| *p == prefix) {
            Some(slot) => slot.1 = adapter,
            None => self.adapters.push((prefix, adapter)),
        }
        // Longest prefix first so lookup can take the first match.
        self.adapters.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Returns the adapter that would handle `url`.
    pub fn adapter_for(&self, url: &str) -> Result<&RetryAdapter> {
        let lowered = url.to_ascii_lowercase();
        self.adapters
            .iter()
            .find(|(prefix, _)| lowered.starts_with(prefix.as_str()))
            .map(|(_, adapter)| adapter)
            .ok_or_else(|| {
                AirtableError::Configuration(format!("no adapter mounted for '{url}'"))
            })
    }

    /// Starts a request with authorization, user agent and timeout applied.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(header::USER_AGENT, &self.options.user_agent)
            .timeout(Duration::from_millis(self.options.timeout_ms));
        if let Some(authorization) = &self.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        builder
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Builds and executes a request.
    pub async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let request = builder.build().map_err(AirtableError::Transport)?;
        self.execute(request).await
    }

    /// Executes a request and decodes a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = self.send(builder).await?;
        let body = response.text().await.map_err(AirtableError::Transport)?;
        serde_json::from_str::<T>(&body).map_err(|err| {
            AirtableError::Decode(format!("invalid response JSON: {err}; body: {body}"))
        })
    }

    /// Executes a request, retrying per the mounted adapter's policy.
    ///
    /// Only the final outcome is returned: a success response, or the error
    /// of the last attempt once retries are exhausted. Requests whose body
    /// cannot be cloned are sent once. Retriable statuses and read errors
    /// are only retried for the policy's allowed methods; connect failures
    /// are retried for any method.
    pub async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        let policy = self.adapter_for(request.url().as_str())?.policy();
        let method_retriable = policy.is_method_retriable(request.method().as_str());
        let mut request = request;
        let mut retries = 0usize;

        loop {
            let next = request.try_clone();
            let result = self.http.execute(request).await;

            let retry_request = match next {
                Some(retry_request) if policy.can_retry(retries) => retry_request,
                _ => return finish(result).await,
            };

            let delay = match &result {
                Ok(response)
                    if method_retriable && policy.is_retry_status(response.status().as_u16()) =>
                {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        status = response.status().as_u16(),
                        "retriable status, retrying"
                    );
                    let delay = policy
                        .respect_retry_after()
                        .then(|| retry_after(response))
                        .flatten()
                        .map(|delay| delay.min(policy.backoff_max()))
                        .unwrap_or_else(|| policy.backoff_for(retries + 1));
                    Some(delay)
                }
                Err(err)
                    if policy.retry_transport_errors()
                        && is_retriable_transport(err, method_retriable) =>
                {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %err, "transport error, retrying");
                    Some(policy.backoff_for(retries + 1))
                }
                _ => None,
            };
            let Some(delay) = delay else {
                return finish(result).await;
            };

            drop(result);
            retries += 1;
            wait_before_retry(retries, delay).await;
            request = retry_request;
        }
    }
}

async fn finish(
    result: std::result::Result<reqwest::Response, reqwest::Error>,
) -> Result<reqwest::Response> {
    let response = result.map_err(AirtableError::Transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.map_err(AirtableError::Transport)?;
    #[cfg(feature = "tracing")]
    tracing::warn!(status = status.as_u16(), "request failed");
    Err(AirtableError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Reads a `Retry-After` header given in whole seconds on 429/503 responses.
fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    if !matches!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return None;
    }
    let value = response.headers().get(header::RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Connect failures never reached the server; anything later may have.
fn is_retriable_transport(err: &reqwest::Error, method_retriable: bool) -> bool {
    if err.is_connect() {
        return true;
    }
    method_retriable && (err.is_timeout() || err.is_request() || err.is_body())
}

async fn wait_before_retry(retry: usize, delay: Duration) {
    #[cfg(feature = "tracing")]
    tracing::debug!(retry, delay_ms = delay.as_millis() as u64, "waiting before retry");
    #[cfg(not(feature = "tracing"))]
    let _ = retry;

    if !delay.is_zero() {
        sleep(delay).await;
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{normalize_bearer_authorization, RetryAdapter, RetryingSession};
    use crate::{retry_strategy, AirtableError, RetryPolicy};

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(normalize_bearer_authorization("pat123"), "Bearer pat123");
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR pat123"),
            "bEaReR pat123"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let session = RetryingSession::new(RetryPolicy::default()).with_api_key("secret-key");
        let debug = format!("{session:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn both_schemes_share_one_policy() {
        let policy = retry_strategy().total(3).build().unwrap();
        let session = RetryingSession::new(policy);

        let https = session.adapter_for("https://api.airtable.com/v0").unwrap();
        let http = session.adapter_for("http://localhost:8080").unwrap();
        assert!(Arc::ptr_eq(&https.policy, &http.policy));
        assert_eq!(https.policy().total(), 3);
    }

    #[test]
    fn longest_prefix_wins() {
        let mut session = RetryingSession::new(RetryPolicy::default());
        let special = retry_strategy().total(0).build().unwrap();
        session.mount("https://api.airtable.com/", RetryAdapter::new(Arc::new(special)));

        let adapter = session
            .adapter_for("https://api.airtable.com/v0/app/tbl")
            .unwrap();
        assert_eq!(adapter.policy().total(), 0);

        let fallback = session.adapter_for("https://example.com/").unwrap();
        assert_eq!(fallback.policy().total(), 5);
    }

    #[test]
    fn unmounted_scheme_is_configuration_error() {
        let session = RetryingSession::new(RetryPolicy::default());
        let err = session.adapter_for("ftp://files").expect_err("must fail");
        assert!(matches!(err, AirtableError::Configuration(_)));
    }
}
