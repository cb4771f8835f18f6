/// Default Airtable REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.airtable.com";

/// Configures HTTP timeout, endpoint and client identification.
///
/// Retry behaviour lives in [`RetryPolicy`](crate::RetryPolicy).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Base URL that table endpoints are resolved against.
    pub api_url: String,
    /// Value sent in the `User-Agent` header.
    pub user_agent: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            api_url: DEFAULT_API_URL.to_owned(),
            user_agent: concat!("airtable-orm/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}
