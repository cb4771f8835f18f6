/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum AirtableError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Retry policy or session could not be set up as requested.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A date or datetime string did not match the Airtable wire format.
    #[error("cannot parse '{value}' as {expected}: {source}")]
    Parse {
        value: String,
        /// Human-readable name of the expected format.
        expected: &'static str,
        source: chrono::ParseError,
    },
    /// A value could not be converted for the given field.
    #[error("invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },
    /// The field has never been written on this instance.
    #[error("field '{field}' is not set")]
    NotSet { field: String },
    /// No field is registered under the requested name.
    #[error("unknown field '{0}'")]
    UnknownField(String),
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
}

impl AirtableError {
    pub(crate) fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}
