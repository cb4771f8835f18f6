//! `airtable-orm` is an async client for the Airtable REST API.
//!
//! The crate has three layers:
//! - [`RetryingSession`]: an HTTP session that retries per a [`RetryPolicy`]
//! - [`convert`]: date, datetime, phone and attachment conversions
//! - [`orm`]: typed field accessors over a per-record [`FieldStore`]
//!
//! [`Table`] ties them together for single-record CRUD.

pub mod convert;
mod error;
mod options;
pub mod orm;
mod retry;
mod session;
mod table;
mod types;
mod value;
mod wire;

pub use convert::{attachment, Attachment};
pub use error::AirtableError;
pub use options::{SessionOptions, DEFAULT_API_URL};
pub use orm::{
    AttachmentsField, CheckboxField, DateField, DatetimeField, DynField, EmailField, Field,
    FieldStore, FieldTable, IntegerField, LinkField, Model, ModelInstance, NumberField, PhoneField,
    RawField, TextField,
};
pub use retry::{
    retry_strategy, RetryPolicy, RetryPolicyBuilder, DEFAULT_ALLOWED_METHODS,
    DEFAULT_BACKOFF_FACTOR, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRIABLE_STATUS_CODES,
};
pub use session::{RetryAdapter, RetryingSession};
pub use table::Table;
pub use types::{DeletedRecord, Record};
pub use value::{FieldValue, NativeValue};

pub type Result<T> = std::result::Result<T, AirtableError>;
