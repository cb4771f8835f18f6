use serde_json::{Map, Value as JsonValue};

use crate::{
    wire::WriteRequest, AirtableError, DeletedRecord, Model, ModelInstance, Record, Result,
    RetryingSession,
};

/// Handle for one table of one base.
///
/// All requests go through the wrapped [`RetryingSession`], so they are
/// retried per its policy.
#[derive(Clone, Debug)]
pub struct Table {
    session: RetryingSession,
    base_id: String,
    table_name: String,
    typecast: bool,
}

impl Table {
    pub fn new(
        session: RetryingSession,
        base_id: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            session,
            base_id: base_id.into(),
            table_name: table_name.into(),
            typecast: false,
        }
    }

    /// Creates a handle for the table model `M` is declared against.
    pub fn for_model<M: Model>(session: RetryingSession, base_id: impl Into<String>) -> Self {
        Self::new(session, base_id, M::table_name())
    }

    /// Asks Airtable to coerce string values into the column types on write.
    pub fn with_typecast(mut self, typecast: bool) -> Self {
        self.typecast = typecast;
        self
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Table endpoint: `{api_url}/v0/{base_id}/{table_name}`, with both path
    /// segments percent-encoded.
    pub fn url(&self) -> String {
        format!(
            "{}/v0/{}/{}",
            self.session.options().api_url.trim_end_matches('/'),
            urlencoding::encode(&self.base_id),
            urlencoding::encode(&self.table_name)
        )
    }

    fn record_url(&self, record_id: &str) -> Result<String> {
        if record_id.trim().is_empty() {
            return Err(AirtableError::Configuration(
                "record id cannot be empty".to_owned(),
            ));
        }
        Ok(format!("{}/{}", self.url(), urlencoding::encode(record_id)))
    }

    pub async fn get(&self, record_id: &str) -> Result<Record> {
        let url = self.record_url(record_id)?;
        self.session.send_json(self.session.get(&url)).await
    }

    pub async fn create(&self, fields: &Map<String, JsonValue>) -> Result<Record> {
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.table_name, fields = fields.len(), "creating record");

        let body = WriteRequest {
            fields,
            typecast: self.typecast,
        };
        let builder = self.session.post(&self.url()).json(&body);
        self.session.send_json(builder).await
    }

    /// Updates only the given fields; other fields keep their values.
    pub async fn update(&self, record_id: &str, fields: &Map<String, JsonValue>) -> Result<Record> {
        #[cfg(feature = "tracing")]
        tracing::debug!(table = %self.table_name, record_id, "updating record");

        let url = self.record_url(record_id)?;
        let body = WriteRequest {
            fields,
            typecast: self.typecast,
        };
        let builder = self.session.patch(&url).json(&body);
        self.session.send_json(builder).await
    }

    pub async fn delete(&self, record_id: &str) -> Result<DeletedRecord> {
        let url = self.record_url(record_id)?;
        self.session.send_json(self.session.delete(&url)).await
    }

    /// Fetches a record and maps it onto model `M`.
    pub async fn fetch<M: Model>(&self, record_id: &str) -> Result<ModelInstance<M>> {
        let record = self.get(record_id).await?;
        ModelInstance::from_record(record)
    }

    /// Creates the record if the instance has no id yet, otherwise updates
    /// it. The instance is refreshed from the API response.
    pub async fn save<M: Model>(&self, instance: &mut ModelInstance<M>) -> Result<()> {
        let fields = instance.to_record_fields()?;
        let record = match instance.id() {
            Some(id) => self.update(id, &fields).await?,
            None => self.create(&fields).await?,
        };
        instance.apply_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::Table;
    use crate::{AirtableError, RetryPolicy, RetryingSession, SessionOptions};

    fn table(name: &str) -> Table {
        let session = RetryingSession::new(RetryPolicy::default()).with_options(SessionOptions {
            api_url: "https://api.airtable.com/".to_owned(),
            ..SessionOptions::default()
        });
        Table::new(session, "appXYZ", name)
    }

    #[test]
    fn url_encodes_table_name() {
        assert_eq!(
            table("My Contacts").url(),
            "https://api.airtable.com/v0/appXYZ/My%20Contacts"
        );
    }

    #[test]
    fn url_encodes_base_id() {
        let session = RetryingSession::new(RetryPolicy::default());
        let table = Table::new(session, "app/../x y", "tblContacts");
        assert_eq!(
            table.url(),
            "https://api.airtable.com/v0/app%2F..%2Fx%20y/tblContacts"
        );
    }

    #[test]
    fn record_url_appends_id() {
        assert_eq!(
            table("tblContacts").record_url("rec1").unwrap(),
            "https://api.airtable.com/v0/appXYZ/tblContacts/rec1"
        );
    }

    #[test]
    fn empty_record_id_is_rejected() {
        let err = table("tblContacts").record_url(" ").expect_err("must fail");
        assert!(matches!(err, AirtableError::Configuration(_)));
    }
}
