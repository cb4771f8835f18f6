use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A record as returned by the Airtable API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    /// Wire values keyed by remote field name. Empty fields are omitted by
    /// the API.
    #[serde(default)]
    pub fields: Map<String, JsonValue>,
}

/// Response to a single-record delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: String,
    pub deleted: bool,
}
