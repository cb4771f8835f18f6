use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Serialize)]
pub struct WriteRequest<'a> {
    pub fields: &'a Map<String, JsonValue>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub typecast: bool,
}
