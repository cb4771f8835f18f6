use chrono::{NaiveDate, NaiveDateTime};

use crate::Attachment;

/// Native value held in a [`FieldStore`](crate::FieldStore).
///
/// Each typed field reads and writes exactly one variant; [`FieldValue::Json`]
/// carries values of fields that perform no conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    Number(f64),
    Integer(i64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    RecordIds(Vec<String>),
    Attachments(Vec<Attachment>),
    Json(serde_json::Value),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn record_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RecordIds(ids.into_iter().map(Into::into).collect())
    }

    /// Variant name, used in conversion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Integer(_) => "integer",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::RecordIds(_) => "record ids",
            Self::Attachments(_) => "attachments",
            Self::Json(_) => "json",
        }
    }
}

/// Native types that can be stored in a [`FieldValue`].
pub trait NativeValue: Sized {
    fn into_field_value(self) -> FieldValue;

    /// Returns `None` if `value` holds a different variant.
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

macro_rules! native_value {
    ($ty:ty, $variant:ident) => {
        impl NativeValue for $ty {
            fn into_field_value(self) -> FieldValue {
                FieldValue::$variant(self)
            }

            fn from_field_value(value: &FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::$variant(value)
            }
        }
    };
}

native_value!(String, Text);
native_value!(bool, Bool);
native_value!(f64, Number);
native_value!(i64, Integer);
native_value!(NaiveDateTime, DateTime);
native_value!(NaiveDate, Date);
native_value!(Vec<String>, RecordIds);
native_value!(Vec<Attachment>, Attachments);
native_value!(serde_json::Value, Json);

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{FieldValue, NativeValue};

    #[test]
    fn helper_constructors() {
        assert_eq!(FieldValue::text("abc"), FieldValue::Text("abc".to_owned()));
        assert_eq!(
            FieldValue::record_ids(["rec1", "rec2"]),
            FieldValue::RecordIds(vec!["rec1".to_owned(), "rec2".to_owned()])
        );
        assert_eq!(FieldValue::from(7), FieldValue::Integer(7));
        assert_eq!(FieldValue::from(true), FieldValue::Bool(true));
    }

    #[test]
    fn native_extraction_checks_variant() {
        let date = NaiveDate::from_ymd_opt(2000, 1, 2).unwrap();
        let value = date.into_field_value();
        assert_eq!(NaiveDate::from_field_value(&value), Some(date));
        assert_eq!(String::from_field_value(&value), None);
        assert_eq!(value.kind(), "date");
    }
}
