//! Typed field descriptors.
//!
//! A field knows the remote column name and how to convert between the
//! wire value and a native value. Fields hold no per-record state: the
//! same field reads and writes whichever [`FieldStore`] it is given.
//!
//! ```
//! use airtable_orm::{Field, FieldStore, TextField};
//!
//! const NAME: TextField = TextField::new("Name");
//!
//! let mut store = FieldStore::new();
//! NAME.set(&mut store, "Kit".to_owned()).unwrap();
//! assert_eq!(NAME.get(&store).unwrap(), "Kit");
//! ```

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::convert::{
    date_from_iso_str, date_to_iso_str, datetime_from_iso_str, datetime_to_iso_str,
    phone_from_e164, phone_to_e164, DEFAULT_COUNTRY_CODE,
};
use crate::{AirtableError, Attachment, FieldStore, FieldValue, NativeValue, Result};

/// Accessor for one remote field.
///
/// Stores always hold the native form; conversion happens only in
/// [`to_internal_value`](Field::to_internal_value) and
/// [`to_record_value`](Field::to_record_value).
pub trait Field {
    type Native: NativeValue;

    /// Remote field name, used as the key in the fields store and on the wire.
    fn field_name(&self) -> &str;

    /// Converts a wire value received from Airtable to the native value.
    fn to_internal_value(&self, value: &JsonValue) -> Result<Self::Native>;

    /// Converts a native value to the wire value sent to Airtable.
    fn to_record_value(&self, value: &Self::Native) -> Result<JsonValue>;

    /// Reads the native value from `store`.
    ///
    /// Fails with [`AirtableError::NotSet`] if the field was never written.
    fn get(&self, store: &FieldStore) -> Result<Self::Native> {
        let value = store
            .get(self.field_name())
            .ok_or_else(|| AirtableError::NotSet {
                field: self.field_name().to_owned(),
            })?;
        Self::Native::from_field_value(value).ok_or_else(|| {
            AirtableError::invalid_value(
                self.field_name(),
                format!("stored value has unexpected kind '{}'", value.kind()),
            )
        })
    }

    /// Writes the native value into `store` under the remote field name.
    fn set(&self, store: &mut FieldStore, value: Self::Native) -> Result<()> {
        store.insert(self.field_name(), value.into_field_value());
        Ok(())
    }
}

/// Object-safe view of a [`Field`], used by [`FieldTable`](crate::FieldTable).
///
/// Implemented for every `Field` whose native type is storable.
pub trait DynField: Send + Sync {
    fn name(&self) -> &str;

    /// Wire value to native value.
    fn load(&self, value: &JsonValue) -> Result<FieldValue>;

    /// Native value to wire value.
    fn dump(&self, value: &FieldValue) -> Result<JsonValue>;

    /// Writes through [`Field::set`] after checking the value's kind.
    fn assign(&self, store: &mut FieldStore, value: FieldValue) -> Result<()>;
}

impl<F> DynField for F
where
    F: Field + Send + Sync,
{
    fn name(&self) -> &str {
        self.field_name()
    }

    fn load(&self, value: &JsonValue) -> Result<FieldValue> {
        self.to_internal_value(value)
            .map(NativeValue::into_field_value)
    }

    fn dump(&self, value: &FieldValue) -> Result<JsonValue> {
        let native = native_of::<F>(self.field_name(), value)?;
        self.to_record_value(&native)
    }

    fn assign(&self, store: &mut FieldStore, value: FieldValue) -> Result<()> {
        let native = native_of::<F>(self.field_name(), &value)?;
        self.set(store, native)
    }
}

fn native_of<F: Field>(field: &str, value: &FieldValue) -> Result<F::Native> {
    F::Native::from_field_value(value).ok_or_else(|| {
        AirtableError::invalid_value(
            field,
            format!("value of kind '{}' not accepted", value.kind()),
        )
    })
}

fn wire_mismatch(field: &str, expected: &str, value: &JsonValue) -> AirtableError {
    AirtableError::invalid_value(field, format!("expected {expected}, got {value}"))
}

fn wire_str<'a>(field: &str, value: &'a JsonValue) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| wire_mismatch(field, "string", value))
}

macro_rules! declare_field {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $name {
            name: Cow<'static, str>,
        }

        impl $name {
            /// Declares the field for the remote column `name`.
            pub const fn new(name: &'static str) -> Self {
                Self {
                    name: Cow::Borrowed(name),
                }
            }

            /// Declares the field for a column name known only at runtime.
            pub fn named(name: impl Into<String>) -> Self {
                Self {
                    name: Cow::Owned(name.into()),
                }
            }
        }
    };
}

declare_field!(
    /// Base field: passes JSON through unchanged in both directions.
    RawField
);
declare_field!(
    /// Single line or long text.
    TextField
);
declare_field!(
    /// Email column, stored as plain text.
    EmailField
);
declare_field!(
    /// Checkbox. Airtable omits unchecked boxes, so `null` reads as `false`.
    CheckboxField
);
declare_field!(NumberField);
declare_field!(IntegerField);
declare_field!(
    /// Date and time, millisecond precision, UTC.
    DatetimeField
);
declare_field!(DateField);
declare_field!(
    /// Links to records in another table, held as record ids.
    LinkField
);
declare_field!(AttachmentsField);

impl Field for RawField {
    type Native = JsonValue;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<JsonValue> {
        Ok(value.clone())
    }

    fn to_record_value(&self, value: &JsonValue) -> Result<JsonValue> {
        Ok(value.clone())
    }
}

impl Field for TextField {
    type Native = String;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<String> {
        wire_str(&self.name, value).map(str::to_owned)
    }

    fn to_record_value(&self, value: &String) -> Result<JsonValue> {
        Ok(JsonValue::String(value.clone()))
    }
}

impl Field for EmailField {
    type Native = String;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<String> {
        wire_str(&self.name, value).map(str::to_owned)
    }

    fn to_record_value(&self, value: &String) -> Result<JsonValue> {
        Ok(JsonValue::String(value.clone()))
    }
}

impl Field for CheckboxField {
    type Native = bool;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<bool> {
        match value {
            JsonValue::Null => Ok(false),
            JsonValue::Bool(checked) => Ok(*checked),
            other => Err(wire_mismatch(&self.name, "bool", other)),
        }
    }

    fn to_record_value(&self, value: &bool) -> Result<JsonValue> {
        Ok(JsonValue::Bool(*value))
    }
}

impl Field for NumberField {
    type Native = f64;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<f64> {
        value
            .as_f64()
            .ok_or_else(|| wire_mismatch(&self.name, "number", value))
    }

    fn to_record_value(&self, value: &f64) -> Result<JsonValue> {
        serde_json::Number::from_f64(*value)
            .map(JsonValue::Number)
            .ok_or_else(|| {
                AirtableError::invalid_value(
                    &self.name,
                    format!("non-finite number '{value}' is unsupported"),
                )
            })
    }
}

impl Field for IntegerField {
    type Native = i64;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<i64> {
        value
            .as_i64()
            .ok_or_else(|| wire_mismatch(&self.name, "integer", value))
    }

    fn to_record_value(&self, value: &i64) -> Result<JsonValue> {
        Ok(JsonValue::from(*value))
    }
}

impl Field for DatetimeField {
    type Native = NaiveDateTime;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<NaiveDateTime> {
        datetime_from_iso_str(wire_str(&self.name, value)?)
    }

    fn to_record_value(&self, value: &NaiveDateTime) -> Result<JsonValue> {
        Ok(JsonValue::String(datetime_to_iso_str(value)))
    }
}

impl Field for DateField {
    type Native = NaiveDate;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<NaiveDate> {
        date_from_iso_str(wire_str(&self.name, value)?)
    }

    fn to_record_value(&self, value: &NaiveDate) -> Result<JsonValue> {
        Ok(JsonValue::String(date_to_iso_str(value)))
    }
}

impl Field for LinkField {
    type Native = Vec<String>;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<Vec<String>> {
        let items = match value {
            JsonValue::Null => return Ok(Vec::new()),
            JsonValue::Array(items) => items,
            other => return Err(wire_mismatch(&self.name, "array of record ids", other)),
        };
        items
            .iter()
            .map(|item| wire_str(&self.name, item).map(str::to_owned))
            .collect()
    }

    fn to_record_value(&self, value: &Vec<String>) -> Result<JsonValue> {
        Ok(JsonValue::from(value.clone()))
    }
}

impl Field for AttachmentsField {
    type Native = Vec<Attachment>;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<Vec<Attachment>> {
        if value.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value.clone())
            .map_err(|err| AirtableError::invalid_value(&self.name, err.to_string()))
    }

    fn to_record_value(&self, value: &Vec<Attachment>) -> Result<JsonValue> {
        serde_json::to_value(value)
            .map_err(|err| AirtableError::invalid_value(&self.name, err.to_string()))
    }
}

/// Phone number column.
///
/// Natively held in E.164 form (`+19876543210`); sent to Airtable in
/// display form (`+1 987-654-3210`). Inputs without a country code get
/// the field's default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneField {
    name: Cow<'static, str>,
    country_code: u16,
}

impl PhoneField {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            country_code: DEFAULT_COUNTRY_CODE,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            country_code: DEFAULT_COUNTRY_CODE,
        }
    }

    pub fn with_country_code(mut self, country_code: u16) -> Self {
        self.country_code = country_code;
        self
    }

    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    fn normalize(&self, value: &str) -> Result<String> {
        phone_to_e164(value, self.country_code).ok_or_else(|| {
            AirtableError::invalid_value(&self.name, format!("'{value}' is not a phone number"))
        })
    }
}

impl Field for PhoneField {
    type Native = String;

    fn field_name(&self) -> &str {
        &self.name
    }

    fn to_internal_value(&self, value: &JsonValue) -> Result<String> {
        self.normalize(wire_str(&self.name, value)?)
    }

    /// Accepts any spelling [`phone_to_e164`] understands, not only E.164.
    fn to_record_value(&self, value: &String) -> Result<JsonValue> {
        let e164 = self.normalize(value)?;
        Ok(JsonValue::String(phone_from_e164(&e164, self.country_code)))
    }

    fn set(&self, store: &mut FieldStore, value: String) -> Result<()> {
        let e164 = self.normalize(&value)?;
        store.insert(self.field_name(), FieldValue::Text(e164));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Timelike};
    use serde_json::json;

    use super::*;
    use crate::attachment;

    #[test]
    fn raw_field_stores_under_remote_name() {
        let field = RawField::new("Name");
        let mut store = FieldStore::new();
        field.set(&mut store, json!("x")).unwrap();

        assert_eq!(field.get(&store).unwrap(), json!("x"));
        assert_eq!(store.get("Name"), Some(&FieldValue::Json(json!("x"))));
    }

    #[test]
    fn typed_fields_read_back_what_was_written() {
        let name = TextField::new("Name");
        let check = CheckboxField::new("Check");
        let email = EmailField::new("Email");
        let mut store = FieldStore::new();

        name.set(&mut store, "name".to_owned()).unwrap();
        check.set(&mut store, true).unwrap();
        email.set(&mut store, "x@x.com".to_owned()).unwrap();

        assert_eq!(name.get(&store).unwrap(), "name");
        assert!(check.get(&store).unwrap());
        assert_eq!(email.get(&store).unwrap(), "x@x.com");
        assert_eq!(store.len(), 3);
        assert!(store.contains("Check"));
    }

    #[test]
    fn missing_field_is_not_set_rather_than_empty() {
        let store = FieldStore::new();
        let err = TextField::new("Name").get(&store).expect_err("must fail");
        assert!(matches!(err, AirtableError::NotSet { field } if field == "Name"));

        let mut store = FieldStore::new();
        CheckboxField::new("Check").set(&mut store, false).unwrap();
        assert!(!CheckboxField::new("Check").get(&store).unwrap());
    }

    #[test]
    fn get_rejects_value_of_other_kind() {
        let mut store = FieldStore::new();
        store.insert("Count", FieldValue::text("three"));
        let err = IntegerField::new("Count").get(&store).expect_err("must fail");
        assert!(matches!(err, AirtableError::InvalidValue { .. }));
    }

    #[test]
    fn datetime_field_round_trips_wire_value() {
        let field = DatetimeField::new("Datetime");
        let wire = json!("2000-01-02T03:04:05.000Z");

        let native = field.to_internal_value(&wire).unwrap();
        assert_eq!(field.to_record_value(&native).unwrap(), wire);

        assert_eq!(
            (native.year(), native.month(), native.day()),
            (2000, 1, 2)
        );
        assert_eq!((native.hour(), native.minute(), native.second()), (3, 4, 5));
    }

    #[test]
    fn date_field_round_trips_wire_value() {
        let field = DateField::new("Date");
        let wire = json!("2000-01-02");

        let native = field.to_internal_value(&wire).unwrap();
        assert_eq!(field.to_record_value(&native).unwrap(), wire);
        assert_eq!(native, NaiveDate::from_ymd_opt(2000, 1, 2).unwrap());
    }

    #[test]
    fn datetime_field_rejects_non_string_and_malformed() {
        let field = DatetimeField::new("Datetime");
        assert!(matches!(
            field.to_internal_value(&json!(12)),
            Err(AirtableError::InvalidValue { .. })
        ));
        assert!(matches!(
            field.to_internal_value(&json!("2000-01-02")),
            Err(AirtableError::Parse { .. })
        ));
    }

    #[test]
    fn phone_field_normalises_every_spelling() {
        let field = PhoneField::new("Phone");
        for value in [
            "9876543210",
            "987-654-3210",
            "(987) 654-3210",
            "987 654 3210",
            "987.654.3210",
            "+1 987.654.3210",
            "+1 (987) 654.3210",
            "+19876543210",
        ] {
            assert_eq!(field.to_internal_value(&json!(value)).unwrap(), "+19876543210");
            assert_eq!(
                field.to_record_value(&value.to_owned()).unwrap(),
                json!("+1 987-654-3210")
            );

            let mut store = FieldStore::new();
            field.set(&mut store, value.to_owned()).unwrap();
            assert_eq!(field.get(&store).unwrap(), "+19876543210");
        }
    }

    #[test]
    fn phone_field_rejects_garbage() {
        let field = PhoneField::new("Phone");
        let mut store = FieldStore::new();
        let err = field
            .set(&mut store, "call me".to_owned())
            .expect_err("must fail");
        assert!(matches!(err, AirtableError::InvalidValue { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn phone_field_with_other_country_code() {
        let field = PhoneField::new("Phone").with_country_code(44);
        assert_eq!(
            field.to_internal_value(&json!("20 7946 0958")).unwrap(),
            "+442079460958"
        );
    }

    #[test]
    fn checkbox_reads_null_as_unchecked() {
        let field = CheckboxField::new("Done");
        assert!(!field.to_internal_value(&JsonValue::Null).unwrap());
        assert!(field.to_internal_value(&json!(true)).unwrap());
        assert!(field.to_internal_value(&json!("yes")).is_err());
    }

    #[test]
    fn number_field_rejects_non_finite_on_write() {
        let field = NumberField::new("Score");
        assert_eq!(field.to_record_value(&1.5).unwrap(), json!(1.5));
        assert!(field.to_record_value(&f64::NAN).is_err());
    }

    #[test]
    fn link_field_reads_record_ids() {
        let field = LinkField::new("Owner");
        assert_eq!(
            field.to_internal_value(&json!(["rec1", "rec2"])).unwrap(),
            vec!["rec1".to_owned(), "rec2".to_owned()]
        );
        assert!(field.to_internal_value(&json!([1])).is_err());
    }

    #[test]
    fn attachments_field_ignores_server_side_properties() {
        let field = AttachmentsField::new("Photos");
        let wire = json!([{
            "id": "att123",
            "url": "https://example.com/a.png",
            "filename": "a.png",
            "size": 42
        }]);
        let native = field.to_internal_value(&wire).unwrap();
        assert_eq!(native, vec![attachment("https://example.com/a.png", "a.png")]);
        assert_eq!(
            field.to_record_value(&native).unwrap(),
            json!([{ "url": "https://example.com/a.png", "filename": "a.png" }])
        );
    }

    #[test]
    fn dyn_field_checks_kind_before_assign() {
        let field: &dyn DynField = &DateField::new("Date");
        let mut store = FieldStore::new();
        let err = field
            .assign(&mut store, FieldValue::Bool(true))
            .expect_err("must fail");
        assert!(matches!(err, AirtableError::InvalidValue { .. }));
        assert_eq!(field.name(), "Date");
    }
}
