//! Mapping of Airtable records onto declared, field-typed models.

pub mod fields;
mod model;

pub use fields::{
    AttachmentsField, CheckboxField, DateField, DatetimeField, DynField, EmailField, Field,
    IntegerField, LinkField, NumberField, PhoneField, RawField, TextField,
};
pub use model::{FieldStore, FieldTable, Model, ModelInstance};
