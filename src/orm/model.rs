use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value as JsonValue};

use crate::orm::fields::{DynField, Field};
use crate::{AirtableError, FieldValue, Record, Result};

/// Per-record mapping from remote field name to native value.
///
/// This is the boundary the CRUD layer reads from and writes to; typed
/// fields go through [`Field::get`] / [`Field::set`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldStore {
    values: BTreeMap<String, FieldValue>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldValue> {
        self.values.get(field_name)
    }

    /// Inserts a value, returning the previous one if any.
    pub fn insert(
        &mut self,
        field_name: impl Into<String>,
        value: FieldValue,
    ) -> Option<FieldValue> {
        self.values.insert(field_name.into(), value)
    }

    pub fn remove(&mut self, field_name: &str) -> Option<FieldValue> {
        self.values.remove(field_name)
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.values.contains_key(field_name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.values.iter()
    }
}

impl<'a> IntoIterator for &'a FieldStore {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Registration table mapping attribute names to field accessors.
///
/// ```
/// use airtable_orm::{CheckboxField, FieldTable, TextField};
///
/// let table = FieldTable::new()
///     .register("name", TextField::new("Name"))
///     .register("done", CheckboxField::new("Done"));
/// assert_eq!(table.field("done").unwrap().name(), "Done");
/// ```
#[derive(Default)]
pub struct FieldTable {
    entries: Vec<(&'static str, Box<dyn DynField>)>,
}

impl fmt::Debug for FieldTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(attr, field)| (attr, field.name())))
            .finish()
    }
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field` under `attribute`, replacing an earlier registration
    /// of the same attribute.
    pub fn register<F>(mut self, attribute: &'static str, field: F) -> Self
    where
        F: Field + Send + Sync + 'static,
    {
        let field: Box<dyn DynField> = Box::new(field);
        match self.entries.iter_mut().find(|(attr, _)| *attr == attribute) {
            Some(slot) => slot.1 = field,
            None => self.entries.push((attribute, field)),
        }
        self
    }

    /// Looks up a field by attribute name.
    pub fn field(&self, attribute: &str) -> Option<&dyn DynField> {
        self.entries
            .iter()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, field)| field.as_ref())
    }

    /// Looks up a field by remote field name.
    pub fn by_field_name(&self, field_name: &str) -> Option<&dyn DynField> {
        self.entries
            .iter()
            .find(|(_, field)| field.name() == field_name)
            .map(|(_, field)| field.as_ref())
    }

    /// Attribute names in registration order.
    pub fn attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(attr, _)| *attr)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads the value of `attribute` from `store`.
    pub fn get(&self, store: &FieldStore, attribute: &str) -> Result<FieldValue> {
        let field = self.require(attribute)?;
        store
            .get(field.name())
            .cloned()
            .ok_or_else(|| AirtableError::NotSet {
                field: field.name().to_owned(),
            })
    }

    /// Writes `value` for `attribute` into `store`.
    pub fn set(&self, store: &mut FieldStore, attribute: &str, value: FieldValue) -> Result<()> {
        self.require(attribute)?.assign(store, value)
    }

    /// Converts the wire fields of a record into a store.
    ///
    /// Remote fields without a registered accessor and `null` values are
    /// skipped.
    pub fn load(&self, fields: &Map<String, JsonValue>) -> Result<FieldStore> {
        let mut store = FieldStore::new();
        for (_, field) in &self.entries {
            match fields.get(field.name()) {
                None | Some(JsonValue::Null) => {}
                Some(value) => {
                    store.insert(field.name(), field.load(value)?);
                }
            }
        }
        Ok(store)
    }

    /// Converts every registered field present in `store` to wire form.
    pub fn dump(&self, store: &FieldStore) -> Result<Map<String, JsonValue>> {
        let mut fields = Map::new();
        for (_, field) in &self.entries {
            if let Some(value) = store.get(field.name()) {
                fields.insert(field.name().to_owned(), field.dump(value)?);
            }
        }
        Ok(fields)
    }

    fn require(&self, attribute: &str) -> Result<&dyn DynField> {
        self.field(attribute)
            .ok_or_else(|| AirtableError::UnknownField(attribute.to_owned()))
    }
}

/// A type whose instances map onto records of one Airtable table.
///
/// ```
/// use std::sync::OnceLock;
/// use airtable_orm::{FieldTable, Model, TextField};
///
/// struct Contact;
///
/// impl Model for Contact {
///     fn table_name() -> &'static str {
///         "Contacts"
///     }
///
///     fn field_table() -> &'static FieldTable {
///         static FIELDS: OnceLock<FieldTable> = OnceLock::new();
///         FIELDS.get_or_init(|| FieldTable::new().register("name", TextField::new("Name")))
///     }
/// }
/// ```
pub trait Model {
    fn table_name() -> &'static str;

    fn field_table() -> &'static FieldTable;
}

/// One record of model `M`: its id, if saved, and its fields store.
pub struct ModelInstance<M> {
    id: Option<String>,
    created_time: Option<String>,
    fields: FieldStore,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for ModelInstance<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            created_time: self.created_time.clone(),
            fields: self.fields.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for ModelInstance<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("id", &self.id)
            .field("created_time", &self.created_time)
            .field("fields", &self.fields)
            .finish()
    }
}

impl<M> Default for ModelInstance<M> {
    fn default() -> Self {
        Self {
            id: None,
            created_time: None,
            fields: FieldStore::new(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> ModelInstance<M> {
    /// Creates an unsaved instance with an empty fields store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialises an instance from a record returned by the API.
    pub fn from_record(record: Record) -> Result<Self> {
        let fields = M::field_table().load(&record.fields)?;
        Ok(Self {
            id: Some(record.id),
            created_time: record.created_time,
            fields,
            _model: PhantomData,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn created_time(&self) -> Option<&str> {
        self.created_time.as_deref()
    }

    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldStore {
        &mut self.fields
    }

    /// Reads through a typed field.
    pub fn get<F: Field>(&self, field: &F) -> Result<F::Native> {
        field.get(&self.fields)
    }

    /// Writes through a typed field.
    pub fn set<F: Field>(&mut self, field: &F, value: F::Native) -> Result<()> {
        field.set(&mut self.fields, value)
    }

    /// Reads the field registered under `attribute`.
    pub fn get_attr(&self, attribute: &str) -> Result<FieldValue> {
        M::field_table().get(&self.fields, attribute)
    }

    /// Writes the field registered under `attribute`.
    pub fn set_attr(&mut self, attribute: &str, value: impl Into<FieldValue>) -> Result<()> {
        M::field_table().set(&mut self.fields, attribute, value.into())
    }

    /// Wire form of all stored fields, ready to send to the API.
    pub fn to_record_fields(&self) -> Result<Map<String, JsonValue>> {
        M::field_table().dump(&self.fields)
    }

    /// Replaces id and fields with what the API returned after a write.
    pub(crate) fn apply_record(&mut self, record: Record) -> Result<()> {
        self.fields = M::field_table().load(&record.fields)?;
        self.id = Some(record.id);
        self.created_time = record.created_time;
        Ok(())
    }
}
