use super::{Entity, EntityBase};
use crate::core::{DbError, Record, Result, is_reserved_field};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{Level, event};

/// General-purpose model with an open attribute bag.
///
/// Attributes are plain JSON values keyed by name. The base fields and the
/// `__class__` key are never accepted as attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseModel {
    base: EntityBase,
    attributes: BTreeMap<String, Value>,
}

impl BaseModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs a model from positional values and optional named fields.
    ///
    /// Positional values are accepted and discarded: only named fields ever
    /// become attributes.
    pub fn with_args<I>(args: I, fields: Option<&Record>) -> Result<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let discarded = args.into_iter().count();
        if discarded > 0 {
            event!(Level::TRACE, discarded, "positional constructor arguments ignored");
        }
        Self::construct(fields)
    }

    /// Sets an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        let name = name.into();
        if is_reserved_field(&name) {
            return Err(DbError::ReservedField(name));
        }
        Ok(self.attributes.insert(name, value.into()))
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
}

impl Entity for BaseModel {
    fn entity_type_name() -> &'static str {
        "BaseModel"
    }

    fn fresh() -> Self {
        Self::default()
    }

    fn from_record(record: &Record) -> Result<Self> {
        let base = EntityBase::from_record(record)?;
        let attributes = record
            .attribute_fields()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(Self { base, attributes })
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn fields(&self) -> Result<Map<String, Value>> {
        Ok(self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }
}
