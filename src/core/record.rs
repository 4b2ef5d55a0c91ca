//! Flat JSON representation of an entity.

use super::timestamp::parse_timestamp;
use super::{DbError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved key holding the concrete type name of a record.
pub const CLASS_FIELD: &str = "__class__";
pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "created_at";
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Keys owned by the entity base rather than by concrete types.
pub const BASE_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// A mapping from field name to JSON value, as stored in the storage document.
///
/// `created_at`/`updated_at` are ISO-8601 strings and [`CLASS_FIELD`] names the
/// concrete type. The class key is routing metadata: constructors never turn
/// it into an attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an arbitrary JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(DbError::InvalidRecord(format!(
                "record must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Returns the type name stored under [`CLASS_FIELD`], if it is a string.
    pub fn class_name(&self) -> Option<&str> {
        self.fields.get(CLASS_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields that carry entity data, i.e. everything except the class key.
    pub fn data_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().filter(|(name, _)| name.as_str() != CLASS_FIELD)
    }

    /// Fields owned by the concrete type: no class key and no base fields.
    pub fn attribute_fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data_fields()
            .filter(|(name, _)| !BASE_FIELDS.contains(&name.as_str()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Reads the `id` field. A present but non-string id is rejected.
    pub fn id(&self) -> Result<Option<String>> {
        match self.fields.get(ID_FIELD) {
            None => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.clone())),
            Some(other) => Err(DbError::InvalidRecord(format!(
                "field '{}' must be a string, got {}",
                ID_FIELD,
                json_type_name(other)
            ))),
        }
    }

    /// Reads and parses a timestamp field. A present value must be a string
    /// in a supported ISO-8601 form.
    pub fn timestamp(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(Value::String(raw)) => parse_timestamp(raw)
                .map(Some)
                .map_err(|err| DbError::InvalidRecord(format!("field '{}': {}", name, err))),
            Some(other) => Err(DbError::InvalidRecord(format!(
                "field '{}' must be an ISO-8601 string, got {}",
                name,
                json_type_name(other)
            ))),
        }
    }

    /// Decodes a field with serde. Missing fields yield `None`.
    pub fn decode_field<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.fields.get(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|err| DbError::InvalidRecord(format!("field '{}': {}", name, err))),
        }
    }

    /// Fails if the record holds a data key outside the base fields and `known`.
    pub fn ensure_known_fields(&self, type_name: &str, known: &[&str]) -> Result<()> {
        for (name, _) in self.attribute_fields() {
            if !known.contains(&name.as_str()) {
                return Err(DbError::InvalidRecord(format!(
                    "unknown field '{}' for type '{}'",
                    name, type_name
                )));
            }
        }
        Ok(())
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl TryFrom<Value> for Record {
    type Error = DbError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Returns true for keys that entity data may never claim.
pub fn is_reserved_field(name: &str) -> bool {
    name == CLASS_FIELD || BASE_FIELDS.contains(&name)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Record {
        Record::from_value(json!({
            "id": "123",
            "created_at": "2024-01-01T00:00:00.000000",
            "updated_at": "2024-01-01T00:00:00.000000",
            "name": "gear",
            "__class__": "Widget"
        }))
        .unwrap()
    }

    #[test]
    fn test_class_name_and_id() {
        let record = sample();
        assert_eq!(record.class_name(), Some("Widget"));
        assert_eq!(record.id().unwrap().as_deref(), Some("123"));
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = Record::from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, DbError::InvalidRecord(_)));
    }

    #[test]
    fn test_data_fields_skip_class() {
        let record = sample();
        let names: Vec<&String> = record.data_fields().map(|(k, _)| k).collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|k| k.as_str() != CLASS_FIELD));

        let attrs: Vec<&String> = record.attribute_fields().map(|(k, _)| k).collect();
        assert_eq!(attrs, vec!["name"]);
    }

    #[test]
    fn test_null_id_is_invalid() {
        let record = Record::from_value(json!({"id": null})).unwrap();
        assert!(matches!(record.id(), Err(DbError::InvalidRecord(_))));
    }

    #[test]
    fn test_null_timestamp_is_invalid() {
        let record = Record::from_value(json!({"created_at": null})).unwrap();
        assert!(record.timestamp(CREATED_AT_FIELD).is_err());
        assert_eq!(record.timestamp(UPDATED_AT_FIELD).unwrap(), None);
    }

    #[test]
    fn test_decode_field() {
        let record = Record::from_value(json!({"count": 3, "name": "gear"})).unwrap();
        assert_eq!(record.decode_field::<i64>("count").unwrap(), Some(3));
        assert_eq!(record.decode_field::<i64>("missing").unwrap(), None);
        assert!(record.decode_field::<i64>("name").is_err());
    }

    #[test]
    fn test_ensure_known_fields() {
        let record = sample();
        assert!(record.ensure_known_fields("Widget", &["name"]).is_ok());
        assert!(record.ensure_known_fields("Widget", &[]).is_err());
    }

    #[test]
    fn test_reserved_fields() {
        assert!(is_reserved_field("__class__"));
        assert!(is_reserved_field("id"));
        assert!(!is_reserved_field("name"));
    }
}
