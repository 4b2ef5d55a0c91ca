//! Entity contract shared by every stored model.
//!
//! An entity carries an [`EntityBase`] (identity plus creation/update
//! timestamps) and whatever typed fields its concrete type owns. Concrete
//! types implement [`Entity`] by hand, through the [`model!`](crate::model!)
//! macro, or use the open-attribute [`BaseModel`].

use crate::core::timestamp::{self, format_timestamp};
use crate::core::{
    CLASS_FIELD, CREATED_AT_FIELD, DbError, ID_FIELD, Record, Result, UPDATED_AT_FIELD,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

mod base_model;
mod macros;

pub use base_model::BaseModel;

/// Generates a fresh entity identifier (UUID v4).
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds the `"<TypeName>.<id>"` key under which an entity is stored.
pub fn registry_key(type_name: &str, id: &str) -> String {
    format!("{}.{}", type_name, id)
}

/// Identity and timestamps of an entity.
///
/// `id` and `created_at` never change after construction; `updated_at` only
/// moves forward, and only when the owning storage commits the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityBase {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Default for EntityBase {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityBase {
    /// Fresh identity: new id, `created_at == updated_at == now`.
    pub fn new() -> Self {
        let now = timestamp::now();
        Self {
            id: new_entity_id(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Restores identity from a record.
    ///
    /// A missing id is replaced by a fresh one. A missing timestamp falls back
    /// to the other timestamp, or to now when both are absent.
    pub fn from_record(record: &Record) -> Result<Self> {
        let id = record.id()?.unwrap_or_else(new_entity_id);
        let created_at = record.timestamp(CREATED_AT_FIELD)?;
        let updated_at = record.timestamp(UPDATED_AT_FIELD)?;

        let (created_at, updated_at) = match (created_at, updated_at) {
            (Some(created), Some(updated)) => (created, updated),
            (Some(created), None) => (created, created),
            (None, Some(updated)) => (updated, updated),
            (None, None) => {
                let now = timestamp::now();
                (now, now)
            }
        };

        if updated_at < created_at {
            return Err(DbError::InvalidRecord(format!(
                "entity '{}' has updated_at before created_at",
                id
            )));
        }

        Ok(Self {
            id,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Advances `updated_at`; only the storage engine commits entities.
    pub(crate) fn touch(&mut self) -> DateTime<Utc> {
        self.updated_at = timestamp::next_after(self.updated_at);
        self.updated_at
    }

    /// Restores `updated_at` after a commit whose snapshot failed.
    pub(crate) fn rewind(&mut self, previous: DateTime<Utc>) {
        if previous >= self.created_at {
            self.updated_at = previous;
        }
    }

    /// Writes `id`, `created_at` and `updated_at` into a record.
    pub fn write_into(&self, record: &mut Record) {
        record.insert(ID_FIELD, Value::String(self.id.clone()));
        record.insert(
            CREATED_AT_FIELD,
            Value::String(format_timestamp(&self.created_at)),
        );
        record.insert(
            UPDATED_AT_FIELD,
            Value::String(format_timestamp(&self.updated_at)),
        );
    }
}

/// Capability set of a storable model.
///
/// Implementors provide the type name, the two construction modes and access
/// to their base and typed fields; everything else is derived.
pub trait Entity: Send + Sync + Sized + 'static {
    /// Name written to the record's `__class__` key and used in registry keys.
    fn entity_type_name() -> &'static str;

    /// Fresh construction: new id, equal timestamps, default fields.
    fn fresh() -> Self;

    /// Reconstruction from a record. Must ignore the `__class__` key.
    fn from_record(record: &Record) -> Result<Self>;

    fn base(&self) -> &EntityBase;

    fn base_mut(&mut self) -> &mut EntityBase;

    /// Fields owned by the concrete type, excluding id and timestamps.
    fn fields(&self) -> Result<Map<String, Value>>;

    /// Fresh construction when `record` is `None`, reconstruction otherwise.
    fn construct(record: Option<&Record>) -> Result<Self> {
        match record {
            None => Ok(Self::fresh()),
            Some(record) => Self::from_record(record),
        }
    }

    fn id(&self) -> &str {
        self.base().id()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.base().created_at()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.base().updated_at()
    }

    fn registry_key(&self) -> String {
        registry_key(Self::entity_type_name(), self.id())
    }

    /// Record form of the entity. The class key always names this type,
    /// whatever the typed fields contain.
    fn to_record(&self) -> Result<Record> {
        let mut record = Record::from(self.fields()?);
        self.base().write_into(&mut record);
        record.insert(
            CLASS_FIELD,
            Value::String(Self::entity_type_name().to_string()),
        );
        Ok(record)
    }

    /// Diagnostic form: `[TypeName] (id) {fields}`.
    fn describe(&self) -> Result<String> {
        let mut data = self.to_record()?;
        data.remove(CLASS_FIELD);
        Ok(format!(
            "[{}] ({}) {}",
            Self::entity_type_name(),
            self.id(),
            data.into_value()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_base_has_equal_timestamps() {
        let base = EntityBase::new();
        assert!(!base.id().is_empty());
        assert_eq!(base.created_at(), base.updated_at());
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        assert_ne!(EntityBase::new().id(), EntityBase::new().id());
    }

    #[test]
    fn test_touch_moves_forward() {
        let mut base = EntityBase::new();
        let before = base.updated_at();
        let after = base.touch();
        assert!(after > before);
        assert_eq!(base.created_at(), before);
    }

    #[test]
    fn test_rewind_restores_previous_update() {
        let mut base = EntityBase::new();
        let before = base.updated_at();
        base.touch();
        base.rewind(before);
        assert_eq!(base.updated_at(), before);
    }

    #[test]
    fn test_from_record_missing_id_generates_one() {
        let record = Record::from_value(json!({
            "created_at": "2024-01-01T00:00:00.000000",
            "updated_at": "2024-01-02T00:00:00.000000"
        }))
        .unwrap();
        let base = EntityBase::from_record(&record).unwrap();
        assert_eq!(base.id().len(), 36);
    }

    #[test]
    fn test_from_record_single_timestamp() {
        let record = Record::from_value(json!({
            "id": "a",
            "created_at": "2024-01-01T00:00:00.000000"
        }))
        .unwrap();
        let base = EntityBase::from_record(&record).unwrap();
        assert_eq!(base.created_at(), base.updated_at());
    }

    #[test]
    fn test_from_record_rejects_inverted_timestamps() {
        let record = Record::from_value(json!({
            "id": "a",
            "created_at": "2024-01-02T00:00:00.000000",
            "updated_at": "2024-01-01T00:00:00.000000"
        }))
        .unwrap();
        assert!(matches!(
            EntityBase::from_record(&record),
            Err(DbError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_write_into_formats_timestamps() {
        let record = Record::from_value(json!({
            "id": "a",
            "created_at": "2024-01-01T00:00:00",
            "updated_at": "2024-01-01T00:00:00"
        }))
        .unwrap();
        let base = EntityBase::from_record(&record).unwrap();
        let mut out = Record::new();
        base.write_into(&mut out);
        assert_eq!(out.get("created_at"), Some(&json!("2024-01-01T00:00:00.000000")));
        assert_eq!(out.get("id"), Some(&json!("a")));
    }

    #[test]
    fn test_registry_key_format() {
        assert_eq!(registry_key("Widget", "42"), "Widget.42");
    }
}
