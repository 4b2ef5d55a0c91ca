//! Type-name to factory resolution for polymorphic restore.

use super::handle::{StoredEntity, share};
use crate::core::{DbError, Record, Result};
use crate::model::Entity;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type FreshFn = Arc<dyn Fn() -> Arc<dyn StoredEntity> + Send + Sync>;
type FromRecordFn = Arc<dyn Fn(&Record) -> Result<Arc<dyn StoredEntity>> + Send + Sync>;

/// Factories registered for one type name.
#[derive(Clone)]
pub struct RegisteredType {
    type_name: String,
    entity_type_name: &'static str,
    fresh: FreshFn,
    from_record: FromRecordFn,
}

impl RegisteredType {
    /// Name this registration is resolved by.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name of the entity type the factories produce.
    pub fn entity_type_name(&self) -> &'static str {
        self.entity_type_name
    }

    pub(crate) fn fresh(&self) -> Arc<dyn StoredEntity> {
        (self.fresh)()
    }

    pub(crate) fn reconstruct(&self, record: &Record) -> Result<Arc<dyn StoredEntity>> {
        (self.from_record)(record)
    }
}

impl fmt::Debug for RegisteredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredType")
            .field("type_name", &self.type_name)
            .field("entity_type_name", &self.entity_type_name)
            .finish()
    }
}

/// Maps the `__class__` value of a record to the factories of its type.
///
/// Populated by the application before the storage is opened; the storage
/// never discovers types on its own.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    registrations: HashMap<String, RegisteredType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` under its own type name, using [`Entity::fresh`] and
    /// [`Entity::from_record`].
    pub fn register<T: Entity>(&mut self) {
        self.register_factory::<T, _, _>(T::entity_type_name(), T::fresh, T::from_record);
    }

    /// Registers explicit factories for `T` under `type_name`.
    ///
    /// `type_name` may differ from `T::entity_type_name()`, e.g. to keep
    /// reading documents written under a former type name. Reconstructed
    /// entities are always keyed and serialized under `T`'s own name.
    pub fn register_factory<T, F, R>(
        &mut self,
        type_name: impl Into<String>,
        fresh: F,
        from_record: R,
    ) where
        T: Entity,
        F: Fn() -> T + Send + Sync + 'static,
        R: Fn(&Record) -> Result<T> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        let registration = RegisteredType {
            type_name: type_name.clone(),
            entity_type_name: T::entity_type_name(),
            fresh: Arc::new(move || share(fresh()) as Arc<dyn StoredEntity>),
            from_record: Arc::new(move |record: &Record| {
                let entity = from_record(record)?;
                Ok(share(entity) as Arc<dyn StoredEntity>)
            }),
        };
        self.registrations.insert(type_name, registration);
    }

    /// Returns the registration for `type_name`.
    pub fn resolve(&self, type_name: &str) -> Result<&RegisteredType> {
        self.registrations
            .get(type_name)
            .ok_or_else(|| DbError::UnknownType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.registrations.contains_key(type_name)
    }

    /// Sorted list of registered type names.
    pub fn type_names(&self) -> Vec<String> {
        let mut names = self.registrations.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BaseModel;
    use serde_json::json;

    #[test]
    fn test_register_and_resolve() {
        let mut registry = TypeRegistry::new();
        registry.register::<BaseModel>();

        let registration = registry.resolve("BaseModel").unwrap();
        assert_eq!(registration.type_name(), "BaseModel");
        assert_eq!(registration.entity_type_name(), "BaseModel");
        assert!(registry.contains("BaseModel"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_type() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        let err = registry.resolve("Widget").unwrap_err();
        assert!(matches!(err, DbError::UnknownType(ref name) if name == "Widget"));
    }

    #[test]
    fn test_alias_registration_builds_target_type() {
        let mut registry = TypeRegistry::new();
        registry.register_factory("LegacyModel", BaseModel::fresh, BaseModel::from_record);

        let record = Record::from_value(json!({"id": "x1", "__class__": "LegacyModel"})).unwrap();
        let entity = registry.resolve("LegacyModel").unwrap().reconstruct(&record).unwrap();
        assert_eq!(entity.type_name(), "BaseModel");
        assert_eq!(entity.registry_key().unwrap(), "BaseModel.x1");
    }

    #[test]
    fn test_fresh_factory() {
        let mut registry = TypeRegistry::new();
        registry.register::<BaseModel>();
        let first = registry.resolve("BaseModel").unwrap().fresh();
        let second = registry.resolve("BaseModel").unwrap().fresh();
        assert_ne!(first.id().unwrap(), second.id().unwrap());
    }

    #[test]
    fn test_type_names_sorted() {
        let mut registry = TypeRegistry::new();
        registry.register_factory("Zeta", BaseModel::fresh, BaseModel::from_record);
        registry.register_factory("Alpha", BaseModel::fresh, BaseModel::from_record);
        assert_eq!(registry.type_names(), vec!["Alpha", "Zeta"]);
    }
}
