//! Application-facing entry point over a [`FileStorage`].

use crate::core::{DbError, Record, Result, is_reserved_field};
use crate::model::Entity;
use crate::storage::{EntityRef, FileStorage, Model, StorageConfig, TypeRegistry};
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::BTreeMap;

/// Creates, lists and persists entities by type name.
///
/// `Models` is what request handlers and other outer layers talk to; it
/// never touches the storage document directly.
#[derive(Clone, Debug)]
pub struct Models {
    storage: FileStorage,
}

impl Models {
    /// Opens the storage at `config.path` and reloads it once.
    pub fn open(config: StorageConfig, registry: TypeRegistry) -> Result<Self> {
        let storage = FileStorage::load(config, registry)?;
        Ok(Self { storage })
    }

    /// Wraps an already opened storage.
    pub fn new(storage: FileStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Builds a `type_name` entity from `initial` and registers it.
    ///
    /// `initial` holds data fields only; identity and timestamps are always
    /// fresh. The entity is not written until it is persisted.
    pub fn create(&self, type_name: &str, initial: Record) -> Result<EntityRef> {
        if let Some(name) = initial.keys().find(|name| is_reserved_field(name)) {
            return Err(DbError::ReservedField(name.to_string()));
        }

        let registration = self.storage.registry().resolve(type_name)?;
        let entity = if initial.is_empty() {
            registration.fresh()
        } else {
            registration.reconstruct(&initial)?
        };

        self.storage.insert(entity.clone())?;
        Ok(EntityRef::new(entity, self.storage.clone()))
    }

    /// Registers an already constructed entity.
    pub fn create_model<T: Entity>(&self, entity: T) -> Result<Model<T>> {
        self.storage.add(entity)
    }

    /// Reloads the storage document; returns the number of records loaded.
    pub fn reconstruct_all(&self) -> Result<usize> {
        self.storage.reload()
    }

    /// Commits `entity` and snapshots the storage.
    pub fn persist(&self, entity: &EntityRef) -> Result<DateTime<Utc>> {
        entity.commit()
    }

    /// Every live entity, optionally restricted to one type name.
    ///
    /// A registered name filters by the entity type its factories build, so
    /// an alias lists the entities of its target type.
    pub fn list_all(&self, type_name: Option<&str>) -> Result<BTreeMap<String, EntityRef>> {
        let Some(type_name) = type_name else {
            return self.storage.all();
        };
        match self.storage.registry().resolve(type_name) {
            Ok(registration) => self.storage.all_of_type(registration.entity_type_name()),
            Err(_) => {
                warn!("listing entities of unregistered type '{}'", type_name);
                self.storage.all_of_type(type_name)
            }
        }
    }
}
