//! Handles to live entities held by a [`FileStorage`].

use super::FileStorage;
use crate::core::{DbError, Record, Result};
use crate::model::Entity;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};

/// Type-erased view of one live entity.
pub(crate) trait StoredEntity: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn id(&self) -> Result<String>;
    fn created_at(&self) -> Result<DateTime<Utc>>;
    fn updated_at(&self) -> Result<DateTime<Utc>>;
    fn to_record(&self) -> Result<Record>;
    fn describe(&self) -> Result<String>;
    fn touch(&self) -> Result<DateTime<Utc>>;
    fn rewind(&self, previous: DateTime<Utc>) -> Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Moves the value held by `other` into this entity, keeping this lock
    /// and every handle on it. Returns `false` when the concrete types differ.
    fn assign_from(&self, other: &dyn StoredEntity) -> Result<bool>;

    fn registry_key(&self) -> Result<String> {
        Ok(crate::model::registry_key(self.type_name(), &self.id()?))
    }
}

impl<T: Entity> StoredEntity for RwLock<T> {
    fn type_name(&self) -> &'static str {
        T::entity_type_name()
    }

    fn id(&self) -> Result<String> {
        Ok(self.read()?.id().to_string())
    }

    fn created_at(&self) -> Result<DateTime<Utc>> {
        Ok(self.read()?.created_at())
    }

    fn updated_at(&self) -> Result<DateTime<Utc>> {
        Ok(self.read()?.updated_at())
    }

    fn to_record(&self) -> Result<Record> {
        self.read()?.to_record()
    }

    fn describe(&self) -> Result<String> {
        self.read()?.describe()
    }

    fn touch(&self) -> Result<DateTime<Utc>> {
        Ok(self.write()?.base_mut().touch())
    }

    fn rewind(&self, previous: DateTime<Utc>) -> Result<()> {
        self.write()?.base_mut().rewind(previous);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn assign_from(&self, other: &dyn StoredEntity) -> Result<bool> {
        let Some(other) = other.as_any().downcast_ref::<RwLock<T>>() else {
            return Ok(false);
        };
        if std::ptr::eq(self, other) {
            return Ok(true);
        }
        let value = std::mem::replace(&mut *other.write()?, T::fresh());
        *self.write()? = value;
        Ok(true)
    }
}

pub(crate) fn share<T: Entity>(entity: T) -> Arc<RwLock<T>> {
    Arc::new(RwLock::new(entity))
}

/// Typed handle to an entity registered in a [`FileStorage`].
///
/// Cloning the handle shares the same entity. Mutations go through
/// [`Model::update`], which commits the change; [`Model::commit`] alone only
/// refreshes `updated_at` and snapshots the storage.
pub struct Model<T: Entity> {
    entity: Arc<RwLock<T>>,
    storage: FileStorage,
}

impl<T: Entity> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self {
            entity: Arc::clone(&self.entity),
            storage: self.storage.clone(),
        }
    }
}

impl<T: Entity> Model<T> {
    pub(crate) fn new(entity: Arc<RwLock<T>>, storage: FileStorage) -> Self {
        Self { entity, storage }
    }

    pub(crate) fn stored(&self) -> Arc<dyn StoredEntity> {
        self.entity.clone()
    }

    pub fn id(&self) -> Result<String> {
        Ok(self.read()?.id().to_string())
    }

    pub fn registry_key(&self) -> Result<String> {
        Ok(self.read()?.registry_key())
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        Ok(self.read()?.created_at())
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>> {
        Ok(self.read()?.updated_at())
    }

    /// Read access to the entity. Drop the guard before calling back into
    /// the storage.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>> {
        self.entity.read().map_err(DbError::from)
    }

    /// Runs `f` against the entity without mutating it.
    pub fn get<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        Ok(f(&*self.read()?))
    }

    /// Mutates the entity and commits it.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let result = {
            let mut entity = self.entity.write()?;
            f(&mut *entity)
        };
        self.commit()?;
        Ok(result)
    }

    /// Sets `updated_at` to now and writes a full snapshot of the storage.
    ///
    /// An entity no longer held by the storage is registered again first.
    /// When the snapshot fails, `updated_at` is put back. Returns the new
    /// `updated_at`.
    pub fn commit(&self) -> Result<DateTime<Utc>> {
        self.storage.commit_entity(self.stored())
    }

    pub fn to_record(&self) -> Result<Record> {
        self.read()?.to_record()
    }

    pub fn describe(&self) -> Result<String> {
        self.read()?.describe()
    }

    /// Type-erased view of the same entity.
    pub fn as_entity_ref(&self) -> EntityRef {
        EntityRef::new(self.stored(), self.storage.clone())
    }

    /// Whether both handles point at the same live entity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entity, &other.entity)
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity.read() {
            Ok(entity) => f.debug_tuple("Model").field(&*entity).finish(),
            Err(_) => f.write_str("Model(<poisoned>)"),
        }
    }
}

/// Type-erased handle to a live entity, as returned by [`FileStorage::all`].
#[derive(Clone)]
pub struct EntityRef {
    entity: Arc<dyn StoredEntity>,
    storage: FileStorage,
}

impl EntityRef {
    pub(crate) fn new(entity: Arc<dyn StoredEntity>, storage: FileStorage) -> Self {
        Self { entity, storage }
    }

    pub fn type_name(&self) -> &'static str {
        self.entity.type_name()
    }

    pub fn id(&self) -> Result<String> {
        self.entity.id()
    }

    pub fn registry_key(&self) -> Result<String> {
        self.entity.registry_key()
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>> {
        self.entity.created_at()
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>> {
        self.entity.updated_at()
    }

    pub fn to_record(&self) -> Result<Record> {
        self.entity.to_record()
    }

    pub fn describe(&self) -> Result<String> {
        self.entity.describe()
    }

    /// Same as [`Model::commit`].
    pub fn commit(&self) -> Result<DateTime<Utc>> {
        self.storage.commit_entity(Arc::clone(&self.entity))
    }

    pub fn is<T: Entity>(&self) -> bool {
        self.type_name() == T::entity_type_name() && self.downcast::<T>().is_some()
    }

    /// Recovers the typed handle when the entity is a `T`.
    pub fn downcast<T: Entity>(&self) -> Option<Model<T>> {
        Arc::clone(&self.entity)
            .into_any()
            .downcast::<RwLock<T>>()
            .ok()
            .map(|entity| Model::new(entity, self.storage.clone()))
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("EntityRef");
        debug.field("type_name", &self.type_name());
        match self.id() {
            Ok(id) => debug.field("id", &id),
            Err(_) => debug.field("id", &"<poisoned>"),
        };
        debug.finish()
    }
}
