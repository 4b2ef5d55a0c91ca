use super::document::{self, StorageDocument};
use super::handle::{EntityRef, Model, StoredEntity, share};
use super::{StorageConfig, TypeRegistry};
use crate::core::{CLASS_FIELD, DbError, Result};
use crate::model::Entity;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{Level, event, info_span};

/// Lifecycle of a [`FileStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    /// Opened but never reloaded; saving is refused.
    Uninitialized,
    /// Reloaded at least once.
    Ready,
}

struct Collection {
    objects: BTreeMap<String, Arc<dyn StoredEntity>>,
    state: StorageState,
}

struct StorageInner {
    config: StorageConfig,
    registry: TypeRegistry,
    collection: Mutex<Collection>,
}

/// The single authority over live entities and their storage document.
///
/// Entities are keyed by `"<TypeName>.<id>"`. [`FileStorage::save`] writes
/// every entity to the document at once; [`FileStorage::reload`] merges the
/// document back into memory, rebuilding each record through the
/// [`TypeRegistry`].
///
/// The handle is cheap to clone; clones share the same collection. All
/// collection operations are serialized by one lock.
#[derive(Clone)]
pub struct FileStorage {
    inner: Arc<StorageInner>,
}

impl FileStorage {
    /// Creates an empty, uninitialized storage. Nothing is read from disk.
    pub fn open(config: StorageConfig, registry: TypeRegistry) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                config,
                registry,
                collection: Mutex::new(Collection {
                    objects: BTreeMap::new(),
                    state: StorageState::Uninitialized,
                }),
            }),
        }
    }

    /// Opens the storage and reloads it from its document.
    pub fn load(config: StorageConfig, registry: TypeRegistry) -> Result<Self> {
        let storage = Self::open(config, registry);
        storage.reload()?;
        Ok(storage)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn path(&self) -> &Path {
        &self.inner.config.path
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> Result<StorageState> {
        Ok(self.inner.collection.lock()?.state)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.inner.collection.lock()?.objects.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every live entity, keyed by registry key.
    ///
    /// The map is a copy; entities themselves are shared with the storage.
    pub fn all(&self) -> Result<BTreeMap<String, EntityRef>> {
        let collection = self.inner.collection.lock()?;
        Ok(collection
            .objects
            .iter()
            .map(|(key, entity)| (key.clone(), EntityRef::new(Arc::clone(entity), self.clone())))
            .collect())
    }

    /// Every live entity whose type name is `type_name`.
    pub fn all_of_type(&self, type_name: &str) -> Result<BTreeMap<String, EntityRef>> {
        let collection = self.inner.collection.lock()?;
        Ok(collection
            .objects
            .iter()
            .filter(|(_, entity)| entity.type_name() == type_name)
            .map(|(key, entity)| (key.clone(), EntityRef::new(Arc::clone(entity), self.clone())))
            .collect())
    }

    /// Typed handles to every live `T`, in registry key order.
    pub fn all_of<T: Entity>(&self) -> Result<Vec<Model<T>>> {
        Ok(self
            .all_of_type(T::entity_type_name())?
            .into_values()
            .filter_map(|entity| entity.downcast::<T>())
            .collect())
    }

    /// Typed handle to the `T` with the given id.
    pub fn get<T: Entity>(&self, id: &str) -> Result<Option<Model<T>>> {
        let key = crate::model::registry_key(T::entity_type_name(), id);
        let collection = self.inner.collection.lock()?;
        Ok(collection
            .objects
            .get(&key)
            .and_then(|entity| EntityRef::new(Arc::clone(entity), self.clone()).downcast::<T>()))
    }

    /// Registers an entity under its registry key and returns its handle.
    ///
    /// `None` is accepted and ignored. An entity whose key is already present
    /// replaces the previous one.
    pub fn new<T: Entity>(&self, entity: impl Into<Option<T>>) -> Result<Option<Model<T>>> {
        let Some(entity) = entity.into() else {
            return Ok(None);
        };
        let model = Model::new(share(entity), self.clone());
        self.insert(model.stored())?;
        Ok(Some(model))
    }

    /// Registers an entity; the non-optional form of [`FileStorage::new`].
    pub fn add<T: Entity>(&self, entity: T) -> Result<Model<T>> {
        let model = Model::new(share(entity), self.clone());
        self.insert(model.stored())?;
        Ok(model)
    }

    pub(crate) fn insert(&self, entity: Arc<dyn StoredEntity>) -> Result<String> {
        let key = entity.registry_key()?;
        let mut collection = self.inner.collection.lock()?;
        if collection.objects.insert(key.clone(), entity).is_some() {
            event!(Level::WARN, key = %key, "entity replaced an existing registration");
        } else {
            event!(Level::DEBUG, key = %key, "entity registered");
        }
        Ok(key)
    }

    /// Writes every live entity to the storage document, replacing it.
    ///
    /// Returns the number of records written.
    pub fn save(&self) -> Result<usize> {
        let span = info_span!("storage_save", path = %self.path().display());
        let _guard = span.enter();

        let collection = self.inner.collection.lock()?;
        if collection.state == StorageState::Uninitialized {
            return Err(DbError::NotLoaded);
        }
        self.write_snapshot(&collection)
    }

    /// Touches `entity` and snapshots the storage under one lock.
    ///
    /// An entity whose key now maps to another instance (after a reload or a
    /// duplicate registration) takes its slot back before the snapshot.
    pub(crate) fn commit_entity(&self, entity: Arc<dyn StoredEntity>) -> Result<DateTime<Utc>> {
        let span = info_span!("storage_commit", path = %self.path().display());
        let _guard = span.enter();

        let mut collection = self.inner.collection.lock()?;
        if collection.state == StorageState::Uninitialized {
            return Err(DbError::NotLoaded);
        }

        let key = entity.registry_key()?;
        let registered = collection
            .objects
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, &entity));
        if !registered {
            event!(Level::WARN, key = %key, "committed entity was detached, registering it again");
            collection.objects.insert(key, Arc::clone(&entity));
        }

        let previous = entity.updated_at()?;
        let updated_at = entity.touch()?;
        if let Err(err) = self.write_snapshot(&collection) {
            entity.rewind(previous)?;
            return Err(err);
        }
        Ok(updated_at)
    }

    fn write_snapshot(&self, collection: &Collection) -> Result<usize> {
        let mut document = StorageDocument::new();
        for (key, entity) in &collection.objects {
            document.insert(key.clone(), entity.to_record()?);
        }

        if let Err(err) = document::write_document(&self.inner.config, &document) {
            event!(Level::ERROR, error = %err, "storage save failed");
            return Err(err);
        }

        event!(Level::DEBUG, records = document.len(), "storage document written");
        Ok(document.len())
    }

    /// Merges the storage document into the live collection.
    ///
    /// A missing document is not an error. Every record is rebuilt before the
    /// collection is touched, so a failure leaves it as it was. Entries whose
    /// keys are absent from the document stay in place. A live entry of the
    /// same type takes the stored state in place, so existing handles stay
    /// attached.
    ///
    /// Returns the number of records loaded.
    pub fn reload(&self) -> Result<usize> {
        let span = info_span!("storage_reload", path = %self.path().display());
        let _guard = span.enter();

        let mut collection = self.inner.collection.lock()?;
        let Some(document) = document::read_document(self.path())? else {
            event!(Level::DEBUG, "storage document absent, nothing to reload");
            collection.state = StorageState::Ready;
            return Ok(0);
        };

        let staged = match self.reconstruct_document(document) {
            Ok(staged) => staged,
            Err(err) => {
                event!(Level::ERROR, error = %err, "storage reload failed");
                return Err(err);
            }
        };

        let loaded = staged.len();
        for (key, entity) in staged {
            if let Some(live) = collection.objects.get(&key)
                && live.assign_from(&*entity)?
            {
                continue;
            }
            collection.objects.insert(key, entity);
        }
        collection.state = StorageState::Ready;
        event!(Level::DEBUG, records = loaded, "storage document reloaded");
        Ok(loaded)
    }

    fn reconstruct_document(
        &self,
        document: StorageDocument,
    ) -> Result<Vec<(String, Arc<dyn StoredEntity>)>> {
        let path = self.path();
        let mut staged = Vec::with_capacity(document.len());

        for (key, record) in document {
            let class_name = record.class_name().ok_or_else(|| {
                DbError::corrupt(
                    path,
                    format!("record '{}' has no string '{}' field", key, CLASS_FIELD),
                )
            })?;

            let registration = self.inner.registry.resolve(class_name)?;
            let entity = registration.reconstruct(&record).map_err(|err| match err {
                DbError::InvalidRecord(reason) | DbError::Serialization(reason) => {
                    DbError::corrupt(path, format!("record '{}': {}", key, reason))
                }
                other => other,
            })?;

            let entity_key = entity.registry_key()?;
            if entity_key != key {
                event!(
                    Level::WARN,
                    document_key = %key,
                    entity_key = %entity_key,
                    "document key does not match record identity"
                );
            }
            staged.push((entity_key, entity));
        }

        Ok(staged)
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.inner.config.path)
            .field("registry", &self.inner.registry)
            .finish()
    }
}
