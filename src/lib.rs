// ============================================================================
// modelstore Library
// ============================================================================

//! Typed entities with identity and timestamps, kept in one in-process
//! collection and snapshotted to a single JSON document.
//!
//! # Examples
//!
//! ```no_run
//! use modelstore::{FileStorage, StorageConfig, TypeRegistry, model};
//!
//! model! {
//!     pub struct User {
//!         pub email: String,
//!         pub first_name: String,
//!     }
//! }
//!
//! # fn main() -> modelstore::Result<()> {
//! let mut registry = TypeRegistry::new();
//! registry.register::<User>();
//!
//! let storage = FileStorage::load(StorageConfig::default(), registry)?;
//! let user = storage.add(User::new("a@b.c".into(), "Ada".into()))?;
//! user.update(|u| u.first_name = "Betty".into())?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod facade;
pub mod model;
pub mod storage;

pub use core::{DbError, Record, Result};
pub use facade::Models;
pub use model::{BaseModel, Entity, EntityBase};
pub use storage::{
    EntityRef, FileStorage, Model, StorageConfig, StorageState, TypeRegistry,
};

#[doc(hidden)]
pub use serde_json;
