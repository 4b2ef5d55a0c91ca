pub mod config;
pub mod document;
pub mod engine;
pub mod handle;
pub mod registry;

pub use config::{DEFAULT_STORAGE_FILE, StorageConfig};
pub use document::{StorageDocument, read_document};
pub use engine::{FileStorage, StorageState};
pub use handle::{EntityRef, Model};
pub use registry::{RegisteredType, TypeRegistry};
