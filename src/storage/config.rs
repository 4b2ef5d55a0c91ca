use std::path::{Path, PathBuf};

/// Document path used when none is configured.
pub const DEFAULT_STORAGE_FILE: &str = "file.json";

/// Storage configuration
///
/// Identifies the backing document and controls how snapshots are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Path of the JSON storage document
    pub path: PathBuf,

    /// Write indented JSON instead of a single line
    pub pretty: bool,

    /// fsync the temporary file before it replaces the document
    pub sync_on_save: bool,

    /// Create missing parent directories on save
    pub create_dirs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_FILE)
    }
}

impl StorageConfig {
    /// Create a configuration for the document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
            sync_on_save: true,
            create_dirs: true,
        }
    }

    /// Set the document path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Enable or disable indented output
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Enable or disable fsync before rename
    pub fn sync_on_save(mut self, sync: bool) -> Self {
        self.sync_on_save = sync;
        self
    }

    /// Enable or disable parent directory creation
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }

    /// Directory that receives the temporary file during a save.
    pub(crate) fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.path, PathBuf::from("file.json"));
        assert!(!config.pretty);
        assert!(config.sync_on_save);
        assert!(config.create_dirs);
    }

    #[test]
    fn test_builder() {
        let config = StorageConfig::default()
            .path("/var/lib/app/objects.json")
            .pretty(true)
            .sync_on_save(false)
            .create_dirs(false);
        assert_eq!(config.path, PathBuf::from("/var/lib/app/objects.json"));
        assert!(config.pretty);
        assert!(!config.sync_on_save);
        assert!(!config.create_dirs);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(StorageConfig::new("file.json").parent_dir(), Path::new("."));
        assert_eq!(
            StorageConfig::new("data/file.json").parent_dir(),
            Path::new("data")
        );
    }
}
