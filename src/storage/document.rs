//! Reading and atomically replacing the JSON storage document.

use super::StorageConfig;
use crate::core::{DbError, Record, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Registry key -> record; the whole collection at the last snapshot.
pub type StorageDocument = BTreeMap<String, Record>;

/// Reads the document at `path`.
///
/// Returns `Ok(None)` when the file does not exist. A file holding only
/// whitespace reads as an empty document.
pub fn read_document(path: &Path) -> Result<Option<StorageDocument>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(DbError::io(path, err)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(StorageDocument::new()));
    }

    let document = serde_json::from_slice::<StorageDocument>(&bytes)
        .map_err(|err| DbError::corrupt(path, err.to_string()))?;
    Ok(Some(document))
}

/// Replaces the document with `document`.
///
/// The JSON is written to a temporary file next to the target and renamed
/// over it, so readers see either the old or the new document.
pub(crate) fn write_document(config: &StorageConfig, document: &StorageDocument) -> Result<()> {
    let path = config.path.as_path();
    let dir = config.parent_dir();
    if config.create_dirs {
        fs::create_dir_all(dir).map_err(|err| DbError::io(dir, err))?;
    }

    let json = if config.pretty {
        serde_json::to_vec_pretty(document)?
    } else {
        serde_json::to_vec(document)?
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|err| DbError::io(dir, err))?;
    temp.write_all(&json)
        .map_err(|err| DbError::io(temp.path(), err))?;
    temp.flush().map_err(|err| DbError::io(temp.path(), err))?;
    if config.sync_on_save {
        temp.as_file()
            .sync_all()
            .map_err(|err| DbError::io(temp.path(), err))?;
    }

    temp.persist(path)
        .map_err(|err| DbError::io(path, err.error))?;
    Ok(())
}
