use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::EntityStore;
use crate::Result;
use crate::StoreError;
use crate::TableEntity;
use crate::next_write_timestamp;

const ENTITIES_VERSION: u8 = 1;
pub const LOCAL_STORE_FILENAME: &str = "entities.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct EntitiesFile {
    version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_write: Option<DateTime<Utc>>,
    #[serde(default)]
    entities: Vec<TableEntity>,
}

impl EntitiesFile {
    fn new_empty() -> Self {
        Self {
            version: ENTITIES_VERSION,
            last_write: None,
            entities: Vec::new(),
        }
    }
}

/// Single-file JSON store for local runs and development pipelines.
///
/// The whole file is rewritten atomically on every write. Writers in the same
/// process are serialized; separate processes race the way a remote table
/// store would (last writer wins).
#[derive(Debug)]
pub struct LocalEntityStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalEntityStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Store backed by [`LOCAL_STORE_FILENAME`] inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(LOCAL_STORE_FILENAME))
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn load_file(&self) -> Result<EntitiesFile> {
        if !self.path.exists() {
            return Ok(EntitiesFile::new_empty());
        }
        let contents =
            fs::read(&self.path).map_err(|err| StoreError::io("read", &self.path, err))?;
        let mut parsed: EntitiesFile =
            serde_json::from_slice(&contents).map_err(|source| StoreError::Serialization {
                path: self.path.clone(),
                source,
            })?;
        if parsed.version == 0 {
            parsed.version = ENTITIES_VERSION;
        }
        if parsed.version > ENTITIES_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: parsed.version,
                supported: ENTITIES_VERSION,
            });
        }
        Ok(parsed)
    }

    fn save_file(&self, file: &EntitiesFile) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|err| StoreError::io("create directory", dir, err))?;
        }
        let contents =
            serde_json::to_vec_pretty(file).map_err(|source| StoreError::Serialization {
                path: self.path.clone(),
                source,
            })?;
        write_file_atomically(&self.path, &contents)?;
        debug!(
            "wrote {} entities to {}",
            file.entities.len(),
            self.path.display()
        );
        Ok(())
    }

    fn modify<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut EntitiesFile, DateTime<Utc>) -> Result<()>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StoreError::Backend("local store lock poisoned".to_string()))?;
        let mut file = self.load_file()?;
        let stamp = next_write_timestamp(file.last_write);
        apply(&mut file, stamp)?;
        file.last_write = Some(stamp);
        self.save_file(&file)
    }
}

impl EntityStore for LocalEntityStore {
    fn query(&self, partition_key: &str, field: &str, value: &str) -> Result<Vec<TableEntity>> {
        let file = self.load_file()?;
        Ok(file
            .entities
            .into_iter()
            .filter(|entity| entity.matches(partition_key, field, value))
            .collect())
    }

    fn list(&self, partition_key: &str) -> Result<Vec<TableEntity>> {
        let file = self.load_file()?;
        Ok(file
            .entities
            .into_iter()
            .filter(|entity| entity.partition_key == partition_key)
            .collect())
    }

    fn insert(&self, entity: &TableEntity) -> Result<()> {
        self.modify(|file, stamp| {
            if file.entities.iter().any(|existing| existing.same_key(entity)) {
                return Err(StoreError::already_exists(
                    &entity.partition_key,
                    &entity.row_key,
                ));
            }
            let mut stored = entity.clone();
            stored.timestamp = Some(stamp);
            file.entities.push(stored);
            Ok(())
        })
    }

    fn replace(&self, entity: &TableEntity) -> Result<()> {
        self.modify(|file, stamp| {
            let existing = file
                .entities
                .iter_mut()
                .find(|existing| existing.same_key(entity))
                .ok_or_else(|| StoreError::not_found(&entity.partition_key, &entity.row_key))?;
            *existing = entity.clone();
            existing.timestamp = Some(stamp);
            Ok(())
        })
    }
}

fn write_file_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let file_name = path
        .file_name()
        .map_or_else(|| LOCAL_STORE_FILENAME.into(), |name| name.to_string_lossy());
    let tmp_path = dir.join(format!(".{file_name}.tmp-{}-{nonce}", std::process::id()));

    {
        let mut tmp_file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)
            .map_err(|err| StoreError::io("create temp file", &tmp_path, err))?;
        tmp_file
            .write_all(contents)
            .map_err(|err| StoreError::io("write temp file", &tmp_path, err))?;
        tmp_file
            .sync_all()
            .map_err(|err| StoreError::io("sync temp file", &tmp_path, err))?;
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StoreError::io("replace", path, err));
    }
    Ok(())
}
