//! Key-value persistence for the application state.
//!
//! Values are JSON strings stored under a few fixed keys. There is no schema
//! versioning: a blob that no longer parses is logged and ignored at startup.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Mutex,
};

use tracing::{debug, info, instrument};

pub const KEY_USERS: &str = "judge.users";
pub const KEY_PROBLEMS: &str = "judge.problems";
pub const KEY_SESSIONS: &str = "judge.sessions";
pub const KEY_SUBMISSIONS: &str = "judge.submissions";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("corrupt store file {path}: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("store lock poisoned")]
  Poisoned,
}

/// Synchronous string key-value store.
pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
  fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
  map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KvStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(map.get(key).cloned())
  }

  fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
    let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    map.insert(key.to_string(), value);
    Ok(())
  }
}

/// All keys in one JSON object file. Every `set` rewrites the file through a
/// temp file + rename so a crash never leaves a half-written store.
pub struct FileStore {
  path: PathBuf,
  map: Mutex<HashMap<String, String>>,
}

impl FileStore {
  #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
    let path = path.as_ref().to_path_buf();
    let map = match std::fs::read_to_string(&path) {
      Ok(s) if s.trim().is_empty() => HashMap::new(),
      Ok(s) => serde_json::from_str::<HashMap<String, String>>(&s)
        .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
      Err(source) => return Err(StoreError::Io { path, source }),
    };
    info!(target: "store", keys = map.len(), "Opened file store");
    Ok(Self { path, map: Mutex::new(map) })
  }

  fn flush(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
    if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
      std::fs::create_dir_all(dir)
        .map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })?;
    }
    let body = serde_json::to_string_pretty(map)?;
    let tmp = self.path.with_extension("tmp");
    std::fs::write(&tmp, body).map_err(|source| StoreError::Io { path: tmp.clone(), source })?;
    std::fs::rename(&tmp, &self.path)
      .map_err(|source| StoreError::Io { path: self.path.clone(), source })?;
    Ok(())
  }
}

impl KvStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    Ok(map.get(key).cloned())
  }

  fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
    let mut map = self.map.lock().map_err(|_| StoreError::Poisoned)?;
    debug!(target: "store", %key, bytes = value.len(), "Persisting key");
    map.insert(key.to_string(), value);
    self.flush(&map)
  }
}
