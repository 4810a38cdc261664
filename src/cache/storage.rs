//! Cache storage trait and on-disk implementation.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::key::CacheKey;
use super::types::CachedEntry;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache I/O on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("corrupt cache entry {path}: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("could not determine home directory for the cache")]
  NoHome,
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Read an entry, `None` when nothing is stored under `key`.
  fn load(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError>;

  /// Replace whatever is stored under `key`.
  fn store(&self, key: &CacheKey, payload: &Value) -> Result<(), CacheError>;
}

/// Storage that never keeps anything. Every lookup misses.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn load(&self, _key: &CacheKey) -> Result<Option<CachedEntry>, CacheError> {
    Ok(None)
  }

  fn store(&self, _key: &CacheKey, _payload: &Value) -> Result<(), CacheError> {
    Ok(())
  }
}

/// One JSON file per key, `<dir>/<key>.cache`.
///
/// The file modification time is the entry's timestamp.
pub struct FileStorage {
  dir: PathBuf,
}

impl FileStorage {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  /// Storage under `~/.cache/devboard`.
  pub fn open_default() -> Result<Self, CacheError> {
    Ok(Self::new(Self::default_dir()?))
  }

  pub fn default_dir() -> Result<PathBuf, CacheError> {
    let home = dirs::home_dir().ok_or(CacheError::NoHome)?;
    Ok(home.join(".cache").join("devboard"))
  }

  fn entry_path(&self, key: &CacheKey) -> PathBuf {
    self.dir.join(format!("{}.cache", key))
  }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
  move |source| CacheError::Io {
    path: path.to_path_buf(),
    source,
  }
}

impl CacheStorage for FileStorage {
  fn load(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError> {
    let path = self.entry_path(key);

    let metadata = match fs::metadata(&path) {
      Ok(m) => m,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(io_err(&path)(e)),
    };
    let stored_at: DateTime<Utc> = metadata.modified().map_err(io_err(&path))?.into();

    let contents = fs::read_to_string(&path).map_err(io_err(&path))?;
    let payload = serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
      path: path.clone(),
      source,
    })?;

    Ok(Some(CachedEntry { payload, stored_at }))
  }

  fn store(&self, key: &CacheKey, payload: &Value) -> Result<(), CacheError> {
    fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

    let path = self.entry_path(key);
    let tmp = self.dir.join(format!("{}.cache.tmp", key));
    let data = serde_json::to_vec(payload).map_err(|source| CacheError::Corrupt {
      path: path.clone(),
      source,
    })?;

    // Readers only ever see a complete file.
    fs::write(&tmp, data).map_err(io_err(&tmp))?;
    fs::rename(&tmp, &path).map_err(io_err(&path))?;
    Ok(())
  }
}
