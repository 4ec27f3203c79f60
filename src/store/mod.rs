pub mod keys;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::models::{Lesson, VocabCard};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encode: {0}")]
    Encode(#[from] serde_json::Error),
}

enum Backend {
    Memory(RwLock<HashMap<String, String>>),
    Dir(PathBuf),
}

/// String-keyed value store, one value per key. The directory backend keeps
/// one file per key so the data directory stays hand-inspectable and
/// greppable. Read-modify-write cycles go through the `update_*` methods,
/// which hold the write guard for the whole cycle.
pub struct Store {
    backend: Backend,
    write_guard: Mutex<()>,
}

impl Store {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            backend: Backend::Dir(dir),
            write_guard: Mutex::new(()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(RwLock::new(HashMap::new())),
            write_guard: Mutex::new(()),
        }
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        match &self.backend {
            Backend::Memory(map) => map.read().get(key).cloned(),
            Backend::Dir(dir) => fs::read_to_string(dir.join(key)).ok(),
        }
    }

    pub fn put_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match &self.backend {
            Backend::Memory(map) => {
                map.write().insert(key.to_string(), value.to_string());
                Ok(())
            }
            Backend::Dir(dir) => write_atomic(dir, key, value),
        }
    }

    /// Decodes the value at `key`. Missing and unreadable values both read as
    /// `None`; collection accessors turn that into an empty collection, so a
    /// damaged file degrades to a fresh start instead of a startup failure.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, %error, "discarding unreadable stored value");
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_string_pretty(value)?;
        self.put_raw(key, &payload)
    }

    pub fn lessons(&self) -> Vec<Lesson> {
        self.get(keys::LESSONS).unwrap_or_default()
    }

    pub fn save_lessons(&self, lessons: &[Lesson]) -> Result<(), StoreError> {
        self.put(keys::LESSONS, &lessons)
    }

    pub fn update_lessons<R>(
        &self,
        apply: impl FnOnce(&mut Vec<Lesson>) -> R,
    ) -> Result<R, StoreError> {
        let _guard = self.write_guard.lock();
        let mut lessons = self.lessons();
        let out = apply(&mut lessons);
        self.save_lessons(&lessons)?;
        Ok(out)
    }

    pub fn vocab(&self) -> Vec<VocabCard> {
        self.get(keys::VOCAB).unwrap_or_default()
    }

    pub fn save_vocab(&self, cards: &[VocabCard]) -> Result<(), StoreError> {
        self.put(keys::VOCAB, &cards)
    }

    pub fn update_vocab<R>(
        &self,
        apply: impl FnOnce(&mut Vec<VocabCard>) -> R,
    ) -> Result<R, StoreError> {
        let _guard = self.write_guard.lock();
        let mut cards = self.vocab();
        let out = apply(&mut cards);
        self.save_vocab(&cards)?;
        Ok(out)
    }

    /// The credential and endpoint are raw strings, not JSON. An empty string
    /// reads as unconfigured, same as the browser build treated `""`.
    pub fn api_key(&self) -> Option<String> {
        self.get_raw(keys::API_KEY).filter(|v| !v.is_empty())
    }

    pub fn set_api_key(&self, value: &str) -> Result<(), StoreError> {
        self.put_raw(keys::API_KEY, value)
    }

    pub fn base_url(&self) -> Option<String> {
        self.get_raw(keys::BASE_URL).filter(|v| !v.is_empty())
    }

    pub fn set_base_url(&self, value: &str) -> Result<(), StoreError> {
        self.put_raw(keys::BASE_URL, value)
    }
}

fn write_atomic(dir: &Path, key: &str, value: &str) -> Result<(), StoreError> {
    let tmp = dir.join(format!("{key}.tmp"));
    fs::write(&tmp, value)?;
    fs::rename(&tmp, dir.join(key))?;
    Ok(())
}

/// Ids are millisecond timestamps. Two records created in the same
/// millisecond would collide, so the id is bumped past the current maximum
/// for the collection.
pub fn allocate_id(existing: impl IntoIterator<Item = i64>, now_ms: i64) -> i64 {
    let max = existing.into_iter().max().unwrap_or(0);
    now_ms.max(max + 1)
}
