//! # Storage Module - Hosted Key/Value Store
//!
//! A small key/value layer over [sled] with the primitives the community stats
//! and the webview handler rely on:
//!
//! - plain values (`get`, `set`, `del`, `set_nx`)
//! - atomic counters (`incr_by`), stored as big-endian `u64`
//! - hashes (`hset`, `hget`, `hgetall`, `hincr_by`, `hdel_all`)
//!
//! Counters never need a transaction: each increment is a single atomic
//! read-modify-write on one key, and deduplication uses compare-and-swap on a
//! marker key.
//!
//! ```text
//! db/
//! ├── kv        ← plain values and counters
//! └── hashes    ← "<hash key>\0<field>" → value
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scriptle::storage::KvStore;
//!
//! fn main() -> Result<(), scriptle::storage::StorageError> {
//!     let store = KvStore::open("./data/db")?;
//!     store.incr_by("stats:global:shrek:2026-10-15:total", 1)?;
//!     store.hincr_by("stats:global:shrek:2026-10-15:dist", "3", 1)?;
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;

const TREE_KV: &str = "kv";
const TREE_HASHES: &str = "hashes";
const HASH_SEPARATOR: u8 = 0;

/// Characters escaped inside a single key component. `:` separates components.
const KEY_COMPONENT: &AsciiSet = &CONTROLS.add(b':').add(b'%').add(b' ').add(b'/');

/// Errors raised by the key/value layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// A counter key holds something other than an 8-byte big-endian integer.
    #[error("value at '{0}' is not a counter")]
    InvalidCounter(String),

    #[error("value at '{0}' is not valid utf-8")]
    InvalidUtf8(String),
}

/// Escape one component of a colon-delimited key so user and community ids
/// can never split into extra components.
pub fn key_component(raw: &str) -> String {
    utf8_percent_encode(raw, KEY_COMPONENT).to_string()
}

fn encode_counter(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

fn decode_counter(bytes: &[u8]) -> Option<u64> {
    let array: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(array))
}

fn hash_entry_key(key: &str, field: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + field.len() + 1);
    out.extend_from_slice(key.as_bytes());
    out.push(HASH_SEPARATOR);
    out.extend_from_slice(field.as_bytes());
    out
}

fn hash_prefix(key: &str) -> Vec<u8> {
    let mut out = key.as_bytes().to_vec();
    out.push(HASH_SEPARATOR);
    out
}

/// Sled-backed key/value store. Cheap to clone; clones share the same database.
#[derive(Clone)]
pub struct KvStore {
    db: sled::Db,
    kv: sled::Tree,
    hashes: sled::Tree,
}

impl KvStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        Self::from_db(db)
    }

    /// In-memory store that disappears on drop.
    pub fn temporary() -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let kv = db.open_tree(TREE_KV)?;
        let hashes = db.open_tree(TREE_HASHES)?;
        Ok(Self { db, kv, hashes })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.kv.get(key.as_bytes())? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::InvalidUtf8(key.to_string())),
            None => Ok(None),
        }
    }

    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.kv.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv.insert(key.as_bytes(), value.as_bytes())?;
        Ok(())
    }

    pub fn del(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.kv.remove(key.as_bytes())?.is_some())
    }

    /// Store `value` only when `key` is absent. Returns `true` when this call
    /// created the key.
    pub fn set_nx(&self, key: &str, value: &[u8]) -> Result<bool, StorageError> {
        let swapped = self
            .kv
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }

    /// Atomically add `by` to the counter at `key` and return the new value.
    pub fn incr_by(&self, key: &str, by: u64) -> Result<u64, StorageError> {
        let updated = self.kv.update_and_fetch(key.as_bytes(), |old| {
            let current = old.and_then(decode_counter).unwrap_or(0);
            Some(encode_counter(current.saturating_add(by)).to_vec())
        })?;
        updated
            .as_deref()
            .and_then(decode_counter)
            .ok_or_else(|| StorageError::InvalidCounter(key.to_string()))
    }

    /// Read a counter; absent keys read as zero.
    pub fn counter(&self, key: &str) -> Result<u64, StorageError> {
        match self.kv.get(key.as_bytes())? {
            Some(bytes) => {
                decode_counter(&bytes).ok_or_else(|| StorageError::InvalidCounter(key.to_string()))
            }
            None => Ok(0),
        }
    }

    pub fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StorageError> {
        self.hashes
            .insert(hash_entry_key(key, field), value.as_bytes())?;
        Ok(())
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StorageError> {
        match self.hashes.get(hash_entry_key(key, field))? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StorageError::InvalidUtf8(format!("{}/{}", key, field))),
            None => Ok(None),
        }
    }

    /// Atomically add `by` to a counter stored in a hash field.
    pub fn hincr_by(&self, key: &str, field: &str, by: u64) -> Result<u64, StorageError> {
        let updated = self
            .hashes
            .update_and_fetch(hash_entry_key(key, field), |old| {
                let current = old.and_then(decode_counter).unwrap_or(0);
                Some(encode_counter(current.saturating_add(by)).to_vec())
            })?;
        updated
            .as_deref()
            .and_then(decode_counter)
            .ok_or_else(|| StorageError::InvalidCounter(format!("{}/{}", key, field)))
    }

    /// All string fields of a hash.
    pub fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StorageError> {
        let prefix = hash_prefix(key);
        let mut out = BTreeMap::new();
        for entry in self.hashes.scan_prefix(&prefix) {
            let (entry_key, value) = entry?;
            let field = String::from_utf8_lossy(&entry_key[prefix.len()..]).to_string();
            let value = String::from_utf8(value.to_vec())
                .map_err(|_| StorageError::InvalidUtf8(format!("{}/{}", key, field)))?;
            out.insert(field, value);
        }
        Ok(out)
    }

    /// All counter fields of a hash.
    pub fn hgetall_counters(&self, key: &str) -> Result<BTreeMap<String, u64>, StorageError> {
        let prefix = hash_prefix(key);
        let mut out = BTreeMap::new();
        for entry in self.hashes.scan_prefix(&prefix) {
            let (entry_key, value) = entry?;
            let field = String::from_utf8_lossy(&entry_key[prefix.len()..]).to_string();
            let count = decode_counter(&value)
                .ok_or_else(|| StorageError::InvalidCounter(format!("{}/{}", key, field)))?;
            out.insert(field, count);
        }
        Ok(out)
    }

    /// Remove every field of a hash. Returns the number of fields removed.
    pub fn hdel_all(&self, key: &str) -> Result<usize, StorageError> {
        let prefix = hash_prefix(key);
        let mut removed = 0;
        for entry in self.hashes.scan_prefix(&prefix) {
            let (entry_key, _) = entry?;
            if self.hashes.remove(entry_key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Keys of the plain-value tree that start with `prefix`.
    pub fn scan_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in self.kv.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key).to_string());
        }
        Ok(keys)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}
