//! Client-side persistence of game progress.
//!
//! Progress lives in a browser-style "local storage" (string keys, string
//! values) under `scriptle:<pack>:<date>`. Anything unreadable there is treated
//! as no progress at all, so a corrupted entry costs the player a restart of
//! that puzzle and nothing more.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::{debug, warn};

use super::GameState;
use crate::logutil::escape_log;
use crate::storage::StorageError;

pub const KEY_PREFIX: &str = "scriptle:";

pub fn game_key(pack: &str, date: &str) -> String {
    format!("{}{}:{}", KEY_PREFIX, pack, date)
}

/// Minimal local-storage surface.
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.items.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.keys().cloned().collect())
    }
}

/// Local storage backed by one JSON object file. Writes take an exclusive
/// lock so two CLI invocations cannot interleave.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match fs::read_to_string(&path) {
            Ok(contents) => parse_items(&path, &contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, items })
    }

    /// Apply `change` to the map currently on disk while holding the exclusive
    /// lock, then write it back. Keys written by other handles since this one
    /// last read the file survive.
    fn update<F>(&mut self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file: File = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;
        let result = (|| -> Result<BTreeMap<String, String>, StorageError> {
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            let mut items = parse_items(&self.path, &contents);
            if change(&mut items) {
                let body = serde_json::to_string_pretty(&items)?;
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(body.as_bytes())?;
                file.sync_all()?;
            }
            Ok(items)
        })();
        file.unlock()?;
        self.items = result?;
        Ok(())
    }

    /// Re-read the file, picking up writes made by another process.
    pub fn reload(&mut self) -> Result<(), StorageError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.items.clear();
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut contents = String::new();
        let read = file.read_to_string(&mut contents);
        file.unlock()?;
        read?;
        self.items = parse_items(&self.path, &contents);
        Ok(())
    }
}

fn parse_items(path: &Path, contents: &str) -> BTreeMap<String, String> {
    if contents.trim().is_empty() {
        return BTreeMap::new();
    }
    serde_json::from_str(contents).unwrap_or_else(|e| {
        warn!(
            "local storage file {} is unreadable ({}); starting empty",
            path.display(),
            e
        );
        BTreeMap::new()
    })
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.update(|items| items.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.items.keys().cloned().collect())
    }
}

/// Reads and writes [`GameState`] through any [`LocalStorage`].
pub struct GameStore<S: LocalStorage> {
    storage: S,
}

impl<S: LocalStorage> GameStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    /// Saved progress, or `None` when absent or unusable.
    pub fn load(&self, pack: &str, date: &str) -> Option<GameState> {
        let key = game_key(pack, date);
        let raw = match self.storage.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("reading {} failed: {}", key, e);
                return None;
            }
        };
        parse_state(&key, &raw)
    }

    /// Persist `state` and return the `(key, value)` written, for mirroring.
    pub fn save(
        &mut self,
        pack: &str,
        date: &str,
        state: &GameState,
    ) -> Result<(String, String), StorageError> {
        let key = game_key(pack, date);
        let value = serde_json::to_string(state)?;
        self.storage.set_item(&key, &value)?;
        Ok((key, value))
    }

    /// Copy server-mirrored entries into local storage. A local game entry is
    /// kept when it is further along than the mirrored one.
    pub fn hydrate(&mut self, mirrored: &BTreeMap<String, String>) -> Result<usize, StorageError> {
        let mut written = 0;
        for (key, value) in mirrored {
            if key.starts_with(KEY_PREFIX) {
                let Some(incoming) = parse_state(key, value) else {
                    continue;
                };
                let local = self
                    .storage
                    .get_item(key)?
                    .and_then(|raw| parse_state(key, &raw));
                if let Some(local) = local {
                    if local.attempts >= incoming.attempts {
                        continue;
                    }
                }
            }
            self.storage.set_item(key, value)?;
            written += 1;
        }
        Ok(written)
    }

    /// Forget every puzzle's progress. Returns the number of entries removed.
    pub fn clear_all(&mut self) -> Result<usize, StorageError> {
        let keys: Vec<String> = self
            .storage
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(KEY_PREFIX))
            .collect();
        for key in &keys {
            self.storage.remove_item(key)?;
        }
        Ok(keys.len())
    }
}

fn parse_state(key: &str, raw: &str) -> Option<GameState> {
    match serde_json::from_str::<GameState>(raw) {
        Ok(state) if state.is_consistent() => Some(state),
        Ok(_) => {
            debug!("discarding inconsistent state at {}", key);
            None
        }
        Err(e) => {
            debug!("discarding malformed state at {}: {} ({})", key, e, escape_log(raw));
            None
        }
    }
}
