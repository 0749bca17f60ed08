//! Puzzle posts: which pack and date each post plays.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{key_component, KvStore, StorageError};

/// Stored under `post:<postId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostConfig {
    pub date: String,
    pub pack_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyPost {
    pub post_id: String,
    pub config: PostConfig,
    /// `false` when the post already existed.
    pub created: bool,
}

pub fn post_key(post_id: &str) -> String {
    format!("post:{}", key_component(post_id))
}

fn daily_key(pack: &str, date: &str) -> String {
    format!("daily:{}:{}", key_component(pack), key_component(date))
}

fn new_post_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("t3_{}", &id[..8])
}

#[derive(Clone)]
pub struct PostStore {
    store: KvStore,
}

impl PostStore {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    pub fn put_config(&self, post_id: &str, config: &PostConfig) -> Result<(), StorageError> {
        let body = serde_json::to_string(config)?;
        self.store.set(&post_key(post_id), &body)
    }

    pub fn get_config(&self, post_id: &str) -> Result<Option<PostConfig>, StorageError> {
        match self.store.get(&post_key(post_id))? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Post id of the daily post for `(pack, date)`, if one was created.
    pub fn daily_post(&self, pack: &str, date: &str) -> Result<Option<String>, StorageError> {
        self.store.get(&daily_key(pack, date))
    }

    /// Create the daily post for `(pack, date)` unless it already exists.
    pub fn create_daily_post(&self, pack: &str, date: &str) -> Result<DailyPost, StorageError> {
        let config = PostConfig {
            date: date.to_string(),
            pack_id: pack.to_string(),
        };
        if let Some(existing) = self.daily_post(pack, date)? {
            debug!("daily post for {} {} already exists: {}", pack, date, existing);
            return Ok(DailyPost {
                post_id: existing,
                config,
                created: false,
            });
        }

        let post_id = new_post_id();
        self.put_config(&post_id, &config)?;
        if !self
            .store
            .set_nx(&daily_key(pack, date), post_id.as_bytes())?
        {
            // Lost a race with another creator; keep theirs.
            self.store.del(&post_key(&post_id))?;
            let winner = self.daily_post(pack, date)?.unwrap_or_default();
            return Ok(DailyPost {
                post_id: winner,
                config,
                created: false,
            });
        }
        self.store.flush()?;
        info!("created daily post {} for {} {}", post_id, pack, date);
        Ok(DailyPost {
            post_id,
            config,
            created: true,
        })
    }
}
