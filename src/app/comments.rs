//! Where shared results go.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::storage::{key_component, KvStore, StorageError};

/// Receives share text posted from the webview.
pub trait CommentSink: Send + Sync {
    fn submit_comment(
        &self,
        post_id: &str,
        user: Option<&str>,
        text: &str,
    ) -> Result<(), StorageError>;
}

pub fn comments_key(post_id: &str) -> String {
    format!("comments:{}", key_component(post_id))
}

/// Keeps the latest shared result per user under `comments:<postId>`.
#[derive(Clone)]
pub struct KvCommentLog {
    store: KvStore,
}

impl KvCommentLog {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    pub fn comments(&self, post_id: &str) -> Result<BTreeMap<String, String>, StorageError> {
        self.store.hgetall(&comments_key(post_id))
    }
}

impl CommentSink for KvCommentLog {
    fn submit_comment(
        &self,
        post_id: &str,
        user: Option<&str>,
        text: &str,
    ) -> Result<(), StorageError> {
        let author = match user {
            Some(id) => id.to_string(),
            None => format!("anonymous:{}", Uuid::new_v4().simple()),
        };
        self.store.hset(&comments_key(post_id), &author, text)
    }
}
