//! # App Module - Community App Server
//!
//! The server half of the embedded game. The webview posts messages
//! ([`protocol::WebviewMessage`]); [`AppHandler`] answers each one with zero or
//! more [`protocol::AppMessage`]s.
//!
//! ```text
//! webview ── READY ─────────────▶ handler ── PUZZLE_CONFIG ─▶ webview
//! webview ── GAME_COMPLETE ─────▶ handler ── STATS_UPDATE ──▶ webview
//!                                   │
//!                                   ├─ StatsAggregator (dedup + counters)
//!                                   ├─ PostStore (post:<id> → pack/date)
//!                                   └─ user:<id>:storage (mirrored local storage)
//! ```
//!
//! The handler never fails a request: store and sink errors are logged and the
//! webview gets whatever replies could still be built.
//!
//! - [`protocol`] - wire messages
//! - [`posts`] - post configuration and daily post creation
//! - [`comments`] - shared result sink
//! - [`scheduler`] - the daily post job
//! - [`server`] - JSON-lines service loop

pub mod comments;
pub mod posts;
pub mod protocol;
pub mod scheduler;
pub mod server;

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::AppConfig;
use crate::logutil::{escape_log, who};
use crate::puzzle::parse_date;
use crate::stats::{Bucket, StatsAggregator};
use crate::storage::{key_component, KvStore};

use comments::{CommentSink, KvCommentLog};
use posts::{PostConfig, PostStore};
use protocol::{
    AppMessage, GameComplete, PuzzleConfig, RequestContext, StatsUpdate, WebviewMessage,
};

pub fn user_storage_key(user: &str) -> String {
    format!("user:{}:storage", key_component(user))
}

pub struct AppHandler {
    store: KvStore,
    stats: StatsAggregator,
    posts: PostStore,
    comments: Box<dyn CommentSink>,
    default_pack: String,
    default_community: Option<String>,
}

impl AppHandler {
    pub fn new(store: KvStore, config: &AppConfig) -> Self {
        let sink = KvCommentLog::new(store.clone());
        Self::with_comment_sink(store, config, Box::new(sink))
    }

    pub fn with_comment_sink(
        store: KvStore,
        config: &AppConfig,
        comments: Box<dyn CommentSink>,
    ) -> Self {
        Self {
            stats: StatsAggregator::new(store.clone()),
            posts: PostStore::new(store.clone()),
            store,
            comments,
            default_pack: config.default_pack.clone(),
            default_community: config.default_community.clone(),
        }
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn posts(&self) -> &PostStore {
        &self.posts
    }

    pub fn handle(&self, ctx: &RequestContext, message: WebviewMessage) -> Vec<AppMessage> {
        match message {
            WebviewMessage::Ready => self.on_ready(ctx),
            WebviewMessage::GameComplete(done) => self.on_game_complete(ctx, done),
            WebviewMessage::StorageSet(entry) => {
                if let Some(user) = ctx.user_id.as_deref() {
                    if let Err(e) = self
                        .store
                        .hset(&user_storage_key(user), &entry.key, &entry.value)
                    {
                        warn!("storage set for {} failed: {}", escape_log(user), e);
                    }
                }
                Vec::new()
            }
            WebviewMessage::StorageClear => {
                if let Some(user) = ctx.user_id.as_deref() {
                    match self.store.hdel_all(&user_storage_key(user)) {
                        Ok(n) => debug!("cleared {} storage entries for {}", n, escape_log(user)),
                        Err(e) => warn!("storage clear for {} failed: {}", escape_log(user), e),
                    }
                }
                Vec::new()
            }
            WebviewMessage::ShareResults(share) => {
                match ctx.post_id.as_deref() {
                    Some(post_id) => {
                        if let Err(e) = self.comments.submit_comment(
                            post_id,
                            ctx.user_id.as_deref(),
                            &share.share_text,
                        ) {
                            warn!("sharing results on {} failed: {}", post_id, e);
                        } else {
                            info!(
                                "shared results on {} for {}: {}",
                                post_id,
                                who(ctx.user_id.as_deref()),
                                escape_log(&share.share_text)
                            );
                        }
                    }
                    None => debug!("share without a post id ignored"),
                }
                Vec::new()
            }
        }
    }

    fn community<'a>(&'a self, ctx: &'a RequestContext) -> Option<&'a str> {
        ctx.community
            .as_deref()
            .or(self.default_community.as_deref())
    }

    /// The post's stored config, or today's puzzle of the default pack.
    fn puzzle_for(&self, ctx: &RequestContext) -> PostConfig {
        if let Some(post_id) = ctx.post_id.as_deref() {
            match self.posts.get_config(post_id) {
                Ok(Some(config)) => return config,
                Ok(None) => debug!("no config for post {}", escape_log(post_id)),
                Err(e) => warn!("reading config for post {} failed: {}", escape_log(post_id), e),
            }
        }
        PostConfig {
            date: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            pack_id: self.default_pack.clone(),
        }
    }

    fn on_ready(&self, ctx: &RequestContext) -> Vec<AppMessage> {
        let config = self.puzzle_for(ctx);
        let user = ctx.user_id.as_deref();

        let storage = match user {
            Some(id) => self
                .store
                .hgetall(&user_storage_key(id))
                .unwrap_or_else(|e| {
                    warn!("loading storage for {} failed: {}", escape_log(id), e);
                    BTreeMap::new()
                }),
            None => BTreeMap::new(),
        };

        let mut replies = vec![AppMessage::PuzzleConfig(PuzzleConfig {
            date: config.date.clone(),
            pack_id: config.pack_id.clone(),
            user_id: ctx.user_id.clone(),
            storage,
        })];

        if let Some(id) = user {
            match self.stats.submission(id, &config.pack_id, &config.date) {
                Ok(Some(previous)) => {
                    match self.stats.read(
                        self.community(ctx),
                        &config.pack_id,
                        &config.date,
                        previous.bucket,
                    ) {
                        Ok(stats) => replies.push(AppMessage::StatsUpdate(StatsUpdate { stats })),
                        Err(e) => warn!("reading stats failed: {}", e),
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("reading submission for {} failed: {}", escape_log(id), e),
            }
        }
        replies
    }

    fn on_game_complete(&self, ctx: &RequestContext, done: GameComplete) -> Vec<AppMessage> {
        let Some(bucket) = Bucket::from_result(done.won, done.attempts) else {
            warn!(
                "rejecting completion with won={} attempts={} from {}",
                done.won,
                done.attempts,
                who(ctx.user_id.as_deref())
            );
            return Vec::new();
        };
        if parse_date(&done.date).is_err() || done.pack_id.trim().is_empty() {
            warn!(
                "rejecting completion for pack '{}' date '{}'",
                escape_log(&done.pack_id),
                escape_log(&done.date)
            );
            return Vec::new();
        }

        let community = self.community(ctx);
        match ctx.user_id.as_deref() {
            Some(user) => {
                if let Err(e) = self.stats.record_completion(
                    user,
                    community,
                    &done.pack_id,
                    &done.date,
                    bucket,
                    done.attempts,
                ) {
                    warn!("recording completion for {} failed: {}", escape_log(user), e);
                }
            }
            None => debug!("anonymous completion not counted"),
        }

        match self.stats.read(community, &done.pack_id, &done.date, bucket) {
            Ok(stats) => vec![AppMessage::StatsUpdate(StatsUpdate { stats })],
            Err(e) => {
                warn!("reading stats failed: {}", e);
                Vec::new()
            }
        }
    }
}
