//! Webview message handling end to end

use std::sync::{Arc, Mutex};

use scriptle::app::comments::{CommentSink, KvCommentLog};
use scriptle::app::posts::PostConfig;
use scriptle::app::protocol::{
    AppMessage, GameComplete, RequestContext, ShareResults, StorageSet, WebviewMessage,
};
use scriptle::app::AppHandler;
use scriptle::config::AppConfig;
use scriptle::stats::Bucket;
use scriptle::storage::{KvStore, StorageError};

fn handler() -> (AppHandler, KvStore) {
    let store = KvStore::temporary().unwrap();
    (AppHandler::new(store.clone(), &AppConfig::default()), store)
}

fn ctx(user: Option<&str>, post: Option<&str>, community: Option<&str>) -> RequestContext {
    RequestContext {
        user_id: user.map(str::to_string),
        post_id: post.map(str::to_string),
        community: community.map(str::to_string),
    }
}

fn complete(won: bool, attempts: u32) -> WebviewMessage {
    WebviewMessage::GameComplete(GameComplete {
        pack_id: "toons".into(),
        date: "2026-10-15".into(),
        won,
        attempts,
    })
}

#[test]
fn ready_returns_the_post_puzzle() {
    let (handler, _) = handler();
    handler
        .posts()
        .put_config(
            "t3_abc",
            &PostConfig {
                date: "2026-10-15".into(),
                pack_id: "toons".into(),
            },
        )
        .unwrap();

    let replies = handler.handle(&ctx(Some("u1"), Some("t3_abc"), None), WebviewMessage::Ready);
    assert_eq!(replies.len(), 1);
    match &replies[0] {
        AppMessage::PuzzleConfig(config) => {
            assert_eq!(config.pack_id, "toons");
            assert_eq!(config.date, "2026-10-15");
            assert_eq!(config.user_id.as_deref(), Some("u1"));
            assert!(config.storage.is_empty());
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn ready_without_post_falls_back_to_default_pack() {
    let (handler, _) = handler();
    let replies = handler.handle(&ctx(None, Some("t3_unknown"), None), WebviewMessage::Ready);
    match &replies[0] {
        AppMessage::PuzzleConfig(config) => {
            assert_eq!(config.pack_id, AppConfig::default().default_pack);
            assert_eq!(config.user_id, None);
        }
        other => panic!("unexpected reply {:?}", other),
    }
}

#[test]
fn completion_is_counted_once_but_always_answered() {
    let (handler, _) = handler();
    let who = ctx(Some("u1"), None, Some("movies"));

    let first = handler.handle(&who, complete(true, 2));
    let second = handler.handle(&who, complete(true, 1));
    for replies in [&first, &second] {
        assert_eq!(replies.len(), 1);
    }
    let AppMessage::StatsUpdate(update) = &second[0] else {
        panic!("expected stats update");
    };
    assert_eq!(update.stats.global.total, 1);
    assert_eq!(update.stats.community.as_ref().unwrap().total, 1);
    assert_eq!(update.stats.global.distribution.get(Bucket::Two), 1);
}

#[test]
fn anonymous_completion_reads_without_counting() {
    let (handler, _) = handler();
    handler.handle(&ctx(Some("u1"), None, None), complete(false, 5));

    let replies = handler.handle(&ctx(None, None, None), complete(true, 1));
    let AppMessage::StatsUpdate(update) = &replies[0] else {
        panic!("expected stats update");
    };
    assert_eq!(update.stats.bucket, Bucket::One);
    assert_eq!(update.stats.global.total, 1);
    assert_eq!(update.stats.global.percentile, Some(100));
}

#[test]
fn invalid_completions_are_dropped() {
    let (handler, _) = handler();
    let who = ctx(Some("u1"), None, None);
    assert!(handler.handle(&who, complete(true, 0)).is_empty());
    assert!(handler.handle(&who, complete(true, 6)).is_empty());
    assert!(handler.handle(&who, complete(false, 99)).is_empty());
    assert!(handler.handle(&who, complete(false, 3)).is_empty());
    let bad_date = WebviewMessage::GameComplete(GameComplete {
        pack_id: "toons".into(),
        date: "15/10/2026".into(),
        won: true,
        attempts: 1,
    });
    assert!(handler.handle(&who, bad_date).is_empty());
    assert_eq!(handler.stats().scope(None, "toons", "2026-10-15").unwrap().1, 0);
}

#[test]
fn ready_after_completion_includes_stats() {
    let (handler, _) = handler();
    handler
        .posts()
        .put_config(
            "t3_p",
            &PostConfig {
                date: "2026-10-15".into(),
                pack_id: "toons".into(),
            },
        )
        .unwrap();
    let who = ctx(Some("u1"), Some("t3_p"), None);
    handler.handle(&who, complete(true, 3));

    let replies = handler.handle(&who, WebviewMessage::Ready);
    assert_eq!(replies.len(), 2);
    assert!(matches!(replies[1], AppMessage::StatsUpdate(_)));
}

#[test]
fn storage_is_mirrored_and_cleared() {
    let (handler, _) = handler();
    let who = ctx(Some("u1"), None, None);
    let set = WebviewMessage::StorageSet(StorageSet {
        key: "scriptle:toons:2026-10-15".into(),
        value: "{\"attempts\":1}".into(),
    });
    assert!(handler.handle(&who, set).is_empty());

    let replies = handler.handle(&who, WebviewMessage::Ready);
    let AppMessage::PuzzleConfig(config) = &replies[0] else {
        panic!("expected puzzle config");
    };
    assert_eq!(
        config.storage.get("scriptle:toons:2026-10-15").map(String::as_str),
        Some("{\"attempts\":1}")
    );

    handler.handle(&who, WebviewMessage::StorageClear);
    let replies = handler.handle(&who, WebviewMessage::Ready);
    let AppMessage::PuzzleConfig(config) = &replies[0] else {
        panic!("expected puzzle config");
    };
    assert!(config.storage.is_empty());
}

#[test]
fn shared_results_land_on_the_post() {
    let (handler, store) = handler();
    let share = WebviewMessage::ShareResults(ShareResults {
        share_text: "Scriptle Toon Town 2026-10-15 1/5\n🎬🟩 🎭🟩".into(),
    });
    assert!(handler
        .handle(&ctx(Some("u1"), Some("t3_p"), None), share)
        .is_empty());
    let comments = KvCommentLog::new(store).comments("t3_p").unwrap();
    assert!(comments["u1"].starts_with("Scriptle Toon Town"));
}

#[derive(Clone, Default)]
struct FailingSink {
    calls: Arc<Mutex<u32>>,
}

impl CommentSink for FailingSink {
    fn submit_comment(&self, _: &str, _: Option<&str>, _: &str) -> Result<(), StorageError> {
        *self.calls.lock().unwrap() += 1;
        Err(StorageError::InvalidCounter("comments".into()))
    }
}

#[test]
fn comment_failures_do_not_reach_the_webview() {
    let sink = FailingSink::default();
    let handler = AppHandler::with_comment_sink(
        KvStore::temporary().unwrap(),
        &AppConfig::default(),
        Box::new(sink.clone()),
    );
    let share = WebviewMessage::ShareResults(ShareResults {
        share_text: "x".into(),
    });
    assert!(handler.handle(&ctx(None, Some("t3_p"), None), share).is_empty());
    assert_eq!(*sink.calls.lock().unwrap(), 1);
}
