//! Messages exchanged between the game webview and the app server.
//!
//! Both directions use `{"type": "...", "data": {...}}`; messages without a
//! payload omit `data`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stats::StatsSnapshot;

/// Webview → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebviewMessage {
    /// The webview has loaded and wants its puzzle.
    Ready,
    GameComplete(GameComplete),
    /// Mirror one local-storage entry server-side.
    StorageSet(StorageSet),
    /// Drop everything mirrored for this user.
    StorageClear,
    ShareResults(ShareResults),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameComplete {
    pub pack_id: String,
    pub date: String,
    pub won: bool,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSet {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResults {
    pub share_text: String,
}

/// Server → webview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppMessage {
    PuzzleConfig(PuzzleConfig),
    StatsUpdate(StatsUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleConfig {
    pub date: String,
    pub pack_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// The user's mirrored local-storage entries.
    #[serde(default)]
    pub storage: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsUpdate {
    pub stats: StatsSnapshot,
}

/// Who is asking, as supplied by the host for each invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub post_id: Option<String>,
    /// Subreddit the post lives in.
    #[serde(default, alias = "subreddit")]
    pub community: Option<String>,
}

/// One line of the service loop's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub context: RequestContext,
    pub message: WebviewMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_messages_parse_from_wire_format() {
        let ready: WebviewMessage = serde_json::from_str(r#"{"type":"READY"}"#).unwrap();
        assert_eq!(ready, WebviewMessage::Ready);

        let done: WebviewMessage = serde_json::from_str(
            r#"{"type":"GAME_COMPLETE","data":{"packId":"shrek","date":"2026-10-15","won":true,"attempts":3}}"#,
        )
        .unwrap();
        assert_eq!(
            done,
            WebviewMessage::GameComplete(GameComplete {
                pack_id: "shrek".into(),
                date: "2026-10-15".into(),
                won: true,
                attempts: 3,
            })
        );

        let share: WebviewMessage =
            serde_json::from_str(r#"{"type":"SHARE_RESULTS","data":{"shareText":"hi"}}"#).unwrap();
        assert!(matches!(share, WebviewMessage::ShareResults(s) if s.share_text == "hi"));
    }

    #[test]
    fn outbound_config_uses_camel_case() {
        let msg = AppMessage::PuzzleConfig(PuzzleConfig {
            date: "2026-10-15".into(),
            pack_id: "shrek".into(),
            user_id: None,
            storage: BTreeMap::new(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "PUZZLE_CONFIG");
        assert_eq!(json["data"]["packId"], "shrek");
        assert!(json["data"].get("userId").is_none());
    }

    #[test]
    fn envelope_context_accepts_subreddit_alias() {
        let env: Envelope = serde_json::from_str(
            r#"{"context":{"userId":"t2_a","subreddit":"movies"},"message":{"type":"STORAGE_CLEAR"}}"#,
        )
        .unwrap();
        assert_eq!(env.context.community.as_deref(), Some("movies"));
        assert_eq!(env.message, WebviewMessage::StorageClear);
    }
}
