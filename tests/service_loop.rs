//! JSON-lines service loop

use scriptle::app::server::Service;
use scriptle::app::AppHandler;
use scriptle::config::AppConfig;
use scriptle::storage::KvStore;
use tokio::io::BufReader;

fn service() -> Service {
    let store = KvStore::temporary().unwrap();
    Service::new(AppHandler::new(store, &AppConfig::default()), None)
}

#[tokio::test]
async fn answers_each_line_until_eof() {
    let input = concat!(
        r#"{"context":{"userId":"u1","subreddit":"movies"},"message":{"type":"GAME_COMPLETE","data":{"packId":"toons","date":"2026-10-15","won":true,"attempts":2}}}"#,
        "\n",
        "not json\n",
        "\n",
        r#"{"message":{"type":"READY"}}"#,
        "\n",
        r#"{"context":{"userId":"u1"},"message":{"type":"STORAGE_SET","data":{"key":"k","value":"v"}}}"#,
        "\n",
    );
    let mut out = Vec::new();
    let summary = service()
        .run(BufReader::new(input.as_bytes()), &mut out)
        .await
        .unwrap();

    assert_eq!(summary.handled, 3);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.replies, 2);

    let text = String::from_utf8(out).unwrap();
    let replies: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(replies[0]["type"], "STATS_UPDATE");
    assert_eq!(replies[0]["data"]["stats"]["bucket"], "2");
    assert_eq!(replies[0]["data"]["stats"]["community"]["total"], 1);
    assert_eq!(replies[1]["type"], "PUZZLE_CONFIG");
    assert_eq!(replies[1]["data"]["packId"], "shrek");
}

#[test]
fn process_line_rejects_unknown_types() {
    let service = service();
    assert!(service
        .process_line(r#"{"message":{"type":"LAUNCH_ROCKETS"}}"#)
        .is_none());
    let replies = service
        .process_line(r#"{"message":{"type":"STORAGE_CLEAR"}}"#)
        .unwrap();
    assert!(replies.is_empty());
}

#[test]
fn split_reads_are_reassembled() {
    let reader = tokio_test::io::Builder::new()
        .read(br#"{"message":{"type":"GAME_COMP"#)
        .read(br#"LETE","data":{"packId":"toons","date":"2026-10-15","won":false,"attempts":5}}}"#)
        .read(b"\n")
        .build();
    let mut out = Vec::new();
    let summary = tokio_test::block_on(service().run(BufReader::new(reader), &mut out)).unwrap();
    assert_eq!(summary.handled, 1);
    assert!(String::from_utf8(out).unwrap().contains(r#""bucket":"fail""#));
}
