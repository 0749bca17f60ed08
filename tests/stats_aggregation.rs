//! Completion counting and percentile reads against a sled store

use scriptle::stats::{Bucket, StatsAggregator};
use scriptle::storage::KvStore;
use tempfile::tempdir;

const PACK: &str = "toons";
const DATE: &str = "2026-10-15";

#[test]
fn repeated_completion_counts_once() {
    let tmp = tempdir().unwrap();
    let stats = StatsAggregator::new(KvStore::open(tmp.path().join("db")).unwrap());

    assert!(stats
        .record_completion("u1", Some("movies"), PACK, DATE, Bucket::Two, 2)
        .unwrap());
    assert!(!stats
        .record_completion("u1", Some("movies"), PACK, DATE, Bucket::One, 1)
        .unwrap());

    let (dist, total) = stats.scope(None, PACK, DATE).unwrap();
    assert_eq!(total, 1);
    assert_eq!(dist.get(Bucket::Two), 1);
    assert_eq!(dist.get(Bucket::One), 0);

    // The first result is the one remembered.
    let marker = stats.submission("u1", PACK, DATE).unwrap().unwrap();
    assert_eq!(marker.bucket, Bucket::Two);
    assert_eq!(marker.attempts, 2);
}

#[test]
fn community_scope_is_a_subset_of_global() {
    let tmp = tempdir().unwrap();
    let stats = StatsAggregator::new(KvStore::open(tmp.path().join("db")).unwrap());

    stats.record_completion("a", Some("movies"), PACK, DATE, Bucket::One, 1).unwrap();
    stats.record_completion("b", Some("films"), PACK, DATE, Bucket::Fail, 5).unwrap();
    stats.record_completion("c", None, PACK, DATE, Bucket::Three, 3).unwrap();

    let (_, global) = stats.scope(None, PACK, DATE).unwrap();
    let (movies_dist, movies) = stats.scope(Some("movies"), PACK, DATE).unwrap();
    let (_, films) = stats.scope(Some("films"), PACK, DATE).unwrap();
    assert_eq!(global, 3);
    assert_eq!(movies, 1);
    assert_eq!(films, 1);
    assert_eq!(movies_dist.get(Bucket::One), 1);
    assert_eq!(movies_dist.sum(), movies);
}

#[test]
fn snapshot_reports_percentiles_per_scope() {
    let tmp = tempdir().unwrap();
    let stats = StatsAggregator::new(KvStore::open(tmp.path().join("db")).unwrap());
    let results = [
        ("p1", Bucket::One),
        ("p2", Bucket::One),
        ("p3", Bucket::Two),
        ("p4", Bucket::Two),
        ("p5", Bucket::Two),
        ("p6", Bucket::Fail),
        ("p7", Bucket::Fail),
        ("p8", Bucket::Fail),
        ("p9", Bucket::Fail),
        ("p10", Bucket::Fail),
    ];
    for (user, bucket) in results {
        stats.record_completion(user, None, PACK, DATE, bucket, 2).unwrap();
    }

    let snapshot = stats.read(Some("movies"), PACK, DATE, Bucket::Two).unwrap();
    assert_eq!(snapshot.global.total, 10);
    assert_eq!(snapshot.global.percentile, Some(65));
    let community = snapshot.community.unwrap();
    assert_eq!(community.total, 0);
    assert_eq!(community.percentile, None);
}

#[test]
fn counters_survive_reopen() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("db");
    {
        let stats = StatsAggregator::new(KvStore::open(&path).unwrap());
        stats.record_completion("u1", None, PACK, DATE, Bucket::Four, 4).unwrap();
    }
    let stats = StatsAggregator::new(KvStore::open(&path).unwrap());
    assert!(!stats.record_completion("u1", None, PACK, DATE, Bucket::Four, 4).unwrap());
    assert_eq!(stats.scope(None, PACK, DATE).unwrap().1, 1);
}

#[test]
fn puzzles_are_counted_separately() {
    let tmp = tempdir().unwrap();
    let stats = StatsAggregator::new(KvStore::open(tmp.path().join("db")).unwrap());
    stats.record_completion("u1", None, PACK, DATE, Bucket::One, 1).unwrap();
    assert!(stats
        .record_completion("u1", None, PACK, "2026-10-16", Bucket::One, 1)
        .unwrap());
    assert!(stats
        .record_completion("u1", None, "pixar", DATE, Bucket::One, 1)
        .unwrap());
    assert_eq!(stats.scope(None, PACK, DATE).unwrap().1, 1);
}
