//! Community statistics: deduplicated completion counting and percentile rank.
//!
//! Every finished puzzle lands in exactly one [`Bucket`]. The first completion
//! of a `(user, pack, date)` triple increments the bucket counter and the total
//! in the global scope and, when the post's community is known, in that
//! community's scope. Repeats are no-ops for counting but still read back the
//! current numbers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::game::MAX_ATTEMPTS;
use crate::logutil::escape_log;
use crate::storage::{key_component, KvStore, StorageError};

/// Number of attempts needed to win, or a failure. Ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "fail")]
    Fail,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::One,
        Bucket::Two,
        Bucket::Three,
        Bucket::Four,
        Bucket::Five,
        Bucket::Fail,
    ];

    /// Classify a finished game. A win needs 1..=5 attempts and a loss means
    /// every attempt was used. Anything else is rejected.
    pub fn from_result(won: bool, attempts: u32) -> Option<Self> {
        if !won {
            return (attempts == MAX_ATTEMPTS).then_some(Bucket::Fail);
        }
        match attempts {
            1 => Some(Bucket::One),
            2 => Some(Bucket::Two),
            3 => Some(Bucket::Three),
            4 => Some(Bucket::Four),
            5 => Some(Bucket::Five),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::One => "1",
            Bucket::Two => "2",
            Bucket::Three => "3",
            Bucket::Four => "4",
            Bucket::Five => "5",
            Bucket::Fail => "fail",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.as_str() == s)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Count per bucket for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Bucket, u64>", into = "BTreeMap<Bucket, u64>")]
pub struct Distribution {
    counts: [u64; 6],
}

impl Distribution {
    pub fn get(&self, bucket: Bucket) -> u64 {
        self.counts[bucket.index()]
    }

    pub fn set(&mut self, bucket: Bucket, count: u64) {
        self.counts[bucket.index()] = count;
    }

    pub fn sum(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Players who did strictly worse than `bucket`.
    pub fn worse_than(&self, bucket: Bucket) -> u64 {
        self.counts[bucket.index() + 1..].iter().sum()
    }
}

impl From<BTreeMap<Bucket, u64>> for Distribution {
    fn from(map: BTreeMap<Bucket, u64>) -> Self {
        let mut dist = Distribution::default();
        for (bucket, count) in map {
            dist.set(bucket, count);
        }
        dist
    }
}

impl From<Distribution> for BTreeMap<Bucket, u64> {
    fn from(dist: Distribution) -> Self {
        Bucket::ALL
            .into_iter()
            .filter(|b| dist.get(*b) > 0)
            .map(|b| (b, dist.get(b)))
            .collect()
    }
}

/// `round((worse + 0.5 * same) / total * 100)`; `None` for an empty scope.
pub fn percentile(dist: &Distribution, total: u64, bucket: Bucket) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let worse = dist.worse_than(bucket) as f64;
    let same = dist.get(bucket) as f64;
    let pct = ((worse + 0.5 * same) / total as f64 * 100.0).round();
    Some(pct.clamp(0.0, 100.0) as u8)
}

/// Numbers for one scope as shown to a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeStats {
    pub distribution: Distribution,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub bucket: Bucket,
    pub global: ScopeStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community: Option<ScopeStats>,
}

/// What the dedup marker remembers about the counted completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub won: bool,
    pub attempts: u32,
    pub bucket: Bucket,
    pub recorded_at: DateTime<Utc>,
}

/// Which counters a completion feeds.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    Global,
    Community(&'a str),
}

impl Scope<'_> {
    fn prefix(&self, pack: &str, date: &str) -> String {
        match self {
            Scope::Global => format!(
                "stats:global:{}:{}",
                key_component(pack),
                key_component(date)
            ),
            Scope::Community(name) => format!(
                "stats:sub:{}:{}:{}",
                key_component(name),
                key_component(pack),
                key_component(date)
            ),
        }
    }
}

pub fn dist_key(community: Option<&str>, pack: &str, date: &str) -> String {
    format!("{}:dist", scope_of(community).prefix(pack, date))
}

pub fn total_key(community: Option<&str>, pack: &str, date: &str) -> String {
    format!("{}:total", scope_of(community).prefix(pack, date))
}

pub fn submitted_key(user: &str, pack: &str, date: &str) -> String {
    format!(
        "user:{}:submitted:{}:{}",
        key_component(user),
        key_component(pack),
        key_component(date)
    )
}

fn scope_of(community: Option<&str>) -> Scope<'_> {
    match community {
        Some(name) => Scope::Community(name),
        None => Scope::Global,
    }
}

/// The marker is already written when a counter update fails, so a retry will
/// not count the completion again. The counters need manual repair.
fn orphaned_marker_message(marker_key: &str, counter_key: &str, e: &StorageError) -> String {
    format!(
        "completion marker {} written but counter {} was not updated: {}",
        escape_log(marker_key),
        escape_log(counter_key),
        e
    )
}

/// Records completions and reads distributions from the hosted store.
#[derive(Clone)]
pub struct StatsAggregator {
    store: KvStore,
}

impl StatsAggregator {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Count a completion once per `(user, pack, date)`. Returns `true` when
    /// this call incremented the counters.
    pub fn record_completion(
        &self,
        user: &str,
        community: Option<&str>,
        pack: &str,
        date: &str,
        bucket: Bucket,
        attempts: u32,
    ) -> Result<bool, StorageError> {
        let marker = Submission {
            won: bucket != Bucket::Fail,
            attempts,
            bucket,
            recorded_at: Utc::now(),
        };
        let encoded = bincode::serialize(&marker)?;
        let marker_key = submitted_key(user, pack, date);
        if !self.store.set_nx(&marker_key, &encoded)? {
            debug!(
                "completion already counted for user={} pack={} date={}",
                escape_log(user),
                escape_log(pack),
                date
            );
            return Ok(false);
        }

        let mut scopes = vec![None];
        if let Some(name) = community {
            scopes.push(Some(name));
        }
        for scope in scopes {
            let dist = dist_key(scope, pack, date);
            if let Err(e) = self.store.hincr_by(&dist, bucket.as_str(), 1) {
                error!("{}", orphaned_marker_message(&marker_key, &dist, &e));
                return Err(e);
            }
            let total = total_key(scope, pack, date);
            if let Err(e) = self.store.incr_by(&total, 1) {
                error!("{}", orphaned_marker_message(&marker_key, &total, &e));
                return Err(e);
            }
        }
        self.store.flush()?;
        info!(
            "counted completion pack={} date={} bucket={} community={}",
            escape_log(pack),
            date,
            bucket,
            community.map(escape_log).unwrap_or_else(|| "-".to_string())
        );
        Ok(true)
    }

    pub fn submission(
        &self,
        user: &str,
        pack: &str,
        date: &str,
    ) -> Result<Option<Submission>, StorageError> {
        match self.store.get_bytes(&submitted_key(user, pack, date))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Distribution and total for one scope.
    pub fn scope(
        &self,
        community: Option<&str>,
        pack: &str,
        date: &str,
    ) -> Result<(Distribution, u64), StorageError> {
        let raw = self
            .store
            .hgetall_counters(&dist_key(community, pack, date))?;
        let mut dist = Distribution::default();
        for (field, count) in raw {
            match Bucket::parse(&field) {
                Some(bucket) => dist.set(bucket, count),
                None => debug!("ignoring unknown bucket field '{}'", escape_log(&field)),
            }
        }
        let total = self.store.counter(&total_key(community, pack, date))?;
        Ok((dist, total))
    }

    pub fn read(
        &self,
        community: Option<&str>,
        pack: &str,
        date: &str,
        bucket: Bucket,
    ) -> Result<StatsSnapshot, StorageError> {
        let global = self.scope_stats(None, pack, date, bucket)?;
        let community = match community {
            Some(name) => Some(self.scope_stats(Some(name), pack, date, bucket)?),
            None => None,
        };
        Ok(StatsSnapshot {
            bucket,
            global,
            community,
        })
    }

    fn scope_stats(
        &self,
        community: Option<&str>,
        pack: &str,
        date: &str,
        bucket: Bucket,
    ) -> Result<ScopeStats, StorageError> {
        let (distribution, total) = self.scope(community, pack, date)?;
        let percentile = percentile(&distribution, total, bucket);
        Ok(ScopeStats {
            distribution,
            total,
            percentile,
        })
    }
}
