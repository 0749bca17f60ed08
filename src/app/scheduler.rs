//! Daily post job.
//!
//! Checked from the service loop's one-second tick instead of an OS cron. Once
//! the configured UTC hour is reached, each scheduled pack gets its post for
//! the current UTC date. Post creation is idempotent per `(pack, date)`, so a
//! restart inside the posting hour cannot double-post. After a failed run the
//! job waits [`RETRY_AFTER_SECS`] before trying again.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use log::{debug, info, warn};

use super::posts::{DailyPost, PostStore};
use crate::config::{Config, SchedulerConfig};
use crate::storage::StorageError;

/// Wait between attempts after a failed run.
pub const RETRY_AFTER_SECS: i64 = 300;

pub struct DailyPostScheduler {
    enabled: bool,
    post_hour: u32,
    packs: Vec<String>,
    last_posted: Option<NaiveDate>,
    last_failure: Option<DateTime<Utc>>,
}

impl DailyPostScheduler {
    pub fn new(config: &SchedulerConfig, packs: Vec<String>) -> Self {
        Self {
            enabled: config.enabled,
            post_hour: config.post_hour(),
            packs,
            last_posted: None,
            last_failure: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.scheduler, config.scheduled_packs())
    }

    pub fn packs(&self) -> &[String] {
        &self.packs
    }

    pub fn last_posted(&self) -> Option<NaiveDate> {
        self.last_posted
    }

    fn is_due(&self, now: &DateTime<Utc>) -> bool {
        self.enabled
            && now.hour() >= self.post_hour
            && self.last_posted != Some(now.date_naive())
    }

    fn backing_off(&self, now: &DateTime<Utc>) -> bool {
        self.last_failure
            .is_some_and(|failed| *now < failed + Duration::seconds(RETRY_AFTER_SECS))
    }

    /// Create today's posts if due. Returns the posts touched this call; empty
    /// when nothing was due.
    pub fn check_and_post(
        &mut self,
        posts: &PostStore,
        now: DateTime<Utc>,
    ) -> Result<Vec<DailyPost>, StorageError> {
        if !self.is_due(&now) {
            return Ok(Vec::new());
        }
        if self.backing_off(&now) {
            debug!("daily job backing off after a failure");
            return Ok(Vec::new());
        }
        let date = now.date_naive().format("%Y-%m-%d").to_string();
        let mut done = Vec::with_capacity(self.packs.len());
        for pack in &self.packs {
            match posts.create_daily_post(pack, &date) {
                Ok(post) => done.push(post),
                Err(e) => {
                    warn!(
                        "daily post for {} {} failed, retrying in {}s: {}",
                        pack, date, RETRY_AFTER_SECS, e
                    );
                    self.last_failure = Some(now);
                    return Err(e);
                }
            }
        }
        self.last_posted = Some(now.date_naive());
        self.last_failure = None;
        let created = done.iter().filter(|p| p.created).count();
        if created > 0 {
            info!("daily job for {}: {} post(s) created", date, created);
        }
        Ok(done)
    }
}
