//! JSON-lines service loop.
//!
//! Each input line is an [`Envelope`]; each reply is written as one JSON line.
//! A one-second tick drives the daily post job. The loop ends on EOF or Ctrl-C.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::protocol::Envelope;
use super::scheduler::DailyPostScheduler;
use super::AppHandler;
use crate::logutil::escape_log;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub handled: u64,
    pub rejected: u64,
    pub replies: u64,
}

pub struct Service {
    handler: AppHandler,
    scheduler: Option<DailyPostScheduler>,
}

impl Service {
    pub fn new(handler: AppHandler, scheduler: Option<DailyPostScheduler>) -> Self {
        Self { handler, scheduler }
    }

    pub fn handler(&self) -> &AppHandler {
        &self.handler
    }

    /// Parse one input line and return the reply lines. Malformed input yields
    /// `None`.
    pub fn process_line(&self, line: &str) -> Option<Vec<String>> {
        let envelope: Envelope = match serde_json::from_str(line) {
            Ok(env) => env,
            Err(e) => {
                warn!("skipping malformed message ({}): {}", e, escape_log(line));
                return None;
            }
        };
        let replies = self.handler.handle(&envelope.context, envelope.message);
        let mut out = Vec::with_capacity(replies.len());
        for reply in replies {
            match serde_json::to_string(&reply) {
                Ok(json) => out.push(json),
                Err(e) => warn!("dropping unserializable reply: {}", e),
            }
        }
        Some(out)
    }

    fn tick(&mut self) {
        if let Some(job) = self.scheduler.as_mut() {
            if let Err(e) = job.check_and_post(self.handler.posts(), Utc::now()) {
                debug!("daily job error: {}", e);
            }
        }
    }

    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> Result<ServeSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut summary = ServeSummary::default();
        let mut lines = reader.lines();
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!("service loop started");
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(),

                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("input closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match self.process_line(&line) {
                        Some(replies) => {
                            summary.handled += 1;
                            for reply in replies {
                                writer.write_all(reply.as_bytes()).await?;
                                writer.write_all(b"\n").await?;
                                summary.replies += 1;
                            }
                            writer.flush().await?;
                        }
                        None => summary.rejected += 1,
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        info!(
            "service loop stopped: {} handled, {} rejected, {} replies",
            summary.handled, summary.rejected, summary.replies
        );
        Ok(summary)
    }
}
