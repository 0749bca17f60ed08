//! # Scriptle - Daily Movie Quote Game
//!
//! Scriptle shows a line of movie dialogue each day. Players name the movie and
//! the character who says it, with five attempts. Puzzles are grouped into
//! packs (a franchise or a themed collection), and every pack gets its own
//! puzzle per day, chosen deterministically from the date.
//!
//! ## Features
//!
//! - **Deterministic Puzzles**: A seeded generator picks each day's line, so
//!   regenerating a date always yields the same puzzle.
//! - **Game State**: Per-dimension locking, five attempts, share text, and
//!   fail-open local persistence of progress.
//! - **Community Stats**: Idempotent completion counting with global and
//!   per-community distributions and percentiles.
//! - **App Server**: JSON message handling for the embedded webview, with a
//!   daily post job for scheduled packs.
//! - **Pack Tooling**: Pack creation and character coverage reports.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scriptle::app::{server::Service, AppHandler};
//! use scriptle::config::Config;
//! use scriptle::storage::KvStore;
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("scriptle.toml").await?;
//!     let store = KvStore::open(&config.storage.db_path)?;
//!     let mut service = Service::new(AppHandler::new(store, &config.app), None);
//!     service
//!         .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - guess state machine and local progress storage
//! - [`puzzle`] - data formats, daily selection and pack tooling
//! - [`stats`] - completion buckets, distributions and percentiles
//! - [`app`] - webview protocol, handler, daily posts and service loop
//! - [`storage`] - sled-backed key-value store
//! - [`config`] - configuration loading
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐      ┌─────────────────┐
//! │   Generator     │ ───▶ │  daily/*.json   │ ← static puzzle files
//! └─────────────────┘      └─────────────────┘
//!                                   │
//! ┌─────────────────┐      ┌─────────────────┐
//! │   App Server    │ ◀──▶ │    Webview      │ ← GameState + local storage
//! └─────────────────┘      └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │   KvStore       │ ← stats counters, posts, mirrored storage
//! └─────────────────┘
//! ```

pub mod app;
pub mod config;
pub mod game;
pub mod logutil;
pub mod puzzle;
pub mod stats;
pub mod storage;
