//! # Puzzle Module - Packs, Scripts and Daily Puzzles
//!
//! On-disk layout under the puzzle data directory:
//!
//! ```text
//! data/
//! ├── packs/<pack>.json          ← pack definition (movies, theme, tier messages)
//! ├── scripts/<movie>.json       ← dialogue lines per movie
//! ├── daily/<pack>/<date>.json   ← generated daily puzzles
//! ├── daily/<pack>/manifest.json
//! └── daily-all/<date>.json      ← every pack's puzzle for one date
//! ```
//!
//! - [`rng`] - string hash and mulberry32, shared with the webview
//! - [`generator`] - daily puzzle, manifest, consolidated and themes output
//! - [`pack`] - pack creation and character coverage analysis

pub mod generator;
pub mod pack;
pub mod rng;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::{Answer, TierMessages};

pub const PUZZLE_VERSION: u32 = 1;
/// Lines of context shown after the target line.
pub const CONTEXT_AFTER: usize = 3;

#[derive(Debug, Error)]
pub enum PuzzleError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pack '{0}' has no lines spoken by significant characters")]
    NoCandidates(String),

    #[error("invalid date '{0}' (expected YYYY-MM-DD)")]
    InvalidDate(String),
}

/// Read and parse a JSON file, naming the file in any error.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, PuzzleError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PuzzleError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| PuzzleError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Write pretty JSON with a trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PuzzleError> {
    let io_err = |source| PuzzleError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut body = serde_json::to_string_pretty(value).map_err(|source| PuzzleError::Json {
        path: path.display().to_string(),
        source,
    })?;
    body.push('\n');
    std::fs::write(path, body).map_err(io_err)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueLine {
    pub character: String,
    pub text: String,
}

/// One movie's parsed script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Script {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub lines: Vec<DialogueLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_speaking_cast: Option<Vec<String>>,
    /// Older scripts name the same list `topCast`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_cast: Option<Vec<String>>,
}

/// Share of all lines the speaking cast should cover.
const SPEAKING_SHARE: f64 = 0.85;
const SPEAKING_MIN: usize = 5;
const SPEAKING_MAX: usize = 15;

impl Script {
    /// Characters whose lines may be chosen as a target.
    pub fn significant_cast(&self) -> &[String] {
        self.top_speaking_cast
            .as_deref()
            .or(self.top_cast.as_deref())
            .unwrap_or(&[])
    }

    /// Rank speakers by line count (ties by name) and take the smallest prefix
    /// covering 85% of the dialogue, with at least 5 and at most 15 names.
    /// Anyone else with at least `max(3, 3% of lines)` lines is appended.
    pub fn derive_speaking_cast(&self) -> Vec<String> {
        let total = self.lines.len();
        if total == 0 {
            return Vec::new();
        }
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for line in &self.lines {
            *counts.entry(line.character.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut cast: Vec<String> = Vec::new();
        let mut covered = 0;
        for (character, count) in &ranked {
            covered += count;
            cast.push(character.to_string());
            if covered as f64 / total as f64 >= SPEAKING_SHARE && cast.len() >= SPEAKING_MIN {
                break;
            }
            if cast.len() >= SPEAKING_MAX {
                break;
            }
        }

        let frequent = std::cmp::max(3, total * 3 / 100);
        for (character, count) in &ranked {
            if *count >= frequent && !cast.iter().any(|c| c == character) {
                cast.push(character.to_string());
            }
        }
        cast
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackType {
    /// Sequels of one franchise.
    Series,
    /// A themed group of unrelated movies.
    Collection,
}

/// CSS variable values for a pack. Unknown keys are carried through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub primary: String,
    pub bg_color: String,
    pub container_bg: String,
    pub accent_color: String,
    pub btn_text: String,
    pub card_gradient_start: String,
    pub card_gradient_end: String,
    pub card_border: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary: "#1976d2".to_string(),
            bg_color: "#0d47a1".to_string(),
            container_bg: "#ffffff".to_string(),
            accent_color: "#1565c0".to_string(),
            btn_text: "white".to_string(),
            card_gradient_start: "#1976d2".to_string(),
            card_gradient_end: "#1565c0".to_string(),
            card_border: "#1976d2".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pack_type: PackType,
    pub movies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_messages: Option<TierMessages>,
}

impl Pack {
    pub fn tier_messages(&self) -> TierMessages {
        self.tier_messages.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLine {
    pub character: String,
    pub text: String,
    pub movie: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleLines {
    pub target_line: TargetLine,
    pub context_before: Option<DialogueLine>,
    pub context_after: Vec<DialogueLine>,
}

/// Choices offered to the player, derived from the pack's scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleMetadata {
    pub movies: Vec<String>,
    pub movie_years: BTreeMap<String, i32>,
    pub movie_titles: BTreeMap<String, String>,
    pub movie_posters: BTreeMap<String, String>,
    pub characters_by_movie: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPuzzle {
    pub version: u32,
    pub date: String,
    pub pack_id: String,
    pub puzzle: PuzzleLines,
    pub metadata: PuzzleMetadata,
}

impl DailyPuzzle {
    pub fn load(data_dir: &Path, pack_id: &str, date: &str) -> Result<Self, PuzzleError> {
        read_json(&daily_path(data_dir, pack_id, date))
    }

    /// The movie (by title and id) and character the player must name.
    pub fn answer(&self) -> Answer {
        let target = &self.puzzle.target_line;
        let ids = self
            .metadata
            .movie_titles
            .iter()
            .filter(|(_, title)| **title == target.movie)
            .map(|(id, _)| id.clone());
        Answer::new(&target.movie, ids, &target.character)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub pack_id: String,
    pub pack_name: String,
    pub generated_at: String,
    pub date_range: DateRange,
    pub total_puzzles: u32,
    pub cycle_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_messages: Option<TierMessages>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedDay {
    pub date: String,
    pub puzzles: BTreeMap<String, DailyPuzzle>,
    pub manifests: BTreeMap<String, Manifest>,
}

pub fn pack_path(data_dir: &Path, pack_id: &str) -> std::path::PathBuf {
    data_dir.join("packs").join(format!("{}.json", pack_id))
}

pub fn script_path(data_dir: &Path, movie_id: &str) -> std::path::PathBuf {
    data_dir.join("scripts").join(format!("{}.json", movie_id))
}

pub fn daily_path(data_dir: &Path, pack_id: &str, date: &str) -> std::path::PathBuf {
    data_dir
        .join("daily")
        .join(pack_id)
        .join(format!("{}.json", date))
}

pub fn load_pack(data_dir: &Path, pack_id: &str) -> Result<Pack, PuzzleError> {
    read_json(&pack_path(data_dir, pack_id))
}

/// Ids of every pack file, sorted.
pub fn list_packs(data_dir: &Path) -> Result<Vec<String>, PuzzleError> {
    let dir = data_dir.join("packs");
    let entries = std::fs::read_dir(&dir).map_err(|source| PuzzleError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let mut ids: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    ids.sort();
    Ok(ids)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(date: &str) -> Result<chrono::NaiveDate, PuzzleError> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| PuzzleError::InvalidDate(date.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_with(counts: &[(&str, usize)]) -> Script {
        let mut lines = Vec::new();
        for (character, n) in counts {
            for i in 0..*n {
                lines.push(DialogueLine {
                    character: character.to_string(),
                    text: format!("line {}", i),
                });
            }
        }
        Script {
            lines,
            ..Script::default()
        }
    }

    #[test]
    fn speaking_cast_stops_at_share_and_breaks_ties_by_name() {
        let script = script_with(&[
            ("ALICE", 10),
            ("BOB", 8),
            ("CAROL", 6),
            ("DAVE", 4),
            ("ZED", 3),
            ("YAN", 3),
            ("EXTRA", 2),
            ("WAITER", 1),
        ]);
        assert_eq!(
            script.derive_speaking_cast(),
            vec!["ALICE", "BOB", "CAROL", "DAVE", "YAN", "ZED"]
        );
    }

    #[test]
    fn speaking_cast_keeps_at_least_five() {
        let script = script_with(&[("LEAD", 20), ("A", 1), ("B", 1), ("C", 1), ("D", 1), ("E", 1)]);
        assert_eq!(script.derive_speaking_cast(), vec!["LEAD", "A", "B", "C", "D"]);
        assert!(Script::default().derive_speaking_cast().is_empty());
    }

    #[test]
    fn speaking_cast_appends_frequent_speakers() {
        let names: Vec<String> = (0..16).map(|i| format!("C{:02}", i)).collect();
        let counts: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 3)).collect();
        let cast = script_with(&counts).derive_speaking_cast();
        assert_eq!(cast.len(), 16);
        assert_eq!(cast.last().map(String::as_str), Some("C15"));

        let names: Vec<String> = (0..20).map(|i| format!("M{:02}", i)).collect();
        let counts: Vec<(&str, usize)> = names.iter().map(|n| (n.as_str(), 2)).collect();
        assert_eq!(script_with(&counts).derive_speaking_cast().len(), 15);
    }

    #[test]
    fn script_prefers_top_speaking_cast() {
        let script: Script = serde_json::from_str(
            r#"{"title":"X","lines":[],"topSpeakingCast":["A"],"topCast":["B"]}"#,
        )
        .unwrap();
        assert_eq!(script.significant_cast(), ["A".to_string()]);
        let legacy: Script = serde_json::from_str(r#"{"title":"X","topCast":["B"]}"#).unwrap();
        assert_eq!(legacy.significant_cast(), ["B".to_string()]);
    }

    #[test]
    fn theme_keeps_unknown_keys() {
        let theme: Theme = serde_json::from_str(
            r##"{"primary":"#000","bgColor":"#111","containerBg":"#222","accentColor":"#333",
                "btnText":"white","cardGradientStart":"#444","cardGradientEnd":"#555",
                "cardBorder":"#666","fontFamily":"serif"}"##,
        )
        .unwrap();
        assert_eq!(theme.extra.get("fontFamily"), Some(&serde_json::json!("serif")));
        let back = serde_json::to_value(&theme).unwrap();
        assert_eq!(back["fontFamily"], "serif");
        assert_eq!(back["bgColor"], "#111");
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(parse_date("2026-10-15").is_ok());
        assert!(parse_date("10/15/2026").is_err());
    }
}
