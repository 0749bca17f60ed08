//! # Game Module - Per-Puzzle Guess State
//!
//! A puzzle asks for two things about one line of dialogue: the **movie** and
//! the **character** who says it. Each dimension locks once it has been guessed
//! correctly. A game ends when both are locked (a win) or after
//! [`MAX_ATTEMPTS`] guesses (a loss).
//!
//! ```rust
//! use scriptle::game::{Answer, GameState, Guess};
//!
//! let answer = Answer::new("Shrek", ["shrek-1"], "DONKEY");
//! let mut state = GameState::new();
//! let outcome = state
//!     .submit_guess(&answer, &Guess::new(Some("shrek-1"), Some("SHREK")))
//!     .unwrap();
//! assert!(outcome.movie_correct);
//! assert!(!outcome.character_correct);
//! assert!(state.movie_locked);
//! ```
//!
//! State is serialized with the field names the webview keeps in local storage
//! (`movieLocked`, `guessStats`, ...) and persisted through [`store::GameStore`].

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::Bucket;

pub const STATE_VERSION: u32 = 1;
pub const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("the game is already over")]
    GameOver,

    /// Nothing was selected for any dimension that is still open.
    #[error("select a movie or a character before guessing")]
    EmptySelection,
}

/// Correctness of one submitted guess, per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessStat {
    pub movie: bool,
    #[serde(rename = "char")]
    pub character: bool,
}

/// Persisted progress for one `(pack, date)` puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub version: u32,
    pub attempts: u32,
    pub movie_locked: bool,
    pub character_locked: bool,
    #[serde(default)]
    pub guess_stats: Vec<GuessStat>,
    pub game_over: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// The correct movie and character for a puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub movie_title: String,
    /// Ids that refer to the target movie (usually one).
    pub movie_ids: Vec<String>,
    pub character: String,
}

impl Answer {
    pub fn new<I, S>(movie_title: &str, movie_ids: I, character: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            movie_title: movie_title.to_string(),
            movie_ids: movie_ids.into_iter().map(Into::into).collect(),
            character: character.to_string(),
        }
    }

    pub fn matches_movie(&self, selection: &str) -> bool {
        let wanted = normalize(selection);
        normalize(&self.movie_title) == wanted
            || self.movie_ids.iter().any(|id| normalize(id) == wanted)
    }

    pub fn matches_character(&self, selection: &str) -> bool {
        normalize(&self.character) == normalize(selection)
    }
}

/// A selection that still counts: non-blank and for an unlocked dimension.
fn open_pick(pick: Option<&str>, locked: bool) -> Option<&str> {
    pick.map(str::trim).filter(|p| !locked && !p.is_empty())
}

fn normalize(s: &str) -> String {
    s.trim().to_uppercase()
}

/// A player's selection. Blank strings count as no selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guess {
    movie: Option<String>,
    character: Option<String>,
}

impl Guess {
    pub fn new(movie: Option<&str>, character: Option<&str>) -> Self {
        let clean = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            movie: clean(movie),
            character: clean(character),
        }
    }

    pub fn movie(&self) -> Option<&str> {
        self.movie.as_deref()
    }

    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }
}

/// Result of an accepted guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessOutcome {
    pub movie_correct: bool,
    pub character_correct: bool,
    pub attempts: u32,
    pub game_over: bool,
    pub success: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            attempts: 0,
            movie_locked: false,
            character_locked: false,
            guess_stats: Vec::new(),
            game_over: false,
            success: false,
            completed_at: None,
        }
    }

    /// Apply one guess. Rejected guesses leave the state untouched.
    pub fn submit_guess(&mut self, answer: &Answer, guess: &Guess) -> Result<GuessOutcome, GameError> {
        if self.game_over {
            return Err(GameError::GameOver);
        }
        let movie_pick = open_pick(guess.movie(), self.movie_locked);
        let character_pick = open_pick(guess.character(), self.character_locked);
        if movie_pick.is_none() && character_pick.is_none() {
            return Err(GameError::EmptySelection);
        }

        let movie_correct =
            self.movie_locked || movie_pick.is_some_and(|m| answer.matches_movie(m));
        let character_correct =
            self.character_locked || character_pick.is_some_and(|c| answer.matches_character(c));

        self.movie_locked = movie_correct;
        self.character_locked = character_correct;
        self.attempts += 1;
        self.guess_stats.push(GuessStat {
            movie: movie_correct,
            character: character_correct,
        });

        let solved = self.movie_locked && self.character_locked;
        if solved || self.attempts >= MAX_ATTEMPTS {
            self.game_over = true;
            self.success = solved;
            self.completed_at = Some(Utc::now());
        }

        Ok(GuessOutcome {
            movie_correct,
            character_correct,
            attempts: self.attempts,
            game_over: self.game_over,
            success: self.success,
        })
    }

    pub fn attempts_left(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.attempts)
    }

    /// Bucket of a finished game; `None` while still in progress.
    pub fn bucket(&self) -> Option<Bucket> {
        if !self.game_over {
            return None;
        }
        Bucket::from_result(self.success, self.attempts)
    }

    /// Structural checks applied to state loaded from storage.
    pub fn is_consistent(&self) -> bool {
        let solved = self.movie_locked && self.character_locked;
        self.version == STATE_VERSION
            && self.attempts as usize == self.guess_stats.len()
            && self.attempts <= MAX_ATTEMPTS
            && (!self.success || (self.game_over && solved))
            && (!self.game_over || self.attempts >= 1)
            && self.game_over == (solved || self.attempts >= MAX_ATTEMPTS)
    }

    /// Emoji grid for sharing, one row per guess.
    pub fn share_text(&self, pack_name: &str, date: &str) -> String {
        let score = if self.success {
            format!("{}/{}", self.attempts, MAX_ATTEMPTS)
        } else {
            format!("X/{}", MAX_ATTEMPTS)
        };
        let mut out = format!("Scriptle {} {} {}", pack_name, date, score);
        for stat in &self.guess_stats {
            out.push('\n');
            out.push_str("🎬");
            out.push_str(square(stat.movie));
            out.push_str(" 🎭");
            out.push_str(square(stat.character));
        }
        out
    }
}

fn square(correct: bool) -> &'static str {
    if correct {
        "🟩"
    } else {
        "🟥"
    }
}

/// Result-screen messages a pack can customise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMessages {
    pub perfect: String,
    pub good: String,
    pub average: String,
    pub barely: String,
    pub failure: String,
}

impl Default for TierMessages {
    fn default() -> Self {
        Self {
            perfect: "Perfect!".to_string(),
            good: "Great job!".to_string(),
            average: "Not bad!".to_string(),
            barely: "Almost there!".to_string(),
            failure: "Better luck next time!".to_string(),
        }
    }
}

impl TierMessages {
    pub fn for_bucket(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::One => &self.perfect,
            Bucket::Two => &self.good,
            Bucket::Three => &self.average,
            Bucket::Four | Bucket::Five => &self.barely,
            Bucket::Fail => &self.failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_selections_never_cost_an_attempt() {
        let answer = Answer::new("Toon Town", ["toon-1"], "ALICE");
        let mut state = GameState::new();
        let raw = Guess {
            movie: Some(" \t".to_string()),
            character: Some(String::new()),
        };
        assert_eq!(state.submit_guess(&answer, &raw), Err(GameError::EmptySelection));
        assert_eq!(state.attempts, 0);

        let padded = Guess {
            movie: Some("  toon-1 ".to_string()),
            character: None,
        };
        assert!(state.submit_guess(&answer, &padded).unwrap().movie_correct);
        assert_eq!(Guess::new(Some(" "), Some(" BOB ")).character(), Some("BOB"));
        assert_eq!(Guess::new(Some(" "), None).movie(), None);
    }

    fn answer() -> Answer {
        Answer::new("Shrek", ["shrek-1"], "DONKEY")
    }

    #[test]
    fn serializes_with_storage_field_names() {
        let mut state = GameState::new();
        state
            .submit_guess(&answer(), &Guess::new(Some("Shrek"), Some("FIONA")))
            .unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["movieLocked"], true);
        assert_eq!(json["characterLocked"], false);
        assert_eq!(json["guessStats"][0]["char"], false);
        assert_eq!(json["guessStats"][0]["movie"], true);
        assert!(json.get("completedAt").is_none());
    }

    #[test]
    fn comparison_ignores_case_and_padding() {
        let a = answer();
        assert!(a.matches_movie("  shrek "));
        assert!(a.matches_movie("SHREK-1"));
        assert!(a.matches_character("donkey"));
        assert!(!a.matches_character("donkey 2"));
    }

    #[test]
    fn blank_selections_are_empty() {
        let guess = Guess::new(Some("   "), None);
        assert_eq!(guess, Guess::default());
    }

    #[test]
    fn tier_messages_cover_every_bucket() {
        let tiers = TierMessages::default();
        assert_eq!(tiers.for_bucket(Bucket::One), "Perfect!");
        assert_eq!(tiers.for_bucket(Bucket::Five), "Almost there!");
        assert_eq!(tiers.for_bucket(Bucket::Fail), "Better luck next time!");
    }

    #[test]
    fn share_text_marks_failures() {
        let mut state = GameState::new();
        for _ in 0..MAX_ATTEMPTS {
            state
                .submit_guess(&answer(), &Guess::new(Some("Cars"), Some("MATER")))
                .unwrap();
        }
        let text = state.share_text("Shrek", "2026-10-15");
        assert!(text.starts_with("Scriptle Shrek 2026-10-15 X/5"));
        assert_eq!(text.lines().count(), 6);
    }
}
