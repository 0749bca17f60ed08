//! Guess state machine properties

use scriptle::game::{Answer, GameError, GameState, Guess, MAX_ATTEMPTS};
use scriptle::stats::Bucket;

fn answer() -> Answer {
    Answer::new("Toon Town Returns", ["toon-2"], "DAVE")
}

fn guess(movie: Option<&str>, character: Option<&str>) -> Guess {
    Guess::new(movie, character)
}

#[test]
fn locked_dimensions_stay_locked() {
    let mut state = GameState::new();
    state
        .submit_guess(&answer(), &guess(Some("toon-2"), Some("ALICE")))
        .unwrap();
    assert!(state.movie_locked);

    // A wrong movie pick is ignored once the movie is locked.
    let outcome = state
        .submit_guess(&answer(), &guess(Some("toon-1"), Some("EVE")))
        .unwrap();
    assert!(outcome.movie_correct);
    assert!(!outcome.character_correct);
    assert!(state.movie_locked);
    assert_eq!(state.guess_stats.len(), 2);
    assert!(state.guess_stats.iter().all(|g| g.movie));
}

#[test]
fn win_on_third_attempt() {
    let mut state = GameState::new();
    state.submit_guess(&answer(), &guess(Some("toon-1"), Some("BOB"))).unwrap();
    state.submit_guess(&answer(), &guess(Some("toon-2"), Some("BOB"))).unwrap();
    let outcome = state.submit_guess(&answer(), &guess(None, Some("dave"))).unwrap();

    assert!(outcome.game_over && outcome.success);
    assert_eq!(state.attempts, 3);
    assert_eq!(state.bucket(), Some(Bucket::Three));
    assert!(state.completed_at.is_some());
    assert!(state.is_consistent());
}

#[test]
fn five_misses_end_the_game() {
    let mut state = GameState::new();
    for n in 1..=MAX_ATTEMPTS {
        let outcome = state
            .submit_guess(&answer(), &guess(Some("toon-1"), Some("ALICE")))
            .unwrap();
        assert_eq!(outcome.game_over, n == MAX_ATTEMPTS);
    }
    assert!(!state.success);
    assert_eq!(state.bucket(), Some(Bucket::Fail));
    assert_eq!(state.attempts_left(), 0);

    let before = state.clone();
    assert_eq!(
        state.submit_guess(&answer(), &guess(Some("toon-2"), Some("DAVE"))),
        Err(GameError::GameOver)
    );
    assert_eq!(state, before);
}

#[test]
fn empty_selection_is_rejected_without_using_an_attempt() {
    let mut state = GameState::new();
    assert_eq!(
        state.submit_guess(&answer(), &guess(Some("  "), None)),
        Err(GameError::EmptySelection)
    );
    assert_eq!(state.attempts, 0);

    state.submit_guess(&answer(), &guess(Some("toon-2"), None)).unwrap();
    // Only a movie selected, and the movie is already locked.
    assert_eq!(
        state.submit_guess(&answer(), &guess(Some("toon-1"), None)),
        Err(GameError::EmptySelection)
    );
    assert_eq!(state.attempts, 1);
}

#[test]
fn first_guess_win_shares_one_row() {
    let mut state = GameState::new();
    state
        .submit_guess(&answer(), &guess(Some("Toon Town Returns"), Some("Dave")))
        .unwrap();
    assert_eq!(state.bucket(), Some(Bucket::One));
    let text = state.share_text("Toon Town", "2026-10-15");
    assert_eq!(text, "Scriptle Toon Town 2026-10-15 1/5\n🎬🟩 🎭🟩");
}

#[test]
fn lost_game_shares_x() {
    let mut state = GameState::new();
    for _ in 0..MAX_ATTEMPTS {
        state.submit_guess(&answer(), &guess(Some("toon-2"), Some("EVE"))).unwrap();
    }
    let text = state.share_text("Toon Town", "2026-10-15");
    let mut rows = text.lines();
    assert_eq!(rows.next(), Some("Scriptle Toon Town 2026-10-15 X/5"));
    assert_eq!(rows.filter(|r| *r == "🎬🟩 🎭🟥").count(), 5);
}

#[test]
fn state_json_uses_webview_field_names() {
    let mut state = GameState::new();
    state.submit_guess(&answer(), &guess(Some("toon-2"), None)).unwrap();
    let value = serde_json::to_value(&state).unwrap();
    assert_eq!(value["movieLocked"], true);
    assert_eq!(value["characterLocked"], false);
    assert_eq!(value["guessStats"][0]["char"], false);
    assert_eq!(value["attempts"], 1);
}
