//! Tests for database repository operations.

use diesel::prelude::*;
use tempfile::NamedTempFile;

use gridmatch::{
    API_KEY_LEN, Board, Cell, DbErrorKind, Direction, GameRepository, Match, MatchEvent,
    MatchResult, MatchStatus, Player, ScoreBoard,
};

/// Overwrites the stored board of `match_id` with raw text.
fn overwrite_board(db: &NamedTempFile, match_id: &str, board: &str) {
    let db_path = db.path().to_str().expect("Invalid path");
    let mut conn = SqliteConnection::establish(db_path).expect("Failed to connect");
    let updated = diesel::sql_query("UPDATE matches SET board = ? WHERE match_id = ?")
        .bind::<diesel::sql_types::Text, _>(board)
        .bind::<diesel::sql_types::Text, _>(match_id)
        .execute(&mut conn)
        .expect("Update failed");
    assert_eq!(updated, 1);
}

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready repository.
fn setup_test_db() -> (NamedTempFile, GameRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");
    (db_file, repo)
}

/// 5x5 board of upward arrows worth nothing, except (2,2) worth 10.
fn scenario_board() -> Board {
    let mut cells = vec![Cell::new(Direction::Up, 0); 25];
    cells[2 * 5 + 2] = Cell::new(Direction::Up, 10);
    Board::from_cells(5, cells).expect("Valid board")
}

/// Registers `user_id` and stores a fresh scenario match for them.
fn stored_match(repo: &GameRepository, user_id: &str, match_id: &str, moves: u32) -> Match {
    let api_key = repo
        .get_or_create_api_key(user_id, "someone@example.com")
        .expect("Login failed");
    let game = Match::with_board(
        match_id.to_string(),
        api_key,
        Player::new(user_id.to_string(), "someone@example.com".to_string()),
        scenario_board(),
        moves,
    );
    repo.create_match(&game).expect("Create failed");
    game
}

#[test]
fn test_new_rejects_empty_path() {
    assert!(GameRepository::new("  ".to_string()).is_err());
}

#[test]
fn test_api_key_is_reused() {
    let (_db, repo) = setup_test_db();
    let first = repo
        .get_or_create_api_key("alice", "alice@example.com")
        .expect("First login failed");
    let second = repo
        .get_or_create_api_key("alice", "alice@example.com")
        .expect("Second login failed");
    assert_eq!(first, second);
    assert_eq!(first.len(), API_KEY_LEN);

    let other = repo
        .get_or_create_api_key("bob", "bob@example.com")
        .expect("Other login failed");
    assert_ne!(first, other);
}

#[test]
fn test_resolve_user() {
    let (_db, repo) = setup_test_db();
    let key = repo
        .get_or_create_api_key("carol", "carol@example.com")
        .expect("Login failed");

    let user = repo
        .resolve_user(&key)
        .expect("Query failed")
        .expect("User should exist");
    assert_eq!(user.user_id(), "carol");
    assert_eq!(user.email(), "carol@example.com");

    assert!(repo.resolve_user("nope").expect("Query failed").is_none());
}

#[test]
fn test_create_then_load_round_trips() {
    let (_db, repo) = setup_test_db();
    let game = stored_match(&repo, "dave", "m1", 5);

    let loaded = repo
        .load_match(game.api_key(), "m1")
        .expect("Load failed")
        .expect("Match should exist");
    assert_eq!(loaded, game);
    assert_eq!(loaded.state(), game.state());
}

#[test]
fn test_load_is_scoped_by_api_key() {
    let (_db, repo) = setup_test_db();
    stored_match(&repo, "erin", "m1", 5);
    let intruder = repo
        .get_or_create_api_key("mallory", "")
        .expect("Login failed");

    assert!(repo.load_match(&intruder, "m1").expect("Load failed").is_none());
    assert!(repo.load_match("unknown", "m1").expect("Load failed").is_none());
}

#[test]
fn test_create_counts_started_match() {
    let (_db, repo) = setup_test_db();
    stored_match(&repo, "frank", "m1", 5);
    stored_match(&repo, "frank", "m2", 5);

    let stats = repo
        .get_user_stats("frank")
        .expect("Query failed")
        .expect("Stats should exist");
    assert_eq!(*stats.total_matches(), 2);
    assert_eq!(*stats.total_score(), 0);
    assert_eq!(stats.average_score(), Some(0.0));
}

#[test]
fn test_save_persists_move() {
    let (_db, repo) = setup_test_db();
    let mut game = stored_match(&repo, "grace", "m1", 5);

    let loaded_moves = *game.moves_made();
    game.submit_move(2, 2).expect("Move failed");
    repo.save_match(&game, loaded_moves, None)
        .expect("Save failed");

    let loaded = repo
        .load_match(game.api_key(), "m1")
        .expect("Load failed")
        .expect("Match should exist");
    assert_eq!(*loaded.score(), 10);
    assert_eq!(*loaded.moves_made(), 1);
    assert_eq!(loaded.state(), game.state());
}

#[test]
fn test_stale_save_is_a_conflict() {
    let (_db, repo) = setup_test_db();
    let stored = stored_match(&repo, "heidi", "m1", 5);

    let mut first = stored.clone();
    let mut second = stored;
    first.submit_move(2, 2).expect("Move failed");
    second.submit_move(0, 4).expect("Move failed");

    repo.save_match(&first, 0, None).expect("First save failed");
    let err = repo
        .save_match(&second, 0, None)
        .expect_err("Stale save should fail");
    assert!(err.is_conflict());

    let loaded = repo
        .load_match(first.api_key(), "m1")
        .expect("Load failed")
        .expect("Match should exist");
    assert_eq!(loaded.state(), first.state());
}

#[test]
fn test_finish_is_aggregated_once() {
    let (_db, repo) = setup_test_db();
    let mut game = stored_match(&repo, "ivan", "m1", 1);

    let outcome = game.submit_move(2, 2).expect("Move failed");
    assert_eq!(*game.status(), MatchStatus::Finished);
    assert!(outcome.event.is_some());
    repo.save_match(&game, 0, Some(*game.score()))
        .expect("Save failed");

    // A replay of the same finishing write is rejected and not counted again.
    assert!(repo.save_match(&game, 0, Some(*game.score())).is_err());

    let stats = repo
        .get_user_stats("ivan")
        .expect("Query failed")
        .expect("Stats should exist");
    assert_eq!(*stats.total_matches(), 1);
    assert_eq!(*stats.total_score(), 10);
    assert_eq!(stats.average_score(), Some(10.0));
}

#[test]
fn test_record_events_directly() {
    let (_db, repo) = setup_test_db();
    repo.record_match_started("judy").expect("Start failed");
    repo.record_match_started("judy").expect("Start failed");
    repo.record_match_finished("judy", 7).expect("Finish failed");

    let stats = repo
        .get_user_stats("judy")
        .expect("Query failed")
        .expect("Stats should exist");
    assert_eq!(stats.average_score(), Some(3.5));

    assert!(repo.record_match_finished("nobody", 3).is_err());
}

#[test]
fn test_list_user_stats_and_results() {
    let (_db, repo) = setup_test_db();
    stored_match(&repo, "kim", "m1", 5);
    stored_match(&repo, "lee", "m2", 5);
    repo.get_or_create_api_key("idle", "")
        .expect("Login failed");

    let stats = repo.list_user_stats().expect("List failed");
    assert_eq!(stats.len(), 3);
    let idle = stats
        .iter()
        .find(|s| s.user_id() == "idle")
        .expect("Idle user listed");
    assert_eq!(idle.average_score(), None);

    let results = repo.list_match_results("m2").expect("Results failed");
    assert_eq!(results, vec![MatchResult::new("lee".to_string(), 0)]);
    assert!(repo.list_match_results("none").expect("Results failed").is_empty());
}

#[test]
fn test_score_board_applies_events() {
    let (_db, repo) = setup_test_db();
    let scores = ScoreBoard::new(repo);
    scores
        .record(&MatchEvent::Started {
            user_id: "kai".to_string(),
        })
        .expect("Start failed");
    assert_eq!(
        scores
            .user_stats("kai")
            .expect("Query failed")
            .and_then(|s| s.average_score()),
        Some(0.0)
    );

    scores
        .record(&MatchEvent::Finished {
            user_id: "kai".to_string(),
            final_score: 12,
        })
        .expect("Finish failed");
    let board = scores.leaderboard().expect("Leaderboard failed");
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].average_score, 12.0);
}

#[test]
fn test_malformed_stored_board_is_corrupt() {
    let (db, repo) = setup_test_db();
    let game = stored_match(&repo, "lena", "m1", 5);

    for board in [
        r#"{"size":0,"cells":[]}"#,
        r#"{"size":3,"cells":[{"state":"unrevealed","direction":"up","points":1}]}"#,
        "not json",
    ] {
        overwrite_board(&db, "m1", board);
        let err = repo
            .load_match(game.api_key(), "m1")
            .expect_err("Malformed board should not load");
        assert_eq!(err.kind, DbErrorKind::Corrupt);
    }
}
