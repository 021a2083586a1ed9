//! Tests for database repository operations.

use omok_core::{MoveKind, Position};
use omok_server::{GameRepository, StoreError};
use tempfile::NamedTempFile;

/// Creates a temporary database file with schema applied, returns the file
/// handle (must stay in scope to keep the file alive) and a ready repository.
fn setup_test_db() -> (NamedTempFile, GameRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();

    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.migrate().expect("Migrations failed");
    (db_file, repo)
}

fn pos(index: i64) -> Position {
    Position::new(index).expect("valid position")
}

#[test]
fn test_empty_path_rejected() {
    assert!(GameRepository::new("  ".to_string()).is_err());
}

#[test]
fn test_create_game_leaves_white_empty() {
    let (_db, repo) = setup_test_db();
    let game = repo.create_game("First", "alice").expect("Create failed");
    assert_eq!(game.title(), "First");
    assert_eq!(game.black_player(), "alice");
    assert!(game.white_player().is_none());
    assert!(*game.id() > 0);
}

#[test]
fn test_migrate_twice_is_harmless() {
    let (_db, repo) = setup_test_db();
    repo.migrate().expect("Second migrate failed");
}

#[test]
fn test_get_missing_game() {
    let (_db, repo) = setup_test_db();
    assert_eq!(repo.get_game(99), Err(StoreError::NotFound(99)));
}

#[test]
fn test_list_games_oldest_first() {
    let (_db, repo) = setup_test_db();
    repo.create_game("one", "alice").expect("Create failed");
    repo.create_game("two", "bob").expect("Create failed");
    let titles: Vec<String> = repo
        .list_games()
        .expect("List failed")
        .into_iter()
        .map(|g| g.title().clone())
        .collect();
    assert_eq!(titles, vec!["one", "two"]);
}

#[test]
fn test_join_rules() {
    let (_db, repo) = setup_test_db();
    let id = *repo.create_game("g", "alice").expect("Create failed").id();

    assert!(matches!(
        repo.join_game(id, "alice"),
        Err(StoreError::JoinRejected(_))
    ));

    let joined = repo.join_game(id, "bob").expect("Join failed");
    assert_eq!(joined.white_player().as_deref(), Some("bob"));

    // Rejoining is a no-op
    assert_eq!(repo.join_game(id, "bob").expect("Rejoin failed"), joined);

    assert!(matches!(
        repo.join_game(id, "carol"),
        Err(StoreError::JoinRejected(_))
    ));
}

#[test]
fn test_commit_assigns_orders_in_sequence() {
    let (_db, repo) = setup_test_db();
    let id = *repo.create_game("g", "alice").expect("Create failed").id();

    let first = repo.commit(id, 1, MoveKind::Place(pos(112))).expect("Commit failed");
    assert_eq!(first.move_order(), 1);
    assert_eq!(first.position(), Some(pos(112)));

    let second = repo.commit(id, 2, MoveKind::Place(pos(113))).expect("Commit failed");
    assert_eq!(repo.moves_after(id, 0).expect("Load failed"), vec![first, second]);
    assert_eq!(repo.moves_after(id, 1).expect("Load failed"), vec![second]);
}

#[test]
fn test_same_order_conflicts() {
    let (_db, repo) = setup_test_db();
    let id = *repo.create_game("g", "alice").expect("Create failed").id();
    repo.commit(id, 1, MoveKind::Place(pos(0))).expect("Commit failed");

    assert_eq!(
        repo.commit(id, 1, MoveKind::Place(pos(1))),
        Err(StoreError::ConcurrencyConflict { move_order: 1 })
    );
}

#[test]
fn test_skipped_order_conflicts() {
    let (_db, repo) = setup_test_db();
    let id = *repo.create_game("g", "alice").expect("Create failed").id();

    assert_eq!(
        repo.commit(id, 3, MoveKind::Place(pos(1))),
        Err(StoreError::ConcurrencyConflict { move_order: 3 })
    );
    assert!(repo.moves_after(id, 0).expect("Load failed").is_empty());
}

#[test]
fn test_same_cell_conflicts() {
    let (_db, repo) = setup_test_db();
    let id = *repo.create_game("g", "alice").expect("Create failed").id();
    repo.commit(id, 1, MoveKind::Place(pos(40))).expect("Commit failed");

    assert_eq!(
        repo.commit(id, 2, MoveKind::Place(pos(40))),
        Err(StoreError::ConcurrencyConflict { move_order: 2 })
    );
}

#[test]
fn test_forfeits_store_null_position() {
    let (_db, repo) = setup_test_db();
    let id = *repo.create_game("g", "alice").expect("Create failed").id();

    repo.commit(id, 1, MoveKind::Forfeit).expect("Commit failed");
    repo.commit(id, 2, MoveKind::Forfeit).expect("Second forfeit failed");
    let third = repo.commit(id, 3, MoveKind::Place(pos(7))).expect("Commit failed");

    let moves = repo.moves_after(id, 0).expect("Load failed");
    assert_eq!(moves.len(), 3);
    assert_eq!(moves[0].kind(), MoveKind::Forfeit);
    assert_eq!(moves[1].position(), None);
    assert_eq!(moves[2], third);
}

#[test]
fn test_commit_to_missing_game() {
    let (_db, repo) = setup_test_db();
    assert_eq!(
        repo.commit(42, 1, MoveKind::Forfeit),
        Err(StoreError::NotFound(42))
    );
}

#[test]
fn test_games_do_not_share_cells() {
    let (_db, repo) = setup_test_db();
    let a = *repo.create_game("a", "alice").expect("Create failed").id();
    let b = *repo.create_game("b", "bob").expect("Create failed").id();

    repo.commit(a, 1, MoveKind::Place(pos(112))).expect("Commit failed");
    repo.commit(b, 1, MoveKind::Place(pos(112))).expect("Commit in other game failed");
}
