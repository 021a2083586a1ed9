//! Session behavior against the in-memory store, on paused time.

use omok_core::{Cell, GameId, MoveKind, Position, Stone, ValidationError};
use omok_server::{
    ClockState, Connection, FixedIdentity, GameSession, GameStore, MemoryStore, SessionConfig,
    SessionError, SessionNotice, SessionStatus, SessionView,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout};

fn pos(index: i64) -> Position {
    Position::new(index).expect("valid position")
}

async fn new_game(store: &MemoryStore, seat_white: bool) -> GameId {
    let game = store.create_game("test", "alice").await.expect("Create failed");
    if seat_white {
        store.join_game(*game.id(), "bob").await.expect("Join failed");
    }
    *game.id()
}

async fn open(store: &MemoryStore, game_id: GameId, player: &str) -> GameSession {
    GameSession::open(
        Arc::new(store.clone()),
        &FixedIdentity::signed_in(player),
        game_id,
        &SessionConfig::default(),
    )
    .await
    .expect("Open failed")
}

/// Waits (in virtual time) until the published view satisfies `pred`.
async fn wait_until(session: &GameSession, pred: impl FnMut(&SessionView) -> bool) -> SessionView {
    let mut rx = session.watch();
    let view = timeout(Duration::from_secs(600), rx.wait_for(pred))
        .await
        .expect("Timed out waiting for view")
        .expect("Session closed")
        .clone();
    view
}

async fn wait_for_moves(session: &GameSession, count: usize) -> SessionView {
    wait_until(session, |v| *v.move_count() >= count).await
}

fn drain(notices: &mut broadcast::Receiver<SessionNotice>) -> Vec<SessionNotice> {
    let mut seen = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        seen.push(notice);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_open_requires_identity() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let result = GameSession::open(
        Arc::new(store.clone()),
        &FixedIdentity::anonymous(),
        id,
        &SessionConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(SessionError::Auth)));
}

#[tokio::test(start_paused = true)]
async fn test_open_unknown_game() {
    let store = MemoryStore::new();
    let result = GameSession::open(
        Arc::new(store.clone()),
        &FixedIdentity::signed_in("alice"),
        7,
        &SessionConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(SessionError::Store(_))));
}

#[tokio::test(start_paused = true)]
async fn test_submit_without_opponent() {
    let store = MemoryStore::new();
    let id = new_game(&store, false).await;
    let session = open(&store, id, "alice").await;

    assert_eq!(
        session.submit_move(pos(112), "alice").await,
        Err(SessionError::Validation(ValidationError::NoOpponent))
    );
    assert_eq!(session.current_clock(), ClockState::Stopped);
    assert_eq!(*session.view().status(), SessionStatus::WaitingForOpponent);
    assert!(store.list_moves(id).await.expect("List failed").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_opponent_joining_starts_clock() {
    let store = MemoryStore::new();
    let id = new_game(&store, false).await;
    let session = open(&store, id, "alice").await;
    let mut notices = session.notices();

    store.join_game(id, "bob").await.expect("Join failed");
    let view = wait_until(&session, |v| *v.status() == SessionStatus::InProgress).await;

    assert_eq!(
        *view.clock(),
        ClockState::Running {
            active: Stone::Black,
            remaining: 60
        }
    );
    assert_eq!(
        drain(&mut notices),
        vec![SessionNotice::OpponentJoined("bob".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_board_changes_only_through_feed() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;

    let mv = session.place(pos(112)).await.expect("Submit failed");
    assert_eq!(mv.move_order(), 1);

    let view = wait_for_moves(&session, 1).await;
    assert_eq!(view.board().get(pos(112)), Cell::Occupied(Stone::Black));
    assert_eq!(*view.turn(), Stone::White);
    assert_eq!(
        *view.clock(),
        ClockState::Running {
            active: Stone::White,
            remaining: 60
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_wrong_turn_and_occupied_cell() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;

    assert_eq!(
        session.submit_move(pos(0), "bob").await,
        Err(SessionError::Validation(ValidationError::NotYourTurn(Stone::Black)))
    );

    session.submit_move(pos(0), "alice").await.expect("Submit failed");
    wait_for_moves(&session, 1).await;

    assert_eq!(
        session.submit_move(pos(0), "bob").await,
        Err(SessionError::Validation(ValidationError::OccupiedCell(pos(0))))
    );
}

#[tokio::test(start_paused = true)]
async fn test_redelivered_event_is_idempotent() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;

    session.submit_move(pos(10), "alice").await.expect("Submit failed");
    wait_for_moves(&session, 1).await;
    let once = session.current_board();

    store.redeliver(id, 1).await.expect("Redeliver failed");
    session.submit_move(pos(11), "bob").await.expect("Submit failed");
    let view = wait_for_moves(&session, 2).await;

    assert_eq!(*view.move_count(), 2);
    assert_eq!(view.board().count(Stone::Black), 1);
    assert_eq!(view.board().count(Stone::White), 1);
    assert_eq!(view.board().get(pos(10)), once.get(pos(10)));
}

#[tokio::test(start_paused = true)]
async fn test_clock_resets_on_committed_move() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;

    tokio::time::sleep(Duration::from_millis(30_500)).await;
    assert_eq!(
        session.current_clock(),
        ClockState::Running {
            active: Stone::Black,
            remaining: 30
        }
    );

    session.place(pos(112)).await.expect("Submit failed");
    let view = wait_for_moves(&session, 1).await;
    assert_eq!(
        *view.clock(),
        ClockState::Running {
            active: Stone::White,
            remaining: 60
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_expiry_forfeits_turn() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let mut notices = session.notices();
    let started = Instant::now();

    let view = wait_for_moves(&session, 1).await;

    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(*view.turn(), Stone::White);
    assert_eq!(
        *view.clock(),
        ClockState::Running {
            active: Stone::White,
            remaining: 60
        }
    );
    assert_eq!(view.board().count(Stone::Black), 0);
    assert_eq!(drain(&mut notices), vec![SessionNotice::Forfeited(Stone::Black)]);

    let moves = store.list_moves(id).await.expect("List failed");
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].kind(), MoveKind::Forfeit);

    // Black's seat has lost the turn
    assert_eq!(
        session.submit_move(pos(0), "alice").await,
        Err(SessionError::Validation(ValidationError::NotYourTurn(Stone::White)))
    );
    session.submit_move(pos(0), "bob").await.expect("White may move");
    let view = wait_for_moves(&session, 2).await;
    assert_eq!(view.board().get(pos(0)), Cell::Occupied(Stone::White));
}

#[tokio::test(start_paused = true)]
async fn test_two_observers_forfeit_once() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let alice = open(&store, id, "alice").await;
    let bob = open(&store, id, "bob").await;

    wait_for_moves(&alice, 1).await;
    wait_for_moves(&bob, 1).await;

    // Both clocks expired; the store kept exactly one forfeit
    let moves = store.list_moves(id).await.expect("List failed");
    assert_eq!(moves.len(), 1);
    assert_eq!(alice.current_turn(), Stone::White);
    assert_eq!(bob.current_turn(), Stone::White);
}

#[tokio::test(start_paused = true)]
async fn test_win_is_announced_once() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let observer = open(&store, id, "bob").await;
    let mut notices = session.notices();
    let mut observed = observer.notices();

    let script = [
        (0, "alice"),
        (15, "bob"),
        (1, "alice"),
        (16, "bob"),
        (2, "alice"),
        (17, "bob"),
        (3, "alice"),
        (18, "bob"),
        (4, "alice"),
    ];
    for (n, (cell, player)) in script.iter().enumerate() {
        session.submit_move(pos(*cell), player).await.expect("Submit failed");
        wait_for_moves(&session, n + 1).await;
    }

    let view = wait_until(&session, |v| *v.status() == SessionStatus::Won(Stone::Black)).await;
    assert_eq!(*view.clock(), ClockState::Stopped);
    wait_until(&observer, |v| *v.status() == SessionStatus::Won(Stone::Black)).await;

    // Nothing after the win revives the session
    store.disconnect(id).await;
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(session.current_clock(), ClockState::Stopped);
    assert_eq!(
        session.submit_move(pos(30), "bob").await,
        Err(SessionError::Validation(ValidationError::GameOver))
    );

    let won = |seen: Vec<SessionNotice>| {
        seen.into_iter()
            .filter(|n| *n == SessionNotice::Won(Stone::Black))
            .count()
    };
    assert_eq!(won(drain(&mut notices)), 1);
    assert_eq!(won(drain(&mut observed)), 1);
    assert_eq!(store.list_moves(id).await.expect("List failed").len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_late_joiner_sees_finished_game() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    for (order, cell) in [0, 15, 1, 16, 2, 17, 3, 18, 4].into_iter().enumerate() {
        store
            .commit_move(id, pos(cell), order as u32 + 1)
            .await
            .expect("Commit failed");
    }

    let session = open(&store, id, "bob").await;
    let view = session.view();
    assert_eq!(*view.status(), SessionStatus::Won(Stone::Black));
    assert_eq!(*view.clock(), ClockState::Stopped);
    assert_eq!(*view.move_count(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_feed_resynchronizes() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let mut notices = session.notices();

    session.place(pos(112)).await.expect("Submit failed");
    wait_for_moves(&session, 1).await;

    store.disconnect(id).await;
    store.commit_move(id, pos(113), 2).await.expect("Commit failed");

    let view = wait_until(&session, |v| {
        *v.move_count() == 2 && *v.connection() == Connection::Live
    })
    .await;
    assert_eq!(view.board().get(pos(113)), Cell::Occupied(Stone::White));
    assert_eq!(
        *view.clock(),
        ClockState::Running {
            active: Stone::Black,
            remaining: 60
        }
    );

    let seen = drain(&mut notices);
    let reconnecting = seen.iter().position(|n| *n == SessionNotice::Reconnecting);
    let resynced = seen.iter().position(|n| *n == SessionNotice::Resynchronized);
    assert!(reconnecting.is_some());
    assert!(reconnecting < resynced);
}

#[tokio::test(start_paused = true)]
async fn test_unclosed_gap_forces_resync() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let mut notices = session.notices();

    store.set_muted(id, true).await;
    store.commit_move(id, pos(0), 1).await.expect("Commit failed");
    store.set_muted(id, false).await;
    let gap_opened = Instant::now();
    store.commit_move(id, pos(1), 2).await.expect("Commit failed");

    let view = wait_for_moves(&session, 2).await;
    assert!(gap_opened.elapsed() >= Duration::from_secs(2));
    assert_eq!(view.board().get(pos(0)), Cell::Occupied(Stone::Black));
    assert_eq!(view.board().get(pos(1)), Cell::Occupied(Stone::White));
    assert!(drain(&mut notices).contains(&SessionNotice::Resynchronized));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_events_are_held_until_the_gap_closes() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let mut notices = session.notices();
    let started = Instant::now();

    store.set_muted(id, true).await;
    store.commit_move(id, pos(0), 1).await.expect("Commit failed");
    store.commit_move(id, pos(1), 2).await.expect("Commit failed");
    store.set_muted(id, false).await;

    // Order 2 arrives first and waits for order 1
    store.redeliver(id, 2).await.expect("Redeliver failed");
    tokio::time::sleep(Duration::from_millis(500)).await;
    let view = session.view();
    assert_eq!(*view.move_count(), 0);
    assert_eq!(view.board().get(pos(1)), Cell::Empty);
    assert_eq!(*view.connection(), Connection::Live);

    store.redeliver(id, 1).await.expect("Redeliver failed");
    let view = wait_for_moves(&session, 2).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(view.board().get(pos(0)), Cell::Occupied(Stone::Black));
    assert_eq!(view.board().get(pos(1)), Cell::Occupied(Stone::White));
    assert_eq!(*view.turn(), Stone::Black);
    assert!(drain(&mut notices).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_forfeit_conflict_recovers_unseen_commit() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let started = Instant::now();

    // Black's move reaches the store but never the feed
    store.set_muted(id, true).await;
    store.commit_move(id, pos(0), 1).await.expect("Commit failed");

    let view = wait_until(&session, |v| {
        *v.move_count() == 1 && *v.connection() == Connection::Live
    })
    .await;
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(view.board().get(pos(0)), Cell::Occupied(Stone::Black));
    assert_eq!(*view.turn(), Stone::White);
    assert_eq!(
        *view.clock(),
        ClockState::Running {
            active: Stone::White,
            remaining: 60
        }
    );

    let moves = store.list_moves(id).await.expect("List failed");
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].kind(), MoveKind::Place(pos(0)));
}

#[tokio::test(start_paused = true)]
async fn test_no_forfeit_notice_after_win() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;
    let mut notices = session.notices();

    store.set_muted(id, true).await;
    for (order, cell) in [0, 15, 1, 16, 2, 17, 3, 18, 4].into_iter().enumerate() {
        store
            .commit_move(id, pos(cell), order as u32 + 1)
            .await
            .expect("Commit failed");
    }
    store.commit_forfeit(id, 10).await.expect("Commit failed");
    store.set_muted(id, false).await;

    // Everything lands in one drained batch: the win, then the forfeit
    for order in 2..=10 {
        store.redeliver(id, order).await.expect("Redeliver failed");
    }
    store.redeliver(id, 1).await.expect("Redeliver failed");

    let view = wait_until(&session, |v| *v.status() == SessionStatus::Won(Stone::Black)).await;
    assert_eq!(*view.move_count(), 10);
    assert_eq!(*view.clock(), ClockState::Stopped);
    assert_eq!(drain(&mut notices), vec![SessionNotice::Won(Stone::Black)]);
}

#[tokio::test(start_paused = true)]
async fn test_stale_submit_reports_conflict() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let session = open(&store, id, "alice").await;

    // Somebody else's commit that this session never hears about
    store.set_muted(id, true).await;
    store.commit_move(id, pos(0), 1).await.expect("Commit failed");

    assert_eq!(
        session.place(pos(5)).await,
        Err(SessionError::Conflict { move_order: 1 })
    );

    // The conflict refetched the authoritative log
    let view = session.view();
    assert_eq!(*view.move_count(), 1);
    assert_eq!(view.board().get(pos(0)), Cell::Occupied(Stone::Black));
    assert_eq!(view.board().get(pos(5)), Cell::Empty);
    assert_eq!(*view.connection(), Connection::Live);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_releases_clock_and_feed() {
    let store = MemoryStore::new();
    let id = new_game(&store, true).await;
    let mut session = open(&store, id, "alice").await;

    session.teardown().await;
    let view = session.view();
    assert_eq!(*view.status(), SessionStatus::Closed);
    assert_eq!(*view.clock(), ClockState::Stopped);

    assert_eq!(session.place(pos(0)).await, Err(SessionError::Closed));

    // No clock is left to forfeit anybody's turn
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(store.list_moves(id).await.expect("List failed").is_empty());

    session.teardown().await;
}
