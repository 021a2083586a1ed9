//! Database repository for games and their move logs.

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::MigrationHarness;
use omok_core::{GameId, Move, MoveKind};
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, DbErrorKind, GameRow, MIGRATIONS, MoveRow, NewGameRow, NewMoveRow, schema};
use crate::store::{Game, StoreError};

/// Milliseconds SQLite waits on a locked database before failing.
const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Database repository for game and move operations.
///
/// Opens a fresh connection per call, so clones are cheap and may be moved
/// onto blocking threads.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a new repository for the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new(DbErrorKind::Connection, "Empty database path"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        let mut conn = SqliteConnection::establish(&self.db_path)?;
        diesel::sql_query(format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS)).execute(&mut conn)?;
        diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;
        Ok(conn)
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn migrate(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(DbErrorKind::Migration, e.to_string()))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Inserts a new game with the white seat empty.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn create_game(&self, title: &str, black_player: &str) -> Result<Game, DbError> {
        let mut conn = self.connection()?;
        let row = diesel::insert_into(schema::games::table)
            .values(&NewGameRow::new(title.to_string(), black_player.to_string()))
            .returning(GameRow::as_returning())
            .get_result(&mut conn)?;
        info!(game_id = row.id(), "Game created");
        Ok(row.into())
    }

    /// Looks up one game.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such game exists.
    #[instrument(skip(self))]
    pub fn get_game(&self, game_id: GameId) -> Result<Game, StoreError> {
        let mut conn = self.connection()?;
        Self::load_game(&mut conn, game_id)
    }

    fn load_game(conn: &mut SqliteConnection, game_id: GameId) -> Result<Game, StoreError> {
        schema::games::table
            .find(game_id)
            .select(GameRow::as_select())
            .first(conn)
            .optional()?
            .map(Game::from)
            .ok_or(StoreError::NotFound(game_id))
    }

    /// Lists all games, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_games(&self) -> Result<Vec<Game>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::games::table
            .order(schema::games::id.asc())
            .select(GameRow::as_select())
            .load(&mut conn)?;
        debug!(count = rows.len(), "Games loaded");
        Ok(rows.into_iter().map(Game::from).collect())
    }

    /// Seats `player_id` as white.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::JoinRejected`] if the player is black or the seat
    /// is held by someone else.
    #[instrument(skip(self))]
    pub fn join_game(&self, game_id: GameId, player_id: &str) -> Result<Game, StoreError> {
        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| {
            let game = Self::load_game(conn, game_id)?;
            if game.black_player() == player_id {
                return Err(StoreError::JoinRejected(
                    "black player cannot take the white seat".to_string(),
                ));
            }
            match game.white_player() {
                Some(white) if white == player_id => return Ok(game),
                Some(_) => {
                    return Err(StoreError::JoinRejected("white seat already taken".to_string()));
                }
                None => {}
            }

            diesel::update(schema::games::table.find(game_id))
                .set(schema::games::white_player.eq(Some(player_id)))
                .execute(conn)?;
            info!(game_id, player_id, "White seat filled");
            Self::load_game(conn, game_id)
        })
    }

    /// Committed entries of a game with order above `after`, in move-order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or a row is corrupt.
    #[instrument(skip(self))]
    pub fn moves_after(&self, game_id: GameId, after: u32) -> Result<Vec<Move>, DbError> {
        let mut conn = self.connection()?;
        let rows = schema::moves::table
            .filter(schema::moves::game_id.eq(game_id))
            .filter(schema::moves::move_order.gt(after as i32))
            .order(schema::moves::move_order.asc())
            .select(MoveRow::as_select())
            .load(&mut conn)?;
        rows.iter().map(MoveRow::to_move).collect()
    }

    /// Commits the entry at `move_order` if it is the game's next order and
    /// its cell is free.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConcurrencyConflict`] when the slot or cell is
    /// taken, [`StoreError::NotFound`] for an unknown game.
    #[instrument(skip(self))]
    pub fn commit(&self, game_id: GameId, move_order: u32, kind: MoveKind) -> Result<Move, StoreError> {
        let mut conn = self.connection()?;
        conn.immediate_transaction(|conn| {
            Self::load_game(conn, game_id)?;

            let committed: i64 = schema::moves::table
                .filter(schema::moves::game_id.eq(game_id))
                .count()
                .get_result(conn)?;
            if i64::from(move_order) != committed + 1 {
                warn!(game_id, move_order, committed, "Stale move order");
                return Err(StoreError::ConcurrencyConflict { move_order });
            }

            let inserted = diesel::insert_into(schema::moves::table)
                .values(&NewMoveRow::from_kind(game_id, move_order, kind))
                .returning(MoveRow::as_returning())
                .get_result(conn);
            let row = match inserted {
                Ok(row) => row,
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                    warn!(game_id, move_order, detail = info.message(), "Slot already claimed");
                    return Err(StoreError::ConcurrencyConflict { move_order });
                }
                Err(e) => return Err(e.into()),
            };

            info!(game_id, move_order, ?kind, "Entry committed");
            Ok(row.to_move()?)
        })
    }
}
