//! Database rows and their mapping onto domain records.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use omok_core::{Move, MoveKind, Position};
use tracing::instrument;

use crate::db::{DbError, DbErrorKind, schema};
use crate::store::Game;

/// Game row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRow {
    id: i32,
    title: String,
    black_player: String,
    white_player: Option<String>,
    created_at: NaiveDateTime,
}

impl From<GameRow> for Game {
    fn from(row: GameRow) -> Self {
        Game::new(
            row.id,
            row.title,
            row.black_player,
            row.white_player,
            row.created_at,
        )
    }
}

/// Insertable game row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::games)]
pub struct NewGameRow {
    title: String,
    black_player: String,
}

/// Committed entry row. A NULL position is a forfeiture.
#[derive(Debug, Clone, Queryable, Identifiable, Associations, Selectable, Getters)]
#[diesel(table_name = schema::moves)]
#[diesel(belongs_to(GameRow, foreign_key = game_id))]
pub struct MoveRow {
    id: i32,
    game_id: i32,
    position: Option<i32>,
    move_order: i32,
}

impl MoveRow {
    /// Converts to a domain entry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the stored position or order is out of range.
    #[instrument(skip(self), fields(game_id = self.game_id, move_order = self.move_order))]
    pub fn to_move(&self) -> Result<Move, DbError> {
        let move_order = u32::try_from(self.move_order)
            .ok()
            .filter(|order| *order >= 1)
            .ok_or_else(|| {
                DbError::new(
                    DbErrorKind::CorruptRow,
                    format!("Invalid move order {}", self.move_order),
                )
            })?;
        let kind = match self.position {
            Some(index) => MoveKind::Place(
                Position::new(index as i64)
                    .map_err(|e| DbError::new(DbErrorKind::CorruptRow, e.to_string()))?,
            ),
            None => MoveKind::Forfeit,
        };
        Ok(Move::new(self.game_id, move_order, kind))
    }
}

/// Insertable entry row.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::moves)]
pub struct NewMoveRow {
    game_id: i32,
    position: Option<i32>,
    move_order: i32,
}

impl NewMoveRow {
    /// Row for a domain entry.
    pub fn from_kind(game_id: i32, move_order: u32, kind: MoveKind) -> Self {
        let position = match kind {
            MoveKind::Place(position) => Some(position.index() as i32),
            MoveKind::Forfeit => None,
        };
        Self::new(game_id, position, move_order as i32)
    }
}
