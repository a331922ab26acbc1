//! Database models and conversions to domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use tracing::instrument;

use crate::db::{DbError, schema};
use crate::game::{Board, Match, MatchStatus, Player};

/// Registered player and their aggregate counters.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::users)]
#[diesel(primary_key(user_id))]
pub struct UserRecord {
    user_id: String,
    email: String,
    api_key: String,
    total_matches: i64,
    total_score: i64,
    created_at: NaiveDateTime,
}

/// Insertable user model for first login.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::users)]
pub struct NewUser {
    user_id: String,
    email: String,
    api_key: String,
}

/// Stored match row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::matches)]
#[diesel(primary_key(match_id))]
pub struct MatchRecord {
    match_id: String,
    api_key: String,
    user_id: String,
    email: String,
    score: i64,
    moves_left: i32,
    moves_made: i32,
    status: String,
    board: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl MatchRecord {
    /// Decodes the row into a [`Match`].
    ///
    /// # Errors
    ///
    /// Returns a corrupt-data [`DbError`] if the board, status or counters fail to decode.
    #[instrument(skip(self), fields(match_id = %self.match_id))]
    pub fn into_match(self) -> Result<Match, DbError> {
        let board: Board = serde_json::from_str(&self.board)?;
        let status: MatchStatus = self
            .status
            .parse()
            .map_err(|_| DbError::corrupt(format!("Invalid status: '{}'", self.status)))?;
        Ok(Match::restore(
            self.match_id,
            self.api_key,
            Player::new(self.user_id, self.email),
            board,
            to_u32(self.score, "score")?,
            to_u32(i64::from(self.moves_left), "moves_left")?,
            to_u32(i64::from(self.moves_made), "moves_made")?,
            status,
        ))
    }
}

/// Insertable match row.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::matches)]
pub struct NewMatchRecord {
    match_id: String,
    api_key: String,
    user_id: String,
    email: String,
    score: i64,
    moves_left: i32,
    moves_made: i32,
    status: String,
    board: String,
}

impl NewMatchRecord {
    /// Encodes a freshly created match.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the board cannot be encoded or a counter overflows.
    #[instrument(skip(game), fields(match_id = %game.match_id()))]
    pub fn from_match(game: &Match) -> Result<Self, DbError> {
        Ok(Self {
            match_id: game.match_id().clone(),
            api_key: game.api_key().clone(),
            user_id: game.player().user_id().clone(),
            email: game.player().email().clone(),
            score: i64::from(*game.score()),
            moves_left: to_i32(*game.moves_left(), "moves_left")?,
            moves_made: to_i32(*game.moves_made(), "moves_made")?,
            status: game.status().to_string(),
            board: serde_json::to_string(game.board())?,
        })
    }
}

/// Changeset written after each applied move.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = schema::matches)]
pub struct MatchUpdate {
    score: i64,
    moves_left: i32,
    moves_made: i32,
    status: String,
    board: String,
    updated_at: NaiveDateTime,
}

impl MatchUpdate {
    /// Encodes the mutable part of a match.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the board cannot be encoded or a counter overflows.
    #[instrument(skip(game), fields(match_id = %game.match_id()))]
    pub fn from_match(game: &Match) -> Result<Self, DbError> {
        Ok(Self {
            score: i64::from(*game.score()),
            moves_left: to_i32(*game.moves_left(), "moves_left")?,
            moves_made: to_i32(*game.moves_made(), "moves_made")?,
            status: game.status().to_string(),
            board: serde_json::to_string(game.board())?,
            updated_at: chrono::Utc::now().naive_utc(),
        })
    }
}

/// Aggregate counters for one user.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct UserStats {
    user_id: String,
    total_matches: i64,
    total_score: i64,
}

impl UserStats {
    /// Average final score per started match, or `None` before the first match.
    pub fn average_score(&self) -> Option<f64> {
        if self.total_matches == 0 {
            None
        } else {
            Some(self.total_score as f64 / self.total_matches as f64)
        }
    }
}

impl From<UserRecord> for UserStats {
    fn from(record: UserRecord) -> Self {
        Self {
            user_id: record.user_id,
            total_matches: record.total_matches,
            total_score: record.total_score,
        }
    }
}

/// Score of one participant in one match.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Getters, new)]
pub struct MatchResult {
    user_id: String,
    score: i64,
}

fn to_u32(value: i64, field: &str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::corrupt(format!("Invalid {}: {}", field, value)))
}

fn to_i32(value: u32, field: &str) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|_| DbError::new(format!("{} out of range: {}", field, value)))
}
