//! Database repository for users, matches and aggregate statistics.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use rand::Rng;
use rand::distr::Alphanumeric;
use tracing::{debug, info, instrument, warn};

use crate::db::{
    DbError, MatchRecord, MatchResult, MatchUpdate, NewMatchRecord, NewUser, UserRecord,
    UserStats, schema,
};
use crate::game::Match;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Length of issued API keys.
pub const API_KEY_LEN: usize = 40;

/// Database repository for credential, match and statistics operations.
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
            return Err(DbError::new("Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))
    }

    /// Applies any pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a migration fails.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(count = applied.len(), "Migrations applied");
        Ok(())
    }

    /// Returns the API key for a user, registering the user with a fresh key on first login.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_or_create_api_key(&self, user_id: &str, email: &str) -> Result<String, DbError> {
        let mut conn = self.connection()?;
        conn.transaction(|conn| {
            if let Some(user) = find_user(conn, user_id)? {
                debug!("Existing API key reused");
                return Ok(user.api_key().clone());
            }
            let api_key = new_api_key();
            insert_user(conn, user_id, email, &api_key)?;
            info!(user_id, "User registered");
            Ok(api_key)
        })
    }

    /// Resolves an API key to its user. Returns `None` for unknown keys.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, api_key))]
    pub fn resolve_user(&self, api_key: &str) -> Result<Option<UserRecord>, DbError> {
        let mut conn = self.connection()?;
        let user = schema::users::table
            .filter(schema::users::api_key.eq(api_key))
            .select(UserRecord::as_select())
            .first(&mut conn)
            .optional()?;
        if user.is_none() {
            debug!("Unknown API key");
        }
        Ok(user)
    }

    /// Persists a new match and counts it as started for its owner, atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self, game), fields(match_id = %game.match_id(), user_id = %game.player().user_id()))]
    pub fn create_match(&self, game: &Match) -> Result<(), DbError> {
        let record = NewMatchRecord::from_match(game)?;
        let mut conn = self.connection()?;
        conn.transaction(|conn| {
            diesel::insert_into(schema::matches::table)
                .values(&record)
                .execute(conn)?;
            increment_total_matches(conn, game.player().user_id())
        })?;
        info!("Match stored");
        Ok(())
    }

    /// Loads a match owned by `api_key`. Returns `None` if no such match exists for that key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs or the row fails to decode.
    #[instrument(skip(self, api_key))]
    pub fn load_match(&self, api_key: &str, match_id: &str) -> Result<Option<Match>, DbError> {
        let mut conn = self.connection()?;
        let record = schema::matches::table
            .filter(schema::matches::match_id.eq(match_id))
            .filter(schema::matches::api_key.eq(api_key))
            .select(MatchRecord::as_select())
            .first(&mut conn)
            .optional()?;
        record.map(MatchRecord::into_match).transpose()
    }

    /// Writes a mutated match back, conditioned on the revision it was loaded at.
    ///
    /// When `final_score` is set the owner's total score grows by it in the same transaction,
    /// so a finish is counted exactly once.
    ///
    /// # Errors
    ///
    /// Returns a conflict [`DbError`] if the stored revision no longer equals
    /// `loaded_moves_made`; other [`DbError`]s on database failure.
    #[instrument(skip(self, game), fields(match_id = %game.match_id(), moves_made = game.moves_made()))]
    pub fn save_match(
        &self,
        game: &Match,
        loaded_moves_made: u32,
        final_score: Option<u32>,
    ) -> Result<(), DbError> {
        let update = MatchUpdate::from_match(game)?;
        let expected = i32::try_from(loaded_moves_made)
            .map_err(|_| DbError::new(format!("moves_made out of range: {}", loaded_moves_made)))?;
        let mut conn = self.connection()?;
        conn.transaction(|conn| {
            let updated = diesel::update(
                schema::matches::table
                    .filter(schema::matches::match_id.eq(game.match_id()))
                    .filter(schema::matches::api_key.eq(game.api_key()))
                    .filter(schema::matches::moves_made.eq(expected)),
            )
            .set(&update)
            .execute(conn)?;

            if updated == 0 {
                warn!(expected, "Stale match revision");
                return Err(DbError::conflict(format!(
                    "Match {} changed since it was loaded",
                    game.match_id()
                )));
            }

            if let Some(score) = final_score {
                increment_total_score(conn, game.player().user_id(), score)?;
            }
            Ok(())
        })?;
        debug!(finished = final_score.is_some(), "Match saved");
        Ok(())
    }

    /// Counts a started match for a user, creating the user record if absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn record_match_started(&self, user_id: &str) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        conn.transaction(|conn| increment_total_matches(conn, user_id))
    }

    /// Adds a finished match's score to a user's total.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the user does not exist or a database error occurs.
    #[instrument(skip(self))]
    pub fn record_match_finished(&self, user_id: &str, score: u32) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        increment_total_score(&mut conn, user_id, score)
    }

    /// Gets the aggregate counters of one user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_user_stats(&self, user_id: &str) -> Result<Option<UserStats>, DbError> {
        let mut conn = self.connection()?;
        Ok(find_user(&mut conn, user_id)?.map(UserStats::from))
    }

    /// Lists the aggregate counters of every user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_user_stats(&self) -> Result<Vec<UserStats>, DbError> {
        let mut conn = self.connection()?;
        let users = schema::users::table
            .select(UserRecord::as_select())
            .load(&mut conn)?;
        info!(count = users.len(), "User stats loaded");
        Ok(users.into_iter().map(UserStats::from).collect())
    }

    /// Lists the score of every participant of a match.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn list_match_results(&self, match_id: &str) -> Result<Vec<MatchResult>, DbError> {
        let mut conn = self.connection()?;
        let rows: Vec<(String, i64)> = schema::matches::table
            .filter(schema::matches::match_id.eq(match_id))
            .select((schema::matches::user_id, schema::matches::score))
            .load(&mut conn)?;
        debug!(count = rows.len(), "Match results loaded");
        Ok(rows
            .into_iter()
            .map(|(user_id, score)| MatchResult::new(user_id, score))
            .collect())
    }
}

fn find_user(conn: &mut SqliteConnection, user_id: &str) -> Result<Option<UserRecord>, DbError> {
    Ok(schema::users::table
        .find(user_id)
        .select(UserRecord::as_select())
        .first(conn)
        .optional()?)
}

fn insert_user(
    conn: &mut SqliteConnection,
    user_id: &str,
    email: &str,
    api_key: &str,
) -> Result<(), DbError> {
    diesel::insert_into(schema::users::table)
        .values(&NewUser::new(
            user_id.to_string(),
            email.to_string(),
            api_key.to_string(),
        ))
        .execute(conn)?;
    Ok(())
}

fn increment_total_matches(conn: &mut SqliteConnection, user_id: &str) -> Result<(), DbError> {
    if find_user(conn, user_id)?.is_none() {
        warn!(user_id, "Stats for unknown user, creating record");
        insert_user(conn, user_id, "", &new_api_key())?;
    }
    diesel::update(schema::users::table.find(user_id))
        .set(schema::users::total_matches.eq(schema::users::total_matches + 1i64))
        .execute(conn)?;
    Ok(())
}

fn increment_total_score(
    conn: &mut SqliteConnection,
    user_id: &str,
    score: u32,
) -> Result<(), DbError> {
    let updated = diesel::update(schema::users::table.find(user_id))
        .set(schema::users::total_score.eq(schema::users::total_score + i64::from(score)))
        .execute(conn)?;
    if updated == 0 {
        return Err(DbError::new(format!("No stats record for user '{}'", user_id)));
    }
    Ok(())
}

fn new_api_key() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_LEN)
        .map(char::from)
        .collect()
}
