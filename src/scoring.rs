//! Score aggregation and leaderboard views.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::{DbError, GameRepository, MatchEvent, MatchResult, UserStats};

/// Average score of one user; derived from [`UserStats`], never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// Ranked user.
    pub user_id: String,
    /// Total score divided by matches started.
    #[serde(rename = "score")]
    pub average_score: f64,
}

/// Builds leaderboard entries, skipping users who never started a match.
#[instrument(skip(stats), fields(users = stats.len()))]
pub fn leaderboard_from(stats: &[UserStats]) -> Vec<LeaderboardEntry> {
    stats
        .iter()
        .filter_map(|s| {
            s.average_score().map(|average_score| LeaderboardEntry {
                user_id: s.user_id().clone(),
                average_score,
            })
        })
        .collect()
}

/// Sorts entries by average score, best first. Ties keep user id order.
pub fn rank_leaderboard(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(|a, b| {
        b.average_score
            .total_cmp(&a.average_score)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    entries
}

/// Sorts match results by score, best first.
pub fn rank_by_score(mut results: Vec<MatchResult>) -> Vec<MatchResult> {
    results.sort_by(|a, b| b.score().cmp(a.score()));
    results
}

/// Maintains per-user statistics and answers leaderboard queries.
///
/// The match flow counts starts and finishes inside the repository transactions that store
/// the match ([`GameRepository::create_match`], [`GameRepository::save_match`]). The
/// `record*` methods are standalone, non-transactional entry points for events that arrive
/// without a match write, such as replaying events into a fresh database.
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    repository: GameRepository,
}

impl ScoreBoard {
    /// Creates a score board backed by the given repository.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository) -> Self {
        info!("Creating ScoreBoard");
        Self { repository }
    }

    /// Counts a started match for `user_id`, creating its record if absent.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn record_match_started(&self, user_id: &str) -> Result<(), DbError> {
        debug!("Recording match start");
        self.repository.record_match_started(user_id)
    }

    /// Adds a finished match's score to the user's total. Call once per match.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the user has no record or a database error occurs.
    #[instrument(skip(self))]
    pub fn record_match_finished(&self, user_id: &str, score: u32) -> Result<(), DbError> {
        debug!("Recording match finish");
        self.repository.record_match_finished(user_id, score)
    }

    /// Applies a match event to the statistics.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn record(&self, event: &MatchEvent) -> Result<(), DbError> {
        match event {
            MatchEvent::Started { user_id } => self.record_match_started(user_id),
            MatchEvent::Finished {
                user_id,
                final_score,
            } => self.record_match_finished(user_id, *final_score),
        }
    }

    /// Statistics of one user.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>, DbError> {
        self.repository.get_user_stats(user_id)
    }

    /// Average score of every user with at least one match, unordered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, DbError> {
        let stats = self.repository.list_user_stats()?;
        let entries = leaderboard_from(&stats);
        info!(entries = entries.len(), "Leaderboard computed");
        Ok(entries)
    }

    /// Scores of every participant of a match, unordered.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn match_results(&self, match_id: &str) -> Result<Vec<MatchResult>, DbError> {
        self.repository.list_match_results(match_id)
    }
}
