//! Request-level operations tying the match state machine to storage and aggregation.

use derive_more::{Display, Error};
use tracing::{debug, info, instrument, warn};

use crate::api::MovePayload;
use crate::auth::Identity;
use crate::game::{GameError, Match, MatchEvent, MatchSettings, MatchView, Player};
use crate::scoring::{LeaderboardEntry, ScoreBoard, rank_by_score, rank_leaderboard};
use crate::{DbError, GameRepository, MatchResult};

/// Failure of a request-level operation.
#[derive(Debug, Clone, Display, Error)]
pub enum ServiceError {
    /// Domain validation failure.
    #[display("{_0}")]
    Game(GameError),
    /// No match with this id exists for the caller's API key.
    #[display("Invalid match_id '{_0}'")]
    NotFound(#[error(not(source))] String),
    /// The one-time login code was rejected.
    #[display("Invalid login code")]
    InvalidCredential,
    /// The API key is missing or unknown.
    #[display("Missing or unknown API key")]
    Unauthorized,
    /// The match changed concurrently; the move was not stored.
    #[display("Match was modified concurrently, retry the move")]
    Conflict,
    /// Storage failure.
    #[display("{_0}")]
    Db(DbError),
    /// Background task failure.
    #[display("Internal error: {_0}")]
    Internal(#[error(not(source))] String),
}

impl From<GameError> for ServiceError {
    fn from(err: GameError) -> Self {
        Self::Game(err)
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        if err.is_conflict() {
            Self::Conflict
        } else {
            Self::Db(err)
        }
    }
}

/// Result of a move submission as seen by the request layer.
#[derive(Debug, Clone)]
pub struct MoveReply {
    /// Match state after the call.
    pub view: MatchView,
    /// True if this call finished the match.
    pub finished_now: bool,
}

/// Match operations scoped by API key.
#[derive(Debug, Clone)]
pub struct MatchService {
    repository: GameRepository,
    scores: ScoreBoard,
    settings: MatchSettings,
}

impl MatchService {
    /// Creates a service over the given repository.
    #[instrument(skip(repository))]
    pub fn new(repository: GameRepository, settings: MatchSettings) -> Self {
        info!("Creating MatchService");
        Self {
            scores: ScoreBoard::new(repository.clone()),
            repository,
            settings,
        }
    }

    /// Score aggregation backing this service.
    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    /// Returns the caller's API key, issuing one on first login.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Db`] on storage failure.
    #[instrument(skip(self), fields(user_id = %identity.user_id))]
    pub fn login(&self, identity: &Identity) -> Result<String, ServiceError> {
        Ok(self
            .repository
            .get_or_create_api_key(&identity.user_id, &identity.email)?)
    }

    /// Resolves an API key to the player it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for unknown keys.
    #[instrument(skip(self, api_key))]
    pub fn authenticate(&self, api_key: &str) -> Result<Player, ServiceError> {
        let user = self
            .repository
            .resolve_user(api_key)?
            .ok_or(ServiceError::Unauthorized)?;
        Ok(Player::new(user.user_id().clone(), user.email().clone()))
    }

    /// Creates a match for the key's owner and counts it as started.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for unknown keys, or a storage error.
    #[instrument(skip(self, api_key))]
    pub fn create_match(&self, api_key: &str) -> Result<Match, ServiceError> {
        let player = self.authenticate(api_key)?;
        let (game, event) = Match::create(
            api_key.to_string(),
            player,
            self.settings,
            &mut rand::rng(),
        )?;
        // The started event is written in the same transaction as the match row.
        self.repository.create_match(&game)?;
        debug!(?event, "Match start recorded");
        Ok(game)
    }

    /// Loads a match owned by `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the key owns no such match.
    #[instrument(skip(self, api_key))]
    pub fn load_match(&self, api_key: &str, match_id: &str) -> Result<Match, ServiceError> {
        self.repository
            .load_match(api_key, match_id)?
            .ok_or_else(|| ServiceError::NotFound(match_id.to_string()))
    }

    /// Current state of a match.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] if the key owns no such match.
    #[instrument(skip(self, api_key))]
    pub fn match_state(&self, api_key: &str, match_id: &str) -> Result<MatchView, ServiceError> {
        Ok(self.load_match(api_key, match_id)?.state())
    }

    /// Submits a move and persists its effect.
    ///
    /// A finished match answers with its current state before the payload is looked at.
    /// The finish is aggregated in the same store transaction as the match update.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown matches, [`ServiceError::Game`] for
    /// malformed or out-of-range coordinates and [`ServiceError::Conflict`] if the match
    /// changed since it was loaded.
    #[instrument(skip(self, api_key, payload))]
    pub fn submit_move(
        &self,
        api_key: &str,
        match_id: &str,
        payload: &MovePayload,
    ) -> Result<MoveReply, ServiceError> {
        let mut game = self.load_match(api_key, match_id)?;
        if !game.is_active() {
            debug!("Match already finished");
            return Ok(MoveReply {
                view: game.state(),
                finished_now: false,
            });
        }

        let request = payload.parse()?;
        let loaded_moves_made = *game.moves_made();
        let outcome = game.submit_move(request.x, request.y)?;
        if !outcome.applied() {
            return Ok(MoveReply {
                view: outcome.view,
                finished_now: false,
            });
        }

        let final_score = match &outcome.event {
            Some(MatchEvent::Finished { final_score, .. }) => Some(*final_score),
            Some(other) => {
                warn!(event = ?other, "Unexpected event from move");
                None
            }
            None => None,
        };
        self.repository
            .save_match(&game, loaded_moves_made, final_score)?;

        if let Some(score) = final_score {
            info!(score, "Match finished and aggregated");
        }
        Ok(MoveReply {
            view: outcome.view,
            finished_now: final_score.is_some(),
        })
    }

    /// Public results of a match, best score first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Db`] on storage failure.
    #[instrument(skip(self))]
    pub fn match_results(&self, match_id: &str) -> Result<Vec<MatchResult>, ServiceError> {
        Ok(rank_by_score(self.scores.match_results(match_id)?))
    }

    /// Leaderboard, best average first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Db`] on storage failure.
    #[instrument(skip(self))]
    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        Ok(rank_leaderboard(self.scores.leaderboard()?))
    }
}
