//! Match state machine.
//!
//! A match starts `Active` and moves to `Finished` exactly once, when the engine reports
//! termination. Moves on a finished match are no-ops that return the current state.

use derive_getters::Getters;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::board::{Board, CellState, Direction};
use super::engine::{self, Resolution};
use super::error::GameError;

/// Board side length used when nothing else is configured.
pub const DEFAULT_BOARD_SIZE: usize = 5;

/// Moves a player starts a match with when nothing else is configured.
pub const DEFAULT_INITIAL_MOVES: u32 = 5;

/// Largest move budget a match can start with.
pub const MAX_INITIAL_MOVES: u32 = 10_000;

/// Lifecycle status of a match.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchStatus {
    /// Moves are accepted.
    Active,
    /// Terminal; no further moves are resolved.
    Finished,
}

/// Participant of a match, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_new::new)]
pub struct Player {
    /// Stable identity from the identity provider.
    user_id: String,
    /// Contact address reported by the identity provider.
    email: String,
}

/// Game parameters shared by every match a server creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Board side length.
    pub board_size: usize,
    /// Moves available at the start of a match.
    pub initial_moves: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
            initial_moves: DEFAULT_INITIAL_MOVES,
        }
    }
}

/// Domain events that drive score aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    /// A match was created for the user.
    Started {
        /// Owner of the match.
        user_id: String,
    },
    /// A match reached its terminal state.
    Finished {
        /// Owner of the match.
        user_id: String,
        /// Score at the moment of finishing.
        final_score: u32,
    },
}

/// Wire view of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellView {
    /// Resolution state.
    pub state: CellState,
    /// Arrow direction.
    pub direction: Direction,
    /// Points carried by the cell.
    pub points: u32,
}

/// Serializable snapshot of a match as seen by its player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchView {
    /// Cells indexed as `board[y][x]`.
    pub board: Vec<Vec<CellView>>,
    /// Running score.
    pub score: u32,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Moves still available.
    pub moves_left: u32,
}

/// Result of submitting a move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// State after the call.
    pub view: MatchView,
    /// Engine output when the move was applied; `None` for no-ops.
    pub resolution: Option<Resolution>,
    /// Emitted once, on the move that finishes the match.
    pub event: Option<MatchEvent>,
}

impl MoveOutcome {
    /// True if the move changed the match.
    pub fn applied(&self) -> bool {
        self.resolution.is_some()
    }
}

/// One player's play-through of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Match {
    /// Unique identifier.
    match_id: String,
    /// Credential that created the match; scopes every lookup.
    api_key: String,
    /// Owner.
    player: Player,
    /// Exclusively owned board.
    board: Board,
    /// Running total, never decreasing.
    score: u32,
    /// Moves still available.
    moves_left: u32,
    /// Moves applied so far; doubles as the optimistic-concurrency revision.
    moves_made: u32,
    /// Lifecycle status.
    status: MatchStatus,
}

impl Match {
    /// Creates an active match with a fresh board.
    ///
    /// Returns the match together with the [`MatchEvent::Started`] event for aggregation.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBoardSize`] if the configured board size is zero.
    #[instrument(skip(api_key, rng), fields(user_id = %player.user_id()))]
    pub fn create<R: Rng>(
        api_key: String,
        player: Player,
        settings: MatchSettings,
        rng: &mut R,
    ) -> Result<(Self, MatchEvent), GameError> {
        let board = Board::new(settings.board_size, rng)?;
        let match_id = new_match_id(rng);
        info!(match_id = %match_id, size = settings.board_size, "Match created");
        let event = MatchEvent::Started {
            user_id: player.user_id().clone(),
        };
        Ok((Self::with_board(match_id, api_key, player, board, settings.initial_moves), event))
    }

    /// Creates an active match over an existing board.
    pub fn with_board(
        match_id: String,
        api_key: String,
        player: Player,
        board: Board,
        initial_moves: u32,
    ) -> Self {
        Self {
            match_id,
            api_key,
            player,
            board,
            score: 0,
            moves_left: initial_moves,
            moves_made: 0,
            status: MatchStatus::Active,
        }
    }

    /// Rebuilds a match from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        match_id: String,
        api_key: String,
        player: Player,
        board: Board,
        score: u32,
        moves_left: u32,
        moves_made: u32,
        status: MatchStatus,
    ) -> Self {
        Self {
            match_id,
            api_key,
            player,
            board,
            score,
            moves_left,
            moves_made,
            status,
        }
    }

    /// True while moves are accepted.
    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    /// Submits a move at raw coordinates.
    ///
    /// A finished match returns its state unchanged before any validation. A move on a cell
    /// that is already resolved is also a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OutOfRange`] if the coordinates are outside the board.
    #[instrument(skip(self), fields(match_id = %self.match_id, status = %self.status))]
    pub fn submit_move(&mut self, x: i64, y: i64) -> Result<MoveOutcome, GameError> {
        if !self.is_active() {
            debug!("Move on finished match ignored");
            return Ok(self.unchanged());
        }

        let target = self.board.coord(x, y)?;
        if self.board.is_resolved(target) {
            warn!(%target, "Move on resolved cell ignored");
            return Ok(self.unchanged());
        }

        let resolution = engine::resolve(&self.board, target, self.moves_left)?;
        self.apply(&resolution);

        let event = if resolution.terminates {
            self.status = MatchStatus::Finished;
            info!(score = self.score, moves = self.moves_made, "Match finished");
            Some(MatchEvent::Finished {
                user_id: self.player.user_id().clone(),
                final_score: self.score,
            })
        } else {
            None
        };

        Ok(MoveOutcome {
            view: self.state(),
            resolution: Some(resolution),
            event,
        })
    }

    /// Serializable snapshot of the match.
    pub fn state(&self) -> MatchView {
        let board = self
            .board
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| CellView {
                        state: cell.state,
                        direction: cell.direction,
                        points: cell.points,
                    })
                    .collect()
            })
            .collect();
        MatchView {
            board,
            score: self.score,
            status: self.status,
            moves_left: self.moves_left,
        }
    }

    fn apply(&mut self, resolution: &Resolution) {
        self.board.claim(resolution.claimed);
        for coord in &resolution.revealed {
            self.board.reveal(*coord);
        }
        self.score += resolution.score_delta;
        self.moves_left = resolution.moves_left;
        self.moves_made += 1;
    }

    fn unchanged(&self) -> MoveOutcome {
        MoveOutcome {
            view: self.state(),
            resolution: None,
            event: None,
        }
    }
}

fn new_match_id<R: Rng>(rng: &mut R) -> String {
    let raw: u128 = rng.random();
    format!("{raw:032x}")
}
