//! Grid game domain: board, move resolution and the match state machine.

mod board;
mod engine;
mod error;
mod matches;

pub use board::{
    Board, Cell, CellState, Coord, Direction, MAX_BOARD_SIZE, MAX_POINTS, MIN_POINTS,
};
pub use engine::{LINE_BONUS_PER_CELL, Resolution, resolve};
pub use error::GameError;
pub use matches::{
    CellView, DEFAULT_BOARD_SIZE, DEFAULT_INITIAL_MOVES, MAX_INITIAL_MOVES, Match, MatchEvent,
    MatchSettings, MatchStatus, MatchView, MoveOutcome, Player,
};
