//! Errors raised by the board, the move engine and the match state machine.

use derive_more::{Display, Error};

/// Error that can occur while building a board or resolving a move.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum GameError {
    /// Board size is zero or does not match the supplied cells.
    #[display("Invalid board size {size} ({cells} cells supplied)")]
    InvalidBoardSize {
        /// Requested side length.
        size: usize,
        /// Number of cells supplied.
        cells: usize,
    },

    /// Coordinates fall outside the board.
    #[display("Coordinates ({x}, {y}) are outside a {size}x{size} board")]
    OutOfRange {
        /// Requested column.
        x: i64,
        /// Requested row.
        y: i64,
        /// Board side length.
        size: usize,
    },

    /// Target cell has already been resolved.
    #[display("Cell ({x}, {y}) has already been resolved")]
    InvalidMove {
        /// Column of the resolved cell.
        x: usize,
        /// Row of the resolved cell.
        y: usize,
    },

    /// Move payload is missing a coordinate or carries a non-integer one.
    #[display("Invalid move payload: {_0}")]
    InvalidInput(#[error(not(source))] String),
}
