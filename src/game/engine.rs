//! Move resolution rules.
//!
//! A move targets one unrevealed cell. The cell is claimed and the chain follows its
//! arrow, skipping cells already resolved, revealing each unrevealed cell it lands on
//! until it runs off the board. The engine never mutates the board; the match applies
//! the returned [`Resolution`].

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::board::{Board, Coord};
use super::error::GameError;

/// Bonus per board cell awarded for each row or column a move completes.
pub const LINE_BONUS_PER_CELL: u32 = 10;

/// Outcome of resolving one move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Cell the move targeted.
    pub claimed: Coord,
    /// Cells swept up by the chain, in visiting order.
    pub revealed: Vec<Coord>,
    /// Points earned by the move, bonuses included.
    pub score_delta: u32,
    /// Moves granted for a long chain.
    pub extra_moves: u32,
    /// Moves remaining once this move is applied.
    pub moves_left: u32,
    /// True when the match must end after this move.
    pub terminates: bool,
}

impl Resolution {
    /// Number of cells resolved by the move.
    pub fn chain_len(&self) -> usize {
        self.revealed.len() + 1
    }
}

/// Resolves a move at a validated coordinate.
///
/// # Errors
///
/// Returns [`GameError::InvalidMove`] if the target cell is not unrevealed.
#[instrument(skip(board), fields(size = board.size()))]
pub fn resolve(board: &Board, target: Coord, moves_left: u32) -> Result<Resolution, GameError> {
    if board.is_resolved(target) {
        return Err(GameError::InvalidMove {
            x: target.x,
            y: target.y,
        });
    }

    let mut chain = vec![target];
    let mut visited: HashSet<Coord> = HashSet::from([target]);
    let mut current = target;

    'chain: loop {
        let direction = board.cell(current).direction;
        let mut probe = current;
        loop {
            match board.step(probe, direction) {
                None => break 'chain,
                Some(next) if board.is_resolved(next) || visited.contains(&next) => probe = next,
                Some(next) => {
                    chain.push(next);
                    visited.insert(next);
                    current = next;
                    break;
                }
            }
        }
    }

    let points: u32 = chain.iter().map(|c| board.cell(*c).points).sum();
    let bonus = completed_lines(board, &chain) * LINE_BONUS_PER_CELL * board.size() as u32;

    let size = board.size();
    let extra_moves = chain.len().saturating_sub(size) as u32;
    let moves_after = moves_left.saturating_sub(1) + extra_moves;
    let terminates = moves_after == 0 || board.unrevealed_count() == chain.len();

    debug!(
        chain = chain.len(),
        points,
        bonus,
        extra_moves,
        moves_after,
        terminates,
        "Move resolved"
    );

    Ok(Resolution {
        claimed: target,
        revealed: chain[1..].to_vec(),
        score_delta: points + bonus,
        extra_moves,
        moves_left: moves_after,
        terminates,
    })
}

/// Rows and columns that become fully resolved once `chain` is resolved.
///
/// Chain cells are unrevealed beforehand, so any full line through them is newly completed.
fn completed_lines(board: &Board, chain: &[Coord]) -> u32 {
    let mut after = board.clone();
    for coord in chain {
        after.reveal(*coord);
    }
    let rows: BTreeSet<usize> = chain.iter().map(|c| c.y).collect();
    let columns: BTreeSet<usize> = chain.iter().map(|c| c.x).collect();
    let full_rows = rows.into_iter().filter(|y| after.row_resolved(*y)).count();
    let full_columns = columns.into_iter().filter(|x| after.column_resolved(*x)).count();
    (full_rows + full_columns) as u32
}
