//! Square game board with arrow cells.

use derive_more::Display;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::error::GameError;

/// Lowest points value a generated cell can carry.
pub const MIN_POINTS: u32 = 1;

/// Highest points value a generated cell can carry.
pub const MAX_POINTS: u32 = 4;

/// Largest supported side length.
pub const MAX_BOARD_SIZE: usize = 64;

/// Direction an arrow cell points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards row 0.
    Up,
    /// Towards the last row.
    Down,
    /// Towards column 0.
    Left,
    /// Towards the last column.
    Right,
}

impl Direction {
    /// Column and row offsets of one step in this direction.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Resolution state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    /// Not yet touched by any move.
    Unrevealed,
    /// Swept up by a chain started elsewhere.
    Revealed,
    /// Directly targeted by a move.
    Claimed,
}

impl CellState {
    /// True once a move has touched the cell.
    pub fn is_resolved(self) -> bool {
        !matches!(self, CellState::Unrevealed)
    }
}

/// One addressable unit of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Resolution state.
    pub state: CellState,
    /// Where the chain goes next.
    pub direction: Direction,
    /// Points awarded when the cell is resolved.
    pub points: u32,
}

impl Cell {
    /// Creates an unrevealed cell.
    pub fn new(direction: Direction, points: u32) -> Self {
        Self {
            state: CellState::Unrevealed,
            direction,
            points,
        }
    }
}

/// Validated board coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("({x}, {y})")]
pub struct Coord {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl Coord {
    /// Creates a coordinate without checking it against a board.
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Square grid of cells stored row by row.
///
/// The side length is fixed at construction; only cell states change afterwards.
/// Decoding goes through [`Board::from_cells`], so a stored board is checked like a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    size: usize,
    cells: Vec<Cell>,
}

#[derive(Deserialize)]
struct RawBoard {
    size: usize,
    cells: Vec<Cell>,
}

impl TryFrom<RawBoard> for Board {
    type Error = GameError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        Board::from_cells(raw.size, raw.cells)
    }
}

impl Board {
    /// Generates a board with random arrows and points.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBoardSize`] if `size` is zero or above [`MAX_BOARD_SIZE`].
    #[instrument(skip(rng))]
    pub fn new<R: Rng>(size: usize, rng: &mut R) -> Result<Self, GameError> {
        if size == 0 || size > MAX_BOARD_SIZE {
            return Err(GameError::InvalidBoardSize { size, cells: 0 });
        }
        let directions = [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ];
        let cells = (0..size * size)
            .map(|_| {
                let direction = directions[rng.random_range(0..directions.len())];
                Cell::new(direction, rng.random_range(MIN_POINTS..=MAX_POINTS))
            })
            .collect();
        Ok(Self { size, cells })
    }

    /// Builds a board from explicit cells in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidBoardSize`] if `size` is zero or above [`MAX_BOARD_SIZE`],
    /// or if `cells` does not hold exactly `size * size` entries.
    pub fn from_cells(size: usize, cells: Vec<Cell>) -> Result<Self, GameError> {
        if size == 0 || size > MAX_BOARD_SIZE || cells.len() != size * size {
            return Err(GameError::InvalidBoardSize {
                size,
                cells: cells.len(),
            });
        }
        Ok(Self { size, cells })
    }

    /// Side length.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Validates raw coordinates against the board.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OutOfRange`] if either coordinate is outside `[0, size)`.
    pub fn coord(&self, x: i64, y: i64) -> Result<Coord, GameError> {
        let in_range = |v: i64| usize::try_from(v).ok().filter(|v| *v < self.size);
        match (in_range(x), in_range(y)) {
            (Some(cx), Some(cy)) => Ok(Coord::new(cx, cy)),
            _ => Err(GameError::OutOfRange {
                x,
                y,
                size: self.size,
            }),
        }
    }

    /// Current state of the cell at `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OutOfRange`] if the coordinates are outside the board.
    pub fn cell_state(&self, x: i64, y: i64) -> Result<CellState, GameError> {
        let coord = self.coord(x, y)?;
        Ok(self.cell(coord).state)
    }

    /// Cell at a validated coordinate.
    pub fn cell(&self, coord: Coord) -> &Cell {
        &self.cells[self.index(coord)]
    }

    /// Marks a cell as swept up by a chain.
    pub fn reveal(&mut self, coord: Coord) {
        let idx = self.index(coord);
        self.cells[idx].state = CellState::Revealed;
    }

    /// Marks a cell as directly targeted by a move.
    pub fn claim(&mut self, coord: Coord) {
        let idx = self.index(coord);
        self.cells[idx].state = CellState::Claimed;
    }

    /// True if the cell has been touched by a move.
    pub fn is_resolved(&self, coord: Coord) -> bool {
        self.cell(coord).state.is_resolved()
    }

    /// True if every cell has been resolved.
    pub fn all_resolved(&self) -> bool {
        self.cells.iter().all(|c| c.state.is_resolved())
    }

    /// True if every cell of row `y` has been resolved.
    pub fn row_resolved(&self, y: usize) -> bool {
        y < self.size && (0..self.size).all(|x| self.is_resolved(Coord::new(x, y)))
    }

    /// True if every cell of column `x` has been resolved.
    pub fn column_resolved(&self, x: usize) -> bool {
        x < self.size && (0..self.size).all(|y| self.is_resolved(Coord::new(x, y)))
    }

    /// Number of cells still unrevealed.
    pub fn unrevealed_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.state.is_resolved()).count()
    }

    /// Neighbour one step away in `direction`, or `None` past the edge.
    pub fn step(&self, coord: Coord, direction: Direction) -> Option<Coord> {
        let (dx, dy) = direction.offset();
        let x = coord.x as i64 + dx;
        let y = coord.y as i64 + dy;
        self.coord(x, y).ok()
    }

    /// Rows of cells, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.size)
    }

    fn index(&self, coord: Coord) -> usize {
        coord.y * self.size + coord.x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn new_board_is_unrevealed() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let board = Board::new(5, &mut rng).unwrap();
        assert_eq!(board.size(), 5);
        assert_eq!(board.unrevealed_count(), 25);
        for row in board.rows() {
            for cell in row {
                assert_eq!(cell.state, CellState::Unrevealed);
                assert!((MIN_POINTS..=MAX_POINTS).contains(&cell.points));
            }
        }
    }

    #[test]
    fn zero_size_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            Board::new(0, &mut rng),
            Err(GameError::InvalidBoardSize { size: 0, .. })
        ));
        assert!(Board::from_cells(2, vec![Cell::new(Direction::Up, 1); 3]).is_err());
    }

    #[test]
    fn oversized_board_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert!(matches!(
            Board::new(MAX_BOARD_SIZE + 1, &mut rng),
            Err(GameError::InvalidBoardSize { .. })
        ));
    }

    #[test]
    fn decoding_checks_shape() {
        assert!(serde_json::from_str::<Board>(r#"{"size":0,"cells":[]}"#).is_err());
        let one_cell = r#"{"size":3,"cells":[{"state":"unrevealed","direction":"up","points":1}]}"#;
        assert!(serde_json::from_str::<Board>(one_cell).is_err());

        let board = Board::from_cells(2, vec![Cell::new(Direction::Down, 3); 4]).unwrap();
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(serde_json::from_str::<Board>(&json).unwrap(), board);
    }

    #[test]
    fn coord_display() {
        assert_eq!(Coord::new(2, 4).to_string(), "(2, 4)");
    }

    #[test]
    fn same_seed_same_board() {
        let a = Board::new(4, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        let b = Board::new(4, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn cell_state_checks_range() {
        let board = Board::from_cells(3, vec![Cell::new(Direction::Up, 1); 9]).unwrap();
        assert_eq!(board.cell_state(2, 2), Ok(CellState::Unrevealed));
        assert!(matches!(
            board.cell_state(3, 0),
            Err(GameError::OutOfRange { x: 3, y: 0, size: 3 })
        ));
        assert!(board.cell_state(0, -1).is_err());
    }

    #[test]
    fn reveal_and_claim_change_state() {
        let mut board = Board::from_cells(2, vec![Cell::new(Direction::Left, 2); 4]).unwrap();
        board.claim(Coord::new(0, 0));
        board.reveal(Coord::new(1, 1));
        assert_eq!(board.cell_state(0, 0), Ok(CellState::Claimed));
        assert_eq!(board.cell_state(1, 1), Ok(CellState::Revealed));
        assert_eq!(board.unrevealed_count(), 2);
        assert!(!board.all_resolved());
    }

    #[test]
    fn line_queries() {
        let mut board = Board::from_cells(2, vec![Cell::new(Direction::Up, 1); 4]).unwrap();
        board.claim(Coord::new(0, 0));
        board.reveal(Coord::new(1, 0));
        assert!(board.row_resolved(0));
        assert!(!board.row_resolved(1));
        assert!(!board.column_resolved(0));
        assert!(!board.row_resolved(5));
    }

    #[test]
    fn step_stops_at_edges() {
        let board = Board::from_cells(2, vec![Cell::new(Direction::Up, 1); 4]).unwrap();
        assert_eq!(board.step(Coord::new(0, 0), Direction::Up), None);
        assert_eq!(board.step(Coord::new(0, 0), Direction::Right), Some(Coord::new(1, 0)));
        assert_eq!(board.step(Coord::new(1, 1), Direction::Down), None);
    }
}
