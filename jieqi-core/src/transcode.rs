//! Sentinel-padded linear board used by offset-based move generators.
//!
//! # Layout
//!
//! ```text
//! STRIDE = 16, PAD = 3, LEN = 256
//!
//!   index(row, col) = (row + PAD) * STRIDE + (col + PAD)
//!
//!   linear rows 0..2 and 13..15 are sentinels
//!   linear cols 0..2 and 12..15 are sentinels
//!
//!   a1 (row 0, col 0) = 51 = 0x33        i9 (row 9, col 8) = 203 = 0xCB
//! ```
//!
//! Any step or slide from a playable cell by one of the fixed piece offsets
//! (at most ±34) lands inside the array, so off-board detection is a single
//! sentinel test.
//!
//! # Orientation
//!
//! `Normal` places squares as they are. `Rotated` places `(r, c)` at the
//! index of `(9 - r, 8 - c)` and swaps every piece's side, so the side to
//! move always looks like red sitting on rows 0..4. Rotating an index is
//! `254 - index`.

use crate::board::{Board, Position, Square, COLS, ROWS};
use crate::piece::{Piece, Side};

pub const STRIDE: usize = 16;
pub const PAD: usize = 3;
pub const LEN: usize = STRIDE * STRIDE;

/// Index sum of a square and its 180° image.
const ROTATION_SUM: usize = (ROWS - 1 + 2 * PAD) * STRIDE + (COLS - 1 + 2 * PAD);

/// Whose side of the board is drawn at the bottom.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Orientation {
    Normal,
    Rotated,
}

impl Orientation {
    /// Orientation that shows `side` as the red, bottom side.
    #[inline]
    pub fn for_side(side: Side) -> Orientation {
        match side {
            Side::Red => Orientation::Normal,
            Side::Black => Orientation::Rotated,
        }
    }

    #[inline]
    fn orient_square(self, square: Square) -> Square {
        match self {
            Orientation::Normal => square,
            Orientation::Rotated => square.flipped(),
        }
    }

    #[inline]
    fn orient_piece(self, piece: Piece) -> Piece {
        match self {
            Orientation::Normal => piece,
            Orientation::Rotated => piece.with_side_swapped(),
        }
    }
}

/// One cell of the linear board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Cell {
    Offboard,
    Empty,
    Occupied(Piece),
}

impl Cell {
    #[inline]
    pub fn piece(self) -> Option<Piece> {
        match self {
            Cell::Occupied(piece) => Some(piece),
            _ => None,
        }
    }

    #[inline]
    pub fn is_offboard(self) -> bool {
        self == Cell::Offboard
    }

    /// Byte code used for hashing: 0 sentinel, 1 empty, else the symbol.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Cell::Offboard => 0,
            Cell::Empty => 1,
            Cell::Occupied(piece) => piece.symbol() as u8,
        }
    }
}

/// Padded 16×16 board.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinearBoard {
    cells: [Cell; LEN],
}

impl LinearBoard {
    /// All playable cells empty, border cells sentinel.
    pub fn empty() -> LinearBoard {
        let mut cells = [Cell::Offboard; LEN];
        for square in Square::all() {
            cells[Self::raw_index(square)] = Cell::Empty;
        }
        LinearBoard { cells }
    }

    #[inline]
    fn raw_index(square: Square) -> usize {
        (square.row() + PAD) * STRIDE + (square.col() + PAD)
    }

    /// Linear index of a logical square under `orientation`.
    #[inline]
    pub fn index_of(square: Square, orientation: Orientation) -> usize {
        Self::raw_index(orientation.orient_square(square))
    }

    /// Logical square at a linear index, or None for sentinels and any
    /// index outside the array.
    pub fn square_at(index: usize, orientation: Orientation) -> Option<Square> {
        if index >= LEN {
            return None;
        }
        let (row, col) = (index / STRIDE, index % STRIDE);
        if row < PAD || col < PAD {
            return None;
        }
        Square::new(row - PAD, col - PAD).map(|sq| orientation.orient_square(sq))
    }

    /// Rotate a linear index 180°. Only meaningful for playable cells.
    #[inline]
    pub fn rotate_index(index: usize) -> usize {
        ROTATION_SUM - index
    }

    /// Transcode a logical board.
    pub fn encode(board: &Board, orientation: Orientation) -> LinearBoard {
        let mut linear = LinearBoard::empty();
        for (square, piece) in board.pieces() {
            linear.cells[Self::index_of(square, orientation)] =
                Cell::Occupied(orientation.orient_piece(piece));
        }
        linear
    }

    /// Transcode a position from the side to move's point of view.
    pub fn from_position(position: &Position) -> LinearBoard {
        Self::encode(&position.board, Orientation::for_side(position.side_to_move))
    }

    /// Inverse of [`LinearBoard::encode`] for the same orientation.
    pub fn decode(&self, orientation: Orientation) -> Board {
        let mut board = Board::empty();
        for square in Square::all() {
            let piece = self.cells[Self::index_of(square, orientation)]
                .piece()
                .map(|p| orientation.orient_piece(p));
            board.set(square, piece);
        }
        board
    }

    /// Cell at `index`; out-of-range indices read as sentinels.
    #[inline]
    pub fn cell(&self, index: usize) -> Cell {
        self.cells.get(index).copied().unwrap_or(Cell::Offboard)
    }

    /// Overwrite a playable cell. Writes to sentinels are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(index) {
            if *slot != Cell::Offboard && cell != Cell::Offboard {
                *slot = cell;
            }
        }
    }

    /// Move whatever is on `from` to `to`, returning what `to` held.
    #[inline]
    pub fn make_move(&mut self, from: usize, to: usize) -> Cell {
        let captured = self.cell(to);
        let moving = self.cell(from);
        self.set(to, moving);
        self.set(from, Cell::Empty);
        captured
    }

    /// 180° rotation with sides swapped: the opponent's view.
    pub fn flipped(&self) -> LinearBoard {
        let mut out = LinearBoard::empty();
        for square in Square::all() {
            let index = Self::raw_index(square);
            if let Cell::Occupied(piece) = self.cells[index] {
                out.cells[Self::rotate_index(index)] = Cell::Occupied(piece.with_side_swapped());
            }
        }
        out
    }

    /// Indices of every playable cell.
    pub fn playable() -> impl Iterator<Item = usize> {
        Square::all().map(Self::raw_index)
    }

    /// Cell codes for hashing.
    pub fn codes(&self) -> [u8; LEN] {
        let mut out = [0u8; LEN];
        for (code, cell) in out.iter_mut().zip(self.cells.iter()) {
            *code = cell.code();
        }
        out
    }
}

impl Default for LinearBoard {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for LinearBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        for row in (0..STRIDE).rev() {
            for col in 0..STRIDE {
                let c = match self.cells[row * STRIDE + col] {
                    Cell::Offboard => ' ',
                    Cell::Empty => '.',
                    Cell::Occupied(p) => p.symbol(),
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
