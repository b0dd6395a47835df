//! Logical 10×9 board, squares, moves and positions.
//!
//! Squares are addressed `(row, col)` with row 0 red's back rank and row 9
//! black's. Cells are stored row-major:
//!
//! ```text
//!   index = row * 9 + col      0 <= row <= 9, 0 <= col <= 8
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::InputError;
use crate::piece::{symbol_of, Kind, Piece, Side, EMPTY_SYMBOL};
use crate::record::MoveRecord;

pub const ROWS: usize = 10;
pub const COLS: usize = 9;
pub const SQUARES: usize = ROWS * COLS;

/// A square on the logical board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Square {
    row: u8,
    col: u8,
}

impl Square {
    /// Create a square, or None when outside the 10×9 grid.
    #[inline]
    pub fn new(row: usize, col: usize) -> Option<Square> {
        if row < ROWS && col < COLS {
            Some(Square {
                row: row as u8,
                col: col as u8,
            })
        } else {
            None
        }
    }

    /// Checked construction from untrusted wire coordinates.
    pub fn from_wire(row: i64, col: i64) -> Result<Square, InputError> {
        if row < 0 || col < 0 {
            return Err(InputError::OffBoard { row, col });
        }
        Square::new(row as usize, col as usize).ok_or(InputError::OffBoard { row, col })
    }

    #[inline]
    pub fn row(self) -> usize {
        self.row as usize
    }

    #[inline]
    pub fn col(self) -> usize {
        self.col as usize
    }

    #[inline]
    pub fn index(self) -> usize {
        self.row() * COLS + self.col()
    }

    #[inline]
    pub fn from_index(index: usize) -> Option<Square> {
        if index < SQUARES {
            Square::new(index / COLS, index % COLS)
        } else {
            None
        }
    }

    /// The square seen after a 180° rotation of the board.
    #[inline]
    pub fn flipped(self) -> Square {
        Square {
            row: (ROWS - 1) as u8 - self.row,
            col: (COLS - 1) as u8 - self.col,
        }
    }

    /// Iterate over all 90 squares in row-major order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..SQUARES).filter_map(Square::from_index)
    }
}

impl fmt::Display for Square {
    /// UCCI square: column letter then row digit, e.g. `e0`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.col) as char, self.row)
    }
}

/// A move between two squares.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct Move {
    pub from: Square,
    pub to: Square,
}

impl Move {
    #[inline]
    pub fn new(from: Square, to: Square) -> Move {
        Move { from, to }
    }

    #[inline]
    pub fn flipped(self) -> Move {
        Move {
            from: self.from.flipped(),
            to: self.to.flipped(),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)
    }
}

impl FromStr for Move {
    type Err = String;

    /// Parse UCCI notation such as `a0i9`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 4 {
            return Err(format!("invalid move {s:?}: expected 4 characters"));
        }
        let parse_square = |col: u8, row: u8| -> Result<Square, String> {
            if !col.is_ascii_lowercase() || !row.is_ascii_digit() {
                return Err(format!("invalid square in move {s:?}"));
            }
            Square::new((row - b'0') as usize, (col - b'a') as usize)
                .ok_or_else(|| format!("square out of range in move {s:?}"))
        };
        Ok(Move {
            from: parse_square(bytes[0], bytes[1])?,
            to: parse_square(bytes[2], bytes[3])?,
        })
    }
}

// =============================================================================
// Board
// =============================================================================

/// Total assignment of the 90 squares to empty-or-piece.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Board {
    cells: [Option<Piece>; SQUARES],
}

impl Board {
    /// Rows of the starting layout, red back rank first.
    const INITIAL_ROWS: [&'static str; ROWS] = [
        "DEFGKGFED",
        ".........",
        ".H.....H.",
        "I.I.I.I.I",
        ".........",
        ".........",
        "i.i.i.i.i",
        ".h.....h.",
        ".........",
        "defgkgfed",
    ];

    /// An empty board.
    pub fn empty() -> Board {
        Board {
            cells: [None; SQUARES],
        }
    }

    /// The fixed starting layout: both generals revealed, all else covered.
    pub fn initial() -> Board {
        let mut board = Board::empty();
        for (row, line) in Self::INITIAL_ROWS.iter().enumerate() {
            for (col, symbol) in line.chars().enumerate() {
                board.cells[row * COLS + col] = Piece::from_symbol(symbol);
            }
        }
        board
    }

    #[inline]
    pub fn get(&self, square: Square) -> Option<Piece> {
        self.cells[square.index()]
    }

    #[inline]
    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        self.cells[square.index()] = piece;
    }

    /// Iterate over occupied squares.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.get(sq).map(|p| (sq, p)))
    }

    /// Location of `side`'s general, if on the board.
    pub fn general(&self, side: Side) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.side() == side && p.kind() == Kind::General)
            .map(|(sq, _)| sq)
    }

    /// Parse the client's nested-array board without validating generals.
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>]) -> Result<Board, InputError> {
        if rows.len() != ROWS {
            return Err(InputError::RowCount(rows.len()));
        }
        let mut board = Board::empty();
        for (row, cells) in rows.iter().enumerate() {
            if cells.len() != COLS {
                return Err(InputError::RowLength {
                    row,
                    len: cells.len(),
                });
            }
            for (col, cell) in cells.iter().enumerate() {
                board.cells[row * COLS + col] = parse_cell(cell.as_ref(), row, col)?;
            }
        }
        Ok(board)
    }

    /// Client nested-array form.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        (0..ROWS)
            .map(|row| {
                (0..COLS)
                    .map(|col| symbol_of(self.cells[row * COLS + col]).to_string())
                    .collect()
            })
            .collect()
    }

    /// Check that each side has exactly one general.
    ///
    /// Generals can only be built revealed, so presence is all that needs
    /// checking.
    pub fn validate(&self) -> Result<(), InputError> {
        for side in Side::all() {
            let generals = self
                .pieces()
                .filter(|(_, p)| p.side() == side && p.kind() == Kind::General)
                .count();
            match generals {
                0 => return Err(InputError::MissingGeneral(side)),
                1 => {}
                _ => return Err(InputError::DuplicateGeneral(side)),
            }
        }
        Ok(())
    }

    /// Rotate 180° and swap every piece's side.
    pub fn flipped(&self) -> Board {
        let mut out = Board::empty();
        for (sq, piece) in self.pieces() {
            out.set(sq.flipped(), Some(piece.with_side_swapped()));
        }
        out
    }

    /// Count covered pieces still on the board.
    pub fn covered_count(&self) -> usize {
        self.cells.iter().flatten().filter(|p| p.is_covered()).count()
    }
}

fn parse_cell(cell: &str, row: usize, col: usize) -> Result<Option<Piece>, InputError> {
    let unknown = || InputError::UnknownSymbol {
        row,
        col,
        symbol: cell.to_string(),
    };
    let mut chars = cell.chars();
    let symbol = chars.next().ok_or_else(unknown)?;
    if chars.next().is_some() {
        return Err(unknown());
    }
    if symbol == EMPTY_SYMBOL {
        return Ok(None);
    }
    Piece::from_symbol(symbol).map(Some).ok_or_else(unknown)
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for Board {
    /// 90 symbols, row 0 first, no separators.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            write!(f, "{}", symbol_of(*cell))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for row in (0..ROWS).rev() {
            write!(f, "{row} ")?;
            for col in 0..COLS {
                write!(f, "{}", symbol_of(self.cells[row * COLS + col]))?;
            }
            writeln!(f)?;
        }
        write!(f, "  abcdefghi")
    }
}

impl FromStr for Board {
    type Err = InputError;

    /// Parse 90 symbols, row 0 first. Whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbols: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
        if symbols.len() != SQUARES {
            return Err(InputError::RowCount(symbols.len() / COLS));
        }
        let mut board = Board::empty();
        for (index, symbol) in symbols.into_iter().enumerate() {
            let mut buf = [0u8; 4];
            board.cells[index] = parse_cell(symbol.encode_utf8(&mut buf), index / COLS, index % COLS)?;
        }
        Ok(board)
    }
}

// =============================================================================
// Position
// =============================================================================

/// Canonical repetition key: all 90 board symbols followed by the
/// side-to-move marker (`r` or `b`). Nothing is omitted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey([u8; SQUARES + 1]);

impl PositionKey {
    pub fn as_str(&self) -> &str {
        // Every byte is an ASCII piece symbol or side marker.
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PositionKey({})", self.as_str())
    }
}

/// A board plus the side to move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    pub board: Board,
    pub side_to_move: Side,
}

impl Position {
    pub fn new(board: Board, side_to_move: Side) -> Position {
        Position {
            board,
            side_to_move,
        }
    }

    /// Starting layout, red to move.
    pub fn initial() -> Position {
        Position::new(Board::initial(), Side::Red)
    }

    /// Canonical key for repetition counting.
    pub fn key(&self) -> PositionKey {
        let mut bytes = [0u8; SQUARES + 1];
        for (index, cell) in self.board.cells.iter().enumerate() {
            bytes[index] = symbol_of(*cell) as u8;
        }
        bytes[SQUARES] = match self.side_to_move {
            Side::Red => b'r',
            Side::Black => b'b',
        };
        PositionKey(bytes)
    }

    /// 180° rotation with side polarity swapped. Involution.
    pub fn flipped(&self) -> Position {
        Position {
            board: self.board.flipped(),
            side_to_move: self.side_to_move.opponent(),
        }
    }

    /// Successor position after `mv`, identities unchanged.
    ///
    /// A moved covered piece stays covered here; callers that care about
    /// reveals check [`Position::reveals`] first.
    pub fn apply(&self, mv: Move) -> Position {
        let mut board = self.board;
        let piece = board.get(mv.from);
        board.set(mv.from, None);
        board.set(mv.to, piece);
        Position {
            board,
            side_to_move: self.side_to_move.opponent(),
        }
    }

    /// True when `mv` moves a covered piece. The piece is flipped on
    /// arrival, so the successor's identity is unknown until the client
    /// reports it.
    pub fn reveals(&self, mv: Move) -> bool {
        self.board.get(mv.from).is_some_and(Piece::is_covered)
    }

    /// Replay a client record: the record's own symbol (the identity settled
    /// after any reveal) lands on `to`, `from` empties, and the turn passes
    /// to the mover's opponent.
    pub fn apply_record(&self, record: &MoveRecord, index: usize) -> Result<Position, InputError> {
        if self.board.get(record.from).is_none() {
            return Err(InputError::BadRecord {
                index,
                reason: format!("no piece on {}", record.from),
            });
        }
        let mut board = self.board;
        board.set(record.from, None);
        board.set(record.to, Some(record.piece));
        Ok(Position {
            board,
            side_to_move: record.piece.side().opponent(),
        })
    }
}
