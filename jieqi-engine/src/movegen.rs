//! Lazy pseudo-legal move generator over the padded linear board.
//!
//! The board is always oriented so the side to move is red at the bottom;
//! "forward" is `+STRIDE`. Off-board detection is a sentinel test.

use jieqi_core::piece::{Kind, Piece, Side};
use jieqi_core::transcode::{Cell, LinearBoard, Orientation, PAD, STRIDE};
use jieqi_core::Square;

const UP: isize = STRIDE as isize;
const ORTHOGONAL: [isize; 4] = [UP, -UP, 1, -1];
const DIAGONAL: [isize; 4] = [UP + 1, UP - 1, -UP + 1, -UP - 1];
/// Horse leg followed by its two landing offsets.
const HORSE: [(isize, [isize; 2]); 4] = [
    (UP, [2 * UP + 1, 2 * UP - 1]),
    (-UP, [-2 * UP + 1, -2 * UP - 1]),
    (1, [UP + 2, -UP + 2]),
    (-1, [UP - 2, -UP - 2]),
];

/// A move between two linear indices.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub struct LinearMove {
    pub from: u8,
    pub to: u8,
}

impl LinearMove {
    #[inline]
    fn new(from: usize, to: usize) -> LinearMove {
        LinearMove {
            from: from as u8,
            to: to as u8,
        }
    }

    #[inline]
    pub fn from(self) -> usize {
        self.from as usize
    }

    #[inline]
    pub fn to(self) -> usize {
        self.to as usize
    }

    /// Logical move under `orientation`, or None if either end is a sentinel.
    pub fn to_move(self, orientation: Orientation) -> Option<jieqi_core::Move> {
        Some(jieqi_core::Move::new(
            LinearBoard::square_at(self.from(), orientation)?,
            LinearBoard::square_at(self.to(), orientation)?,
        ))
    }

    pub fn from_move(mv: jieqi_core::Move, orientation: Orientation) -> LinearMove {
        LinearMove::new(
            LinearBoard::index_of(mv.from, orientation),
            LinearBoard::index_of(mv.to, orientation),
        )
    }
}

#[inline]
fn step(index: usize, offset: isize) -> usize {
    // out-of-range results read as sentinels
    index.checked_add_signed(offset).unwrap_or(usize::MAX)
}

#[inline]
fn is_enemy(cell: Cell) -> bool {
    matches!(cell, Cell::Occupied(p) if p.side() == Side::Black)
}

/// Logical `(row, col)` of a playable index in red's view.
#[inline]
fn coords(index: usize) -> (usize, usize) {
    (index / STRIDE - PAD, index % STRIDE - PAD)
}

#[inline]
fn in_palace(index: usize) -> bool {
    let (row, col) = coords(index);
    row <= 2 && (3..=5).contains(&col)
}

#[inline]
fn own_half(index: usize) -> bool {
    coords(index).0 <= 4
}

/// True once a red-view piece has crossed the river.
#[inline]
pub fn crossed_river(index: usize) -> bool {
    coords(index).0 >= 5
}

/// Generates moves in order of source square (a0, b0, .., i9), buffering
/// one source's targets at a time.
pub struct MoveGenerator {
    phase: GenPhase,
    /// Next logical square to scan
    square: usize,
    /// Targets from the current source
    pending: Vec<LinearMove>,
    cursor: usize,
    captures_only: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum GenPhase {
    Scan,
    Done,
}

impl MoveGenerator {
    /// Generator over every pseudo-legal move.
    pub fn new() -> Self {
        Self {
            phase: GenPhase::Scan,
            square: 0,
            pending: Vec::with_capacity(17),
            cursor: 0,
            captures_only: false,
        }
    }

    /// Generator over captures only.
    pub fn captures() -> Self {
        Self {
            captures_only: true,
            ..Self::new()
        }
    }

    /// Get the next move, or None if exhausted.
    pub fn next(&mut self, board: &LinearBoard) -> Option<LinearMove> {
        loop {
            if let Some(&mv) = self.pending.get(self.cursor) {
                self.cursor += 1;
                return Some(mv);
            }
            if self.phase == GenPhase::Done {
                return None;
            }
            self.pending.clear();
            self.cursor = 0;
            match Square::from_index(self.square) {
                Some(square) => {
                    self.square += 1;
                    let from = LinearBoard::index_of(square, Orientation::Normal);
                    if let Cell::Occupied(piece) = board.cell(from) {
                        if piece.side() == Side::Red {
                            push_targets(board, from, piece, self.captures_only, &mut self.pending);
                        }
                    }
                }
                None => self.phase = GenPhase::Done,
            }
        }
    }
}

impl Default for MoveGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// All pseudo-legal moves for red.
pub fn generate(board: &LinearBoard) -> Vec<LinearMove> {
    collect(board, MoveGenerator::new())
}

/// Captures for red.
pub fn generate_captures(board: &LinearBoard) -> Vec<LinearMove> {
    collect(board, MoveGenerator::captures())
}

fn collect(board: &LinearBoard, mut gen: MoveGenerator) -> Vec<LinearMove> {
    let mut moves = Vec::with_capacity(64);
    while let Some(mv) = gen.next(board) {
        moves.push(mv);
    }
    moves
}

fn push_targets(board: &LinearBoard, from: usize, piece: Piece, captures_only: bool, out: &mut Vec<LinearMove>) {
    let mut push = |to: usize| {
        let cell = board.cell(to);
        let ok = if captures_only {
            is_enemy(cell)
        } else {
            cell == Cell::Empty || is_enemy(cell)
        };
        if ok {
            out.push(LinearMove::new(from, to));
        }
    };

    // Covered pieces move as their slot kind. A covered advisor keeps to
    // the palace and a covered minister to its own half.
    match piece.kind() {
        Kind::Chariot => {
            for dir in ORTHOGONAL {
                let mut to = step(from, dir);
                loop {
                    let cell = board.cell(to);
                    if cell == Cell::Empty {
                        push(to);
                        to = step(to, dir);
                        continue;
                    }
                    if is_enemy(cell) {
                        push(to);
                    }
                    break;
                }
            }
        }
        Kind::Cannon => {
            for dir in ORTHOGONAL {
                let mut to = step(from, dir);
                while board.cell(to) == Cell::Empty {
                    push(to);
                    to = step(to, dir);
                }
                if board.cell(to).is_offboard() {
                    continue;
                }
                // jump the screen to the next piece
                to = step(to, dir);
                while board.cell(to) == Cell::Empty {
                    to = step(to, dir);
                }
                if is_enemy(board.cell(to)) {
                    push(to);
                }
            }
        }
        Kind::Horse => {
            for (leg, landings) in HORSE {
                if board.cell(step(from, leg)) != Cell::Empty {
                    continue;
                }
                for offset in landings {
                    push(step(from, offset));
                }
            }
        }
        Kind::Minister => {
            for dir in DIAGONAL {
                if board.cell(step(from, dir)) != Cell::Empty {
                    continue;
                }
                let to = step(from, 2 * dir);
                if piece.is_covered() && !board.cell(to).is_offboard() && !own_half(to) {
                    continue;
                }
                push(to);
            }
        }
        Kind::Advisor => {
            for dir in DIAGONAL {
                let to = step(from, dir);
                if piece.is_covered() && !board.cell(to).is_offboard() && !in_palace(to) {
                    continue;
                }
                push(to);
            }
        }
        Kind::General => {
            for dir in ORTHOGONAL {
                let to = step(from, dir);
                if !board.cell(to).is_offboard() && in_palace(to) {
                    push(to);
                }
            }
            // facing generals
            let mut to = step(from, UP);
            while board.cell(to) == Cell::Empty {
                to = step(to, UP);
            }
            if matches!(board.cell(to), Cell::Occupied(p) if p.side() == Side::Black && p.kind() == Kind::General) {
                push(to);
            }
        }
        Kind::Soldier => {
            push(step(from, UP));
            if crossed_river(from) {
                push(step(from, 1));
                push(step(from, -1));
            }
        }
    }
}

/// True if `to` holds the opponent's general.
#[inline]
pub fn captures_general(board: &LinearBoard, mv: LinearMove) -> bool {
    matches!(board.cell(mv.to()), Cell::Occupied(p) if p.kind() == Kind::General && p.side() == Side::Black)
}
