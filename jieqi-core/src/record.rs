//! Client-produced history records.

use crate::board::{Board, Move, Square};
use crate::piece::{Kind, Piece, Side};

/// One move of the supplied history. Read-only to this crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: Square,
    pub to: Square,
    /// Symbol that ended on `to`: the revealed identity when a covered
    /// piece was flipped by moving.
    pub piece: Piece,
    /// Piece that stood on `to` before the move.
    pub captured: Option<Piece>,
    /// Asserted true kind of a captured covered piece.
    pub captured_real: Option<Kind>,
    /// Full board after the move, when the client supplied it.
    pub board_after: Option<Board>,
}

impl MoveRecord {
    pub fn new(from: Square, to: Square, piece: Piece) -> MoveRecord {
        MoveRecord {
            from,
            to,
            piece,
            captured: None,
            captured_real: None,
            board_after: None,
        }
    }

    pub fn capturing(mut self, captured: Piece, real: Option<Kind>) -> MoveRecord {
        self.captured = Some(captured);
        self.captured_real = real;
        self
    }

    pub fn with_board_after(mut self, board: Board) -> MoveRecord {
        self.board_after = Some(board);
        self
    }

    #[inline]
    pub fn mv(&self) -> Move {
        Move::new(self.from, self.to)
    }

    /// Side that made this move.
    #[inline]
    pub fn mover(&self) -> Side {
        self.piece.side()
    }

    /// The covered piece this record reveals by capture, with its asserted
    /// kind: `(owner, kind)`.
    pub fn revealed_capture(&self) -> Option<(Side, Kind)> {
        let captured = self.captured?;
        if !captured.is_covered() {
            return None;
        }
        self.captured_real.map(|kind| (captured.side(), kind))
    }
}
