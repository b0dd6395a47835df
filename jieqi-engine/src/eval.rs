//! Static evaluation: material plus soldier advancement.
//!
//! Covered pieces are worth the expected value of whatever their owner
//! still has face down, weighted by the hidden-piece ledger.

use jieqi_core::piece::{Kind, Side};
use jieqi_core::transcode::{Cell, LinearBoard};
use jieqi_core::HiddenPieceLedger;

use crate::movegen::crossed_river;

/// Material value of a revealed piece.
pub const fn piece_value(kind: Kind) -> i32 {
    match kind {
        Kind::General => 0,
        Kind::Advisor => 120,
        Kind::Minister => 120,
        Kind::Horse => 270,
        Kind::Chariot => 600,
        Kind::Cannon => 285,
        Kind::Soldier => 30,
    }
}

pub const CROSSED_SOLDIER_BONUS: i32 = 40;

/// Expected value of a covered piece for each side as seen on the board:
/// index 0 for the side shown as red (the mover), 1 for the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoveredValues([i32; 2]);

impl CoveredValues {
    pub fn new(ledger: &HiddenPieceLedger, side_to_move: Side) -> CoveredValues {
        let value = |side: Side| -> i32 {
            let expected: f64 = Kind::COVERABLE
                .iter()
                .map(|&kind| ledger.weight(side, kind) * f64::from(piece_value(kind)))
                .sum();
            expected.round() as i32
        };
        CoveredValues([value(side_to_move), value(side_to_move.opponent())])
    }

    /// Values for the opponent's view of the same board.
    #[inline]
    pub fn swapped(self) -> CoveredValues {
        CoveredValues([self.0[1], self.0[0]])
    }

    #[inline]
    pub fn get(self, shown_as: Side) -> i32 {
        self.0[shown_as.index()]
    }
}

/// Score for the side shown as red.
pub fn evaluate(board: &LinearBoard, covered: CoveredValues) -> i32 {
    let mut score = 0;
    for index in LinearBoard::playable() {
        let Cell::Occupied(piece) = board.cell(index) else {
            continue;
        };
        let side = piece.side();
        let mut value = if piece.is_covered() {
            covered.get(side)
        } else {
            piece_value(piece.kind())
        };
        if piece.kind() == Kind::Soldier && !piece.is_covered() {
            let crossed = match side {
                Side::Red => crossed_river(index),
                Side::Black => !crossed_river(index),
            };
            if crossed {
                value += CROSSED_SOLDIER_BONUS;
            }
        }
        match side {
            Side::Red => score += value,
            Side::Black => score -= value,
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use jieqi_core::{Board, Piece, Position, Square};

    #[test]
    fn test_initial_position_is_level() {
        let ledger = HiddenPieceLedger::initial();
        for side in Side::all() {
            let position = Position::new(Board::initial(), side);
            let linear = LinearBoard::from_position(&position);
            assert_eq!(evaluate(&linear, CoveredValues::new(&ledger, side)), 0);
        }
    }

    #[test]
    fn test_covered_value_is_expectation() {
        let ledger = HiddenPieceLedger::initial();
        let values = CoveredValues::new(&ledger, Side::Red);
        // (2*120 + 2*120 + 2*270 + 2*600 + 2*285 + 5*30) / 15
        assert_eq!(values.get(Side::Red), 196);
        assert_eq!(values.get(Side::Red), values.get(Side::Black));
    }

    #[test]
    fn test_ledger_shifts_covered_value() {
        let mut ledger = HiddenPieceLedger::initial();
        ledger.record_reveal(Side::Black, Kind::Chariot);
        ledger.record_reveal(Side::Black, Kind::Chariot);
        let values = CoveredValues::new(&ledger, Side::Red);
        assert!(values.get(Side::Black) < values.get(Side::Red));
        assert_eq!(values.swapped().get(Side::Red), values.get(Side::Black));
    }

    #[test]
    fn test_crossed_soldier_bonus() {
        let mut board = Board::empty();
        board.set(Square::new(0, 4).unwrap(), Piece::from_symbol('K'));
        board.set(Square::new(9, 4).unwrap(), Piece::from_symbol('k'));
        board.set(Square::new(6, 0).unwrap(), Piece::from_symbol('P'));
        let position = Position::new(board, Side::Red);
        let covered = CoveredValues::new(&HiddenPieceLedger::initial(), Side::Red);
        let red_view = evaluate(&LinearBoard::from_position(&position), covered);
        assert_eq!(red_view, 70);
        let black_to_move = Position::new(board, Side::Black);
        let black_view = evaluate(&LinearBoard::from_position(&black_to_move), covered.swapped());
        assert_eq!(black_view, -70);
    }
}
