//! Per-side tally of covered pieces still unrevealed, by true kind.
//!
//! The ledger is rebuilt from the full history on every request and never
//! kept between requests: history is the only source of truth, so retries,
//! branches and out-of-order calls all see a consistent count.

use serde::Serialize;
use tracing::debug;

use crate::piece::{Kind, Side};
use crate::record::MoveRecord;

/// Remaining covered counts indexed `[side][kind]`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct HiddenPieceLedger {
    counts: [[u8; Kind::COUNT]; 2],
    /// Covered pieces captured without an asserted identity.
    unidentified: [u8; 2],
}

impl HiddenPieceLedger {
    /// Full starting distribution for both sides.
    pub fn initial() -> HiddenPieceLedger {
        let mut counts = [[0u8; Kind::COUNT]; 2];
        for side in Side::all() {
            for kind in Kind::COVERABLE {
                counts[side.index()][kind.index()] = kind.initial_count();
            }
        }
        HiddenPieceLedger {
            counts,
            unidentified: [0; 2],
        }
    }

    /// Replay capture events from `history` against the initial distribution.
    pub fn build(history: &[MoveRecord]) -> HiddenPieceLedger {
        let mut ledger = HiddenPieceLedger::initial();
        for (index, record) in history.iter().enumerate() {
            match (record.revealed_capture(), record.captured) {
                (Some((side, kind)), _) => ledger.record_reveal(side, kind),
                (None, Some(piece)) if piece.is_covered() => {
                    let side = piece.side();
                    debug!(index, side = side.name(), "covered capture without real type");
                    ledger.unidentified[side.index()] =
                        ledger.unidentified[side.index()].saturating_add(1);
                }
                _ => {}
            }
        }
        ledger
    }

    /// Decrement one (side, kind) counter, clamped at zero.
    ///
    /// A general assertion or a kind already at zero is ignored.
    pub fn record_reveal(&mut self, side: Side, kind: Kind) {
        let slot = &mut self.counts[side.index()][kind.index()];
        if *slot == 0 {
            debug!(side = side.name(), ?kind, "reveal beyond remaining count ignored");
            return;
        }
        *slot -= 1;
    }

    /// Covered instances of `kind` still unaccounted for.
    #[inline]
    pub fn count(&self, side: Side, kind: Kind) -> u8 {
        self.counts[side.index()][kind.index()]
    }

    /// Instances of `kind` revealed by capture so far.
    #[inline]
    pub fn revealed(&self, side: Side, kind: Kind) -> u8 {
        if kind == Kind::General {
            return 0;
        }
        kind.initial_count().saturating_sub(self.count(side, kind))
    }

    /// Sum of the per-kind counts.
    pub fn total(&self, side: Side) -> u32 {
        self.counts[side.index()].iter().map(|&c| u32::from(c)).sum()
    }

    #[inline]
    pub fn unidentified(&self, side: Side) -> u8 {
        self.unidentified[side.index()]
    }

    /// Covered pieces of `side` that can still be on the board.
    pub fn covered_on_board(&self, side: Side) -> u32 {
        self.total(side).saturating_sub(u32::from(self.unidentified(side)))
    }

    /// Probability that a covered piece of `side` turns out to be `kind`.
    ///
    /// Falls back to the starting distribution once every count is zero.
    pub fn weight(&self, side: Side, kind: Kind) -> f64 {
        if kind == Kind::General {
            return 0.0;
        }
        let total = self.total(side);
        if total == 0 {
            return f64::from(kind.initial_count()) / 15.0;
        }
        f64::from(self.count(side, kind)) / f64::from(total)
    }
}

impl Default for HiddenPieceLedger {
    fn default() -> Self {
        Self::initial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Square;
    use crate::piece::Piece;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sq(row: usize, col: usize) -> Square {
        Square::new(row, col).unwrap()
    }

    fn capture(captured: char, real: Option<Kind>) -> MoveRecord {
        MoveRecord::new(sq(0, 0), sq(9, 0), Piece::from_symbol('R').unwrap())
            .capturing(Piece::from_symbol(captured).unwrap(), real)
    }

    #[test]
    fn test_initial_distribution() {
        let ledger = HiddenPieceLedger::initial();
        for side in Side::all() {
            assert_eq!(ledger.count(side, Kind::Chariot), 2);
            assert_eq!(ledger.count(side, Kind::Soldier), 5);
            assert_eq!(ledger.count(side, Kind::General), 0);
            assert_eq!(ledger.total(side), 15);
        }
    }

    #[test]
    fn test_empty_history_is_initial() {
        assert_eq!(HiddenPieceLedger::build(&[]), HiddenPieceLedger::initial());
    }

    #[test]
    fn test_covered_capture_decrements_owner() {
        // a black covered piece on a chariot slot turned out to be a cannon
        let ledger = HiddenPieceLedger::build(&[capture('d', Some(Kind::Cannon))]);
        assert_eq!(ledger.count(Side::Black, Kind::Cannon), 1);
        assert_eq!(ledger.count(Side::Black, Kind::Chariot), 2);
        assert_eq!(ledger.count(Side::Red, Kind::Cannon), 2);
        assert_eq!(ledger.revealed(Side::Black, Kind::Cannon), 1);
    }

    #[test]
    fn test_revealed_capture_ignored() {
        let ledger = HiddenPieceLedger::build(&[capture('r', Some(Kind::Chariot))]);
        assert_eq!(ledger, HiddenPieceLedger::initial());
    }

    #[test]
    fn test_clamped_at_zero() {
        let history: Vec<_> = (0..5).map(|_| capture('E', Some(Kind::Horse))).collect();
        let ledger = HiddenPieceLedger::build(&history);
        assert_eq!(ledger.count(Side::Red, Kind::Horse), 0);
        assert_eq!(ledger.revealed(Side::Red, Kind::Horse), 2);
    }

    #[test]
    fn test_general_assertion_ignored() {
        let ledger = HiddenPieceLedger::build(&[capture('i', Some(Kind::General))]);
        assert_eq!(ledger, HiddenPieceLedger::initial());
    }

    #[test]
    fn test_unidentified_capture() {
        let ledger = HiddenPieceLedger::build(&[capture('I', None)]);
        assert_eq!(ledger.unidentified(Side::Red), 1);
        assert_eq!(ledger.total(Side::Red), 15);
        assert_eq!(ledger.covered_on_board(Side::Red), 14);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let ledger = HiddenPieceLedger::build(&[
            capture('d', Some(Kind::Chariot)),
            capture('g', Some(Kind::Soldier)),
        ]);
        for side in Side::all() {
            let sum: f64 = Kind::COVERABLE.iter().map(|&k| ledger.weight(side, k)).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
        assert!((ledger.weight(Side::Black, Kind::Chariot) - 1.0 / 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_random_history_never_negative() {
        let mut rng = StdRng::seed_from_u64(42);
        let covered = b"DEFGHIdefghi";
        for _ in 0..100 {
            let history: Vec<_> = (0..rng.random_range(0..60))
                .map(|_| {
                    let symbol = covered[rng.random_range(0..covered.len())] as char;
                    let real = Kind::COVERABLE[rng.random_range(0..6)];
                    capture(symbol, Some(real))
                })
                .collect();
            let ledger = HiddenPieceLedger::build(&history);
            for side in Side::all() {
                for kind in Kind::COVERABLE {
                    let count = ledger.count(side, kind);
                    assert!(count <= kind.initial_count());
                    assert!(count + ledger.revealed(side, kind) <= kind.initial_count());
                }
            }
        }
    }
}
