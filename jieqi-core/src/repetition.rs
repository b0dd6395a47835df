//! Repetition counting, forbidden moves and fallback move selection.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::board::{Move, Position, PositionKey};
use crate::engine::Candidate;
use crate::error::InputError;
use crate::record::MoveRecord;

/// A move is forbidden once its successor has already occurred this often.
pub const REPETITION_LIMIT: u32 = 2;

/// Occurrence count of every position reached by the supplied history.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HistoryIndex {
    counts: HashMap<PositionKey, u32>,
    /// Last position reached by the replay.
    last: Option<Position>,
}

impl HistoryIndex {
    /// Pick the replay strategy from what the client supplied: snapshots when
    /// every record carries a post-move board, moves otherwise.
    pub fn build(history: &[MoveRecord]) -> Result<HistoryIndex, InputError> {
        if !history.is_empty() && history.iter().all(|r| r.board_after.is_some()) {
            Ok(Self::from_snapshots(history))
        } else {
            Self::from_moves(history)
        }
    }

    /// Replay records from the initial layout.
    pub fn from_moves(history: &[MoveRecord]) -> Result<HistoryIndex, InputError> {
        let mut index = HistoryIndex::default();
        if history.is_empty() {
            return Ok(index);
        }
        let mut position = Position::initial();
        index.record(&position);
        for (i, record) in history.iter().enumerate() {
            position = position.apply_record(record, i)?;
            index.record(&position);
        }
        Ok(index)
    }

    /// Count the post-move boards; records without one are skipped.
    pub fn from_snapshots(history: &[MoveRecord]) -> HistoryIndex {
        let mut index = HistoryIndex::default();
        if history.is_empty() {
            return index;
        }
        index.record(&Position::initial());
        for record in history {
            if let Some(board) = record.board_after {
                index.record(&Position::new(board, record.mover().opponent()));
            }
        }
        index
    }

    fn record(&mut self, position: &Position) {
        *self.counts.entry(position.key()).or_insert(0) += 1;
        self.last = Some(*position);
    }

    /// Times `key` has occurred.
    #[inline]
    pub fn occurrences(&self, key: &PositionKey) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Number of distinct positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Warn when the replay ends somewhere other than the request's board.
    pub fn check_against(&self, current: &Position) -> bool {
        match &self.last {
            Some(last) if last != current => {
                warn!(
                    replayed = %last.key(),
                    supplied = %current.key(),
                    "history replay does not reach the supplied position"
                );
                false
            }
            _ => true,
        }
    }
}

/// Moves excluded because they would create a position for the third time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForbiddenMoveSet {
    moves: BTreeSet<Move>,
}

impl ForbiddenMoveSet {
    pub fn new() -> ForbiddenMoveSet {
        ForbiddenMoveSet::default()
    }

    #[inline]
    pub fn contains(&self, mv: &Move) -> bool {
        self.moves.contains(mv)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Moves in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.moves.iter()
    }
}

impl FromIterator<Move> for ForbiddenMoveSet {
    fn from_iter<T: IntoIterator<Item = Move>>(iter: T) -> Self {
        ForbiddenMoveSet {
            moves: iter.into_iter().collect(),
        }
    }
}

/// Legal moves whose successor already occurred at least
/// [`REPETITION_LIMIT`] times.
///
/// Depends only on its arguments. The candidate move itself does not count
/// as played. Moves of a covered piece are skipped: the successor holds a
/// revealed piece whose identity is not known yet. Captures are looked up
/// like any other move.
pub fn forbidden_moves(
    position: &Position,
    index: &HistoryIndex,
    legal_moves: &[Move],
) -> ForbiddenMoveSet {
    if index.is_empty() {
        return ForbiddenMoveSet::new();
    }
    legal_moves
        .iter()
        .copied()
        .filter(|&mv| !position.reveals(mv))
        .filter(|&mv| index.occurrences(&position.apply(mv).key()) >= REPETITION_LIMIT)
        .collect()
}

// =============================================================================
// Move selection
// =============================================================================

/// Outcome of [`MoveSelector::finish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Choice {
    pub candidate: Candidate,
    /// Every candidate seen was forbidden; the move repeats a position.
    pub forced_repetition: bool,
}

/// Consumes a ranked candidate stream and keeps what the fallback policy
/// needs: the first candidate, the best allowed one and the best scored.
///
/// Allowed candidates rank by `(depth, score)`: a deeper completed iteration
/// supersedes a shallower one. The forced fallback takes the highest score
/// among everything seen, whatever its depth. Earlier candidates win exact
/// ties in both.
#[derive(Debug)]
pub struct MoveSelector<'a> {
    forbidden: &'a ForbiddenMoveSet,
    fallback: Option<Candidate>,
    best_allowed: Option<Candidate>,
    best_scored: Option<Candidate>,
    seen: usize,
}

impl<'a> MoveSelector<'a> {
    pub fn new(forbidden: &'a ForbiddenMoveSet) -> MoveSelector<'a> {
        MoveSelector {
            forbidden,
            fallback: None,
            best_allowed: None,
            best_scored: None,
            seen: 0,
        }
    }

    #[inline]
    fn outranks(candidate: &Candidate, current: &Option<Candidate>) -> bool {
        match current {
            None => true,
            Some(best) => (candidate.depth, candidate.score) > (best.depth, best.score),
        }
    }

    #[inline]
    fn outscores(candidate: &Candidate, current: &Option<Candidate>) -> bool {
        match current {
            None => true,
            Some(best) => candidate.score > best.score,
        }
    }

    pub fn observe(&mut self, candidate: Candidate) {
        self.seen += 1;
        if self.fallback.is_none() {
            self.fallback = Some(candidate);
        }
        if Self::outscores(&candidate, &self.best_scored) {
            self.best_scored = Some(candidate);
        }
        if !self.forbidden.contains(&candidate.mv) && Self::outranks(&candidate, &self.best_allowed) {
            self.best_allowed = Some(candidate);
        }
    }

    /// First candidate ever observed.
    pub fn fallback(&self) -> Option<Candidate> {
        self.fallback
    }

    /// True once a non-forbidden candidate has been seen.
    pub fn has_allowed(&self) -> bool {
        self.best_allowed.is_some()
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Best allowed candidate, else the best scored of all with the forced
    /// flag.
    /// None only if nothing was observed.
    pub fn finish(self) -> Option<Choice> {
        if let Some(candidate) = self.best_allowed {
            return Some(Choice {
                candidate,
                forced_repetition: false,
            });
        }
        let candidate = self.best_scored.or(self.fallback)?;
        debug!(mv = %candidate.mv, seen = self.seen, "all candidates forbidden");
        Some(Choice {
            candidate,
            forced_repetition: true,
        })
    }
}

/// Run a whole candidate sequence through a [`MoveSelector`].
pub fn choose_move<I>(candidates: I, forbidden: &ForbiddenMoveSet) -> Option<Choice>
where
    I: IntoIterator<Item = Candidate>,
{
    let mut selector = MoveSelector::new(forbidden);
    for candidate in candidates {
        selector.observe(candidate);
    }
    selector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Board, Square};
    use crate::piece::{Kind, Piece, Side};

    fn sq(row: usize, col: usize) -> Square {
        Square::new(row, col).unwrap()
    }

    fn mv(text: &str) -> Move {
        text.parse().unwrap()
    }

    fn candidate(depth: u8, text: &str, score: i32) -> Candidate {
        Candidate {
            depth,
            mv: mv(text),
            score,
        }
    }

    /// Generals plus one chariot each, everything revealed.
    fn bare_position() -> Position {
        let mut board = Board::empty();
        board.set(sq(0, 4), Some(Piece::revealed(Side::Red, Kind::General)));
        board.set(sq(9, 3), Some(Piece::revealed(Side::Black, Kind::General)));
        board.set(sq(0, 0), Some(Piece::revealed(Side::Red, Kind::Chariot)));
        board.set(sq(9, 8), Some(Piece::revealed(Side::Black, Kind::Chariot)));
        Position::new(board, Side::Red)
    }

    fn snapshot_record(position: &Position, m: Move) -> (MoveRecord, Position) {
        let next = position.apply(m);
        let piece = position.board.get(m.from).unwrap();
        let record = MoveRecord::new(m.from, m.to, piece).with_board_after(next.board);
        (record, next)
    }

    #[test]
    fn test_empty_history_forbids_nothing() {
        let index = HistoryIndex::build(&[]).unwrap();
        assert!(index.is_empty());
        let position = Position::initial();
        let moves = [mv("b2b9"), mv("a0a1")];
        assert!(forbidden_moves(&position, &index, &moves).is_empty());
    }

    #[test]
    fn test_move_replay_counts_start() {
        let record = MoveRecord::new(sq(3, 0), sq(4, 0), Piece::revealed(Side::Red, Kind::Soldier));
        let index = HistoryIndex::from_moves(&[record]).unwrap();
        assert_eq!(index.occurrences(&Position::initial().key()), 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_move_replay_rejects_empty_source() {
        let record = MoveRecord::new(sq(4, 4), sq(5, 4), Piece::revealed(Side::Red, Kind::Soldier));
        assert!(matches!(
            HistoryIndex::from_moves(&[record]),
            Err(InputError::BadRecord { index: 0, .. })
        ));
    }

    #[test]
    fn test_strategy_selection() {
        // a record with a board snapshot that a move replay could never reach
        let board = bare_position().board;
        let record = MoveRecord::new(sq(4, 4), sq(5, 4), Piece::revealed(Side::Red, Kind::Chariot))
            .with_board_after(board);
        let index = HistoryIndex::build(&[record]).unwrap();
        assert_eq!(index.occurrences(&Position::new(board, Side::Black).key()), 1);
    }

    /// Shuffle both chariots out and back twice, ending where we started.
    fn shuffled_twice() -> (Vec<MoveRecord>, Position) {
        let mut position = bare_position();
        let mut history = Vec::new();
        for _ in 0..2 {
            for m in ["a0a1", "i9i8", "a1a0", "i8i9"] {
                let (record, next) = snapshot_record(&position, mv(m));
                history.push(record);
                position = next;
            }
        }
        (history, position)
    }

    #[test]
    fn test_third_occurrence_forbidden() {
        let (history, position) = shuffled_twice();
        assert_eq!(position, bare_position());
        let index = HistoryIndex::build(&history).unwrap();

        // after a0a1 from here, red chariot on a1 with black to move occurred twice
        let repeat = mv("a0a1");
        let fresh = mv("a0a2");
        let forbidden = forbidden_moves(&position, &index, &[repeat, fresh]);
        assert!(forbidden.contains(&repeat));
        assert!(!forbidden.contains(&fresh));
    }

    #[test]
    fn test_shorter_history_never_grows_forbidden_set() {
        let (history, position) = shuffled_twice();
        let moves = [mv("a0a1"), mv("a0a2"), mv("e0e1"), mv("e0d0")];
        let full = forbidden_moves(&position, &HistoryIndex::build(&history).unwrap(), &moves);
        for len in 0..history.len() {
            let index = HistoryIndex::build(&history[..len]).unwrap();
            let partial = forbidden_moves(&position, &index, &moves);
            assert!(partial.iter().all(|m| full.contains(m)), "len {len}");
        }
    }

    #[test]
    fn test_forbidden_set_is_deterministic() {
        let (history, position) = shuffled_twice();
        let index = HistoryIndex::build(&history).unwrap();
        let moves = [mv("a0a1"), mv("a0a2")];
        assert_eq!(
            forbidden_moves(&position, &index, &moves),
            forbidden_moves(&position, &index, &moves)
        );
    }

    #[test]
    fn test_capture_into_repeated_position_is_forbidden() {
        let mut position = bare_position();
        position.board.set(sq(5, 0), Some(Piece::revealed(Side::Black, Kind::Horse)));
        let capture = mv("a0a5");
        let after = position.apply(capture);
        // the post-capture position already happened twice
        let chariot = Piece::revealed(Side::Red, Kind::Chariot);
        let record = MoveRecord::new(sq(0, 0), sq(5, 0), chariot).with_board_after(after.board);
        let index = HistoryIndex::build(&[record.clone(), record]).unwrap();
        assert_eq!(index.occurrences(&after.key()), 2);
        assert!(!position.reveals(capture));
        let forbidden = forbidden_moves(&position, &index, &[capture]);
        assert!(forbidden.contains(&capture));

        // seen once: still allowed
        let once = MoveRecord::new(sq(0, 0), sq(5, 0), chariot).with_board_after(after.board);
        let index = HistoryIndex::build(&[once]).unwrap();
        assert!(forbidden_moves(&position, &index, &[capture]).is_empty());
    }

    #[test]
    fn test_covered_moves_never_forbidden() {
        let mut position = bare_position();
        let covered = Piece::covered(Side::Red, Kind::Horse).unwrap();
        position.board.set(sq(0, 1), Some(covered));
        let step = mv("b0c2");
        let after = position.apply(step);
        let record = MoveRecord::new(sq(0, 1), sq(2, 2), covered).with_board_after(after.board);
        let index = HistoryIndex::build(&[record.clone(), record]).unwrap();
        assert_eq!(index.occurrences(&after.key()), 2);
        assert!(position.reveals(step));
        assert!(forbidden_moves(&position, &index, &[step]).is_empty());
    }

    #[test]
    fn test_choose_prefers_allowed() {
        let forbidden: ForbiddenMoveSet = [mv("a0a1")].into_iter().collect();
        let choice = choose_move(
            [
                candidate(0, "a0a2", -5),
                candidate(1, "a0a1", 80),
                candidate(1, "a0a3", 10),
            ],
            &forbidden,
        )
        .unwrap();
        assert_eq!(choice.candidate.mv, mv("a0a3"));
        assert!(!choice.forced_repetition);
    }

    #[test]
    fn test_forced_fallback_takes_global_best() {
        let forbidden: ForbiddenMoveSet = [mv("a0a1"), mv("a0a2")].into_iter().collect();
        let choice = choose_move(
            [
                candidate(0, "a0a2", 30),
                candidate(1, "a0a1", 5),
                candidate(1, "a0a2", 12),
            ],
            &forbidden,
        )
        .unwrap();
        assert_eq!(choice.candidate, candidate(0, "a0a2", 30));
        assert!(choice.forced_repetition);
    }

    #[test]
    fn test_forced_fallback_tie_keeps_earlier() {
        let forbidden: ForbiddenMoveSet = [mv("a0a1"), mv("a0a2")].into_iter().collect();
        let choice = choose_move(
            [candidate(1, "a0a1", 7), candidate(2, "a0a2", 7)],
            &forbidden,
        )
        .unwrap();
        assert_eq!(choice.candidate, candidate(1, "a0a1", 7));
        assert!(choice.forced_repetition);
    }

    #[test]
    fn test_selector_tracks_fallback() {
        let forbidden = ForbiddenMoveSet::new();
        let mut selector = MoveSelector::new(&forbidden);
        assert!(selector.fallback().is_none());
        selector.observe(candidate(0, "a0a2", 1));
        selector.observe(candidate(2, "a0a1", 0));
        assert_eq!(selector.fallback().unwrap().mv, mv("a0a2"));
        assert!(selector.has_allowed());
        assert_eq!(selector.finish().unwrap().candidate.mv, mv("a0a1"));
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(choose_move(Vec::new(), &ForbiddenMoveSet::new()), None);
    }
}
