//! Iterative-deepening negamax with alpha-beta pruning, capture
//! quiescence and a transposition table.
//!
//! Every node sees the board from the mover's side: after a move the board
//! is flipped, so move generation and evaluation only ever deal with red.
//! A moved covered piece stays covered in the tree; what it would turn out
//! to be is priced by the ledger-weighted expectation instead.

use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use xxhash_rust::xxh64::xxh64;

use jieqi_core::engine::{Candidate, CandidateStream, SearchEngine, SearchRequest};
use jieqi_core::transcode::{Cell, LinearBoard, Orientation};
use jieqi_core::{EngineError, HiddenPieceLedger, Move, Position};

use crate::eval::{evaluate, piece_value, CoveredValues};
use crate::movegen::{captures_general, generate, generate_captures, LinearMove};
use crate::stats::SearchStats;

/// Score for capturing the general at the root.
pub const MATE: i32 = 30_000;
/// Scores at or beyond this are forced wins or losses.
pub const MATE_BOUND: i32 = MATE - 512;
const INFINITY: i32 = 32_000;

/// Nodes between deadline and stop-flag checks.
const CHECK_INTERVAL: u64 = 1024;
const MAX_QUIESCENCE: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transposition table size in MiB.
    pub tt_mb: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { tt_mb: 16 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Bound {
    #[default]
    Exact,
    Lower,
    Upper,
}

#[derive(Clone, Copy, Debug, Default)]
struct TtEntry {
    key: u64,
    /// 0 never matches; searches count from 1
    generation: u16,
    depth: u8,
    bound: Bound,
    score: i32,
    best: LinearMove,
}

#[inline]
fn hash(board: &LinearBoard) -> u64 {
    xxh64(&board.codes(), 0)
}

/// Successor seen from the new mover's side.
#[inline]
fn make(board: &LinearBoard, mv: LinearMove) -> LinearBoard {
    let mut child = *board;
    child.make_move(mv.from(), mv.to());
    child.flipped()
}

/// Reference engine. One instance per process; access is serialised by
/// the caller.
pub struct Engine {
    table: Vec<TtEntry>,
    generation: u16,
    stop: Arc<AtomicBool>,
}

impl Engine {
    /// Allocate the transposition table. A zero size or a failed
    /// allocation is an initialisation error.
    pub fn new(config: EngineConfig) -> Result<Engine, EngineError> {
        let entries = config.tt_mb.saturating_mul(1024 * 1024) / size_of::<TtEntry>();
        if entries == 0 {
            return Err(EngineError::Init("transposition table size must be positive".to_string()));
        }
        let mut table = Vec::new();
        table
            .try_reserve_exact(entries)
            .map_err(|e| EngineError::Init(format!("cannot allocate {} MiB transposition table: {e}", config.tt_mb)))?;
        table.resize(entries, TtEntry::default());
        info!(tt_mb = config.tt_mb, entries, "engine ready");
        Ok(Engine {
            table,
            generation: 0,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that interrupts a running search at its next checkpoint. Reset
    /// at the start of every search.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn check_generals(position: &Position) -> Result<(), String> {
        if position.board.general(position.side_to_move).is_none() {
            return Err(format!("{} general missing", position.side_to_move.name()));
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        info!("engine released");
    }
}

impl SearchEngine for Engine {
    fn legal_moves(&self, position: &Position) -> Vec<Move> {
        let orientation = Orientation::for_side(position.side_to_move);
        generate(&LinearBoard::from_position(position))
            .into_iter()
            .filter_map(|mv| mv.to_move(orientation))
            .collect()
    }

    fn evaluate(&mut self, position: &Position, ledger: &HiddenPieceLedger) -> Result<i32, EngineError> {
        Self::check_generals(position).map_err(EngineError::Evaluation)?;
        let covered = CoveredValues::new(ledger, position.side_to_move);
        Ok(evaluate(&LinearBoard::from_position(position), covered))
    }

    fn search<'a>(&'a mut self, request: SearchRequest<'a>) -> Result<CandidateStream<'a>, EngineError> {
        let position = request.position;
        Self::check_generals(position).map_err(EngineError::Search)?;

        self.stop.store(false, Ordering::Relaxed);
        self.generation = self.generation.wrapping_add(1).max(1);

        let orientation = Orientation::for_side(position.side_to_move);
        let root = LinearBoard::from_position(position);
        let all = generate(&root);
        let allowed: Vec<LinearMove> = all
            .iter()
            .copied()
            .filter(|mv| {
                mv.to_move(orientation)
                    .is_some_and(|m| !request.forbidden.contains(&m))
            })
            .collect();
        let moves = if allowed.is_empty() {
            debug!(moves = all.len(), "every root move forbidden; searching all");
            all
        } else {
            allowed
        };

        let start = Instant::now();
        let searcher = Searcher {
            table: &mut self.table,
            generation: self.generation,
            stop: &self.stop,
            deadline: start.checked_add(request.limits.time_budget),
            stats: SearchStats::new(),
            stopped: false,
        };
        Ok(Box::new(SearchIter {
            finished: moves.is_empty(),
            searcher,
            root,
            orientation,
            covered: CoveredValues::new(request.ledger, position.side_to_move),
            moves,
            next_depth: 0,
            max_depth: request.limits.max_depth,
            last_depth: 0,
            exhausted: false,
        }))
    }
}

// =============================================================================
// Tree search
// =============================================================================

struct Searcher<'a> {
    table: &'a mut [TtEntry],
    generation: u16,
    stop: &'a AtomicBool,
    /// None when the budget overflows `Instant`
    deadline: Option<Instant>,
    stats: SearchStats,
    stopped: bool,
}

impl Searcher<'_> {
    #[inline]
    fn out_of_time(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Cooperative checkpoint.
    #[inline]
    fn poll(&mut self) -> bool {
        if !self.stopped && self.stats.total_nodes() % CHECK_INTERVAL == 0 && self.out_of_time() {
            self.stopped = true;
        }
        self.stopped
    }

    #[inline]
    fn slot(&self, key: u64) -> usize {
        (key % self.table.len() as u64) as usize
    }

    fn probe(&self, key: u64) -> Option<TtEntry> {
        let entry = self.table[self.slot(key)];
        (entry.generation == self.generation && entry.key == key).then_some(entry)
    }

    fn store(&mut self, key: u64, depth: u8, bound: Bound, score: i32, best: LinearMove) {
        let slot = self.slot(key);
        let current = self.table[slot];
        if current.generation == self.generation && current.depth > depth && current.key != key {
            return;
        }
        self.table[slot] = TtEntry {
            key,
            generation: self.generation,
            depth,
            bound,
            score,
            best,
        };
    }

    fn negamax(
        &mut self,
        board: &LinearBoard,
        covered: CoveredValues,
        depth: u8,
        mut alpha: i32,
        beta: i32,
        ply: u32,
    ) -> i32 {
        if depth == 0 {
            return self.quiescence(board, covered, alpha, beta, ply, 0);
        }
        self.stats.nodes += 1;
        self.stats.max_ply = self.stats.max_ply.max(ply);
        if self.poll() {
            return 0;
        }

        let key = hash(board);
        let mut tt_move = None;
        if let Some(entry) = self.probe(key) {
            tt_move = Some(entry.best);
            if entry.depth >= depth {
                let usable = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => entry.score >= beta,
                    Bound::Upper => entry.score <= alpha,
                };
                if usable {
                    self.stats.tt_hits += 1;
                    return entry.score;
                }
            }
        }

        let mut moves = generate(board);
        if moves.is_empty() {
            return -(MATE - ply as i32);
        }
        order(board, &mut moves, tt_move);

        let original_alpha = alpha;
        let mut best = -INFINITY;
        let mut best_move = moves[0];
        for mv in moves {
            if captures_general(board, mv) {
                best = MATE - ply as i32 - 1;
                best_move = mv;
                break;
            }
            let child = make(board, mv);
            let score = -self.negamax(&child, covered.swapped(), depth - 1, -beta, -alpha, ply + 1);
            if self.stopped {
                return 0;
            }
            if score > best {
                best = score;
                best_move = mv;
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                self.stats.cutoffs += 1;
                break;
            }
        }

        let bound = if best <= original_alpha {
            Bound::Upper
        } else if best >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.store(key, depth, bound, best, best_move);
        best
    }

    fn quiescence(
        &mut self,
        board: &LinearBoard,
        covered: CoveredValues,
        mut alpha: i32,
        beta: i32,
        ply: u32,
        qdepth: u32,
    ) -> i32 {
        self.stats.qnodes += 1;
        self.stats.max_ply = self.stats.max_ply.max(ply);
        if self.poll() {
            return 0;
        }

        let stand_pat = evaluate(board, covered);
        if stand_pat >= beta {
            return stand_pat;
        }
        alpha = alpha.max(stand_pat);
        if qdepth >= MAX_QUIESCENCE {
            return alpha;
        }

        let mut captures = generate_captures(board);
        order(board, &mut captures, None);
        for mv in captures {
            if captures_general(board, mv) {
                return MATE - ply as i32 - 1;
            }
            let child = make(board, mv);
            let score = -self.quiescence(&child, covered.swapped(), -beta, -alpha, ply + 1, qdepth + 1);
            if self.stopped {
                return 0;
            }
            if score >= beta {
                self.stats.cutoffs += 1;
                return score;
            }
            alpha = alpha.max(score);
        }
        alpha
    }

    /// One full-width root iteration. None if interrupted.
    fn root(&mut self, board: &LinearBoard, covered: CoveredValues, moves: &[LinearMove], depth: u8) -> Option<Vec<i32>> {
        let mut alpha = -INFINITY;
        let mut scores = Vec::with_capacity(moves.len());
        for &mv in moves {
            let score = if captures_general(board, mv) {
                MATE - 1
            } else {
                let child = make(board, mv);
                -self.negamax(&child, covered.swapped(), depth - 1, -INFINITY, -alpha, 1)
            };
            if self.stopped {
                return None;
            }
            alpha = alpha.max(score);
            scores.push(score);
        }
        Some(scores)
    }
}

/// Most valuable victim first, then least valuable attacker; the table
/// move goes in front of everything.
fn order(board: &LinearBoard, moves: &mut [LinearMove], tt_move: Option<LinearMove>) {
    moves.sort_by_cached_key(|&mv| {
        if Some(mv) == tt_move {
            return i32::MIN;
        }
        match board.cell(mv.to()) {
            Cell::Occupied(victim) => {
                let attacker = board.cell(mv.from()).piece().map_or(0, |p| piece_value(p.kind()));
                let victim = match victim.kind() {
                    jieqi_core::Kind::General => MATE,
                    kind => piece_value(kind),
                };
                -(10 * victim - attacker / 10 + 1)
            }
            _ => 0,
        }
    });
}

/// Stable sort of `moves` by descending score.
fn rank(moves: &mut Vec<LinearMove>, scores: &[i32]) {
    let mut paired: Vec<(LinearMove, i32)> = moves.iter().copied().zip(scores.iter().copied()).collect();
    paired.sort_by_key(|&(_, score)| std::cmp::Reverse(score));
    *moves = paired.into_iter().map(|(mv, _)| mv).collect();
}

// =============================================================================
// Candidate stream
// =============================================================================

struct SearchIter<'a> {
    searcher: Searcher<'a>,
    root: LinearBoard,
    orientation: Orientation,
    covered: CoveredValues,
    /// Root moves, best first after each completed iteration
    moves: Vec<LinearMove>,
    next_depth: u8,
    max_depth: u8,
    last_depth: u8,
    /// No further iteration will run
    exhausted: bool,
    finished: bool,
}

impl SearchIter<'_> {
    fn candidate(&self, depth: u8, mv: LinearMove, score: i32) -> Result<Candidate, EngineError> {
        let mv = mv
            .to_move(self.orientation)
            .ok_or_else(|| EngineError::Search(format!("root move {mv:?} leaves the board")))?;
        Ok(Candidate { depth, mv, score })
    }

    /// Depth-0 fallback: best one-ply static score.
    fn static_order(&mut self) -> (LinearMove, i32) {
        let scores: Vec<i32> = self
            .moves
            .iter()
            .map(|&mv| {
                if captures_general(&self.root, mv) {
                    MATE - 1
                } else {
                    -evaluate(&make(&self.root, mv), self.covered.swapped())
                }
            })
            .collect();
        rank(&mut self.moves, &scores);
        let best = scores.iter().copied().max().unwrap_or(0);
        (self.moves[0], best)
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.searcher.stats.log_summary(self.last_depth);
        }
    }
}

impl Iterator for SearchIter<'_> {
    type Item = Result<Candidate, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.next_depth == 0 {
            self.next_depth = 1;
            self.exhausted = self.max_depth == 0;
            let (mv, score) = self.static_order();
            return Some(self.candidate(0, mv, score));
        }
        if self.exhausted || self.searcher.out_of_time() {
            self.finish();
            return None;
        }

        let depth = self.next_depth;
        let Some(scores) = self.searcher.root(&self.root, self.covered, &self.moves, depth) else {
            self.searcher.stats.aborted_iterations += 1;
            self.finish();
            return None;
        };
        rank(&mut self.moves, &scores);
        let score = scores.iter().copied().max().unwrap_or(-INFINITY);
        let mv = self.moves[0];
        self.last_depth = depth;
        let shown = mv.to_move(self.orientation).map(|m| m.to_string()).unwrap_or_default();
        self.searcher.stats.log_iteration(depth, score, &shown);

        // a forced result will not change with more depth
        if score.abs() >= MATE_BOUND || depth >= self.max_depth {
            self.exhausted = true;
        } else {
            self.next_depth = depth + 1;
        }
        Some(self.candidate(depth, mv, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jieqi_core::repetition::ForbiddenMoveSet;
    use jieqi_core::{Board, Piece, SearchLimits, Side, Square};
    use std::time::Duration;

    fn sq(row: usize, col: usize) -> Square {
        Square::new(row, col).unwrap()
    }

    fn mv(text: &str) -> Move {
        text.parse().unwrap()
    }

    fn engine() -> Engine {
        Engine::new(EngineConfig { tt_mb: 1 }).unwrap()
    }

    fn limits(max_depth: u8) -> SearchLimits {
        SearchLimits {
            max_depth,
            time_budget: Duration::from_secs(30),
        }
    }

    /// Red chariot a4 facing an undefended black chariot a7.
    fn hanging_chariot() -> Position {
        let mut board = Board::empty();
        board.set(sq(0, 4), Piece::from_symbol('K'));
        board.set(sq(9, 3), Piece::from_symbol('k'));
        board.set(sq(4, 0), Piece::from_symbol('R'));
        board.set(sq(7, 0), Piece::from_symbol('r'));
        Position::new(board, Side::Red)
    }

    fn run(engine: &mut Engine, position: &Position, forbidden: &ForbiddenMoveSet, limits: SearchLimits) -> Vec<Candidate> {
        let ledger = HiddenPieceLedger::initial();
        let stream = engine
            .search(SearchRequest {
                position,
                ledger: &ledger,
                forbidden,
                limits,
            })
            .unwrap();
        stream.map(Result::unwrap).collect()
    }

    #[test]
    fn test_zero_size_table_is_init_error() {
        assert!(matches!(Engine::new(EngineConfig { tt_mb: 0 }), Err(EngineError::Init(_))));
    }

    #[test]
    fn test_oversized_table_is_init_error() {
        assert!(matches!(
            Engine::new(EngineConfig { tt_mb: usize::MAX }),
            Err(EngineError::Init(_))
        ));
    }

    #[test]
    fn test_legal_moves_initial() {
        assert_eq!(engine().legal_moves(&Position::initial()).len(), 44);
    }

    #[test]
    fn test_stream_starts_with_fallback_then_deepens() {
        let mut engine = engine();
        let candidates = run(&mut engine, &hanging_chariot(), &ForbiddenMoveSet::new(), limits(3));
        let depths: Vec<u8> = candidates.iter().map(|c| c.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_takes_hanging_chariot() {
        let mut engine = engine();
        let candidates = run(&mut engine, &hanging_chariot(), &ForbiddenMoveSet::new(), limits(2));
        let last = candidates.last().unwrap();
        assert_eq!(last.mv, mv("a4a7"));
        assert!(last.score > 400);
    }

    #[test]
    fn test_general_capture_is_mate() {
        let mut board = Board::empty();
        board.set(sq(0, 4), Piece::from_symbol('K'));
        board.set(sq(9, 3), Piece::from_symbol('k'));
        board.set(sq(5, 3), Piece::from_symbol('R'));
        let position = Position::new(board, Side::Red);
        let mut engine = engine();
        let candidates = run(&mut engine, &position, &ForbiddenMoveSet::new(), limits(4));
        let last = candidates.last().unwrap();
        assert_eq!(last.mv, mv("d5d9"));
        assert!(last.score >= MATE_BOUND);
        // mate found at depth 1, nothing deeper
        assert_eq!(last.depth, 1);
    }

    #[test]
    fn test_forbidden_root_moves_skipped() {
        let mut engine = engine();
        let forbidden: ForbiddenMoveSet = [mv("a4a7")].into_iter().collect();
        let candidates = run(&mut engine, &hanging_chariot(), &forbidden, limits(2));
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.mv != mv("a4a7")));
    }

    #[test]
    fn test_all_forbidden_still_answers() {
        let mut engine = engine();
        let position = hanging_chariot();
        let forbidden: ForbiddenMoveSet = engine.legal_moves(&position).into_iter().collect();
        let candidates = run(&mut engine, &position, &forbidden, limits(2));
        assert_eq!(candidates.last().unwrap().mv, mv("a4a7"));
    }

    #[test]
    fn test_zero_budget_yields_fallback_only() {
        let mut engine = engine();
        let limits = SearchLimits {
            max_depth: 6,
            time_budget: Duration::ZERO,
        };
        let candidates = run(&mut engine, &Position::initial(), &ForbiddenMoveSet::new(), limits);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].depth, 0);
    }

    #[test]
    fn test_black_to_move_returns_black_moves() {
        let mut engine = engine();
        let position = Position::new(Board::initial(), Side::Black);
        let candidates = run(&mut engine, &position, &ForbiddenMoveSet::new(), limits(2));
        for c in candidates {
            assert_eq!(position.board.get(c.mv.from).map(|p| p.side()), Some(Side::Black));
        }
    }

    #[test]
    fn test_search_is_repeatable() {
        let mut engine = engine();
        let position = Position::initial();
        let first = run(&mut engine, &position, &ForbiddenMoveSet::new(), limits(2));
        let second = run(&mut engine, &position, &ForbiddenMoveSet::new(), limits(2));
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_general_is_engine_error() {
        let mut engine = engine();
        let mut board = Board::empty();
        board.set(sq(9, 4), Piece::from_symbol('k'));
        let position = Position::new(board, Side::Red);
        assert!(matches!(
            engine.evaluate(&position, &HiddenPieceLedger::initial()),
            Err(EngineError::Evaluation(_))
        ));
    }
}
