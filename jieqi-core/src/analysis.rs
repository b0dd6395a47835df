//! Per-request pipeline: rebuild ledger and history, ask the engine,
//! adjudicate repetitions, calibrate the score.
//!
//! Nothing here outlives a call. Every request brings its full history and
//! everything derived from it is rebuilt from scratch.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::board::{Move, Position};
use crate::calibrate::{advantage, red_perspective, win_draw_loss, Advantage, CalibrationConfig, Wdl};
use crate::engine::{SearchEngine, SearchLimits, SearchRequest};
use crate::error::{EngineError, InputError, ServiceError};
use crate::ledger::HiddenPieceLedger;
use crate::piece::{Piece, Side};
use crate::record::MoveRecord;
use crate::repetition::{forbidden_moves, ForbiddenMoveSet, HistoryIndex, MoveSelector};

/// A decoded client request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRequest {
    pub position: Position,
    pub history: Vec<MoveRecord>,
}

impl GameRequest {
    pub fn new(position: Position, history: Vec<MoveRecord>) -> GameRequest {
        GameRequest { position, history }
    }
}

/// Request-scoped state derived from the history.
#[derive(Clone, Debug)]
pub struct Prepared {
    pub ledger: HiddenPieceLedger,
    pub history: HistoryIndex,
    /// False when the replay ended somewhere other than the supplied board.
    pub replay_consistent: bool,
}

/// Validate the board and replay the history. No engine involved.
pub fn prepare(request: &GameRequest) -> Result<Prepared, InputError> {
    request.position.board.validate()?;
    let ledger = HiddenPieceLedger::build(&request.history);
    let history = HistoryIndex::build(&request.history)?;
    let replay_consistent = history.check_against(&request.position);
    Ok(Prepared {
        ledger,
        history,
        replay_consistent,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct Recommendation {
    pub mv: Move,
    pub piece: Piece,
    pub captured: Option<Piece>,
    /// Side to move's view.
    pub score: i32,
    pub depth: u8,
    pub forced_repetition: bool,
    pub forbidden: Vec<Move>,
    pub elapsed: Duration,
}

/// Pick a move for the side to move.
pub fn recommend<E>(
    engine: &mut E,
    request: &GameRequest,
    limits: SearchLimits,
) -> Result<Recommendation, ServiceError>
where
    E: SearchEngine + ?Sized,
{
    let prepared = prepare(request)?;
    let position = &request.position;

    let legal = engine.legal_moves(position);
    if legal.is_empty() {
        return Err(ServiceError::NoMove);
    }
    let forbidden: ForbiddenMoveSet = forbidden_moves(position, &prepared.history, &legal);
    debug!(
        legal = legal.len(),
        forbidden = forbidden.len(),
        history = request.history.len(),
        "searching"
    );

    let start = Instant::now();
    let choice = {
        let stream = engine.search(SearchRequest {
            position,
            ledger: &prepared.ledger,
            forbidden: &forbidden,
            limits,
        })?;
        let mut selector = MoveSelector::new(&forbidden);
        for candidate in stream {
            selector.observe(candidate?);
        }
        selector.finish().ok_or(ServiceError::NoMove)?
    };
    let elapsed = start.elapsed();

    let mv = choice.candidate.mv;
    let piece = position
        .board
        .get(mv.from)
        .ok_or_else(|| EngineError::Search(format!("engine proposed {mv} from an empty square")))?;
    if choice.forced_repetition {
        warn!(%mv, forbidden = forbidden.len(), "every candidate repeats a position; playing best anyway");
    }

    Ok(Recommendation {
        mv,
        piece,
        captured: position.board.get(mv.to),
        score: choice.candidate.score,
        depth: choice.candidate.depth,
        forced_repetition: choice.forced_repetition,
        forbidden: forbidden.iter().copied().collect(),
        elapsed,
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Red's view.
    pub score: i32,
    pub advantage: Advantage,
}

fn red_score<E>(engine: &mut E, request: &GameRequest) -> Result<i32, ServiceError>
where
    E: SearchEngine + ?Sized,
{
    let prepared = prepare(request)?;
    let score = engine.evaluate(&request.position, &prepared.ledger)?;
    Ok(red_perspective(score, request.position.side_to_move))
}

pub fn evaluate<E>(
    engine: &mut E,
    request: &GameRequest,
    config: &CalibrationConfig,
) -> Result<Evaluation, ServiceError>
where
    E: SearchEngine + ?Sized,
{
    let score = red_score(engine, request)?;
    Ok(Evaluation {
        score,
        advantage: advantage(score, config),
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WinProbability {
    /// Red's view.
    pub wdl: Wdl,
    pub side_to_move: Side,
    pub side_to_move_win: f64,
}

/// Outcome odds. Game progress is measured by the history length.
pub fn win_probability<E>(
    engine: &mut E,
    request: &GameRequest,
    config: &CalibrationConfig,
) -> Result<WinProbability, ServiceError>
where
    E: SearchEngine + ?Sized,
{
    let score = red_score(engine, request)?;
    let wdl = win_draw_loss(score, request.history.len(), config);
    let side_to_move = request.position.side_to_move;
    Ok(WinProbability {
        wdl,
        side_to_move,
        side_to_move_win: wdl.for_side(side_to_move),
    })
}
