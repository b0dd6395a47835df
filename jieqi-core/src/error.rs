//! Error taxonomy shared by the pipeline, the engine and the service.

use thiserror::Error;

use crate::piece::Side;

/// Missing or structurally invalid request data. Always detected before
/// any engine call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("board data required")]
    MissingBoard,

    #[error("board must have 10 rows, got {0}")]
    RowCount(usize),

    #[error("row {row} must have 9 squares, got {len}")]
    RowLength { row: usize, len: usize },

    #[error("unknown symbol {symbol:?} at row {row}, col {col}")]
    UnknownSymbol { row: usize, col: usize, symbol: String },

    #[error("{} general is missing", .0.name())]
    MissingGeneral(Side),

    #[error("{} has more than one general", .0.name())]
    DuplicateGeneral(Side),

    #[error("unknown player {0:?}")]
    UnknownSide(String),

    #[error("square ({row}, {col}) is off the board")]
    OffBoard { row: i64, col: i64 },

    #[error("history move {index}: {reason}")]
    BadRecord { index: usize, reason: String },
}

/// Failure reported by the search engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    Init(String),

    #[error("search failed: {0}")]
    Search(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

/// Everything a request can fail with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("AI engine not available")]
    EngineUnavailable,

    #[error(transparent)]
    MalformedInput(#[from] InputError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("no legal move available")]
    NoMove,
}

impl ServiceError {
    /// Stable machine-checkable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::EngineUnavailable => "engine_unavailable",
            ServiceError::MalformedInput(_) => "malformed_input",
            ServiceError::Engine(_) => "engine_error",
            ServiceError::NoMove => "no_move",
        }
    }
}
