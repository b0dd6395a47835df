//! Game-state reconciliation for jieqi, the xiangqi variant played with
//! face-down pieces.
//!
//! A stateless web client sends the full board and history with every
//! request. This crate turns that into what a search engine needs and turns
//! the engine's answer back into something a player can read:
//!
//! ```text
//!   client rows ──► Board ──► LinearBoard        (transcode)
//!   history     ──► HiddenPieceLedger           (ledger)
//!   history     ──► HistoryIndex ──► forbidden   (repetition)
//!   engine      ──► candidates ──► MoveSelector  (repetition)
//!   score       ──► Advantage, Wdl               (calibrate)
//! ```
//!
//! # Notation
//!
//! ```text
//! Row 0 is red's back rank, row 9 black's. Columns a..i, rows 0..9.
//!
//!   9  d e f g k g f e d
//!   8  . . . . . . . . .
//!   7  . h . . . . . h .
//!   6  i . i . i . i . i
//!   5  . . . . . . . . .
//!   4  . . . . . . . . .
//!   3  I . I . I . I . I
//!   2  . H . . . . . H .
//!   1  . . . . . . . . .
//!   0  D E F G K G F E D
//!      a b c d e f g h i
//! ```
//!
//! See [`piece`] for the symbol table.

pub mod analysis;
pub mod board;
pub mod calibrate;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod piece;
pub mod record;
pub mod repetition;
pub mod transcode;

pub use analysis::{GameRequest, Prepared, Recommendation};
pub use board::{Board, Move, Position, PositionKey, Square};
pub use calibrate::CalibrationConfig;
pub use engine::{Candidate, CandidateStream, SearchEngine, SearchLimits, SearchRequest};
pub use error::{EngineError, InputError, ServiceError};
pub use ledger::HiddenPieceLedger;
pub use piece::{Kind, Piece, Side, Visibility};
pub use record::MoveRecord;
pub use repetition::{ForbiddenMoveSet, HistoryIndex};
pub use transcode::{Cell, LinearBoard, Orientation};
