//! Boundary to a move-search engine.

use std::time::Duration;

use crate::board::{Move, Position};
use crate::error::EngineError;
use crate::ledger::HiddenPieceLedger;
use crate::repetition::ForbiddenMoveSet;

/// One ranked search result. Scores are from the side to move's view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Completed iteration depth; 0 for the static fallback.
    pub depth: u8,
    pub mv: Move,
    pub score: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_depth: u8,
    pub time_budget: Duration,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_depth: 4,
            time_budget: Duration::from_millis(2000),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SearchRequest<'a> {
    pub position: &'a Position,
    pub ledger: &'a HiddenPieceLedger,
    pub forbidden: &'a ForbiddenMoveSet,
    pub limits: SearchLimits,
}

/// Lazily produced candidates, improving by depth. Callers may stop
/// pulling at any point.
pub type CandidateStream<'a> = Box<dyn Iterator<Item = Result<Candidate, EngineError>> + 'a>;

/// A stateful search engine. Not assumed reentrant: callers serialise
/// access to one instance.
pub trait SearchEngine: Send {
    /// Pseudo-legal moves for the side to move, in a deterministic order.
    fn legal_moves(&self, position: &Position) -> Vec<Move>;

    /// Static score from the side to move's view.
    fn evaluate(&mut self, position: &Position, ledger: &HiddenPieceLedger) -> Result<i32, EngineError>;

    /// Start a time-boxed search.
    fn search<'a>(&'a mut self, request: SearchRequest<'a>) -> Result<CandidateStream<'a>, EngineError>;
}
