//! Reference jieqi search engine.
//!
//! Implements [`jieqi_core::SearchEngine`] on the padded linear board:
//! offset move generation ([`movegen`]), ledger-aware material evaluation
//! ([`eval`]) and iterative-deepening alpha-beta ([`search`]).

pub mod eval;
pub mod movegen;
pub mod search;
pub mod stats;

pub use search::{Engine, EngineConfig, MATE, MATE_BOUND};
