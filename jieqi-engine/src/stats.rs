//! Search statistics tracking.

use std::time::Instant;

use tracing::{debug, info};

/// Counters for one search call.
#[derive(Debug)]
pub struct SearchStats {
    /// Nodes visited by the main search
    pub nodes: u64,

    /// Nodes visited by the capture search
    pub qnodes: u64,

    /// Transposition entries that cut off or narrowed the window
    pub tt_hits: u64,

    /// Beta cutoffs
    pub cutoffs: u64,

    /// Deepest ply reached, quiescence included
    pub max_ply: u32,

    /// Iterations thrown away because the budget ran out mid-way
    pub aborted_iterations: u32,

    start_time: Instant,
}

impl SearchStats {
    pub fn new() -> Self {
        Self {
            nodes: 0,
            qnodes: 0,
            tt_hits: 0,
            cutoffs: 0,
            max_ply: 0,
            aborted_iterations: 0,
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn total_nodes(&self) -> u64 {
        self.nodes + self.qnodes
    }

    /// Nodes per second since the search started.
    pub fn nodes_per_sec(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_nodes() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log one completed iteration.
    pub fn log_iteration(&self, depth: u8, score: i32, best: &str) {
        let cut_pct = if self.nodes > 0 {
            100.0 * self.cutoffs as f64 / self.nodes as f64
        } else {
            0.0
        };
        debug!(
            depth,
            score,
            best,
            nodes = self.nodes,
            qnodes = self.qnodes,
            tt_hits = self.tt_hits,
            cutoffs = format_args!("{cut_pct:.1}%"),
            max_ply = self.max_ply,
            nps = format_args!("{:.0}", self.nodes_per_sec()),
            "iteration complete"
        );
    }

    /// Log the final summary.
    pub fn log_summary(&self, depth: u8) {
        info!(
            depth,
            nodes = self.total_nodes(),
            elapsed_ms = self.start_time.elapsed().as_millis() as u64,
            aborted = self.aborted_iterations,
            "search finished"
        );
    }
}

impl Default for SearchStats {
    fn default() -> Self {
        Self::new()
    }
}
