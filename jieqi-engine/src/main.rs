//! Jieqi position analyzer
//!
//! Runs the reference engine on one position and prints every candidate as
//! the search deepens. Ctrl-C stops the search and keeps the best move so far.

use std::error::Error;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jieqi_core::analysis::{self, GameRequest};
use jieqi_core::calibrate::{self, CalibrationConfig};
use jieqi_core::{Board, ForbiddenMoveSet, Position, SearchEngine, SearchLimits, SearchRequest, Side};
use jieqi_engine::{Engine, EngineConfig};

#[derive(Parser, Debug)]
#[command(name = "analyze", version, about = "Analyze a jieqi position")]
struct Args {
    /// Board as 90 symbols, row 0 (red's back rank) first
    #[arg(long)]
    board: Option<String>,

    /// Side to move: red or black
    #[arg(long, default_value = "red")]
    side: String,

    /// Maximum search depth
    #[arg(long, default_value_t = 6)]
    depth: u8,

    /// Time budget in milliseconds
    #[arg(long, default_value_t = 5000)]
    time_ms: u64,

    /// Transposition table size in MiB
    #[arg(long, default_value_t = 16)]
    tt_mb: usize,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let board = match &args.board {
        Some(text) => text.parse::<Board>()?,
        None => Board::initial(),
    };
    let side = Side::from_name(&args.side).ok_or_else(|| format!("unknown side {:?}", args.side))?;
    let position = Position::new(board, side);

    println!("Jieqi analyzer");
    println!("==============");
    println!("{:?}", position.board);
    println!("{} to move, depth {}, {} ms", side.name(), args.depth, args.time_ms);
    println!();

    let mut engine = Engine::new(EngineConfig { tt_mb: args.tt_mb })?;

    // Set up SIGINT handler for a cooperative stop
    let stop = engine.stop_handle();
    ctrlc::set_handler(move || {
        println!("\nInterrupt received, stopping search...");
        stop.store(true, Ordering::SeqCst);
    })?;

    let request = GameRequest::new(position, Vec::new());
    let limits = SearchLimits {
        max_depth: args.depth,
        time_budget: Duration::from_millis(args.time_ms),
    };

    let start = Instant::now();
    let prepared = analysis::prepare(&request)?;
    let forbidden = ForbiddenMoveSet::new();
    let stream = engine.search(SearchRequest {
        position: &request.position,
        ledger: &prepared.ledger,
        forbidden: &forbidden,
        limits,
    })?;
    let mut best = None;
    for candidate in stream {
        let candidate = candidate?;
        println!(
            "depth {:>2}  {}  score {:>6}  {:.2}s",
            candidate.depth,
            candidate.mv,
            candidate.score,
            start.elapsed().as_secs_f64()
        );
        best = Some(candidate);
    }

    println!();
    match best {
        Some(candidate) => {
            let config = CalibrationConfig::default();
            let red = calibrate::red_perspective(candidate.score, side);
            let advantage = calibrate::advantage(red, &config);
            let wdl = calibrate::win_draw_loss(red, 0, &config);
            println!("Best move: {} (depth {})", candidate.mv, candidate.depth);
            println!("{} ({:.1}% red)", advantage.label, advantage.percentage);
            println!("Red win {:.2}  draw {:.2}  loss {:.2}", wdl.win, wdl.draw, wdl.loss);
        }
        None => println!("No legal move."),
    }
    Ok(())
}
