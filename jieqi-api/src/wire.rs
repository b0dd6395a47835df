//! JSON models shared with the web client, and their conversion to and
//! from the core types.

use serde::{Deserialize, Serialize};

use jieqi_core::analysis::{Evaluation, Recommendation, WinProbability};
use jieqi_core::calibrate::AdvantageLevel;
use jieqi_core::{Board, GameRequest, InputError, Kind, MoveRecord, Piece, Position, Side, Square};

// =============================================================================
// Requests
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareModel {
    pub row: i64,
    pub col: i64,
}

impl From<Square> for SquareModel {
    fn from(square: Square) -> Self {
        SquareModel {
            row: square.row() as i64,
            col: square.col() as i64,
        }
    }
}

/// One history entry as the web client records it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryModel {
    pub from: Option<SquareModel>,
    pub to: Option<SquareModel>,
    #[serde(default)]
    pub piece: String,
    #[serde(default)]
    pub captured_piece: Option<String>,
    #[serde(default)]
    pub captured_piece_real_type: Option<String>,
    #[serde(default)]
    pub player: Option<String>,
    #[serde(default)]
    pub board_state_after: Option<Vec<Vec<String>>>,
}

/// Body shared by every position endpoint.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRequest {
    #[serde(default)]
    pub board: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub current_player: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntryModel>,
    /// Clamped later by [`crate::ServiceConfig::limits`].
    #[serde(default)]
    pub depth: Option<i64>,
    #[serde(default)]
    pub time_budget_ms: Option<i64>,
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.trim().chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

/// An absent, empty or `.` symbol means no piece.
fn optional_piece(text: Option<&str>) -> Result<Option<Piece>, String> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty() && *t != ".") else {
        return Ok(None);
    };
    single_char(text)
        .and_then(Piece::from_symbol)
        .map(Some)
        .ok_or_else(|| format!("unknown piece symbol {text:?}"))
}

fn real_type(text: Option<&str>) -> Result<Option<Kind>, String> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    match single_char(text).and_then(Kind::from_letter) {
        Some(Kind::General) | None => Err(format!("{text:?} is not a coverable piece type")),
        Some(kind) => Ok(Some(kind)),
    }
}

impl HistoryEntryModel {
    pub fn to_record(&self, index: usize) -> Result<MoveRecord, InputError> {
        let bad = |reason: String| InputError::BadRecord { index, reason };

        let square = |model: Option<SquareModel>, name: &str| {
            let model = model.ok_or_else(|| bad(format!("missing {name} square")))?;
            Square::from_wire(model.row, model.col).map_err(|err| bad(err.to_string()))
        };
        let from = square(self.from, "from")?;
        let to = square(self.to, "to")?;

        let piece = optional_piece(Some(self.piece.as_str()))
            .map_err(bad)?
            .ok_or_else(|| bad("missing moved piece".to_string()))?;

        if let Some(player) = self.player.as_deref() {
            let side = Side::from_name(player).ok_or_else(|| bad(format!("unknown player {player:?}")))?;
            if side != piece.side() {
                return Err(bad(format!("{} moved a {} piece", side.name(), piece.side().name())));
            }
        }

        let mut record = MoveRecord::new(from, to, piece);
        if let Some(captured) = optional_piece(self.captured_piece.as_deref()).map_err(bad)? {
            let real = real_type(self.captured_piece_real_type.as_deref()).map_err(bad)?;
            record = record.capturing(captured, real);
        }
        if let Some(rows) = &self.board_state_after {
            let board = Board::from_rows(rows).map_err(|err| bad(err.to_string()))?;
            record = record.with_board_after(board);
        }
        Ok(record)
    }
}

impl PositionRequest {
    /// Decode into the core request. Missing player defaults to red.
    pub fn to_game_request(&self) -> Result<GameRequest, InputError> {
        let rows = self.board.as_ref().ok_or(InputError::MissingBoard)?;
        let board = Board::from_rows(rows)?;
        let side = match self.current_player.as_deref() {
            None => Side::Red,
            Some(name) => Side::from_name(name).ok_or_else(|| InputError::UnknownSide(name.to_string()))?,
        };
        let history = self
            .history
            .iter()
            .enumerate()
            .map(|(index, entry)| entry.to_record(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GameRequest::new(Position::new(board, side), history))
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveModel {
    pub from: SquareModel,
    pub to: SquareModel,
    pub piece: String,
    pub captured_piece: Option<String>,
    pub is_capture: bool,
    pub ucci: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationModel {
    pub success: bool,
    pub r#move: MoveModel,
    pub score: i32,
    pub depth: u8,
    /// Milliseconds.
    pub search_time: u64,
    pub forced_repetition: bool,
    pub forbidden_moves: Vec<String>,
    pub details: Vec<String>,
}

impl From<Recommendation> for RecommendationModel {
    fn from(rec: Recommendation) -> Self {
        let mut details = vec![format!("recommended {} at depth {}", rec.mv, rec.depth)];
        if rec.forced_repetition {
            details.push("every candidate repeats a position; best move played anyway".to_string());
        }
        if !rec.forbidden.is_empty() {
            details.push(format!("{} move(s) excluded for repetition", rec.forbidden.len()));
        }
        RecommendationModel {
            success: true,
            r#move: MoveModel {
                from: rec.mv.from.into(),
                to: rec.mv.to.into(),
                piece: rec.piece.symbol().to_string(),
                captured_piece: rec.captured.map(|p| p.symbol().to_string()),
                is_capture: rec.captured.is_some(),
                ucci: rec.mv.to_string(),
            },
            score: rec.score,
            depth: rec.depth,
            search_time: rec.elapsed.as_millis() as u64,
            forced_repetition: rec.forced_repetition,
            forbidden_moves: rec.forbidden.iter().map(ToString::to_string).collect(),
            details,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdvantageModel {
    pub level: AdvantageLevel,
    pub side: Option<Side>,
    pub percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct EvaluationModel {
    pub success: bool,
    pub score: i32,
    pub evaluation: String,
    pub advantage: AdvantageModel,
}

impl From<Evaluation> for EvaluationModel {
    fn from(eval: Evaluation) -> Self {
        EvaluationModel {
            success: true,
            score: eval.score,
            evaluation: eval.advantage.label,
            advantage: AdvantageModel {
                level: eval.advantage.level,
                side: eval.advantage.side,
                percentage: eval.advantage.percentage,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinProbabilityModel {
    pub success: bool,
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
    pub side_to_move: Side,
    pub side_to_move_win: f64,
}

impl From<WinProbability> for WinProbabilityModel {
    fn from(odds: WinProbability) -> Self {
        WinProbabilityModel {
            success: true,
            win: odds.wdl.win,
            draw: odds.wdl.draw,
            loss: odds.wdl.loss,
            side_to_move: odds.side_to_move,
            side_to_move_win: odds.side_to_move_win,
        }
    }
}

/// Keys stay snake_case: the web client reads `ai_available`.
#[derive(Debug, Serialize)]
pub struct GameStatusModel {
    pub ai_available: bool,
    /// Seconds since the Unix epoch.
    pub server_time: f64,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthModel {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorModel {
    pub success: bool,
    pub code: &'static str,
    pub error: String,
}
