//! Jieqi analysis web API.
//!
//! Stateless over requests: every body carries the board, the side to move
//! and the full history, and the pipeline in [`jieqi_core::analysis`]
//! rebuilds everything from it. The one shared resource is the search
//! engine, created at start-up and used by one request at a time.

pub mod config;
pub mod wire;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use jieqi_core::{analysis, EngineError, GameRequest, SearchEngine, ServiceError};

pub use config::{ConfigError, ServiceConfig};
use wire::{
    ErrorModel, EvaluationModel, GameStatusModel, HealthModel, PositionRequest, RecommendationModel,
    WinProbabilityModel,
};

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidJson(_) => "malformed_input",
            ApiError::Service(err) => err.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::MalformedInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::EngineUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Service(ServiceError::Engine(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Service(ServiceError::NoMove) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidJson(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        } else {
            debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ErrorModel {
            success: false,
            code: self.code(),
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Shared State
// =============================================================================

pub type SharedEngine = Mutex<Box<dyn SearchEngine>>;

pub struct AppStateInner {
    /// None when the engine failed to initialise.
    engine: Option<SharedEngine>,
    config: ServiceConfig,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(engine: Option<Box<dyn SearchEngine>>, config: ServiceConfig) -> AppState {
        Arc::new(AppStateInner {
            engine: engine.map(Mutex::new),
            config,
        })
    }

    pub fn engine_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Run `f` against the engine on the blocking pool, one call at a time.
async fn with_engine<T, F>(state: AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn SearchEngine, &ServiceConfig) -> Result<T, ServiceError> + Send + 'static,
{
    if !state.engine_available() {
        return Err(ServiceError::EngineUnavailable.into());
    }
    let joined = tokio::task::spawn_blocking(move || {
        let engine = state.engine.as_ref().ok_or(ServiceError::EngineUnavailable)?;
        let mut guard = engine.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **guard, &state.config)
    })
    .await;
    match joined {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => Err(ServiceError::from(EngineError::Search(format!("search task failed: {err}"))).into()),
    }
}

fn decode(payload: Result<Json<PositionRequest>, JsonRejection>) -> Result<(PositionRequest, GameRequest), ApiError> {
    let Json(body) = payload?;
    let request = body.to_game_request().map_err(ServiceError::from)?;
    request.position.board.validate().map_err(ServiceError::from)?;
    Ok((body, request))
}

// =============================================================================
// API Endpoints
// =============================================================================

async fn ai_recommendation(
    State(state): State<AppState>,
    payload: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<Json<RecommendationModel>, ApiError> {
    let (body, request) = decode(payload)?;
    let limits = state.config.limits(body.depth, body.time_budget_ms);
    debug!(
        side = request.position.side_to_move.name(),
        history = request.history.len(),
        depth = limits.max_depth,
        budget_ms = limits.time_budget.as_millis() as u64,
        "recommendation requested"
    );
    let recommendation =
        with_engine(state, move |engine, _| analysis::recommend(engine, &request, limits)).await?;
    info!(
        mv = %recommendation.mv,
        score = recommendation.score,
        depth = recommendation.depth,
        forced = recommendation.forced_repetition,
        "recommendation"
    );
    Ok(Json(recommendation.into()))
}

async fn position_evaluation(
    State(state): State<AppState>,
    payload: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<Json<EvaluationModel>, ApiError> {
    let (_, request) = decode(payload)?;
    let evaluation = with_engine(state, move |engine, config| {
        analysis::evaluate(engine, &request, &config.calibration)
    })
    .await?;
    Ok(Json(evaluation.into()))
}

async fn win_probability(
    State(state): State<AppState>,
    payload: Result<Json<PositionRequest>, JsonRejection>,
) -> Result<Json<WinProbabilityModel>, ApiError> {
    let (_, request) = decode(payload)?;
    let odds = with_engine(state, move |engine, config| {
        analysis::win_probability(engine, &request, &config.calibration)
    })
    .await?;
    Ok(Json(odds.into()))
}

async fn game_status(State(state): State<AppState>) -> Json<GameStatusModel> {
    let server_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    Json(GameStatusModel {
        ai_available: state.engine_available(),
        server_time,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel { status: "ok" })
}

// =============================================================================
// Router
// =============================================================================

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ai-recommendation", post(ai_recommendation))
        .route("/api/position-evaluation", post(position_evaluation))
        .route("/api/win-probability", post(win_probability))
        .route("/api/game-status", get(game_status))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}
