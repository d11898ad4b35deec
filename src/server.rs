//! HTTP surface for batch shot analysis.
//!
//! This module provides an HTTP server that:
//! - Accepts a recorded pose sequence via POST /analyze
//! - Runs it through a fresh shot detector
//! - Optionally forwards each shot to the coaching feedback service
//!
//! # Architecture
//!
//! ```text
//! Client ──→ POST /analyze ──→ ShotDetector ──→ ShotReport ──→ feedback service
//!                                                   ↓
//!                                            [SessionSummary]
//! ```

use crate::config::{EngineConfig, LeadSide};
use crate::core::{ReportBuilder, SessionSummary, ShotDetector, ShotReport};
use crate::feedback::{FeedbackClient, FeedbackConfig, FeedbackResponse};
use crate::pose::PoseFrame;
use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Engine settings used for every request unless overridden
    pub engine: EngineConfig,
    /// Feedback service to forward shots to, if any
    pub feedback: Option<FeedbackConfig>,
}

impl ServerConfig {
    pub fn new(port: u16, engine: EngineConfig, feedback: Option<FeedbackConfig>) -> Self {
        Self {
            port,
            engine,
            feedback,
        }
    }
}

/// Shared server state
pub struct ServerState {
    engine: EngineConfig,
    feedback: Option<FeedbackClient>,
}

impl ServerState {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let feedback = match config.feedback {
            Some(ref feedback) => Some(FeedbackClient::new(feedback.clone())?),
            None => None,
        };
        Ok(Self {
            engine: config.engine.clone(),
            feedback,
        })
    }
}

/// Body of POST /analyze
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// Shooting arm; defaults to the server's engine setting
    #[serde(default)]
    pub lead_side: Option<LeadSide>,
    /// Full engine override for this request
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub frames: Vec<PoseFrame>,
}

/// One detected shot with its feedback, if any was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedShot {
    pub report: ShotReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackResponse>,
}

/// Response from the analyze endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub frames_processed: usize,
    pub shots: Vec<AnalyzedShot>,
    pub summary: SessionSummary,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub feedback_configured: bool,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        feedback_configured: state.feedback.is_some(),
    })
}

/// POST /analyze
///
/// Segments the submitted frames into shots and returns one report per shot
/// plus a session summary.
async fn analyze(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    if request.frames.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "NO_FRAMES",
            "Request contains no frames",
        ));
    }

    let mut engine = request.engine.unwrap_or_else(|| state.engine.clone());
    if let Some(side) = request.lead_side {
        engine.lead_side = side;
    }
    let detector = ShotDetector::new(engine.clone())
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "INVALID_CONFIG", e.to_string()))?;

    let frames_processed = request.frames.len();
    let mut builder = ReportBuilder::new(engine.lead_side);
    if let Some(session_id) = request.session_id {
        builder = builder.with_session_id(session_id);
    }

    // Detection is pure computation; keep it off the async workers.
    let frames = request.frames;
    let reports = tokio::task::spawn_blocking(move || detect_all(detector, frames, &builder))
        .await
        .map_err(|e| {
            tracing::error!("Detection task failed: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DETECTION_FAILED",
                e.to_string(),
            )
        })?;

    if reports.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "NO_SHOTS_DETECTED",
            format!("No shots detected in {frames_processed} frames"),
        ));
    }

    let feedback = request_feedback(state.feedback.as_ref(), &reports).await;
    let summary = SessionSummary::from_reports(&reports).with_feedback(
        reports
            .iter()
            .zip(&feedback)
            .filter_map(|(report, response)| Some((report, response.as_ref()?))),
    );
    let shots = reports
        .into_iter()
        .zip(feedback)
        .map(|(report, feedback)| AnalyzedShot { report, feedback })
        .collect();

    Ok(Json(AnalyzeResponse {
        frames_processed,
        shots,
        summary,
    }))
}

fn detect_all(
    mut detector: ShotDetector,
    frames: Vec<PoseFrame>,
    builder: &ReportBuilder,
) -> Vec<ShotReport> {
    frames
        .into_iter()
        .filter_map(|frame| detector.ingest(frame))
        .map(|event| builder.build(&event))
        .collect()
}

/// Ask for feedback on every report concurrently. Failures leave a gap.
async fn request_feedback(
    client: Option<&FeedbackClient>,
    reports: &[ShotReport],
) -> Vec<Option<FeedbackResponse>> {
    let mut results = vec![None; reports.len()];
    let Some(client) = client else {
        return results;
    };

    let mut tasks = JoinSet::new();
    for (index, report) in reports.iter().enumerate() {
        let client = client.clone();
        let report = report.clone();
        tasks.spawn(async move { (index, client.analyze(&report).await) });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(response))) => results[index] = Some(response),
            Ok((index, Err(e))) => tracing::warn!("Feedback for shot {} failed: {}", index + 1, e),
            Err(e) => tracing::warn!("Feedback task failed: {}", e),
        }
    }
    results
}

/// Build the router.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("FormCheck server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
