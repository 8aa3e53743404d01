//! HTTP telemetry server.
//!
//! Exposes every registered session: derived metrics, sample history, alerts
//! with operator resolution, schedule control and snapshot export.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use vigil_core::{
    Alert, AlertId, DerivedMetrics, ExportFormat, HealthReport, HealthStatus, Sample,
    ScheduleConfig, SessionInfo, SessionRegistry, TelemetrySession, TickStatus, VigilError,
};

/// Shared server state.
struct AppState {
    registry: Arc<SessionRegistry>,
}

impl AppState {
    fn session(&self, subject: &str) -> Result<Arc<TelemetrySession>, ApiError> {
        Ok(self.registry.get(subject)?)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Engine error mapped onto an HTTP status.
#[derive(Debug)]
struct ApiError(VigilError);

impl From<VigilError> for ApiError {
    fn from(e: VigilError) -> Self {
        Self(e)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            VigilError::NotFound { .. } => StatusCode::NOT_FOUND,
            VigilError::InvalidConfig { .. }
            | VigilError::InvalidRule { .. }
            | VigilError::InvalidSample { .. }
            | VigilError::Export { .. } => StatusCode::BAD_REQUEST,
            VigilError::SchedulerClosed | VigilError::AlreadyStarted => StatusCode::CONFLICT,
            VigilError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            success: false,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct SessionsResponse {
    sessions: Vec<SessionInfo>,
    total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct HistoryResponse {
    subject: String,
    capacity: usize,
    samples: Vec<Sample>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertsParams {
    include_resolved: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AlertsResponse {
    subject: String,
    alerts: Vec<Alert>,
    total: usize,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleUpdate {
    enabled: Option<bool>,
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ExportParams {
    format: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let subjects = state.registry.subjects();
    let first = subjects
        .first()
        .map_or("system-health", String::as_str)
        .to_string();
    Json(serde_json::json!({
        "name": "Vigil Telemetry Server",
        "version": vigil_core::VERSION,
        "sessions": subjects,
        "endpoints": {
            "/": "This API index",
            "/health": "Overall and per-session health",
            "/sessions": "List sessions with schedule and alert counts",
            "/sessions/{subject}/metrics": "Derived KPIs for the current window",
            "/sessions/{subject}/history": "Samples in the current window, oldest first",
            "/sessions/{subject}/alerts": {
                "method": "GET",
                "params": { "include_resolved": "Include resolved alerts (default: false)" }
            },
            "/sessions/{subject}/alerts/{id}/resolve": { "method": "POST" },
            "/sessions/{subject}/schedule": {
                "method": "GET | POST",
                "body": { "enabled": "bool", "interval_ms": "u64" }
            },
            "/sessions/{subject}/refresh": { "method": "POST", "description": "Run one tick now" },
            "/sessions/{subject}/export": {
                "method": "GET",
                "params": { "format": "csv or json (default: json)" }
            },
        },
        "examples": {
            "metrics": format!("/sessions/{first}/metrics"),
            "all_alerts": "/sessions/system-health/alerts?include_resolved=true",
            "csv_export": "/sessions/system-health/export?format=csv",
        }
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = state.registry.health();
    let status = if report.status == HealthStatus::Outage {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

async fn handle_sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    let sessions = state.registry.list();
    let total = sessions.len();
    Json(SessionsResponse { sessions, total })
}

async fn handle_metrics(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<Json<DerivedMetrics>, ApiError> {
    Ok(Json(state.session(&subject)?.current_metrics()))
}

async fn handle_history(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let snapshot = state.session(&subject)?.snapshot();
    Ok(Json(HistoryResponse {
        subject,
        capacity: snapshot.capacity,
        samples: snapshot.samples.clone(),
    }))
}

async fn handle_alerts(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<AlertsParams>,
) -> Result<Json<AlertsResponse>, ApiError> {
    let alerts = state
        .session(&subject)?
        .alerts(params.include_resolved.unwrap_or(false));
    let total = alerts.len();
    Ok(Json(AlertsResponse {
        subject,
        alerts,
        total,
    }))
}

async fn handle_resolve(
    State(state): State<Arc<AppState>>,
    Path((subject, id)): Path<(String, AlertId)>,
) -> Result<Json<Alert>, ApiError> {
    Ok(Json(state.session(&subject)?.resolve_alert(id)?))
}

async fn handle_get_schedule(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<Json<ScheduleConfig>, ApiError> {
    Ok(Json(state.session(&subject)?.schedule()))
}

async fn handle_set_schedule(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Json(update): Json<ScheduleUpdate>,
) -> Result<Json<ScheduleConfig>, ApiError> {
    let session = state.session(&subject)?;
    if let Some(interval_ms) = update.interval_ms {
        session.set_interval(interval_ms)?;
    }
    if let Some(enabled) = update.enabled {
        session.set_schedule_enabled(enabled)?;
    }
    Ok(Json(session.schedule()))
}

async fn handle_refresh(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
) -> Result<Json<TickStatus>, ApiError> {
    let session = state.session(&subject)?;
    let status = tokio::task::spawn_blocking(move || session.refresh())
        .await
        .unwrap_or_else(|e| TickStatus::Degraded {
            reason: format!("refresh task failed: {e}"),
        });
    Ok(Json(status))
}

async fn handle_export(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = match params.format.as_deref() {
        Some(f) => f.parse()?,
        None => ExportFormat::default(),
    };
    let body = state.session(&subject)?.export_snapshot(format)?;
    let disposition = format!(
        "attachment; filename=\"{subject}.{}\"",
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the axum router over a session registry.
pub fn build_router(registry: Arc<SessionRegistry>) -> Router {
    let state = Arc::new(AppState { registry });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/sessions", get(handle_sessions))
        .route("/sessions/{subject}/metrics", get(handle_metrics))
        .route("/sessions/{subject}/history", get(handle_history))
        .route("/sessions/{subject}/alerts", get(handle_alerts))
        .route("/sessions/{subject}/alerts/{id}/resolve", post(handle_resolve))
        .route(
            "/sessions/{subject}/schedule",
            get(handle_get_schedule).post(handle_set_schedule),
        )
        .route("/sessions/{subject}/refresh", post(handle_refresh))
        .route("/sessions/{subject}/export", get(handle_export))
        .with_state(state)
}

/// Run the HTTP telemetry server until the listener fails.
pub async fn run_server(
    registry: Arc<SessionRegistry>,
    host: &str,
    port: u16,
) -> std::io::Result<()> {
    let app = build_router(registry);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app).await
}
