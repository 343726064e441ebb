// Meter Readings - REST API with Axum
//
//   GET  /health
//   GET  /accounts
//   GET  /meter-reading-uploads
//   POST /meter-reading-uploads   (multipart, field `file`)

use crate::entities::Account;
use crate::error::IngestError;
use crate::reading::NormalizedReading;
use crate::reconciliation::{IngestionReport, ReconciliationEngine};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Multipart field carrying the CSV upload
pub const UPLOAD_FIELD: &str = "file";

/// Largest accepted upload body; axum's default is 2 MiB
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: ReconciliationEngine,
}

impl AppState {
    pub fn new(engine: ReconciliationEngine) -> Self {
        AppState { engine }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// HTTP error with a stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", message)
    }

    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            tracing::error!(error = %err, "Reading store failure");
            ApiError::internal("reading store unavailable")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /accounts - All known accounts
async fn list_accounts(State(state): State<AppState>) -> Json<Vec<Account>> {
    Json(state.engine.directory().all())
}

/// GET /meter-reading-uploads - Current reading per account
async fn list_readings(
    State(state): State<AppState>,
) -> Result<Json<Vec<NormalizedReading>>, ApiError> {
    let readings = state.engine.store().list().map_err(IngestError::from)?;
    Ok(Json(readings))
}

/// POST /meter-reading-uploads - Ingest a CSV upload
async fn upload_readings(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestionReport>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read upload: {}", e)))?;
            upload = Some(bytes);
            break;
        }
    }

    let bytes = upload
        .ok_or_else(|| ApiError::bad_request(format!("multipart field `{}` is required", UPLOAD_FIELD)))?;
    tracing::info!(bytes = bytes.len(), "Received meter reading upload");

    let engine = state.engine.clone();
    let report = tokio::task::spawn_blocking(move || engine.ingest_csv(&bytes[..]))
        .await
        .map_err(|e| ApiError::internal(format!("ingestion task failed: {}", e)))??;

    Ok(Json(report))
}

// ============================================================================
// Router
// ============================================================================

/// CORS restricted to a single origin; any method and header.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match HeaderValue::from_str(origin) {
        Ok(value) => {
            tracing::info!(origin = %origin, "CORS configured");
            cors.allow_origin(AllowOrigin::exact(value))
        }
        Err(_) => {
            tracing::error!(origin = %origin, "Invalid CORS origin; cross-origin requests disabled");
            cors
        }
    }
}

pub fn router(state: AppState, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/accounts", get(list_accounts))
        .route(
            "/meter-reading-uploads",
            get(list_readings)
                .post(upload_readings)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
