//! HTTP surface: JSON request/response handlers over the engine
//!
//! Handlers return `Result<Json<T>, StatusCode>`; the status code carries
//! the error category (4xx for input problems, 502 when the model backend
//! is down, 500 otherwise) and the body of a completed-with-error analysis
//! carries the user-safe message in its envelope. The chat endpoint streams
//! newline-delimited JSON.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::engine::{AnalysisOutcome, InsightEngine};
use crate::error::EngineError;
use crate::store::dataset::{DatasetSummary, StorageType};
use crate::store::Job;

/// Shared application state
pub type AppState = Arc<InsightEngine>;

fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::Input { .. } => StatusCode::BAD_REQUEST,
        EngineError::Resolution { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        EngineError::Execution { .. } | EngineError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn router(engine: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/datasets", get(list_datasets))
        .route("/api/datasets/:id", get(dataset_summary))
        .route("/api/datasets/:id/columns", post(reconfigure_column))
        .route("/api/analyze", post(analyze))
        .route("/api/jobs/:id", get(get_job))
        .route("/api/chat", post(chat))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

/// Start the web server
pub async fn start_server(engine: InsightEngine, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(Arc::new(engine));
    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!(host, port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct UploadResponse {
    dataset: DatasetSummary,
}

async fn upload(
    State(engine): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or(StatusCode::BAD_REQUEST)?;
        let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let dataset = engine.upload(&bytes, &filename).map_err(|e| {
            error!(error = %e, filename, "upload rejected");
            status_for(&e)
        })?;
        return Ok(Json(UploadResponse { dataset }));
    }
    Err(StatusCode::BAD_REQUEST)
}

async fn list_datasets(State(engine): State<AppState>) -> Json<Vec<DatasetSummary>> {
    Json(engine.list_datasets())
}

async fn dataset_summary(
    State(engine): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DatasetSummary>, StatusCode> {
    engine
        .dataset_summary(&id)
        .map(Json)
        .map_err(|e| status_for(&e))
}

#[derive(Deserialize)]
struct ReconfigureRequest {
    column: String,
    storage_type: StorageType,
}

async fn reconfigure_column(
    State(engine): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ReconfigureRequest>,
) -> Result<Json<DatasetSummary>, StatusCode> {
    engine
        .reconfigure_column(&id, &request.column, request.storage_type)
        .map(Json)
        .map_err(|e| {
            error!(error = %e, dataset = %id, "column reconfigure failed");
            status_for(&e)
        })
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    dataset_id: String,
    prompt: String,
}

async fn analyze(
    State(engine): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisOutcome>, StatusCode> {
    engine
        .analyze(&request.dataset_id, &request.prompt)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, dataset = %request.dataset_id, "analyze rejected");
            status_for(&e)
        })
}

async fn get_job(
    State(engine): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, StatusCode> {
    engine.job(&id).map(Json).map_err(|e| status_for(&e))
}

#[derive(Deserialize)]
struct ChatRequest {
    job_id: String,
}

/// Stream the explanation of a finished job as newline-delimited JSON
async fn chat(
    State(engine): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, StatusCode> {
    let receiver = engine.explain(&request.job_id).await.map_err(|e| status_for(&e))?;

    let lines = ReceiverStream::new(receiver).map(|chunk| {
        let mut line = serde_json::to_string(&chunk).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        Ok::<_, Infallible>(line)
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(lines))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn health_check(State(engine): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "datasets": engine.store.len(),
    }))
}
