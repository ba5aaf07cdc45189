//! API Request Handlers

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Json, Path as UrlPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::types::*;
use crate::config::AppConfig;
use crate::core::registry::{RunMode, RunRegistry};
use crate::models::errors::AppError;

/// Shared application state
pub struct AppState {
    pub registry: Arc<RunRegistry>,
    pub config: Arc<AppConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::with_registry(config, RunRegistry::new())
    }

    /// Tests swap in a registry pointed at a stub API
    pub fn with_registry(config: AppConfig, registry: RunRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type ErrorReply = (StatusCode, Json<ApiResponse<()>>);

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn error_reply(err: &AppError, start: Instant) -> ErrorReply {
    let status = StatusCode::from_u16(err.code.http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiResponse::error(ApiError::from(err), elapsed_ms(start))),
    )
}

fn bad_request(message: &str, start: Instant) -> ErrorReply {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::error(
            ApiError::bad_request(message),
            elapsed_ms(start),
        )),
    )
}

// ============================================
// Run / Transfer
// ============================================

/// Start the full pipeline. Without a gift id the Run is unattended and
/// terminates at the selection step; the transfer endpoint is the directed
/// entry point.
pub async fn run_pipeline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<ApiResponse<RunStartedData>>, ErrorReply> {
    let start = Instant::now();

    let config = req.to_config(&state.config);
    let mode = match &req.gift_id {
        Some(id) if !id.trim().is_empty() => RunMode::Directed(id.trim().to_string()),
        _ => RunMode::Unattended,
    };

    let started = state
        .registry
        .start(config, mode)
        .map_err(|e| error_reply(&e, start))?;

    Ok(Json(ApiResponse::success(
        RunStartedData {
            job_id: started.job_id,
            log_file: started.log_file,
            message: "Transfer pipeline started successfully".to_string(),
        },
        elapsed_ms(start),
    )))
}

/// Start a directed Run for one specific gift
pub async fn start_transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<ApiResponse<RunStartedData>>, ErrorReply> {
    let start = Instant::now();

    let gift_id = match &req.gift_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => return Err(bad_request("Gift ID is required.", start)),
    };

    let config = req.to_config(&state.config);
    let started = state
        .registry
        .start(config, RunMode::Directed(gift_id))
        .map_err(|e| error_reply(&e, start))?;

    Ok(Json(ApiResponse::success(
        RunStartedData {
            job_id: started.job_id,
            log_file: started.log_file,
            message: "Gift transfer started successfully".to_string(),
        },
        elapsed_ms(start),
    )))
}

// ============================================
// Status / Stop
// ============================================

pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<StatusData>> {
    let start = Instant::now();
    let status = state.registry.status();

    Json(ApiResponse::success(
        StatusData {
            running: status.running,
            output: status.output,
        },
        elapsed_ms(start),
    ))
}

pub async fn stop_run(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<MessageData>>, ErrorReply> {
    let start = Instant::now();

    state.registry.stop().map_err(|e| error_reply(&e, start))?;

    Ok(Json(ApiResponse::success(
        MessageData {
            message: "Process termination requested.".to_string(),
        },
        elapsed_ms(start),
    )))
}

// ============================================
// Gifts
// ============================================

/// Read-only gift listing; runs the pipeline's validation prefix inline
pub async fn get_gifts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RunRequest>,
) -> Result<Json<ApiResponse<GiftsData>>, ErrorReply> {
    let start = Instant::now();

    let config = req.to_config(&state.config);
    let gifts = state
        .registry
        .list_gifts(config)
        .await
        .map_err(|e| error_reply(&e, start))?;

    Ok(Json(ApiResponse::success(
        GiftsData {
            total: gifts.len(),
            gifts,
        },
        elapsed_ms(start),
    )))
}

// ============================================
// Log artifacts
// ============================================

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<LogsData>> {
    let start = Instant::now();

    let mut logs = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(&state.config.log_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".log") {
                logs.push(name);
            }
        }
    }
    // Most recent first; names embed the Run timestamp
    logs.sort_by(|a, b| b.cmp(a));

    Json(ApiResponse::success(LogsData { logs }, elapsed_ms(start)))
}

pub async fn download_log(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Result<Response, ErrorReply> {
    let start = Instant::now();

    // Bare .log names only; the log dir is the whole reachable surface
    if filename.contains('/')
        || filename.contains('\\')
        || filename.contains("..")
        || !filename.ends_with(".log")
    {
        return Err(not_found_reply(start));
    }

    let path = Path::new(&state.config.log_dir).join(&filename);
    serve_log_file(&path, &filename, start).await
}

pub async fn download_current_log(
    State(state): State<Arc<AppState>>,
) -> Result<Response, ErrorReply> {
    let start = Instant::now();

    let path = match state.registry.current_log_file() {
        Some(path) => path,
        None => return Err(not_found_reply(start)),
    };
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    serve_log_file(&path, &filename, start).await
}

async fn serve_log_file(
    path: &Path,
    filename: &str,
    start: Instant,
) -> Result<Response, ErrorReply> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|_| not_found_reply(start))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(contents.into())
        .map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(
                    ApiError::internal("Failed to build response"),
                    elapsed_ms(start),
                )),
            )
        })
}

fn not_found_reply(start: Instant) -> ErrorReply {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error(
            ApiError::not_found("Log file not found."),
            elapsed_ms(start),
        )),
    )
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        running: state.registry.is_running(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
