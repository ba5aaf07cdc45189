//! API Route Configuration

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers::{self, AppState};
use super::middleware::{
    auth_middleware, logging_middleware, rate_limit_middleware, security_headers_middleware,
};

/// Create the API router with all routes and middleware
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Mutating routes sit behind the shared-secret check
    let protected = Router::new()
        .route("/run", post(handlers::run_pipeline))
        .route("/transfer", post(handlers::start_transfer))
        .route("/stop", post(handlers::stop_run))
        .route("/gifts", post(handlers::get_gifts))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Read-only routes stay open; they leak nothing an operator minds
    let open = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/logs", get(handlers::list_logs))
        .route("/logs/current", get(handlers::download_current_log))
        .route("/logs/:filename", get(handlers::download_log))
        .route("/health", get(handlers::health_check));

    // Build full router
    Router::new()
        .nest("/api", protected.merge(open))
        // Also expose health at root for platform probes
        .route("/health", get(handlers::health_check))
        .with_state(state)
        // Middleware (order matters - bottom runs first)
        // Generous: the inline gift listing may ride out a full retry cycle
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(rate_limit_middleware))
}
