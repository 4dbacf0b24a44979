//! HTTP serving surface for the normalizer.
//!
//! Exposes the response normalizer as a JSON endpoint so the chat frontend
//! (and the workflow engine sitting between it and the agent) can call it
//! over HTTP instead of embedding the logic.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/normalize` | Normalize raw agent output into a response payload |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the PWA frontend is
//! served from a different origin than this API.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::models::{NormalizedResponse, SessionContext};
use crate::normalize::{normalize, NormalizeOptions};

/// Shared application state passed to route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Start the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/normalize", post(handle_normalize))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("arcbot server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ GET /health ============

/// JSON response body for `GET /health`. The version string doubles as the
/// cache-busting version the PWA shows in its about panel.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/normalize ============

/// Request body for `POST /api/normalize`.
#[derive(Debug, Deserialize)]
struct NormalizeRequest {
    /// Raw text produced by the upstream agent.
    raw_output: String,
    #[serde(default)]
    session: SessionFields,
}

/// Session context as supplied by the caller; both fields optional.
#[derive(Debug, Default, Deserialize)]
struct SessionFields {
    session_id: Option<String>,
    history_count: Option<i64>,
}

/// Handler for `POST /api/normalize`.
///
/// Cannot fail for any `raw_output` string — the normalizer degrades to
/// plain-text passthrough internally. A missing session id is replaced with
/// a generated UUID so the caller always gets one back.
async fn handle_normalize(
    State(state): State<AppState>,
    Json(request): Json<NormalizeRequest>,
) -> Json<NormalizedResponse> {
    let session = SessionContext {
        session_id: request
            .session
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        history_count: request.session.history_count.unwrap_or(0),
    };

    let options = NormalizeOptions {
        merge_sources: state.config.normalizer.merge_sources,
    };

    Json(normalize(&request.raw_output, &session, &options))
}
