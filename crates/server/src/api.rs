//! HTTP handlers: facility lookups plus the admin surface.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, warn};

use gridcache_core::{parse_sources, SourceConfig, SourceFormat};
use gridcache_sync::{ReconcileReport, SyncError};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, e: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ── Health ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sources: usize,
    pub routes: usize,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sources: state.sync.job_urls().await.len(),
        routes: state.routes.len(),
    })
}

// ── Configuration ────────────────────────────────────────────────

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Vec<SourceConfig>> {
    Json(state.sync.current_config().await)
}

/// Replace the source list. Accepts a JSON list or `{ "sources": [...] }`.
pub async fn put_config(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<ReconcileReport>, (StatusCode, Json<ErrorResponse>)> {
    if body.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "request body is empty"));
    }
    let list = parse_sources(&body, SourceFormat::Json)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))?;

    match state.sync.apply(list).await {
        Ok(report) => Ok(Json(report)),
        Err(SyncError::Config(e)) => {
            warn!(error = %e, "rejected configuration update");
            Err(error_response(StatusCode::BAD_REQUEST, e))
        }
        Err(e @ SyncError::ShutDown) => Err(error_response(StatusCode::SERVICE_UNAVAILABLE, e)),
    }
}

// ── Lookup ───────────────────────────────────────────────────────

/// Answers `GET <mounted path>/<code>` and `GET <mounted path>?code=<code>`.
///
/// Unknown paths, unknown codes and store failures are all a plain 404.
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = uri.path();
    let matched = match params.get("code") {
        Some(code) => state.routes.resolve_with_code(path, code),
        // Query values arrive decoded, path segments do not.
        None => state.routes.resolve(path).and_then(|mut route| {
            route.code = urlencoding::decode(&route.code).ok()?.into_owned();
            Some(route)
        }),
    };
    let Some(route) = matched else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.store.get(&route.namespace, &route.code).await {
        Ok(Some(value)) => ([(header::CONTENT_TYPE, "application/json")], value).into_response(),
        Ok(None) => {
            debug!(path = %route.path, code = %route.code, "facility code not cached");
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            warn!(path = %route.path, code = %route.code, error = %e, "cache lookup failed");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}
