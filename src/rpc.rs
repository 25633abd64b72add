//! HTTP/JSON surface for the coordinator's RPC operations (spec.md 6).
//!
//! The wire format itself is out of scope for the coordinator core — this
//! module is the ambient "facade has an address" surface every service in
//! this pack exposes over `axum` (grounded on `aerolithdb-api/src/rest.rs`).
//! One route per spec.md table row, returning the same JSON shapes the
//! original `zerorpc` service did: a handle→addresses map, a
//! `(handle, addresses)` list, or `null` for "not found" — `NotFound` is
//! recovered data, not an error, so it never becomes a non-200 response.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use shardmaster_core::CoordinatorError;
use shardmaster_service::CoordinatorService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CoordinatorService>,
}

pub fn router(service: Arc<CoordinatorService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/servers", post(register_chunk_server))
        .route("/servers/:addr", delete(unregister_chunk_server))
        .route("/heartbeat", post(heartbeat))
        .route("/files", post(write_file))
        .route("/files/:stem/:suffix", get(get_file).delete(delete_file))
        .route("/files/:stem/:suffix/info", get(fetch_file_info))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { service })
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    let families = state.service.metrics().registry().gather();
    let mut buf = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&families, &mut buf) {
        warn!(error = %e, "failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], buf).into_response()
}

/// Maps `CoordinatorError` to a status code: `AlreadyExists` is a caller
/// mistake (409), `Internal` is opaque and logged (500) — the "outer
/// exception-logging boundary" `DecoratorUtils.exception_logging_decorator`
/// played in the original, here as a response mapping rather than a caught
/// exception converted to a string.
impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        match &self {
            CoordinatorError::AlreadyExists { id } => {
                warn!(server = %id, "rejected: already registered");
                (StatusCode::CONFLICT, self.to_string()).into_response()
            }
            CoordinatorError::Internal(err) => {
                tracing::error!(error = %err, "internal coordinator error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    addr: String,
}

async fn register_chunk_server(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<StatusCode, CoordinatorError> {
    state.service.register_chunk_server(req.addr).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unregister_chunk_server(State(state): State<AppState>, Path(addr): Path<String>) -> StatusCode {
    state.service.unregister_chunk_server(addr).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct HeartbeatRequest {
    addr: String,
    remains: u64,
}

async fn heartbeat(State(state): State<AppState>, Json(req): Json<HeartbeatRequest>) -> StatusCode {
    state.service.heartbeat(req.addr, req.remains).await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct WriteFileRequest {
    file_stem: String,
    file_suffix: String,
    chunk_num: u64,
    replica: Option<usize>,
}

async fn write_file(State(state): State<AppState>, Json(req): Json<WriteFileRequest>) -> impl IntoResponse {
    let map = state
        .service
        .write_file(req.file_stem, req.file_suffix, req.chunk_num, req.replica)
        .await;
    let serializable: std::collections::HashMap<String, Vec<String>> = map
        .into_iter()
        .map(|(handle, servers)| {
            (
                handle.as_str().to_string(),
                servers.iter().map(|s| s.as_str().to_string()).collect(),
            )
        })
        .collect();
    Json(serializable)
}

#[derive(Serialize)]
struct ChunkLocation {
    handle: String,
    addresses: Vec<String>,
}

async fn get_file(
    State(state): State<AppState>,
    Path((stem, suffix)): Path<(String, String)>,
) -> Json<Option<Vec<ChunkLocation>>> {
    let result = state.service.get_file(stem, suffix).await.map(|chunks| {
        chunks
            .into_iter()
            .map(|(handle, servers)| ChunkLocation {
                handle: handle.as_str().to_string(),
                addresses: servers.iter().map(|s| s.as_str().to_string()).collect(),
            })
            .collect()
    });
    Json(result)
}

async fn fetch_file_info(
    State(state): State<AppState>,
    Path((stem, suffix)): Path<(String, String)>,
) -> Json<Option<shardmaster_core::File>> {
    Json(state.service.fetch_file_info(stem, suffix).await)
}

async fn delete_file(State(state): State<AppState>, Path((stem, suffix)): Path<(String, String)>) -> StatusCode {
    state.service.delete_file(stem, suffix).await;
    StatusCode::NO_CONTENT
}
