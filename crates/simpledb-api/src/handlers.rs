//! REST API handlers.
//!
//! Each handler reads/writes via `StateStore` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use simpledb_controller::{MetricsSnapshot, render_prometheus};
use simpledb_state::*;
use tracing::info;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn internal(e: StateError) -> axum::response::Response {
    error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}

impl ApiState {
    async fn enqueue(&self, key: ObjectKey) {
        if let Some(ref controller) = self.controller {
            controller.enqueue(key).await;
        }
    }
}

// ── SimpleDBs ──────────────────────────────────────────────────

/// GET /apis/v1/simpledbs
pub async fn list_simpledbs(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_simpledbs() {
        Ok(dbs) => ApiResponse::ok(dbs).into_response(),
        Err(e) => internal(e),
    }
}

/// GET /apis/v1/namespaces/{ns}/simpledbs/{name}
pub async fn get_simpledb(
    State(state): State<ApiState>,
    Path((ns, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_simpledb(&ObjectKey::new(ns, name).table_key()) {
        Ok(Some(db)) => ApiResponse::ok(db).into_response(),
        Ok(None) => error_response("simpledb not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

/// PUT /apis/v1/namespaces/{ns}/simpledbs/{name}
///
/// Creates the object or replaces its spec; stored status is kept.
pub async fn apply_simpledb(
    State(state): State<ApiState>,
    Path((ns, name)): Path<(String, String)>,
    Json(spec): Json<SimpleDbSpec>,
) -> impl IntoResponse {
    let key = ObjectKey::new(ns, name);
    match state.store.apply_simpledb(&key.namespace, &key.name, spec) {
        Ok((db, created)) => {
            info!(%key, replicas = db.spec.replicas, created, "simpledb applied");
            state.enqueue(key).await;
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            (status, ApiResponse::ok(db)).into_response()
        }
        Err(StateError::Invalid(msg)) => {
            error_response(&msg, StatusCode::BAD_REQUEST).into_response()
        }
        Err(e) => internal(e),
    }
}

/// DELETE /apis/v1/namespaces/{ns}/simpledbs/{name}
pub async fn delete_simpledb(
    State(state): State<ApiState>,
    Path((ns, name)): Path<(String, String)>,
) -> impl IntoResponse {
    let key = ObjectKey::new(ns, name);
    match state.store.delete_simpledb(&key.table_key()) {
        Ok(true) => {
            info!(%key, "simpledb deleted");
            state.enqueue(key).await;
            ApiResponse::ok("deleted").into_response()
        }
        Ok(false) => error_response("simpledb not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

// ── Workloads ──────────────────────────────────────────────────

/// GET /apis/v1/namespaces/{ns}/workloads/{name}
pub async fn get_workload(
    State(state): State<ApiState>,
    Path((ns, name)): Path<(String, String)>,
) -> impl IntoResponse {
    match state.store.get_workload(&ObjectKey::new(ns, name).table_key()) {
        Ok(Some(workload)) => ApiResponse::ok(workload).into_response(),
        Ok(None) => error_response("workload not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => internal(e),
    }
}

// ── Probes ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /readyz
pub async fn readyz(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_simpledbs() {
        Ok(_) => (StatusCode::OK, "ok".to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = match state.controller {
        Some(ref controller) => controller.render_metrics().await,
        None => render_prometheus(&MetricsSnapshot::default(), 0),
    };
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
