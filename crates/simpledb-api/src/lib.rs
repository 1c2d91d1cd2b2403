//! simpledb-api: REST API for the SimpleDB operator.
//!
//! Stands in for the cluster API server in a standalone deployment: users
//! declare SimpleDB objects here and read back their status and workloads.
//! Every write enqueues the object on the controller.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/apis/v1/simpledbs` | List all SimpleDBs |
//! | PUT | `/apis/v1/namespaces/{ns}/simpledbs/{name}` | Create or replace a spec |
//! | GET | `/apis/v1/namespaces/{ns}/simpledbs/{name}` | Get one SimpleDB |
//! | DELETE | `/apis/v1/namespaces/{ns}/simpledbs/{name}` | Delete, cascading to its workload |
//! | GET | `/apis/v1/namespaces/{ns}/workloads/{name}` | Get a workload |
//! | GET | `/healthz` | Liveness |
//! | GET | `/readyz` | Store readiness |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use simpledb_controller::ControllerHandle;
use simpledb_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    /// Absent when the API runs without a control loop.
    pub controller: Option<ControllerHandle>,
}

/// Build the complete API router.
pub fn build_router(store: StateStore, controller: Option<ControllerHandle>) -> Router {
    let state = ApiState { store, controller };

    let api_routes = Router::new()
        .route("/simpledbs", get(handlers::list_simpledbs))
        .route(
            "/namespaces/{ns}/simpledbs/{name}",
            get(handlers::get_simpledb)
                .put(handlers::apply_simpledb)
                .delete(handlers::delete_simpledb),
        )
        .route("/namespaces/{ns}/workloads/{name}", get(handlers::get_workload));

    Router::new()
        .nest("/apis/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}
