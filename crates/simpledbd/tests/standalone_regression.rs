//! Standalone regression tests.
//!
//! Assembles the operator the way `simpledbd run` does (store, controller,
//! rollout simulator, API) and drives it purely through HTTP.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use simpledb_controller::{
    Backoff, BoxFuture, ChangeCallback, Controller, ControllerConfig, RolloutSimulator,
};
use simpledb_reconciler::Reconciler;
use simpledb_state::StateStore;
use tokio::sync::watch;
use tower::ServiceExt;

struct Operator {
    router: Router,
    shutdown: watch::Sender<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Operator {
    fn start() -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let config = ControllerConfig {
            workers: 2,
            resync_interval: Duration::from_secs(1),
            backoff: Backoff::new(Duration::from_millis(10), Duration::from_millis(100)),
        };
        let controller = Controller::new(Reconciler::new(store.clone()), config);
        let handle = controller.handle();
        let (shutdown, rx) = watch::channel(false);

        let enqueue = handle.clone();
        let on_change: ChangeCallback = Arc::new(move |key| -> BoxFuture {
            let enqueue = enqueue.clone();
            Box::pin(async move { enqueue.enqueue(key).await })
        });
        let simulator = RolloutSimulator::new(store.clone(), 1).with_callback(on_change);

        let rollout_rx = rx.clone();
        let tasks = vec![
            tokio::spawn(controller.run(rx)),
            tokio::spawn(async move {
                simulator.run(Duration::from_millis(10), rollout_rx).await;
            }),
        ];

        Self {
            router: simpledb_api::build_router(store, Some(handle)),
            shutdown,
            tasks,
        }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };
        let resp = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Poll the SimpleDB until its Ready condition has `reason`.
    async fn wait_for_reason(&self, uri: &str, reason: &str) -> Value {
        for _ in 0..500 {
            let (status, body) = self.request("GET", uri, None).await;
            if status == StatusCode::OK
                && body["data"]["status"]["conditions"][0]["reason"] == reason
            {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{uri} never reported reason {reason}");
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        for task in self.tasks {
            tokio::time::timeout(Duration::from_secs(5), task)
                .await
                .unwrap()
                .unwrap();
        }
    }
}

const ORDERS: &str = "/apis/v1/namespaces/default/simpledbs/orders";
const ORDERS_WORKLOAD: &str = "/apis/v1/namespaces/default/workloads/orders";

fn spec(replicas: i32) -> Value {
    json!({ "replicas": replicas, "image": "postgres:14", "dbName": "orders" })
}

#[tokio::test]
async fn standalone_list_simpledbs_empty() {
    let op = Operator::start();
    let (status, body) = op.request("GET", "/apis/v1/simpledbs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    op.stop().await;
}

#[tokio::test]
async fn standalone_simpledb_becomes_ready() {
    let op = Operator::start();

    let (status, _) = op.request("PUT", ORDERS, Some(spec(3))).await;
    assert_eq!(status, StatusCode::CREATED);

    let body = op.wait_for_reason(ORDERS, "Available").await;
    let cond = &body["data"]["status"]["conditions"][0];
    assert_eq!(cond["type"], "Ready");
    assert_eq!(cond["status"], "True");
    assert_eq!(cond["message"], "Database is ready");

    let (status, workload) = op.request("GET", ORDERS_WORKLOAD, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(workload["data"]["spec"]["replicas"], 3);
    assert_eq!(workload["data"]["labels"]["app"], "simpledb");
    assert_eq!(workload["data"]["spec"]["container"]["image"], "postgres:14");
    assert_eq!(workload["data"]["status"]["availableReplicas"], 3);

    op.stop().await;
}

#[tokio::test]
async fn standalone_scale_up_converges() {
    let op = Operator::start();
    op.request("PUT", ORDERS, Some(spec(1))).await;
    op.wait_for_reason(ORDERS, "Available").await;

    let (status, _) = op.request("PUT", ORDERS, Some(spec(4))).await;
    assert_eq!(status, StatusCode::OK);

    // Desired replicas land on the workload, then readiness catches up.
    for _ in 0..500 {
        let (_, workload) = op.request("GET", ORDERS_WORKLOAD, None).await;
        if workload["data"]["status"]["availableReplicas"] == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let (_, workload) = op.request("GET", ORDERS_WORKLOAD, None).await;
    assert_eq!(workload["data"]["spec"]["replicas"], 4);
    op.wait_for_reason(ORDERS, "Available").await;

    op.stop().await;
}

#[tokio::test]
async fn standalone_rejects_zero_replicas() {
    let op = Operator::start();

    let (status, body) = op.request("PUT", ORDERS, Some(spec(0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = op.request("GET", ORDERS, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    op.stop().await;
}

#[tokio::test]
async fn standalone_delete_cascades_to_workload() {
    let op = Operator::start();
    op.request("PUT", ORDERS, Some(spec(2))).await;
    op.wait_for_reason(ORDERS, "Available").await;

    let (status, _) = op.request("DELETE", ORDERS, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = op.request("GET", ORDERS, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = op.request("GET", ORDERS_WORKLOAD, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    op.stop().await;
}

#[tokio::test]
async fn standalone_probes_and_metrics() {
    let op = Operator::start();
    op.request("PUT", ORDERS, Some(spec(1))).await;
    op.wait_for_reason(ORDERS, "Available").await;

    let (status, _) = op.request("GET", "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = op.request("GET", "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let resp = op
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("# TYPE simpledb_reconcile_total counter"));
    assert!(!text.contains("simpledb_reconcile_total{result=\"requeue\"} 0"));
    assert!(!text.contains("simpledb_status_writes_total 0"));

    op.stop().await;
}
