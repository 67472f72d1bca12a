// All functions in this module are shared test helpers. Not every test binary
// uses every helper, so we suppress dead_code warnings at the module level.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower::ServiceExt;

use ferry_api::config::ServerConfig;
use ferry_api::router::build_app_router;
use ferry_api::state::AppState;
use ferry_client::RestClient;

pub const TEST_TOKEN: &str = "Bearer test-token";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        upstream_timeout_secs: 5,
        access_control_url: None,
        lookup_fan_out: 8,
    }
}

/// Build the full application router with all middleware layers.
///
/// Delegates to [`build_app_router`] so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub fn build_test_app() -> Router {
    build_test_app_with(test_config())
}

/// Build the test app from a custom config (e.g. with an access-control
/// gate).
pub fn build_test_app_with(config: ServerConfig) -> Router {
    let client = RestClient::new(Duration::from_secs(config.upstream_timeout_secs))
        .expect("client should build");
    let state = AppState {
        config: Arc::new(config.clone()),
        client,
    };
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Shared HTTP test helpers
// ---------------------------------------------------------------------------

/// Collect the response body into a `serde_json::Value`.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect the response body as a UTF-8 string.
pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// GET from the given URI without credentials.
pub async fn get_anon(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// GET from the given URI with the test Authorization header.
pub async fn get_auth(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header("authorization", TEST_TOKEN)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

const MULTIPART_BOUNDARY: &str = "ferry-test-boundary";

/// POST a multipart body with a single `file` part to the given URI, with
/// the test Authorization header.
pub async fn post_file(app: Router, uri: &str, contents: &str) -> Response {
    let body = format!(
        "--{MULTIPART_BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"upload\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         {contents}\r\n\
         --{MULTIPART_BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", TEST_TOKEN)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

// ---------------------------------------------------------------------------
// Mock upstream service
// ---------------------------------------------------------------------------

/// Shared state of the in-process mock service: per-collection records and a
/// log of every POST in arrival order.
#[derive(Default)]
pub struct MockStore {
    pub collections: HashMap<String, Vec<Value>>,
    pub posts: Vec<(String, Value)>,
    pub next_id: usize,
    /// When set, POSTs are rejected with 422.
    pub reject_posts: bool,
}

/// An in-process service speaking the generic collection API (list, fetch,
/// filtered query, create) that exports and imports run against.
pub struct MockUpstream {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    pub store: Arc<Mutex<MockStore>>,
}

impl MockUpstream {
    /// Spawn the mock service on an ephemeral port.
    pub async fn spawn() -> Self {
        let store = Arc::new(Mutex::new(MockStore::default()));

        let router = Router::new()
            .route("/api/{resource}", get(mock_list).post(mock_create))
            .route("/api/{resource}/{id}", get(mock_fetch))
            .route("/gate/allow", get(|| async { StatusCode::OK }))
            .route("/gate/deny", get(|| async { StatusCode::FORBIDDEN }))
            .with_state(Arc::clone(&store));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("mock upstream should bind");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            store,
        }
    }

    /// Endpoint URL for a collection.
    pub fn collection_url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.base_url)
    }

    /// URL of the access-control allow/deny endpoints.
    pub fn gate_url(&self, allow: bool) -> String {
        let base = self.base_url.trim_end_matches("/api");
        if allow {
            format!("{base}/gate/allow")
        } else {
            format!("{base}/gate/deny")
        }
    }

    /// Seed a collection with records.
    pub async fn seed(&self, resource: &str, records: Value) {
        let mut store = self.store.lock().await;
        store
            .collections
            .insert(resource.to_string(), records.as_array().unwrap().clone());
    }

    /// Posted bodies for one collection, in arrival order.
    pub async fn posts_to(&self, resource: &str) -> Vec<Value> {
        let store = self.store.lock().await;
        store
            .posts
            .iter()
            .filter(|(r, _)| r == resource)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub async fn set_reject_posts(&self, reject: bool) {
        self.store.lock().await.reject_posts = reject;
    }
}

type MockState = Arc<Mutex<MockStore>>;

async fn mock_list(
    State(store): State<MockState>,
    Path(resource): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
) -> Response {
    let store = store.lock().await;
    let Some(records) = store.collections.get(&resource) else {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "unknown collection"})))
            .into_response();
    };

    let matching: Vec<Value> = records
        .iter()
        .filter(|record| {
            filters.iter().all(|(field, wanted)| {
                record
                    .get(field)
                    .is_some_and(|value| value_matches(value, wanted))
            })
        })
        .cloned()
        .collect();

    Json(matching).into_response()
}

async fn mock_fetch(
    State(store): State<MockState>,
    Path((resource, id)): Path<(String, String)>,
) -> Response {
    let store = store.lock().await;
    let record = store
        .collections
        .get(&resource)
        .and_then(|records| {
            records
                .iter()
                .find(|r| r.get("id").is_some_and(|v| value_matches(v, &id)))
        })
        .cloned();

    match record {
        Some(record) => Json(record).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "not found"}))).into_response(),
    }
}

async fn mock_create(
    State(store): State<MockState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut store = store.lock().await;
    if store.reject_posts {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "rejected"})),
        )
            .into_response();
    }

    store.next_id += 1;
    let new_id = format!("t{}", store.next_id);

    let mut created = body.as_object().cloned().unwrap_or_default();
    created.insert("id".to_string(), json!(new_id));
    let created = Value::Object(created);

    store.posts.push((resource.clone(), body));
    store
        .collections
        .entry(resource)
        .or_default()
        .push(created.clone());

    (StatusCode::CREATED, Json(created)).into_response()
}

fn value_matches(value: &Value, wanted: &str) -> bool {
    match value {
        Value::String(s) => s == wanted,
        other => other.to_string() == wanted,
    }
}
