mod error;
mod http;
pub mod validate;

use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use registrar_engine::Coordinator;

pub use error::GatewayError;

#[derive(Clone)]
struct AppState {
    coordinator: Arc<Coordinator>,
}

/// Ingestion gateway routes over a shared coordinator.
pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let state = AppState { coordinator };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ]);

    Router::new()
        .route("/", get(http::handle_root))
        .route("/registrar", post(http::handle_register))
        .route("/upload-data", post(http::handle_upload))
        .route("/fetch", get(http::handle_list))
        .route("/fetch-tournaments", get(http::handle_list))
        .route("/status", get(http::handle_status))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway on `0.0.0.0:port` until `shutdown` is cancelled.
pub async fn run(
    port: u16,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
) -> Result<(), String> {
    let app = router(coordinator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|e| format!("bind api :{port}: {e}"))?;
    tracing::info!(port, "http api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| format!("axum serve: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use registrar_api::RetryPolicy;
    use registrar_engine::testing::{FlakyStore, ScriptedBroker};
    use registrar_engine::ConnectionManager;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    struct TestApp {
        app: Router,
        store: Arc<FlakyStore>,
        broker: Arc<ScriptedBroker>,
    }

    async fn test_app(broker: ScriptedBroker) -> TestApp {
        let store = Arc::new(FlakyStore::new());
        let broker = Arc::new(broker);
        let manager = ConnectionManager::new(broker.clone());
        manager
            .start(RetryPolicy::new(1, Default::default(), Default::default()), CancellationToken::new())
            .unwrap()
            .await
            .unwrap();
        let coordinator = Coordinator::new(store.clone(), manager, "torneo").unwrap();
        TestApp {
            app: router(Arc::new(coordinator)),
            store,
            broker,
        }
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let t = test_app(ScriptedBroker::new()).await;
        let (status, body) = send(&t.app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("running"));
    }

    #[tokio::test]
    async fn register_then_list() {
        let t = test_app(ScriptedBroker::new()).await;

        let (status, body) = send(
            &t.app,
            post_json("/registrar", &json!({"name": "Summer Cup", "year": 2024})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["name"], "Summer Cup");
        assert!(body["data"]["id"].is_string());
        assert!(body["data"]["createdAt"].is_string());

        let (status, list) = send(&t.app, get("/fetch-tournaments")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0], body["data"]);

        let (_, alias) = send(&t.app, get("/fetch")).await;
        assert_eq!(alias, list);

        let published = t.broker.published();
        assert_eq!(published.len(), 1);
        let payload: Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(payload["name"], "Summer Cup");
    }

    #[tokio::test]
    async fn missing_fields_never_reach_the_coordinator() {
        let t = test_app(ScriptedBroker::new()).await;
        let (status, body) = send(&t.app, post_json("/registrar", &json!({"year": 2024}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "missing or invalid fields: name");
        assert_eq!(t.store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let t = test_app(ScriptedBroker::new()).await;
        let req = Request::builder()
            .method("POST")
            .uri("/registrar")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let (status, body) = send(&t.app, req).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(t.store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_a_server_error() {
        let t = test_app(ScriptedBroker::new()).await;
        t.store.fail_inserts(true);

        let (status, body) = send(
            &t.app,
            post_json("/registrar", &json!({"name": "Summer Cup", "year": 2024})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"ok": false, "error": "store unavailable"}));
        assert_eq!(t.broker.publish_attempts(), 0);

        t.store.fail_inserts(false);
        let (_, list) = send(&t.app, get("/fetch")).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn broker_failure_does_not_change_the_response() {
        let t = test_app(ScriptedBroker::new()).await;
        t.broker.fail_publishes(true);

        let (status, body) = send(
            &t.app,
            post_json("/registrar", &json!({"name": "Summer Cup", "year": 2024})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ok"], true);

        let (_, stats) = send(&t.app, get("/status")).await;
        assert_eq!(stats["stored"], 1);
        assert_eq!(stats["announceFailures"], 1);
        assert_eq!(stats["broker"], "connected");
    }

    #[tokio::test]
    async fn unreachable_broker_still_accepts_registrations() {
        let t = test_app(ScriptedBroker::unreachable()).await;

        let (status, _) = send(
            &t.app,
            post_json("/registrar", &json!({"title": "Open", "type": "judo", "roster": []})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, stats) = send(&t.app, get("/status")).await;
        assert_eq!(stats["broker"], "disconnected");
        assert_eq!(stats["announced"], 0);
    }

    #[tokio::test]
    async fn list_failure_is_a_server_error() {
        let t = test_app(ScriptedBroker::new()).await;
        t.store.fail_reads(true);
        let (status, body) = send(&t.app, get("/fetch-tournaments")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn bulk_upload_validates_everything_first() {
        let t = test_app(ScriptedBroker::new()).await;
        let batch = json!([
            {"name": "Cup A", "year": 2023},
            {"name": "Cup B"}
        ]);
        let (status, body) = send(&t.app, post_json("/upload-data", &batch)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "item 1: missing or invalid fields: year|type");
        assert_eq!(t.store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn bulk_upload_registers_each_item() {
        let t = test_app(ScriptedBroker::new()).await;
        let batch = json!([
            {"name": "Cup A", "year": 2023},
            {"name": "Cup B", "type": "karate"}
        ]);
        let (status, body) = send(&t.app, post_json("/upload-data", &batch)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Inserted 2 tournaments");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(t.broker.published().len(), 2);
    }

    #[tokio::test]
    async fn bulk_upload_accepts_a_single_object() {
        let t = test_app(ScriptedBroker::new()).await;
        let (status, body) = send(
            &t.app,
            post_json("/upload-data", &json!({"name": "Summer Cup", "year": 2024})),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Inserted 1 tournaments");
        assert_eq!(body["data"][0]["name"], "Summer Cup");
        assert_eq!(t.store.insert_calls(), 1);
    }

    #[tokio::test]
    async fn cors_headers_are_sent() {
        let t = test_app(ScriptedBroker::new()).await;
        let req = Request::builder()
            .uri("/")
            .header("origin", "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let resp = t.app.clone().oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
