use super::*;
use crate::service::test_helpers::{FakeEncoder, FakeFetcher, test_config};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;


const AUDIO_URL: &str = "http://upstream.test/song.mp3";

/// Router backed by fakes, plus the service and its work directory
async fn create_test_app(
    fetcher: FakeFetcher,
    encoder: FakeEncoder,
) -> (Router, Arc<MergeService>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let service = MergeService::with_components(
        config.clone(),
        Arc::new(fetcher),
        Arc::new(encoder),
        Arc::new(crate::clock::SystemClock),
    )
    .await
    .unwrap();
    let service = Arc::new(service);
    (create_router(service.clone(), Arc::new(config)), service, dir)
}

fn audio_fetcher() -> FakeFetcher {
    FakeFetcher::new().with(AUDIO_URL, b"ID3audio".to_vec())
}

fn jpeg_base64() -> String {
    STANDARD.encode(b"\xff\xd8\xff\xe0fake-jpeg")
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

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops_on_signal() {
    let (_router, service, dir) = create_test_app(audio_fetcher(), FakeEncoder::writing(10)).await;

    let mut config = test_config(dir.path());
    config.server.bind_ip = "127.0.0.1".parse().unwrap();
    config.server.port = 0; // OS assigns a free port
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(start_api_server(service, Arc::new(config), async move {
        let _ = rx.await;
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_headers_present() {
    let (app, _service, _dir) = create_test_app(audio_fetcher(), FakeEncoder::writing(10)).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:8080")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _service, _dir) = create_test_app(audio_fetcher(), FakeEncoder::writing(10)).await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/merge")
        .header("Origin", "http://localhost:8080")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let methods = response
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("POST"));
}

#[tokio::test]
async fn test_plain_options_request_is_ok() {
    let (app, _service, _dir) = create_test_app(audio_fetcher(), FakeEncoder::writing(10)).await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/anything/at/all")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _service, _dir) = create_test_app(audio_fetcher(), FakeEncoder::writing(10)).await;

    let response = app.oneshot(get("/no/such/route")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "not_found");
}

#[test]
fn test_panic_becomes_generic_500() {
    let response = panic_response(Box::new("boom"));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = panic_response(Box::new(String::from("boom")));
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
