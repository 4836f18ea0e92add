mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use common::test_frames::quadrants;
use media_toolkit::imagegen::{ImageGenClient, ImageSource, UNREADABLE_RESPONSE};
use media_toolkit::proxy::{self, GENERATE_ROUTE, UpstreamClient};

type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

/// Fake upstream that records what it received and answers with `reply`.
async fn spawn_upstream(status: StatusCode, reply: Value) -> (SocketAddr, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/images/generations",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let log = Arc::clone(&log);
            let reply = reply.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                log.lock().unwrap().push((auth, body));
                if status.is_success() {
                    (status, Json(reply)).into_response()
                } else {
                    (status, "slow down").into_response()
                }
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (addr, seen)
}

fn client_for(addr: SocketAddr) -> UpstreamClient {
    UpstreamClient::new(reqwest::Client::new(), &format!("http://{}", addr), "test-key")
}

async fn call(router: Router, body: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::post(GENERATE_ROUTE)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_success_relays_upstream_json() {
    let reply = json!({"data": [{"url": "https://img.example/cat.png"}]});
    let (addr, seen) = spawn_upstream(StatusCode::OK, reply.clone()).await;

    let (status, body) = call(proxy::router(client_for(addr)), r#"{"prompt": "a cat"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, reply);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0.as_deref(), Some("Bearer test-key"));
    assert_eq!(seen[0].1, json!({"prompt": "a cat", "n": 1, "size": "1024x1024"}));
}

#[tokio::test]
async fn test_upstream_error_keeps_status() {
    let (addr, _) = spawn_upstream(StatusCode::TOO_MANY_REQUESTS, Value::Null).await;

    let (status, body) = call(
        proxy::router(client_for(addr)),
        r#"{"model": "img3", "prompt": "a dog", "n": 2, "size": "512x512"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"error": "API Error: 429 slow down"}));
}

#[tokio::test]
async fn test_generator_client_through_running_proxy() {
    let mut png = Vec::new();
    quadrants(8, 8)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    let reply = json!({"data": [{"b64_json": STANDARD.encode(&png)}]});
    let (upstream_addr, _) = spawn_upstream(StatusCode::OK, reply).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(proxy::serve_on(
        listener,
        client_for(upstream_addr),
        shutdown.clone(),
    ));

    let client = ImageGenClient::new(reqwest::Client::new(), &format!("http://{}", proxy_addr));
    let image = client.generate("Sunset over the sea").await.unwrap();
    assert!(matches!(image.source, ImageSource::Inline(_)));

    let asset = client.download(&image).await.unwrap();
    assert_eq!(asset.filename, "sunset_over_the_sea.png");
    assert_eq!(asset.mime, "image/png");
    assert_eq!(asset.bytes.as_ref(), png.as_slice());

    shutdown.cancel();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_generator_client_surfaces_proxy_errors() {
    let (upstream_addr, _) = spawn_upstream(StatusCode::UNAUTHORIZED, Value::Null).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(proxy::serve_on(listener, client_for(upstream_addr), shutdown.clone()));

    let client = ImageGenClient::new(reqwest::Client::new(), &format!("http://{}", proxy_addr));
    let err = client.generate("anything").await.unwrap_err();
    assert_eq!(err.category(), "network_or_upstream");
    assert_eq!(
        err.user_message(),
        "Failed to generate image. API Error: 401 slow down"
    );
    shutdown.cancel();
}

#[tokio::test]
async fn test_generator_client_reports_unreadable_success_body() {
    let app = Router::new().route(GENERATE_ROUTE, post(|| async { "<html>maintenance</html>" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = ImageGenClient::new(reqwest::Client::new(), &format!("http://{}", addr));
    let err = client.generate("anything").await.unwrap_err();
    assert_eq!(err.category(), "decode_failed");
    assert_eq!(err.user_message(), UNREADABLE_RESPONSE);
    assert!(err.context().context.is_some());
}
