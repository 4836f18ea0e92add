//! # Image Generation Proxy
//!
//! A small HTTP surface that keeps the upstream API key on the server.
//!
//! | Route | Behavior |
//! |-------|----------|
//! | `POST /api/generate-image` | Forward `{model, prompt, n, size}` upstream, relay the JSON answer |
//! | `GET /health` | Liveness check |
//!
//! Failures are JSON bodies of the form `{"error": "..."}`: upstream
//! rejections keep their status, a malformed body is 400, anything else is
//! 500 `Internal server error`. There is no retry, rate limiting or caching.

pub mod upstream;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ProxyConfig;
use crate::error::{ToolkitError, ToolkitResult};

pub use upstream::{GenerationRequest, UpstreamClient};

pub const GENERATE_ROUTE: &str = "/api/generate-image";

#[derive(Debug, Clone)]
pub struct ProxyState {
    upstream: Arc<UpstreamClient>,
}

/// Build the router around an upstream client.
pub fn router(upstream: UpstreamClient) -> Router {
    let state = ProxyState {
        upstream: Arc::new(upstream),
    };
    Router::new()
        .route(GENERATE_ROUTE, post(generate_image))
        .route("/health", get(health))
        .with_state(state)
}

/// POST /api/generate-image
async fn generate_image(
    State(state): State<ProxyState>,
    body: Bytes,
) -> Result<Json<Value>, ToolkitError> {
    let request: GenerationRequest = serde_json::from_slice(&body)
        .map_err(|e| ToolkitError::invalid_json(format!("Invalid request body: {}", e)))?;

    info!(
        model = request.model.as_deref().unwrap_or("default"),
        n = request.n,
        size = %request.size,
        "Forwarding image generation request"
    );
    let data = state.upstream.generate(&request).await?;
    Ok(Json(data))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Bind `config.bind` and serve until `shutdown` is cancelled.
///
/// Refuses to start without an API key.
pub async fn serve(config: &ProxyConfig, shutdown: CancellationToken) -> ToolkitResult<()> {
    let upstream = UpstreamClient::from_config(config)?;
    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|e| ToolkitError::io("bind proxy listener", e).with_context(config.bind.clone()))?;
    serve_on(listener, upstream, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(
    listener: TcpListener,
    upstream: UpstreamClient,
    shutdown: CancellationToken,
) -> ToolkitResult<()> {
    let addr = listener
        .local_addr()
        .map_err(|e| ToolkitError::io("read listener address", e))?;
    info!(%addr, upstream = upstream.endpoint(), "Image proxy listening");

    axum::serve(listener, router(upstream))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ToolkitError::io("serve proxy", e))?;

    info!("Image proxy stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn unreachable_router() -> Router {
        router(UpstreamClient::new(reqwest::Client::new(), "http://127.0.0.1:9", "key"))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = unreachable_router()
            .oneshot(
                Request::post(GENERATE_ROUTE)
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_transport_failure_is_internal_error() {
        let response = unreachable_router()
            .oneshot(
                Request::post(GENERATE_ROUTE)
                    .body(axum::body::Body::from(r#"{"prompt":"a cat"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_health() {
        let response = unreachable_router()
            .oneshot(Request::get("/health").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_serve_refuses_without_key() {
        let err = serve(&ProxyConfig::default(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "config");
    }
}
