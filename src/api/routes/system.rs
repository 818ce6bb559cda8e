//! System handlers: health, service description, OpenAPI, fallback.

use crate::api::AppState;
use crate::error::ApiError;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// GET /health - Health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy")
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "ffmerge",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }))
}

/// GET / - Service description and usage
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses(
        (status = 200, description = "Endpoints, request format and limits")
    )
)]
pub async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    Json(json!({
        "name": "ffmerge",
        "description": "Merges a still image and an audio track into an MP4 video",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /health": "Health check",
            "POST /api/merge": "Merge an image and an audio track",
            "GET /api/download/:id": "Download a merged video (once)",
            "GET /openapi.json": "OpenAPI specification",
            "GET /": "This document",
        },
        "usage": {
            "endpoint": "POST /api/merge",
            "body": {
                "audio_url": "https://example.com/audio.mp3 (required)",
                "image_data": "base64 encoded image (required unless image_url is given)",
                "image_url": "https://example.com/cover.jpg (alternative to image_data)",
                "resolution": "1920x1080 (optional, default 1920x1080)",
            },
            "response": {
                "success": true,
                "download_url": "/api/download/{request_id}",
                "size": "bytes",
                "size_mb": "MB",
                "processing_time_ms": "milliseconds",
                "processing_time_sec": "seconds",
                "resolution": "WIDTHxHEIGHT",
                "request_id": "string",
            },
        },
        "limits": {
            "audio_max_bytes": config.fetch.audio_max_bytes,
            "image_max_bytes": config.fetch.image_max_bytes,
            "request_body_max_bytes": config.server.max_body_bytes,
            "download_expires_after_secs": config.artifacts.ttl.as_secs(),
        },
    }))
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}

/// Fallback for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiError::not_found("route")))
}
