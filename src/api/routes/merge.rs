//! Merge handler: image + audio in, download link out.

use super::MergeResponse;
use crate::api::AppState;
use crate::api::error_response::RequestError;
use crate::error::ValidationError;
use crate::types::{ArtifactId, MergeParams, MergeRequest};
use crate::utils::{bytes_to_mb, round2};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use std::time::Instant;

/// POST /api/merge - Merge a still image and an audio track into a video
#[utoipa::path(
    post,
    path = "/api/merge",
    tag = "merge",
    request_body = MergeParams,
    responses(
        (status = 200, description = "Video created; download it once via download_url", body = MergeResponse),
        (status = 400, description = "Missing or invalid parameters", body = crate::error::ApiError),
        (status = 413, description = "Request body too large", body = crate::error::ApiError),
        (status = 500, description = "Fetching an input or encoding failed", body = crate::error::ApiError),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    )
)]
pub async fn merge(
    State(state): State<AppState>,
    body: Result<Json<MergeParams>, JsonRejection>,
) -> Result<Json<MergeResponse>, RequestError> {
    let started = Instant::now();
    let request_id = ArtifactId::generate();

    let Json(params) = body.map_err(|rejection| {
        let error = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ValidationError::BodyTooLarge {
                limit_bytes: state.config.server.max_body_bytes,
            }
        } else {
            ValidationError::MalformedBody(rejection.body_text())
        };
        tracing::info!(request_id = %request_id, error = %error, "rejected merge request body");
        RequestError::new(&request_id, error)
    })?;

    let request = MergeRequest::from_params(params).map_err(|e| {
        tracing::info!(request_id = %request_id, error = %e, "rejected merge request");
        RequestError::new(&request_id, e)
    })?;

    tracing::info!(
        request_id = %request_id,
        audio_url = %request.audio_url,
        resolution = %request.resolution,
        "merge request accepted"
    );

    let handle = state
        .service
        .merge(&request_id, request)
        .await
        .map_err(|e| RequestError::new(&request_id, e))?;

    let elapsed = started.elapsed();
    tracing::info!(
        request_id = %request_id,
        size_bytes = handle.size_bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "merge request complete"
    );

    Ok(Json(MergeResponse {
        success: true,
        download_url: handle.download_url(),
        size: handle.size_bytes,
        size_mb: bytes_to_mb(handle.size_bytes),
        processing_time_ms: elapsed.as_millis() as u64,
        processing_time_sec: round2(elapsed.as_secs_f64()),
        resolution: handle.resolution.to_string(),
        request_id: request_id.to_string(),
    }))
}
