//! Download handler: each artifact can be fetched once.

use crate::api::AppState;
use crate::error::Result;
use crate::types::ArtifactId;
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

/// GET /api/download/:id - Download a finished video
///
/// The video is deleted shortly after the transfer ends, whether or not it
/// completed.
#[utoipa::path(
    get,
    path = "/api/download/{id}",
    tag = "download",
    params(
        ("id" = String, Path, description = "Request identifier returned by POST /api/merge")
    ),
    responses(
        (status = 200, description = "The video", content_type = "video/mp4"),
        (status = 404, description = "Unknown or expired identifier", body = crate::error::ApiError),
        (status = 409, description = "A download of this video is already in progress", body = crate::error::ApiError)
    )
)]
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let id = ArtifactId::from(id);
    let download = state.service.download(&id).await?;

    let headers = [
        (header::CONTENT_TYPE, "video/mp4".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", download.record.display_name),
        ),
        (header::CONTENT_LENGTH, download.size_bytes.to_string()),
    ];

    Ok((headers, Body::from_stream(download.into_stream())).into_response())
}
