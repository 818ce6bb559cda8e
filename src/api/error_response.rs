//! HTTP error response handling for the API
//!
//! Conversions from domain errors to HTTP responses with appropriate status
//! codes and the JSON error envelope.

use crate::error::{ApiError, Error, ToHttpStatus};
use crate::types::ArtifactId;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Errors with a known status go through Error::into_response
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// An error tied to the merge request that produced it
///
/// Same status mapping as [`Error`], with `request_id` filled in so clients
/// can quote it when reporting problems.
#[derive(Debug)]
pub struct RequestError {
    /// Identifier assigned to the failed request
    pub request_id: ArtifactId,
    /// What went wrong
    pub error: Error,
}

impl RequestError {
    /// Attach `request_id` to `error`
    pub fn new(request_id: &ArtifactId, error: impl Into<Error>) -> Self {
        Self {
            request_id: request_id.clone(),
            error: error.into(),
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status_code = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let api_error = ApiError::from(self.error).with_request_id(self.request_id.as_str());

        (status_code, Json(api_error)).into_response()
    }
}
