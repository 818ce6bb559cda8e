//! Error types for ffmerge
//!
//! This module provides the error handling for the crate, including:
//! - Domain-specific error types (validation, fetch, encode, artifact store)
//! - HTTP status code mapping for API integration
//! - The uniform JSON error envelope returned by the HTTP surface

use crate::types::ArtifactId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for ffmerge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ffmerge
///
/// Each variant carries enough context to diagnose the failure. Every variant
/// maps to an HTTP status through [`ToHttpStatus`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "PORT")
        key: Option<String>,
    },

    /// Request parameters were missing or malformed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Fetching a remote input failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The external encoder failed
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Artifact store rejected the operation
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Shutdown in progress - not accepting new merge requests
    #[error("shutdown in progress: not accepting new requests")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Invalid or missing request parameters
///
/// Validation always happens before any network call or file is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// `audio_url` was not supplied
    #[error("missing parameter: audio_url")]
    MissingAudioSource,

    /// Neither `image_data` nor `image_url` was supplied
    #[error("missing parameter: image_data (base64 encoded image) or image_url")]
    MissingImageSource,

    /// Resolution string did not parse as `WIDTHxHEIGHT`
    #[error("invalid resolution '{0}', expected WIDTHxHEIGHT (e.g. 1920x1080)")]
    InvalidResolution(String),

    /// `image_data` was not valid base64 or decoded to nothing
    #[error("invalid image_data: {0}")]
    InvalidImageData(String),

    /// A source URL was not an absolute http(s) URL
    #[error("invalid {field}: {reason}")]
    InvalidUrl {
        /// The request field holding the URL
        field: &'static str,
        /// Why the URL was rejected
        reason: String,
    },

    /// Request body could not be parsed
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Request body exceeded the configured limit
    #[error("request body exceeds the {limit_bytes} byte limit")]
    BodyTooLarge {
        /// The configured limit in bytes
        limit_bytes: usize,
    },
}

/// Failures while fetching a remote input
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The transfer did not finish within the timeout
    #[error("timed out fetching {url} after {timeout_secs}s")]
    Timeout {
        /// The URL being fetched
        url: String,
        /// The timeout that elapsed, in seconds
        timeout_secs: u64,
    },

    /// The body exceeded the size ceiling
    #[error("response from {url} exceeds the {limit_bytes} byte limit")]
    TooLarge {
        /// The URL being fetched
        url: String,
        /// The configured ceiling in bytes
        limit_bytes: u64,
    },

    /// The upstream answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL being fetched
        url: String,
        /// The status code returned
        status: u16,
    },

    /// Connection or protocol failure
    #[error("network error fetching {url}: {message}")]
    Network {
        /// The URL being fetched
        url: String,
        /// Underlying error message
        message: String,
    },
}

/// Failures of the external encoder
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    /// The encoder binary could not be located or started
    #[error("encoder not found: {0}")]
    EncoderNotFound(String),

    /// The encoder exited unsuccessfully
    #[error("encoder failed (exit code {exit_code}): {diagnostic}")]
    Exit {
        /// Process exit code, `-1` when terminated by a signal
        exit_code: i32,
        /// Tail of the encoder's diagnostic output
        diagnostic: String,
    },

    /// The encoder exceeded its configured time budget and was killed
    #[error("encoder timed out after {timeout_secs}s")]
    TimedOut {
        /// The timeout that elapsed, in seconds
        timeout_secs: u64,
    },

    /// Talking to the encoder process failed
    #[error("encoder I/O failure: {0}")]
    Process(String),
}

/// Artifact store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The identifier is already registered
    #[error("artifact {0} already exists")]
    DuplicateId(ArtifactId),

    /// No downloadable artifact under this identifier
    ///
    /// Deliberately identical for "never existed" and "expired".
    #[error("artifact not found or expired")]
    NotFound(ArtifactId),

    /// A transfer of this artifact is already in progress
    #[error("artifact {0} is already being downloaded")]
    AlreadyDownloading(ArtifactId),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "success": false,
///   "error": "missing parameter: audio_url",
///   "code": "missing_audio_source",
///   "request_id": "req_1718000000000_k3j9x0a2b"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Always `false`
    pub success: bool,

    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code (e.g., "not_found", "encode_failed")
    pub code: String,

    /// Identifier of the request that failed, for log correlation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            code: code.into(),
            request_id: None,
        }
    }

    /// Attach the request identifier
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Create a "not found" error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new("not_found", format!("{} not found", resource.into()))
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
///
/// This trait maps domain errors to appropriate HTTP status codes.
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - never reaches the network or disk
            Error::Validation(ValidationError::BodyTooLarge { .. }) => 413,
            Error::Validation(_) => 400,

            Error::Store(StoreError::NotFound(_)) => 404,
            Error::Store(StoreError::AlreadyDownloading(_)) => 409,
            Error::Store(StoreError::DuplicateId(_)) => 500,

            // Upstream and encoder failures are reported as internal errors
            Error::Fetch(_) => 500,
            Error::Encode(_) => 500,

            Error::Config { .. } => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(e) => match e {
                ValidationError::MissingAudioSource => "missing_audio_source",
                ValidationError::MissingImageSource => "missing_image_source",
                ValidationError::InvalidResolution(_) => "invalid_resolution",
                ValidationError::InvalidImageData(_) => "invalid_image_data",
                ValidationError::InvalidUrl { .. } => "invalid_url",
                ValidationError::MalformedBody(_) => "malformed_body",
                ValidationError::BodyTooLarge { .. } => "body_too_large",
            },
            Error::Fetch(e) => match e {
                FetchError::Timeout { .. } => "fetch_timeout",
                FetchError::TooLarge { .. } => "fetch_too_large",
                FetchError::HttpStatus { .. } => "fetch_http_status",
                FetchError::Network { .. } => "fetch_network_error",
            },
            Error::Encode(e) => match e {
                EncodeError::EncoderNotFound(_) => "encoder_not_found",
                EncodeError::Exit { .. } => "encode_failed",
                EncodeError::TimedOut { .. } => "encode_timeout",
                EncodeError::Process(_) => "encode_failed",
            },
            Error::Store(e) => match e {
                StoreError::DuplicateId(_) => "duplicate_id",
                StoreError::NotFound(_) => "not_found",
                StoreError::AlreadyDownloading(_) => "already_downloading",
            },
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ShuttingDown => "shutting_down",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error.error_code(), error.to_string())
    }
}
