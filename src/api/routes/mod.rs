//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`merge`]: Creating videos
//! - [`download`]: Fetching finished videos
//! - [`system`]: Health, service description, OpenAPI, fallback

use serde::{Deserialize, Serialize};

mod download;
mod merge;
mod system;

pub use download::*;
pub use merge::*;
pub use system::*;

/// Response body for a successful `POST /api/merge`
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MergeResponse {
    /// Always `true`
    pub success: bool,
    /// Relative URL serving the video exactly once
    #[schema(example = "/api/download/req_1718000000000_k3j9x0a2b")]
    pub download_url: String,
    /// Video size in bytes
    pub size: u64,
    /// Video size in megabytes, two decimals
    pub size_mb: f64,
    /// Wall-clock processing time in milliseconds
    pub processing_time_ms: u64,
    /// Wall-clock processing time in seconds, two decimals
    pub processing_time_sec: f64,
    /// Output dimensions as `WIDTHxHEIGHT`
    #[schema(example = "1920x1080")]
    pub resolution: String,
    /// Request identifier, also the download handle
    pub request_id: String,
}
