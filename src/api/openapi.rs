//! OpenAPI documentation and schema generation
//!
//! Defines the OpenAPI specification for the ffmerge REST API using utoipa
//! for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the ffmerge REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ffmerge REST API",
        version = "0.1.0",
        description = "Merges a still image and an audio track into an MP4 video served through a short-lived, single-use download link",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Merging
        crate::api::routes::merge,

        // Downloads
        crate::api::routes::download,

        // System
        crate::api::routes::health_check,
        crate::api::routes::service_info,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::MergeParams,
        crate::api::routes::MergeResponse,
        crate::error::ApiError,
    )),
    tags(
        (name = "merge", description = "Merging - Combine a still image and an audio track into a video"),
        (name = "download", description = "Downloads - Fetch a merged video once before it expires"),
        (name = "system", description = "System endpoints - Health check, service description, OpenAPI spec"),
    )
)]
pub struct ApiDoc;
