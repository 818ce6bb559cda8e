//! REST API server module
//!
//! HTTP surface of the merge service: create a video, download it once, and
//! a few system endpoints.

use crate::error::ApiError;
use crate::{Config, MergeService, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// - `POST /api/merge` - Merge an image and an audio track into a video
/// - `GET /api/download/:id` - Download the video (once)
/// - `GET /health` - Health check
/// - `GET /` - Service description
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
///
/// Unknown routes get a JSON 404, panics in handlers a JSON 500, and any
/// `OPTIONS` request is answered with 200.
pub fn create_router(service: Arc<MergeService>, config: Arc<Config>) -> Router {
    let state = AppState::new(service, config.clone());

    let router = Router::new()
        .route("/api/merge", post(routes::merge))
        .route("/api/download/:id", get(routes::download))
        .route("/health", get(routes::health_check))
        .route("/", get(routes::service_info))
        .route("/openapi.json", get(routes::openapi_spec))
        .fallback(routes::not_found);

    let router = if config.server.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    // The last layer applied is the outermost:
    //   CORS → trace → OPTIONS → catch panic → body limit → handler
    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(answer_options))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.server.cors_origins))
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if allow_any || origins.is_empty() {
        cors.allow_origin(AnyOrigin)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(AllowOrigin::list(allowed))
    }
}

/// Answer every `OPTIONS` request with 200 without reaching a handler
async fn answer_options(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

/// Turn a handler panic into the generic JSON 500
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "request handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::internal("internal server error")),
    )
        .into_response()
}

/// Start the API server on the configured bind address
///
/// Serves until `shutdown` resolves, then stops accepting connections and
/// waits for in-flight requests (including downloads) to finish.
///
/// # Example
///
/// ```no_run
/// use ffmerge::{Config, MergeService};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::from_env()?);
/// let service = Arc::new(MergeService::new((*config).clone()).await?);
///
/// ffmerge::api::start_api_server(service.clone(), config, ffmerge::shutdown_signal()).await?;
/// service.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server<F>(
    service: Arc<MergeService>,
    config: Arc<Config>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = config.server.bind_address();

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(service, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
