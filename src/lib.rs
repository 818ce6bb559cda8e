//! # ffmerge
//!
//! HTTP service that merges a still image and an audio track into an MP4
//! video and hands the result out through a short-lived, single-use download
//! link.
//!
//! ## Artifact lifecycle
//!
//! Every merge produces one artifact on disk, tracked by the
//! [`ArtifactStore`](artifact_store::ArtifactStore):
//!
//! - registered when the encoder finishes, then downloadable once
//! - deleted a couple of seconds after its download ends, however it ends
//! - deleted by the [`Sweeper`](sweeper::Sweeper) if nobody downloads it
//!   within the expiry window (5 minutes by default)
//! - never deleted while a download is streaming it
//!
//! Staged inputs are removed as soon as the encoder returns, and failed
//! merges leave nothing behind.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ffmerge::{Config, MergeService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::from_env()?);
//!     let service = Arc::new(MergeService::new((*config).clone()).await?);
//!
//!     ffmerge::api::start_api_server(service.clone(), config, ffmerge::shutdown_signal()).await?;
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// In-memory artifact registry
pub mod artifact_store;
/// Time source abstraction
pub mod clock;
/// Configuration types
pub mod config;
/// One-time artifact downloads
pub mod download;
/// External video encoder
pub mod encoder;
/// Error types
pub mod error;
/// Bounded fetching of remote inputs
pub mod fetch;
/// Merge job execution
pub mod job;
/// Tracing subscriber setup
pub mod logging;
/// Service facade and shutdown
pub mod service;
/// Expiry of undownloaded artifacts
pub mod sweeper;
/// Core types
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use artifact_store::ArtifactStore;
pub use config::{ArtifactConfig, Config, EncoderConfig, FetchConfig, ServerConfig};
pub use encoder::{EncodeJob, Encoder, FfmpegEncoder, UnavailableEncoder};
pub use error::{
    ApiError, EncodeError, Error, FetchError, Result, StoreError, ToHttpStatus, ValidationError,
};
pub use fetch::{FetchLimits, Fetcher, HttpFetcher};
pub use service::MergeService;
pub use types::{
    ArtifactHandle, ArtifactId, ArtifactRecord, ArtifactState, ImageSource, MergeParams,
    MergeRequest, Resolution,
};

/// Resolves when the process is asked to terminate
///
/// - **Unix:** SIGTERM or SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Pass it to [`api::start_api_server`] for graceful shutdown.
pub async fn shutdown_signal() {
    wait_for_signal().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
