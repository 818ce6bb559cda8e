//! Utility functions for file operations and naming

use crate::types::ArtifactId;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Attempts made to unlink a file before giving up
const REMOVE_ATTEMPTS: u32 = 3;

/// Pause between unlink attempts
const REMOVE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Filename prefix of staged images
pub const IMAGE_PREFIX: &str = "cover_";

/// Filename prefix of staged audio tracks
pub const AUDIO_PREFIX: &str = "audio_";

/// Filename prefix of encoder output
pub const OUTPUT_PREFIX: &str = "output_";

/// Per-request file locations inside the work directory
///
/// Every name embeds the request identifier, so concurrent requests never
/// share a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPaths {
    /// Staged still image
    pub image: PathBuf,
    /// Staged audio track
    pub audio: PathBuf,
    /// Encoder output
    pub output: PathBuf,
}

impl StagedPaths {
    /// Compute the paths for `id`, using `image_ext` for the staged image
    pub fn new(work_dir: &Path, id: &ArtifactId, image_ext: &str) -> Self {
        Self {
            image: work_dir.join(format!("{IMAGE_PREFIX}{id}.{image_ext}")),
            audio: work_dir.join(format!("{AUDIO_PREFIX}{id}.mp3")),
            output: output_path(work_dir, id),
        }
    }
}

/// Location of the encoded output for `id`
pub fn output_path(work_dir: &Path, id: &ArtifactId) -> PathBuf {
    work_dir.join(format!("{OUTPUT_PREFIX}{id}.mp4"))
}

/// Filename offered to clients downloading the artifact for `id`
pub fn display_name(id: &ArtifactId) -> String {
    format!("video_{id}.mp4")
}

/// Whether `name` is a file this service creates in its work directory
pub fn is_managed_file_name(name: &str) -> bool {
    [IMAGE_PREFIX, AUDIO_PREFIX, OUTPUT_PREFIX]
        .iter()
        .any(|prefix| name.starts_with(&format!("{prefix}req_")))
}

/// Pick a file extension for image bytes by sniffing their signature
///
/// The encoder's image demuxer selects a decoder from the extension, so a PNG
/// staged as `.jpg` would fail to decode.
pub fn image_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        "png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else if bytes.starts_with(b"BM") {
        "bmp"
    } else {
        "jpg"
    }
}

/// Remove a file, treating "already gone" as success
///
/// Transient failures are retried a few times. Returns `false` if the file
/// could not be removed; the failure has already been logged at error level.
pub async fn remove_file_logged(path: &Path) -> bool {
    for attempt in 1..=REMOVE_ATTEMPTS {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(?path, "removed file");
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) if attempt < REMOVE_ATTEMPTS => {
                warn!(?path, attempt, error = %e, "failed to remove file, retrying");
                tokio::time::sleep(REMOVE_RETRY_DELAY).await;
            }
            Err(e) => {
                error!(?path, attempts = REMOVE_ATTEMPTS, error = %e, "giving up removing file");
            }
        }
    }
    false
}

/// Keep only the last `max_chars` characters of `text`
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    match text.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Bytes to megabytes rounded to two decimals
pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024.0 / 1024.0)
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
