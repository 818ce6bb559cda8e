//! Core types for ffmerge

use crate::error::ValidationError;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// Resolution used when the request does not name one
pub const DEFAULT_RESOLUTION: &str = "1920x1080";

/// Largest accepted width or height
pub const MAX_DIMENSION: u32 = 16_384;

/// Unique identifier for a merge request and the artifact it produced
///
/// Doubles as the external download handle, so it is never reused.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    /// Generate a fresh identifier of the form `req_<unix-millis>_<9 base36 chars>`
    pub fn generate() -> Self {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        let suffix: String = (0..9)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(format!("req_{}_{}", Utc::now().timestamp_millis(), suffix))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArtifactId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ArtifactId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a tracked artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    /// Encode not finished yet; invisible to downloaders and the sweeper
    Pending,
    /// Available for download
    Ready,
    /// A transfer is in progress; exempt from expiry
    Downloading,
    /// Terminal; the file is gone and lookups fail
    Deleted,
}

/// Metadata for one on-disk artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactRecord {
    /// Request identifier and download handle
    pub id: ArtifactId,
    /// Location of the encoded output
    pub path: PathBuf,
    /// Filename suggested to the downloading client
    pub display_name: String,
    /// Registration time; expiry is measured from here
    pub created_at: DateTime<Utc>,
    /// Size of the file in bytes (zero while pending)
    pub size_bytes: u64,
    /// Current lifecycle state
    pub state: ArtifactState,
}

impl ArtifactRecord {
    /// Create a record for an output file, in the `Ready` state
    pub fn new(
        id: ArtifactId,
        path: PathBuf,
        display_name: impl Into<String>,
        created_at: DateTime<Utc>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id,
            path,
            display_name: display_name.into(),
            created_at,
            size_bytes,
            state: ArtifactState::Ready,
        }
    }
}

/// Output dimensions in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a resolution
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidResolution(s.to_string());
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let parse = |part: &str| -> Result<u32, ValidationError> {
            match part.trim().parse::<u32>() {
                Ok(value) if value > 0 && value <= MAX_DIMENSION => Ok(value),
                _ => Err(invalid()),
            }
        };
        Ok(Self::new(parse(width)?, parse(height)?))
    }
}

/// Where the still image comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// Fetch from a remote URL
    Remote(url::Url),
    /// Already-decoded image bytes
    Inline(Vec<u8>),
}

/// Body of `POST /api/merge`
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MergeParams {
    /// Remote audio track (required)
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Base64-encoded image, optionally as a `data:` URI
    #[serde(default)]
    pub image_data: Option<String>,
    /// Remote image; wins over `image_data` when both are given
    #[serde(default)]
    pub image_url: Option<String>,
    /// Output size as `WIDTHxHEIGHT` (default 1920x1080)
    #[serde(default)]
    pub resolution: Option<String>,
}

/// A validated merge request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeRequest {
    /// Remote audio track
    pub audio_url: url::Url,
    /// Still image source
    pub image: ImageSource,
    /// Output dimensions
    pub resolution: Resolution,
}

impl MergeRequest {
    /// Validate wire parameters without touching the network or the disk
    ///
    /// When both `image_url` and `image_data` are present the URL is used and
    /// the inline data is ignored.
    pub fn from_params(params: MergeParams) -> Result<Self, ValidationError> {
        let audio_url = params
            .audio_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingAudioSource)?;
        let audio_url = parse_source_url("audio_url", audio_url)?;

        let image_url = non_blank(params.image_url.as_deref());
        let image_data = non_blank(params.image_data.as_deref());
        let image = match (image_url, image_data) {
            (Some(url), data) => {
                if data.is_some() {
                    tracing::debug!("both image_url and image_data supplied, using image_url");
                }
                ImageSource::Remote(parse_source_url("image_url", url)?)
            }
            (None, Some(data)) => ImageSource::Inline(decode_image_data(data)?),
            (None, None) => return Err(ValidationError::MissingImageSource),
        };

        let resolution = params
            .resolution
            .as_deref()
            .unwrap_or(DEFAULT_RESOLUTION)
            .parse()?;

        Ok(Self {
            audio_url,
            image,
            resolution,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_source_url(field: &'static str, raw: &str) -> Result<url::Url, ValidationError> {
    let url = url::Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::InvalidUrl {
            field,
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

fn decode_image_data(raw: &str) -> Result<Vec<u8>, ValidationError> {
    // Accept `data:image/png;base64,....` as well as bare base64
    let payload = match raw.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => raw,
    };
    let compact: String = payload.split_whitespace().collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ValidationError::InvalidImageData(e.to_string()))?;
    if bytes.is_empty() {
        return Err(ValidationError::InvalidImageData("decoded image is empty".into()));
    }
    Ok(bytes)
}

/// Handle returned for a successfully produced artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Artifact identifier
    pub id: ArtifactId,
    /// Exact size of the encoded file
    pub size_bytes: u64,
    /// Output dimensions
    pub resolution: Resolution,
}

impl ArtifactHandle {
    /// Relative URL the client uses to fetch the artifact
    pub fn download_url(&self) -> String {
        format!("/api/download/{}", self.id)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn params(audio: Option<&str>, data: Option<&str>, url: Option<&str>) -> MergeParams {
        MergeParams {
            audio_url: audio.map(String::from),
            image_data: data.map(String::from),
            image_url: url.map(String::from),
            resolution: None,
        }
    }

    #[test]
    fn generated_ids_are_unique_and_well_formed() {
        let a = ArtifactId::generate();
        let b = ArtifactId::generate();
        assert_ne!(a, b);

        let parts: Vec<&str> = a.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "req");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn resolution_parses_width_and_height() {
        assert_eq!("640x480".parse::<Resolution>().unwrap(), Resolution::new(640, 480));
        assert_eq!(" 1280X720 ".parse::<Resolution>().unwrap(), Resolution::new(1280, 720));
        assert_eq!(Resolution::new(640, 480).to_string(), "640x480");
    }

    #[test]
    fn resolution_rejects_malformed_input() {
        for bad in ["", "1920", "x1080", "1920x", "0x1080", "1920x0", "-1x5", "axb", "1x2x3", "99999x10"] {
            assert_eq!(
                bad.parse::<Resolution>(),
                Err(ValidationError::InvalidResolution(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn missing_audio_is_reported_first() {
        let err = MergeRequest::from_params(params(None, None, None)).unwrap_err();
        assert_eq!(err, ValidationError::MissingAudioSource);

        let err = MergeRequest::from_params(params(Some("  "), Some("aGk="), None)).unwrap_err();
        assert_eq!(err, ValidationError::MissingAudioSource);
    }

    #[test]
    fn missing_image_is_rejected() {
        let err =
            MergeRequest::from_params(params(Some("https://cdn.test/a.mp3"), None, Some("")))
                .unwrap_err();
        assert_eq!(err, ValidationError::MissingImageSource);
    }

    #[test]
    fn image_url_wins_over_inline_data() {
        let request = MergeRequest::from_params(params(
            Some("https://cdn.test/a.mp3"),
            Some("aGVsbG8="),
            Some("https://cdn.test/cover.png"),
        ))
        .unwrap();

        assert_eq!(
            request.image,
            ImageSource::Remote(url::Url::parse("https://cdn.test/cover.png").unwrap())
        );
        assert_eq!(request.resolution, Resolution::default());
    }

    #[test]
    fn inline_image_is_decoded() {
        let encoded = STANDARD.encode(b"\x89PNG\r\n\x1a\nrest");
        let request =
            MergeRequest::from_params(params(Some("http://cdn.test/a.mp3"), Some(&encoded), None))
                .unwrap();
        assert_eq!(request.image, ImageSource::Inline(b"\x89PNG\r\n\x1a\nrest".to_vec()));
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        let data = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"jpeg-bytes"));
        let request =
            MergeRequest::from_params(params(Some("http://cdn.test/a.mp3"), Some(&data), None))
                .unwrap();
        assert_eq!(request.image, ImageSource::Inline(b"jpeg-bytes".to_vec()));
    }

    #[test]
    fn invalid_base64_is_a_validation_error() {
        let err = MergeRequest::from_params(params(
            Some("http://cdn.test/a.mp3"),
            Some("***not base64***"),
            None,
        ))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidImageData(_)));
    }

    #[test]
    fn non_http_urls_are_rejected() {
        let err = MergeRequest::from_params(params(
            Some("file:///etc/passwd"),
            Some("aGk="),
            None,
        ))
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidUrl { field: "audio_url", .. }));

        let err =
            MergeRequest::from_params(params(Some("not a url"), Some("aGk="), None)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidUrl { .. }));
    }

    #[test]
    fn bad_resolution_is_rejected_after_sources() {
        let mut p = params(Some("http://cdn.test/a.mp3"), Some("aGk="), None);
        p.resolution = Some("wide".into());
        assert_eq!(
            MergeRequest::from_params(p).unwrap_err(),
            ValidationError::InvalidResolution("wide".into())
        );
    }

    #[test]
    fn download_url_uses_identifier() {
        let handle = ArtifactHandle {
            id: ArtifactId::from("req_1_abc"),
            size_bytes: 10,
            resolution: Resolution::new(640, 480),
        };
        assert_eq!(handle.download_url(), "/api/download/req_1_abc");
    }
}
