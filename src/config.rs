//! Configuration types for ffmerge

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

/// HTTP listener settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind (default: 0.0.0.0)
    #[serde(default = "default_bind_ip")]
    pub bind_ip: IpAddr,

    /// Listen port (default: 3000, overridden by `PORT`)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins ("*" allows any origin)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Serve Swagger UI at `/swagger-ui` (default: false)
    #[serde(default)]
    pub swagger_ui: bool,

    /// Maximum accepted request body size in bytes (default: 100 MB)
    ///
    /// Inline images arrive base64-encoded in the JSON body, so this bounds
    /// their size too.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    /// Socket address the API server listens on
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: default_bind_ip(),
            port: default_port(),
            cors_origins: default_cors_origins(),
            swagger_ui: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Limits applied when fetching remote inputs
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Largest accepted audio download (default: 100 MB)
    #[serde(default = "default_audio_max_bytes")]
    pub audio_max_bytes: u64,

    /// Largest accepted image download (default: 50 MB)
    #[serde(default = "default_image_max_bytes")]
    pub image_max_bytes: u64,

    /// Timeout for each individual fetch (default: 60s)
    #[serde(default = "default_fetch_timeout")]
    pub timeout: Duration,

    /// User-Agent sent with fetch requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            audio_max_bytes: default_audio_max_bytes(),
            image_max_bytes: default_image_max_bytes(),
            timeout: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Lifecycle settings for produced artifacts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory holding staged inputs and encoded outputs
    /// (default: `<system temp>/ffmerge`)
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// How long an undownloaded artifact is kept (default: 5 minutes)
    #[serde(default = "default_ttl")]
    pub ttl: Duration,

    /// How often the sweeper looks for expired artifacts (default: 60s)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,

    /// Delay between the end of a transfer and deletion (default: 2s)
    #[serde(default = "default_grace_delay")]
    pub grace_delay: Duration,

    /// Age after which an unfinished reservation is reaped (default: 1 hour)
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout: Duration,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            ttl: default_ttl(),
            sweep_interval: default_sweep_interval(),
            grace_delay: default_grace_delay(),
            pending_timeout: default_pending_timeout(),
        }
    }
}

/// External encoder settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// x264 preset (default: "medium")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// AAC bitrate (default: "192k")
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Kill the encoder after this long (default: no limit)
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
            preset: default_preset(),
            audio_bitrate: default_audio_bitrate(),
            timeout: None,
        }
    }
}

/// Main configuration for ffmerge
///
/// Fields are organized into logical sub-configs:
/// - [`server`](ServerConfig) : listener, CORS, body limit
/// - [`fetch`](FetchConfig) : size ceilings and timeouts for remote inputs
/// - [`artifacts`](ArtifactConfig) : work directory, expiry, sweep cadence
/// - [`encoder`](EncoderConfig) : ffmpeg location and encoding knobs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote fetch limits
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Artifact lifecycle settings
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Encoder settings
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl Config {
    /// Build a configuration from defaults plus process environment overrides
    ///
    /// Recognised variables:
    /// - `PORT`: listen port
    /// - `FFMERGE_WORK_DIR`: work directory
    /// - `FFMPEG_PATH`: explicit ffmpeg binary
    /// - `FFMERGE_ARTIFACT_TTL_SECS`: artifact expiry in seconds
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            config.server.port = port.trim().parse().map_err(|_| Error::Config {
                message: format!("PORT must be a port number, got '{port}'"),
                key: Some("PORT".into()),
            })?;
        }

        if let Some(dir) = get("FFMERGE_WORK_DIR") {
            config.artifacts.work_dir = PathBuf::from(dir);
        }

        if let Some(path) = get("FFMPEG_PATH") {
            config.encoder.ffmpeg_path = Some(PathBuf::from(path));
        }

        if let Some(ttl) = get("FFMERGE_ARTIFACT_TTL_SECS") {
            let secs: u64 = ttl.trim().parse().map_err(|_| Error::Config {
                message: format!("FFMERGE_ARTIFACT_TTL_SECS must be whole seconds, got '{ttl}'"),
                key: Some("FFMERGE_ARTIFACT_TTL_SECS".into()),
            })?;
            config.artifacts.ttl = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.artifacts.sweep_interval.is_zero() {
            return Err(Error::Config {
                message: "sweep interval must be greater than zero".into(),
                key: Some("artifacts.sweep_interval".into()),
            });
        }
        if self.artifacts.ttl.is_zero() {
            return Err(Error::Config {
                message: "artifact ttl must be greater than zero".into(),
                key: Some("artifacts.ttl".into()),
            });
        }
        if self.artifacts.pending_timeout.is_zero() {
            return Err(Error::Config {
                message: "pending timeout must be greater than zero".into(),
                key: Some("artifacts.pending_timeout".into()),
            });
        }
        Ok(())
    }
}

fn default_bind_ip() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_audio_max_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_image_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("ffmerge/{}", env!("CARGO_PKG_VERSION"))
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("ffmerge")
}

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_grace_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_pending_timeout() -> Duration {
    crate::sweeper::DEFAULT_PENDING_TIMEOUT
}

fn default_true() -> bool {
    true
}

fn default_preset() -> String {
    "medium".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_contract() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address().to_string(), "0.0.0.0:3000");
        assert_eq!(config.fetch.audio_max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.fetch.image_max_bytes, 50 * 1024 * 1024);
        assert_eq!(config.fetch.timeout, Duration::from_secs(60));
        assert_eq!(config.artifacts.ttl, Duration::from_secs(300));
        assert_eq!(config.artifacts.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.artifacts.grace_delay, Duration::from_secs(2));
        assert_eq!(config.artifacts.pending_timeout, Duration::from_secs(3600));
        assert!(config.encoder.timeout.is_none());
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("FFMERGE_WORK_DIR", "/var/lib/ffmerge"),
            ("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg"),
            ("FFMERGE_ARTIFACT_TTL_SECS", "120"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.artifacts.work_dir, PathBuf::from("/var/lib/ffmerge"));
        assert_eq!(
            config.encoder.ffmpeg_path,
            Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(config.artifacts.ttl, Duration::from_secs(120));
    }

    #[test]
    fn empty_variables_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("PORT", "  ")])).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn invalid_port_names_the_key() {
        let err = Config::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        match err {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("PORT"));
                assert!(message.contains("eighty"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let err = Config::from_lookup(lookup(&[("FFMERGE_ARTIFACT_TTL_SECS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"server": {"port": 9000}, "encoder": {"preset": "fast"}}"#)
                .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.cors_origins, vec!["*".to_string()]);
        assert_eq!(config.encoder.preset, "fast");
        assert_eq!(config.encoder.audio_bitrate, "192k");
        assert_eq!(config.artifacts.ttl, Duration::from_secs(300));
    }
}
