use faceaccess_hw::CaptureSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Env var naming an optional TOML file loaded before env overrides.
pub const CONFIG_PATH_ENV: &str = "FACEACCESS_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Client configuration: a TOML file (optional) overlaid by `FACEACCESS_*`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend API root, including the `/api` prefix.
    pub api_base_url: String,
    /// V4L2 device path.
    pub camera_device: String,
    /// Frames to discard after opening the camera (auto-exposure settling).
    pub warmup_frames: usize,
    /// Non-dark frames grabbed per still.
    pub frames_per_capture: usize,
    /// JPEG quality for uploaded stills.
    pub jpeg_quality: u8,
    /// Whole-request timeout. Unset means the transport default.
    pub request_timeout_secs: Option<u64>,
    /// Dashboard refresh interval in watch mode.
    pub dashboard_refresh_secs: u64,
    /// Access logs shown on the dashboard.
    pub dashboard_log_limit: u32,
    /// Access logs fetched by `logs` when no limit is given.
    pub access_log_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            camera_device: "/dev/video0".to_string(),
            warmup_frames: 4,
            frames_per_capture: 3,
            jpeg_quality: 80,
            request_timeout_secs: None,
            dashboard_refresh_secs: 30,
            dashboard_log_limit: 20,
            access_log_limit: 50,
        }
    }
}

impl Config {
    /// Load from `FACEACCESS_CONFIG` (if set) and then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overlay `FACEACCESS_*` values from `lookup`. Unparseable values are
    /// ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("FACEACCESS_API_URL") {
            self.api_base_url = url;
        }
        if let Some(device) = lookup("FACEACCESS_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        override_parsed(&lookup, "FACEACCESS_WARMUP_FRAMES", &mut self.warmup_frames);
        override_parsed(&lookup, "FACEACCESS_FRAMES_PER_CAPTURE", &mut self.frames_per_capture);
        override_parsed(&lookup, "FACEACCESS_JPEG_QUALITY", &mut self.jpeg_quality);
        override_parsed(&lookup, "FACEACCESS_DASHBOARD_REFRESH_SECS", &mut self.dashboard_refresh_secs);
        override_parsed(&lookup, "FACEACCESS_DASHBOARD_LOG_LIMIT", &mut self.dashboard_log_limit);
        override_parsed(&lookup, "FACEACCESS_ACCESS_LOG_LIMIT", &mut self.access_log_limit);

        let mut timeout = 0u64;
        if override_parsed(&lookup, "FACEACCESS_REQUEST_TIMEOUT_SECS", &mut timeout) {
            self.request_timeout_secs = (timeout > 0).then_some(timeout);
        }
        self
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            frames: self.frames_per_capture.max(1),
            jpeg_quality: self.jpeg_quality.clamp(1, 100),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn dashboard_refresh(&self) -> Duration {
        Duration::from_secs(self.dashboard_refresh_secs.max(1))
    }
}

fn override_parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> bool {
    let Some(raw) = lookup(key) else {
        return false;
    };
    match raw.trim().parse() {
        Ok(value) => {
            *target = value;
            true
        }
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable config override");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.dashboard_refresh(), Duration::from_secs(30));
        assert_eq!(config.capture_settings(), CaptureSettings { frames: 3, jpeg_quality: 80 });
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            api_base_url = "https://access.example.org/api"
            jpeg_quality = 90
            request_timeout_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "https://access.example.org/api");
        assert_eq!(config.jpeg_quality, 90);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.access_log_limit, 50);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("warmup_frames = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_overrides(lookup(&[
            ("FACEACCESS_API_URL", "http://10.0.0.5:8000/api"),
            ("FACEACCESS_CAMERA_DEVICE", "/dev/video2"),
            ("FACEACCESS_WARMUP_FRAMES", "0"),
            ("FACEACCESS_JPEG_QUALITY", "not-a-number"),
            ("FACEACCESS_REQUEST_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.api_base_url, "http://10.0.0.5:8000/api");
        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.warmup_frames, 0);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_timeout_override_clears_timeout() {
        let mut config = Config::default();
        config.request_timeout_secs = Some(10);
        let config = config.with_overrides(lookup(&[("FACEACCESS_REQUEST_TIMEOUT_SECS", "0")]));
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/faceaccess.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
