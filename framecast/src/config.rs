//! Pipeline configuration
//!
//! [`PipelineConfig`] is the single context object handed to the supervisor.
//! It can be built in code, loaded from JSON, or overlaid with `FRAMECAST_*`
//! environment variables.

use framecast_core::{DropPolicy, FramecastError, FramecastResult, ImageFormat, RetryPolicy};
use framecast_media::EncoderConfig;
use framecast_upload::{BodyMode, HttpTransportConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Highest accepted capture rate
pub const MAX_FRAME_RATE: f64 = 120.0;

/// What `stop()` does with frames still waiting for upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Let workers upload what is queued, up to the grace period
    #[default]
    Drain,
    /// Throw queued frames away and stop workers right away
    Discard,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upload URL
    pub endpoint: String,
    /// Capture ticks per second
    pub target_frame_rate: f64,
    /// Upload queue slots
    pub queue_capacity: usize,
    /// Policy applied when the queue is full
    pub drop_policy: DropPolicy,
    /// Concurrent upload workers
    pub worker_count: usize,
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,
    /// First retry delay
    pub backoff_base_ms: u64,
    /// Upper bound on any retry delay
    pub max_backoff_ms: u64,
    /// Per-request timeout
    pub request_timeout_ms: u64,
    /// What `stop` does with queued frames
    pub shutdown_policy: ShutdownPolicy,
    /// How long `stop()` waits for in-flight work before aborting it
    pub grace_period_ms: u64,
    /// Re-poll interval while the device is unavailable and silent
    pub device_retry_ms: u64,
    /// Encoded image format
    pub image_format: ImageFormat,
    /// JPEG quality, 1..=100
    pub jpeg_quality: u8,
    /// How the image is placed in the request body
    pub body_mode: BodyMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/receive_frame".to_string(),
            target_frame_rate: 10.0,
            queue_capacity: 8,
            drop_policy: DropPolicy::DropOldest,
            worker_count: 2,
            max_retries: 3,
            backoff_base_ms: 100,
            max_backoff_ms: 5_000,
            request_timeout_ms: 5_000,
            shutdown_policy: ShutdownPolicy::Drain,
            grace_period_ms: 2_000,
            device_retry_ms: 500,
            image_format: ImageFormat::Jpeg,
            jpeg_quality: 80,
            body_mode: BodyMode::Multipart,
        }
    }
}

impl PipelineConfig {
    /// Validate every field
    pub fn validate(&self) -> FramecastResult<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(FramecastError::invalid_config(
                "endpoint",
                format!("'{}' is not an http(s) URL", self.endpoint),
            ));
        }

        if !self.target_frame_rate.is_finite()
            || self.target_frame_rate <= 0.0
            || self.target_frame_rate > MAX_FRAME_RATE
        {
            return Err(FramecastError::invalid_config(
                "target_frame_rate",
                format!(
                    "{} outside (0, {}]",
                    self.target_frame_rate, MAX_FRAME_RATE
                ),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(FramecastError::invalid_config(
                "queue_capacity",
                "must be at least 1",
            ));
        }

        if self.worker_count == 0 {
            return Err(FramecastError::invalid_config(
                "worker_count",
                "must be at least 1",
            ));
        }

        if self.max_backoff_ms < self.backoff_base_ms {
            return Err(FramecastError::invalid_config(
                "max_backoff_ms",
                format!(
                    "{} is below backoff_base_ms {}",
                    self.max_backoff_ms, self.backoff_base_ms
                ),
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(FramecastError::invalid_config(
                "request_timeout_ms",
                "must be positive",
            ));
        }

        if self.device_retry_ms == 0 {
            return Err(FramecastError::invalid_config(
                "device_retry_ms",
                "must be positive",
            ));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(FramecastError::invalid_config(
                "jpeg_quality",
                format!("{} outside 1..=100", self.jpeg_quality),
            ));
        }

        Ok(())
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json_str(json: &str) -> FramecastResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| FramecastError::ConfigParse {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> FramecastResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| FramecastError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Defaults overlaid with `FRAMECAST_*` environment variables
    pub fn from_env() -> FramecastResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from `lookup`, keyed by `FRAMECAST_*` variable names
    pub fn apply_env<F>(&mut self, lookup: F) -> FramecastResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("FRAMECAST_ENDPOINT") {
            self.endpoint = endpoint;
        }
        overlay(&lookup, "FRAMECAST_FRAME_RATE", &mut self.target_frame_rate)?;
        overlay(&lookup, "FRAMECAST_QUEUE_CAPACITY", &mut self.queue_capacity)?;
        overlay_enum(&lookup, "FRAMECAST_DROP_POLICY", &mut self.drop_policy)?;
        overlay(&lookup, "FRAMECAST_WORKERS", &mut self.worker_count)?;
        overlay(&lookup, "FRAMECAST_MAX_RETRIES", &mut self.max_retries)?;
        overlay(&lookup, "FRAMECAST_BACKOFF_BASE_MS", &mut self.backoff_base_ms)?;
        overlay(&lookup, "FRAMECAST_MAX_BACKOFF_MS", &mut self.max_backoff_ms)?;
        overlay(&lookup, "FRAMECAST_REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms)?;
        overlay_enum(&lookup, "FRAMECAST_SHUTDOWN_POLICY", &mut self.shutdown_policy)?;
        overlay(&lookup, "FRAMECAST_GRACE_PERIOD_MS", &mut self.grace_period_ms)?;
        overlay(&lookup, "FRAMECAST_DEVICE_RETRY_MS", &mut self.device_retry_ms)?;
        overlay_enum(&lookup, "FRAMECAST_IMAGE_FORMAT", &mut self.image_format)?;
        overlay(&lookup, "FRAMECAST_JPEG_QUALITY", &mut self.jpeg_quality)?;
        overlay_enum(&lookup, "FRAMECAST_BODY_MODE", &mut self.body_mode)?;
        Ok(())
    }

    /// Time between capture ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_frame_rate)
    }

    /// Shutdown grace period
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Poll interval while the device is unavailable
    pub fn device_retry(&self) -> Duration {
        Duration::from_millis(self.device_retry_ms)
    }

    /// Retry policy for upload workers, with jitter
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.backoff_base_ms)),
            jitter: true,
        }
    }

    /// Encoder settings
    pub fn encoder_config(&self) -> EncoderConfig {
        EncoderConfig {
            format: self.image_format,
            jpeg_quality: self.jpeg_quality,
        }
    }

    /// HTTP transport settings
    pub fn transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            endpoint: self.endpoint.clone(),
            body_mode: self.body_mode,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

fn overlay<T, F>(lookup: &F, key: &str, target: &mut T) -> FramecastResult<()>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e: T::Err| FramecastError::invalid_config(key, format!("'{raw}': {e}")))?;
    }
    Ok(())
}

/// Enum values use their serde spelling, e.g. `drop-newest` or `png`
fn overlay_enum<T, F>(lookup: &F, key: &str, target: &mut T) -> FramecastResult<()>
where
    T: DeserializeOwned,
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        let value = serde_json::Value::String(raw.trim().to_ascii_lowercase());
        *target = serde_json::from_value(value)
            .map_err(|e| FramecastError::invalid_config(key, format!("'{raw}': {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.drop_policy, DropPolicy::DropOldest);
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let cases: Vec<(&str, PipelineConfig)> = vec![
            ("endpoint", PipelineConfig { endpoint: "ftp://x".into(), ..Default::default() }),
            ("target_frame_rate", PipelineConfig { target_frame_rate: 0.0, ..Default::default() }),
            ("target_frame_rate", PipelineConfig { target_frame_rate: 240.0, ..Default::default() }),
            ("target_frame_rate", PipelineConfig { target_frame_rate: f64::NAN, ..Default::default() }),
            ("queue_capacity", PipelineConfig { queue_capacity: 0, ..Default::default() }),
            ("worker_count", PipelineConfig { worker_count: 0, ..Default::default() }),
            ("max_backoff_ms", PipelineConfig { max_backoff_ms: 10, ..Default::default() }),
            ("jpeg_quality", PipelineConfig { jpeg_quality: 0, ..Default::default() }),
        ];

        for (field, config) in cases {
            match config.validate() {
                Err(FramecastError::InvalidConfiguration { field: got, .. }) => {
                    assert_eq!(got, field)
                }
                other => panic!("expected {field} to be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"queue_capacity": 5, "drop_policy": "drop-newest", "shutdown_policy": "discard"}"#,
        )
        .unwrap();

        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.drop_policy, DropPolicy::DropNewest);
        assert_eq!(config.shutdown_policy, ShutdownPolicy::Discard);
        assert_eq!(config.worker_count, 2);
    }

    #[test]
    fn test_json_errors() {
        assert!(matches!(
            PipelineConfig::from_json_str("{not json"),
            Err(FramecastError::ConfigParse { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"worker_count": 0}"#),
            Err(FramecastError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json_file("/nonexistent/framecast.json"),
            Err(FramecastError::ConfigRead { .. })
        ));
    }

    #[test]
    fn test_env_overlay() {
        let mut config = PipelineConfig::default();
        config
            .apply_env(env(&[
                ("FRAMECAST_ENDPOINT", "https://frames.example/upload"),
                ("FRAMECAST_FRAME_RATE", "30"),
                ("FRAMECAST_WORKERS", " 4 "),
                ("FRAMECAST_DROP_POLICY", "DROP-NEWEST"),
                ("FRAMECAST_IMAGE_FORMAT", "png"),
                ("FRAMECAST_BODY_MODE", "raw"),
            ]))
            .unwrap();

        assert_eq!(config.endpoint, "https://frames.example/upload");
        assert_eq!(config.target_frame_rate, 30.0);
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.drop_policy, DropPolicy::DropNewest);
        assert_eq!(config.image_format, ImageFormat::Png);
        assert_eq!(config.body_mode, BodyMode::Raw);
        assert_eq!(config.queue_capacity, 8);
    }

    #[test]
    fn test_env_overlay_reports_variable() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_env(env(&[("FRAMECAST_QUEUE_CAPACITY", "lots")]))
            .unwrap_err();
        match err {
            FramecastError::InvalidConfiguration { field, .. } => {
                assert_eq!(field, "FRAMECAST_QUEUE_CAPACITY")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_derived_settings() {
        let config = PipelineConfig {
            max_retries: 5,
            backoff_base_ms: 250,
            image_format: ImageFormat::Png,
            ..Default::default()
        };

        let retry = config.retry_policy();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.backoff_base, Duration::from_millis(250));
        assert_eq!(config.encoder_config().format, ImageFormat::Png);
        assert_eq!(config.transport_config().endpoint, config.endpoint);
    }
}
