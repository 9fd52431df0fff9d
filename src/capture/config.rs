//! Capture and session configuration.
//!
//! Settings load from a TOML file whose sections all fall back to their
//! defaults when absent.

use super::Facing;
use crate::export::MAX_CLIP_MS;
use crate::filter::{FilterState, Intensity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for camera capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera opened at session start.
    pub facing: Facing,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Target render rate in frames per second.
    pub fps: u32,
    /// Device index used for the front camera.
    pub front_device: u32,
    /// Device index used for the rear camera.
    pub rear_device: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Rear,
            width: 640,
            height: 480,
            fps: 30,
            front_device: 0,
            rear_device: 1,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Device index for the given facing.
    pub fn device_for(&self, facing: Facing) -> u32 {
        match facing {
            Facing::Front => self.front_device,
            Facing::Rear => self.rear_device,
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.fps == 0 || self.fps > 120 {
            return Err(ConfigError::InvalidFrameRate);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    #[error("invalid clip duration {0} ms (must be 1-30000 ms)")]
    InvalidClipDuration(u64),
    #[error("invalid segment interval (must be non-zero)")]
    InvalidSegmentInterval,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Initial filter settings for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub enabled: bool,
    pub intensity: Intensity,
}

impl Default for FilterConfig {
    fn default() -> Self {
        let state = FilterState::default();
        Self {
            enabled: state.enabled,
            intensity: state.intensity,
        }
    }
}

impl FilterConfig {
    pub fn to_state(&self) -> FilterState {
        FilterState {
            enabled: self.enabled,
            intensity: self.intensity,
        }
    }
}

/// Render loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Run until interrupted (true) or stop after `frame_count` presents.
    pub continuous: bool,
    /// Number of frames to present if not continuous.
    pub frame_count: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            frame_count: 120,
        }
    }
}

/// Still/clip export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory exported files are written to.
    pub output_dir: PathBuf,
    /// Caption stamped into the bottom band of exports.
    pub caption: String,
    /// Height in pixels of each overlay band.
    pub band_height: u32,
    /// Cadence at which recorded frames are flushed into a segment.
    pub segment_interval_ms: u64,
    /// Recording ceiling; sessions auto-finalize at this duration.
    pub max_clip_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            caption: "SPECTRAL TINT".to_string(),
            band_height: 24,
            segment_interval_ms: 1000,
            max_clip_ms: MAX_CLIP_MS,
        }
    }
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clip_ms == 0 || self.max_clip_ms > MAX_CLIP_MS {
            return Err(ConfigError::InvalidClipDuration(self.max_clip_ms));
        }
        if self.segment_interval_ms == 0 {
            return Err(ConfigError::InvalidSegmentInterval);
        }
        Ok(())
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.export.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert!(FileConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [capture]
            facing = "front"
            width = 320

            [filter]
            intensity = 0.4
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.facing, Facing::Front);
        assert_eq!(config.capture.width, 320);
        assert_eq!(config.capture.height, 480);
        assert!(config.filter.enabled);
        assert_eq!(config.filter.intensity.value(), 0.4);
        assert_eq!(config.export.max_clip_ms, 30_000);
    }

    #[test]
    fn test_intensity_out_of_range_is_clamped() {
        let config = FileConfig::from_toml("[filter]\nintensity = 3.0\n").unwrap();
        assert_eq!(config.filter.intensity, Intensity::FULL);
    }

    #[test]
    fn test_clip_ceiling_enforced() {
        let result = FileConfig::from_toml("[export]\nmax_clip_ms = 60000\n");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidClipDuration(60000))
        ));
    }

    #[test]
    fn test_device_for_facing() {
        let config = CaptureConfig::default();
        assert_eq!(config.device_for(Facing::Front), 0);
        assert_eq!(config.device_for(Facing::Rear), 1);
    }
}
