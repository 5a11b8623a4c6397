//! Recorder configuration

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Default number of frames recorded before the replay program is exported
pub const DEFAULT_FRAMES: usize = 100;

/// Default base name of the exported replay program
pub const DEFAULT_EXPORT: &str = "gpu_record";

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    /// Frames to record before exporting
    pub frames: usize,
    /// Base file name of the exported artifact (`<export>.html`)
    pub export: String,
    /// Width of the replay surface
    pub width: u32,
    /// Height of the replay surface
    pub height: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            export: DEFAULT_EXPORT.to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

impl RecorderConfig {
    /// Parse a TOML configuration, filling omitted keys with defaults
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames == 0 {
            return Err(ConfigError::Invalid("frames must be at least 1"));
        }
        if self.export.trim().is_empty() {
            return Err(ConfigError::Invalid("export name must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid("surface dimensions must be non-zero"));
        }
        Ok(())
    }

    /// Frame budget; a zero budget still records one frame
    pub fn frame_budget(&self) -> usize {
        self.frames.max(1)
    }

    /// File name of the exported artifact
    pub fn artifact_name(&self) -> String {
        format!("{}.html", self.export)
    }
}
