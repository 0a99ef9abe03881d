//! Configuration management for renderq
//!
//! This module provides:
//! - `BridgeConfig`: ring geometry, render quantum, worker batch and wait policy
//! - `ClockConfig`: sample rate and kernel choice for the bundled hosts
//! - TOML load/save for the complete `RenderqConfig`

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument};

use super::audio::{RenderQuantum, SampleRate};
use super::error::BridgeError;
use super::kernel::KernelConfig;
use super::layout::RegionLayout;
use super::signal::WaitPolicy;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] BridgeError),

    #[error("Invalid configuration: tone frequency {0} Hz must be finite and non-negative")]
    InvalidTone(f32),
}

/// Geometry and scheduling of one input/output ring pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Ring capacity in frames, per direction
    pub capacity: usize,

    /// Preallocated channel count; the active count may shrink at runtime
    pub max_channels: usize,

    /// Frames per real-time callback
    pub render_quantum: usize,

    /// Frames the worker processes per wake, a multiple of `render_quantum`
    pub batch_size: usize,

    /// Park the worker thread or spin with backoff
    pub wait_policy: WaitPolicy,

    /// Upper bound on one worker wait before it re-checks state
    pub wait_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            max_channels: 2,
            render_quantum: 128,
            batch_size: 512,
            wait_policy: WaitPolicy::Block,
            wait_timeout_ms: 25_000,
        }
    }
}

impl BridgeConfig {
    /// Check every construction rule without allocating anything
    pub fn validate(&self) -> std::result::Result<(), BridgeError> {
        self.layout().map(|_| ())
    }

    pub fn quantum(&self) -> std::result::Result<RenderQuantum, BridgeError> {
        RenderQuantum::new(self.render_quantum)
    }

    /// Layout shared by the input and output rings
    pub fn layout(&self) -> std::result::Result<RegionLayout, BridgeError> {
        let quantum = self.quantum()?;
        let layout = RegionLayout::new(self.capacity, self.max_channels)?;
        quantum.check_batch(self.batch_size)?;
        layout.with_batch(self.batch_size)
    }

    /// `None` means wait without a deadline
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}

/// Settings for the bundled render hosts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub sample_rate: SampleRate,

    /// Frequency of the test tone fed into the bridge
    pub tone_hz: f32,

    pub kernel: KernelConfig,
}

impl ClockConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate.hz() == 0 {
            return Err(BridgeError::ZeroSampleRate.into());
        }
        if !self.tone_hz.is_finite() || self.tone_hz < 0.0 {
            return Err(ConfigError::InvalidTone(self.tone_hz));
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            tone_hz: 440.0,
            kernel: KernelConfig::Gain { gain: 0.1 },
        }
    }
}

/// Complete renderq configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderqConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

impl RenderqConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_toml(&contents)?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, self.to_toml()?).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.bridge.validate()?;
        config.clock.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
