//! Audio timing primitives shared by the real-time and worker sides

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{BridgeError, Result};

/// Frames per render callback in the Web Audio rendering model
pub const RENDER_QUANTUM_FRAMES: usize = 128;

/// Number of frames the real-time callback produces or consumes per invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct RenderQuantum(usize);

impl RenderQuantum {
    pub fn new(frames: usize) -> Result<Self> {
        if frames == 0 {
            return Err(BridgeError::ZeroRenderQuantum);
        }
        Ok(Self(frames))
    }

    pub fn frames(&self) -> usize {
        self.0
    }

    /// Wall-clock length of one quantum at `sample_rate`
    pub fn period(&self, sample_rate: SampleRate) -> Result<Duration> {
        match sample_rate.hz() {
            0 => Err(BridgeError::ZeroSampleRate),
            hz => Ok(Duration::from_secs_f64(self.0 as f64 / hz as f64)),
        }
    }

    /// Check that `batch` is a whole, non-zero number of quanta
    pub fn check_batch(&self, batch: usize) -> Result<usize> {
        if batch == 0 || batch % self.0 != 0 {
            return Err(BridgeError::BatchNotQuantumMultiple {
                batch,
                quantum: self.0,
            });
        }
        Ok(batch / self.0)
    }
}

impl Default for RenderQuantum {
    fn default() -> Self {
        Self(RENDER_QUANTUM_FRAMES)
    }
}

impl TryFrom<usize> for RenderQuantum {
    type Error = BridgeError;

    fn try_from(frames: usize) -> Result<Self> {
        Self::new(frames)
    }
}

impl From<RenderQuantum> for usize {
    fn from(quantum: RenderQuantum) -> Self {
        quantum.0
    }
}

/// Audio sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum SampleRate {
    Hz44100,
    Hz48000,
    Hz96000,
    Custom(u32),
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz44100 => 44100,
            SampleRate::Hz48000 => 48000,
            SampleRate::Hz96000 => 96000,
            SampleRate::Custom(hz) => *hz,
        }
    }

    pub fn from_hz(hz: u32) -> Self {
        match hz {
            44100 => SampleRate::Hz44100,
            48000 => SampleRate::Hz48000,
            96000 => SampleRate::Hz96000,
            hz => SampleRate::Custom(hz),
        }
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        SampleRate::Hz48000
    }
}

impl From<u32> for SampleRate {
    fn from(hz: u32) -> Self {
        Self::from_hz(hz)
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}
