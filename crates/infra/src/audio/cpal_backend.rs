//! CPAL output host
//!
//! Plays the bridge output on the default output device. Devices call back
//! with arbitrary buffer sizes, so the callback re-blocks them into whole
//! render quanta through a preallocated interleaved carry buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use tracing::{error, info};

use renderq_core::domain::{RenderQuantum, SampleRate};

use super::clock::SineSource;
use super::realtime::AudioThreadAdapter;
use crate::error::{HostError, Result};

pub struct CpalOutputHost {
    device: cpal::Device,
    config: StreamConfig,
    name: String,
}

impl CpalOutputHost {
    /// Open the default output device in its default f32 configuration
    pub fn open_default() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| HostError::Device("no default output device".into()))?;

        #[allow(deprecated)]
        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| HostError::Device(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(HostError::Device(format!(
                "unsupported sample format {:?} on {}",
                supported.sample_format(),
                name
            )));
        }

        let config = supported.config();
        info!(
            device = %name,
            channels = config.channels,
            sample_rate = config.sample_rate,
            "Opened output device"
        );

        Ok(Self {
            device,
            config,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> SampleRate {
        let hz: u32 = self.config.sample_rate;
        SampleRate::from_hz(hz)
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    /// Start playback. `source` feeds the bridge input, one quantum at a time.
    pub fn play(
        &self,
        mut audio: AudioThreadAdapter,
        mut source: SineSource,
        quantum: RenderQuantum,
        bridge_channels: usize,
    ) -> Result<CpalStream> {
        let frames = quantum.frames();
        let device_channels = self.channels().max(1);
        let bridge_channels = bridge_channels.max(1);

        let mut input = vec![vec![0.0f32; frames]; bridge_channels];
        let mut output = vec![vec![0.0f32; frames]; bridge_channels];
        let mut carry = vec![0.0f32; frames * device_channels];
        let mut carry_pos = carry.len();

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut written = 0;
                    while written < data.len() {
                        if carry_pos == carry.len() {
                            source.fill(&mut input);
                            audio.process(&input, &mut output, frames);
                            for (frame, slot) in carry.chunks_mut(device_channels).enumerate() {
                                for (ch, sample) in slot.iter_mut().enumerate() {
                                    *sample = output[ch.min(bridge_channels - 1)][frame];
                                }
                            }
                            carry_pos = 0;
                        }
                        let len = (data.len() - written).min(carry.len() - carry_pos);
                        data[written..written + len]
                            .copy_from_slice(&carry[carry_pos..carry_pos + len]);
                        written += len;
                        carry_pos += len;
                    }
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| HostError::Stream(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| HostError::Stream(format!("Failed to start stream: {}", e)))?;

        Ok(CpalStream { _stream: stream })
    }
}

impl std::fmt::Debug for CpalOutputHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutputHost")
            .field("name", &self.name)
            .field("channels", &self.config.channels)
            .field("sample_rate", &self.config.sample_rate)
            .finish()
    }
}

/// Keeps the device stream alive; playback stops when dropped
pub struct CpalStream {
    _stream: cpal::Stream,
}
