//! Batch processing kernels invoked from the worker thread
//!
//! A kernel receives deinterleaved per-channel batches of a fixed size and
//! writes an output batch of the same shape. It runs off the real-time thread,
//! so it may take variable time, but it must not allocate per call if it wants
//! to keep up with the production rate.

use serde::{Deserialize, Serialize};

/// Opaque batch processor
///
/// `input` and `output` hold at least `channel_count` channels, each exactly
/// one batch long. Channels beyond `channel_count` are ignored.
pub trait Kernel: Send {
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], channel_count: usize);

    /// Kernel name for logging
    fn name(&self) -> &str {
        "kernel"
    }
}

/// Adapts a closure into a [`Kernel`]
pub struct FnKernel<F>(pub F);

impl<F> Kernel for FnKernel<F>
where
    F: FnMut(&[Vec<f32>], &mut [Vec<f32>], usize) + Send,
{
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], channel_count: usize) {
        (self.0)(input, output, channel_count)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

impl Kernel for Box<dyn Kernel> {
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], channel_count: usize) {
        (**self).process(input, output, channel_count)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Copies input to output unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKernel;

impl Kernel for IdentityKernel {
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], channel_count: usize) {
        for (src, dst) in input.iter().zip(output.iter_mut()).take(channel_count) {
            let len = src.len().min(dst.len());
            dst[..len].copy_from_slice(&src[..len]);
        }
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Scales every sample by a linear gain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainKernel {
    gain: f32,
}

impl GainKernel {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Kernel for GainKernel {
    fn process(&mut self, input: &[Vec<f32>], output: &mut [Vec<f32>], channel_count: usize) {
        for (src, dst) in input.iter().zip(output.iter_mut()).take(channel_count) {
            for (out, &sample) in dst.iter_mut().zip(src.iter()) {
                *out = sample * self.gain;
            }
        }
    }

    fn name(&self) -> &str {
        "gain"
    }
}

/// Serializable choice of built-in kernel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelConfig {
    #[default]
    Identity,
    Gain { gain: f32 },
}

impl KernelConfig {
    pub fn build(&self) -> Box<dyn Kernel> {
        match *self {
            KernelConfig::Identity => Box::new(IdentityKernel),
            KernelConfig::Gain { gain } => Box::new(GainKernel::new(gain)),
        }
    }
}
