//! Real-time side of the bridge
//!
//! [`AudioThreadAdapter::process`] is the only code that runs inside the
//! render deadline. Each call does a bounded amount of work proportional to
//! the quantum size: no allocation, no locks, no logging, no waiting. The
//! worker wake is an atomic swap plus a thread unpark.

use renderq_core::domain::{RenderRequester, RingConsumer, RingProducer};

/// What one quantum did, for hosts that keep their own statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuantumReport {
    /// The input quantum was accepted (false means it was dropped on overrun)
    pub pushed: bool,
    /// Real output frames copied; the rest of the quantum is silence
    pub pulled: usize,
    /// This quantum flipped the request flag and woke the worker
    pub requested: bool,
}

/// Per-quantum driver owned by the audio callback
///
/// Holds the producer end of the input ring, the consumer end of the output
/// ring and the requesting half of the render signal.
#[derive(Debug)]
pub struct AudioThreadAdapter {
    input: RingProducer,
    output: RingConsumer,
    requester: RenderRequester,
    batch_threshold: usize,
    channel_count: usize,
}

impl AudioThreadAdapter {
    pub fn new(input: RingProducer, output: RingConsumer, requester: RenderRequester) -> Self {
        let layout = input.layout();
        let batch_threshold = layout.batch_frames().unwrap_or(layout.capacity());
        let channel_count = input.active_channels();
        Self {
            input,
            output,
            requester,
            batch_threshold,
            channel_count,
        }
    }

    /// Run one render quantum.
    ///
    /// `input` holds one slice per node input channel, `output` one slice per
    /// node output channel. On overrun the input quantum is dropped; on
    /// underrun the missing output frames are zero-filled.
    pub fn process<I, O>(&mut self, input: &[I], output: &mut [O], frames: usize) -> QuantumReport
    where
        I: AsRef<[f32]>,
        O: AsMut<[f32]>,
    {
        let channels = input.len().clamp(1, self.input.layout().max_channels());
        if channels != self.channel_count && self.input.adapt_channel_count(channels).is_ok() {
            self.channel_count = channels;
        }

        let worker_channels = self.output.producer_channels();
        if worker_channels != self.output.active_channels() {
            // Values outside 1..=max are rejected and the old count kept
            let _ = self.output.adapt_channel_count(worker_channels);
        }

        let pushed = self.input.push(input, frames);
        let pulled = self.output.pull(output, frames);

        let requested = self.input.frames_available() >= self.batch_threshold
            && self.requester.request();

        QuantumReport {
            pushed,
            pulled,
            requested,
        }
    }

    pub fn is_worker_ready(&self) -> bool {
        self.requester.is_worker_ready()
    }

    /// Input frames queued for the worker
    pub fn input_frames_available(&self) -> usize {
        self.input.frames_available()
    }

    /// Processed frames waiting to be played
    pub fn output_frames_available(&self) -> usize {
        self.output.frames_available()
    }

    pub fn batch_threshold(&self) -> usize {
        self.batch_threshold
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn requester(&self) -> &RenderRequester {
        &self.requester
    }
}
