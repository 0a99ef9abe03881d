//! Bridge assembly
//!
//! Builds the input and output rings described by a [`BridgeConfig`], splits
//! them between the audio-thread adapter and the worker, and hands back a
//! monitor that can read every diagnostic counter from any thread.

use crossbeam::utils::Backoff;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use renderq_core::domain::{
    BridgeConfig, Kernel, RenderSignal, RingBuffer, RingSnapshot, SharedRegion,
};

use super::realtime::AudioThreadAdapter;
use super::worker::{WorkerHandle, WorkerStats, WorkerThreadAdapter};
use crate::error::Result;

/// Both sides of a bridge, not yet running
pub struct Bridge<K: Kernel> {
    audio: AudioThreadAdapter,
    worker: WorkerThreadAdapter<K>,
    monitor: BridgeMonitor,
}

impl<K: Kernel> Bridge<K> {
    pub fn build(config: &BridgeConfig, kernel: K) -> Result<Self> {
        let layout = config.layout()?;
        info!(
            capacity = layout.capacity(),
            channels = layout.max_channels(),
            batch = config.batch_size,
            policy = ?config.wait_policy,
            bytes = layout.byte_size(),
            "Building render bridge"
        );

        let input = RingBuffer::new(layout);
        let output = RingBuffer::new(layout);
        let input_region = Arc::clone(input.region());
        let output_region = Arc::clone(output.region());

        // The request flag lives in the input ring's control block
        let (requester, waiter) =
            RenderSignal::new(Arc::clone(&input_region)).split(config.wait_policy);
        let (input_producer, input_consumer) = input.split();
        let (output_producer, output_consumer) = output.split();

        let audio = AudioThreadAdapter::new(input_producer, output_consumer, requester);
        let worker = WorkerThreadAdapter::new(input_consumer, output_producer, waiter, kernel)
            .with_timeout(config.wait_timeout());

        let monitor = BridgeMonitor {
            input: input_region,
            output: output_region,
            worker: worker.stats(),
        };

        Ok(Self {
            audio,
            worker,
            monitor,
        })
    }

    pub fn monitor(&self) -> &BridgeMonitor {
        &self.monitor
    }

    /// Split without starting a thread, for hosts that drive the worker themselves
    pub fn into_parts(self) -> (AudioThreadAdapter, WorkerThreadAdapter<K>, BridgeMonitor) {
        (self.audio, self.worker, self.monitor)
    }
}

impl<K: Kernel + 'static> Bridge<K> {
    /// Spawn the worker thread
    pub fn start(self) -> Result<RunningBridge> {
        let requester = self.audio.requester().clone();
        let worker = self.worker.spawn(requester)?;
        debug!("Render bridge started");

        Ok(RunningBridge {
            audio: self.audio,
            worker,
            monitor: self.monitor,
        })
    }
}

impl<K: Kernel> std::fmt::Debug for Bridge<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("audio", &self.audio)
            .field("worker", &self.worker)
            .finish()
    }
}

/// A bridge whose worker thread is running
#[derive(Debug)]
pub struct RunningBridge {
    audio: AudioThreadAdapter,
    worker: WorkerHandle,
    monitor: BridgeMonitor,
}

impl RunningBridge {
    pub fn audio_mut(&mut self) -> &mut AudioThreadAdapter {
        &mut self.audio
    }

    pub fn monitor(&self) -> &BridgeMonitor {
        &self.monitor
    }

    /// Hand the audio adapter to a callback thread and keep the worker handle
    pub fn into_parts(self) -> (AudioThreadAdapter, WorkerHandle, BridgeMonitor) {
        (self.audio, self.worker, self.monitor)
    }

    /// Stop the worker and return the final counters
    pub fn stop(self) -> Result<BridgeStats> {
        self.worker.stop()?;
        let stats = self.monitor.stats();
        info!(
            batches = stats.batches,
            overruns = stats.input.overruns,
            underrun_frames = stats.output.underrun_frames,
            "Render bridge stopped"
        );
        Ok(stats)
    }
}

/// Read-only view of both rings and the worker counters
#[derive(Debug, Clone)]
pub struct BridgeMonitor {
    input: Arc<SharedRegion>,
    output: Arc<SharedRegion>,
    worker: Arc<WorkerStats>,
}

impl BridgeMonitor {
    pub fn stats(&self) -> BridgeStats {
        let control = self.input.control();
        BridgeStats {
            input: RingSnapshot::capture(&self.input),
            output: RingSnapshot::capture(&self.output),
            wakes: control.wakes(),
            batches: self.worker.batches(),
            frames_processed: self.worker.frames(),
            timeouts: self.worker.timeouts(),
            worker_ready: control.is_ready(),
        }
    }

    pub fn is_worker_ready(&self) -> bool {
        self.input.control().is_ready()
    }

    /// Block the calling (non-real-time) thread until the worker has entered
    /// its loop. Returns `false` on timeout.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        while !self.is_worker_ready() {
            if Instant::now() >= deadline {
                return false;
            }
            if backoff.is_completed() {
                std::thread::sleep(Duration::from_millis(1));
            } else {
                backoff.snooze();
            }
        }
        true
    }
}

/// Aggregated diagnostic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    pub input: RingSnapshot,
    pub output: RingSnapshot,
    /// Idle-to-requested edges that woke the worker
    pub wakes: u64,
    pub batches: u64,
    pub frames_processed: u64,
    pub timeouts: u64,
    pub worker_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderq_core::domain::{BridgeError, GainKernel, IdentityKernel};
    use crate::error::HostError;

    fn small_config() -> BridgeConfig {
        BridgeConfig {
            capacity: 64,
            max_channels: 1,
            render_quantum: 8,
            batch_size: 16,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = BridgeConfig {
            batch_size: 12,
            ..small_config()
        };
        let err = Bridge::build(&config, IdentityKernel).unwrap_err();
        assert!(matches!(
            err,
            HostError::Config(BridgeError::BatchNotQuantumMultiple { .. })
        ));
    }

    #[test]
    fn test_manual_drive() {
        let bridge = Bridge::build(&small_config(), GainKernel::new(0.5)).unwrap();
        let (mut audio, mut worker, monitor) = bridge.into_parts();
        assert_eq!(audio.batch_threshold(), 16);
        assert_eq!(worker.batch_size(), 16);

        let mut out = [vec![0.0f32; 8]];
        audio.process(&[vec![1.0f32; 8]], &mut out, 8);
        let report = audio.process(&[vec![1.0f32; 8]], &mut out, 8);
        assert!(report.requested);

        assert_eq!(worker.process_pending(), 1);

        let report = audio.process(&[vec![1.0f32; 8]], &mut out, 8);
        assert_eq!(report.pulled, 8);
        assert_eq!(out[0], vec![0.5; 8]);

        let stats = monitor.stats();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.wakes, 1);
        assert_eq!(stats.input.frames_available, 8);
        assert_eq!(stats.output.frames_available, 8);
        assert_eq!(stats.output.underrun_frames, 16);
        assert!(!stats.worker_ready);
    }

    #[test]
    fn test_start_and_stop() {
        let bridge = Bridge::build(&small_config(), IdentityKernel).unwrap();
        let running = bridge.start().unwrap();

        assert!(running.monitor().wait_until_ready(Duration::from_secs(5)));
        let stats = running.stop().unwrap();
        assert!(stats.worker_ready);
        assert_eq!(stats.batches, 0);
    }
}
