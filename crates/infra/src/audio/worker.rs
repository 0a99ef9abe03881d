//! Non-real-time side of the bridge
//!
//! The worker sleeps on the render signal, and on every wake drains whole
//! batches from the input ring through the kernel into the output ring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use renderq_core::domain::{
    Kernel, RenderRequester, RenderWaiter, RingConsumer, RingProducer, WaitOutcome,
};

use crate::error::{HostError, Result};

/// Counters owned by the worker, readable from any thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    batches: AtomicU64,
    frames: AtomicU64,
    timeouts: AtomicU64,
}

impl WorkerStats {
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }
}

/// Batch loop driving an opaque [`Kernel`]
pub struct WorkerThreadAdapter<K: Kernel> {
    input: RingConsumer,
    output: RingProducer,
    waiter: RenderWaiter,
    kernel: K,
    batch: usize,
    timeout: Option<Duration>,
    input_scratch: Vec<Vec<f32>>,
    output_scratch: Vec<Vec<f32>>,
    stats: Arc<WorkerStats>,
}

impl<K: Kernel> WorkerThreadAdapter<K> {
    /// Scratch buffers for a full batch on every channel are allocated here,
    /// never inside the loop.
    pub fn new(input: RingConsumer, output: RingProducer, waiter: RenderWaiter, kernel: K) -> Self {
        let layout = *input.layout();
        let batch = layout.batch_frames().unwrap_or(layout.capacity());
        let max_channels = layout.max_channels();
        Self {
            input,
            output,
            waiter,
            kernel,
            batch,
            timeout: None,
            input_scratch: vec![vec![0.0; batch]; max_channels],
            output_scratch: vec![vec![0.0; batch]; max_channels],
            stats: Arc::new(WorkerStats::default()),
        }
    }

    /// Bound each wait so the worker re-checks the rings even if a wake is missed
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Process every whole batch that fits, returning how many ran.
    ///
    /// Stops when the input holds less than a batch or the output has no room
    /// for one. In the latter case the input is left untouched.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;

        loop {
            self.follow_channel_count();

            if !self.input.is_frame_available(self.batch) || self.output.frames_free() < self.batch {
                break;
            }

            let channels = self.input.active_channels();
            let pulled = self.input.pull(&mut self.input_scratch, self.batch);
            debug_assert_eq!(pulled, self.batch);

            for buffer in self.output_scratch.iter_mut().take(channels) {
                buffer.fill(0.0);
            }
            self.kernel
                .process(&self.input_scratch, &mut self.output_scratch, channels);

            if !self.output.push(&self.output_scratch[..channels], self.batch) {
                // Only this thread pushes to the output ring
                warn!("output ring rejected a batch it had room for");
            }

            self.stats.batches.fetch_add(1, Ordering::Relaxed);
            self.stats
                .frames
                .fetch_add(self.batch as u64, Ordering::Relaxed);
            processed += 1;
        }

        if processed > 0 {
            trace!(
                batches = processed,
                backlog = self.input.frames_available(),
                "processed batches"
            );
        }
        processed
    }

    /// Wait/process loop. Returns once the bridge is shut down.
    pub fn run(&mut self) {
        info!(
            kernel = self.kernel.name(),
            batch = self.batch,
            policy = ?self.waiter.policy(),
            "worker started"
        );
        self.waiter.mark_ready();

        loop {
            match self.waiter.wait(self.timeout) {
                WaitOutcome::Requested => {
                    self.process_pending();
                }
                WaitOutcome::TimedOut => {
                    self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                    trace!("worker wait timed out");
                    self.process_pending();
                }
                WaitOutcome::Shutdown => break,
            }
        }

        info!(
            batches = self.stats.batches(),
            timeouts = self.stats.timeouts(),
            "worker stopped"
        );
    }

    fn follow_channel_count(&mut self) {
        let channels = self.input.producer_channels();
        if channels == self.input.active_channels() {
            return;
        }
        if self.input.adapt_channel_count(channels).is_ok()
            && self.output.adapt_channel_count(channels).is_ok()
        {
            debug!(channels, "worker followed channel count change");
        }
    }
}

impl<K: Kernel + 'static> WorkerThreadAdapter<K> {
    /// Move the loop onto a dedicated thread.
    ///
    /// `requester` must belong to the same signal as this worker's waiter; the
    /// handle uses it to request shutdown.
    pub fn spawn(mut self, requester: RenderRequester) -> Result<WorkerHandle> {
        let stats = self.stats();
        let thread = thread::Builder::new()
            .name("renderq-worker".into())
            .spawn(move || self.run())
            .map_err(|source| HostError::Spawn {
                thread: "worker",
                source,
            })?;

        Ok(WorkerHandle {
            thread: Some(thread),
            requester,
            stats,
        })
    }
}

impl<K: Kernel> std::fmt::Debug for WorkerThreadAdapter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThreadAdapter")
            .field("kernel", &self.kernel.name())
            .field("batch", &self.batch)
            .field("timeout", &self.timeout)
            .field("waiter", &self.waiter)
            .finish()
    }
}

/// Owns a running worker thread; stops and joins it on drop
#[derive(Debug)]
pub struct WorkerHandle {
    thread: Option<JoinHandle<()>>,
    requester: RenderRequester,
    stats: Arc<WorkerStats>,
}

impl WorkerHandle {
    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Signal shutdown and join the thread
    pub fn stop(mut self) -> Result<()> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        self.requester.shutdown();
        thread.join().map_err(|_| HostError::Panicked("worker"))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            warn!("worker exited abnormally: {}", e);
        }
    }
}
