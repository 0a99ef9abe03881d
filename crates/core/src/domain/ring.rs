//! Lock-free multi-channel ring buffer for render quanta
//!
//! One producer and one consumer share a [`SharedRegion`]. The producer owns
//! `write_index`, the consumer owns `read_index`, and `frames_available` is the
//! only count either side trusts:
//! - sample writes happen before the release increment that advertises them
//! - the consumer acquires `frames_available` before touching those samples
//! - the consumer's release decrement hands the slots back to the producer
//!
//! Performance characteristics:
//! - No allocation, no locks, no unbounded loops in `push`/`pull`
//! - At most two contiguous copies per channel (tail then head)
//! - Cache-padded counters to avoid false sharing between the two threads

use serde::Serialize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::error::{BridgeError, Result};
use super::layout::{RegionLayout, SharedRegion};

/// Unsplit ring buffer, owned by whoever builds the bridge.
///
/// Call [`RingBuffer::split`] to hand one end to each thread.
#[derive(Debug)]
pub struct RingBuffer {
    region: Arc<SharedRegion>,
}

impl RingBuffer {
    /// Allocate the control block and sample storage for `layout`
    pub fn new(layout: RegionLayout) -> Self {
        Self {
            region: Arc::new(SharedRegion::new(layout)),
        }
    }

    /// Create a buffer holding `capacity` frames of up to `max_channels` channels
    pub fn with_capacity(capacity: usize, max_channels: usize) -> Result<Self> {
        Ok(Self::new(RegionLayout::new(capacity, max_channels)?))
    }

    pub fn layout(&self) -> &RegionLayout {
        self.region.layout()
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    /// Shared region handle, e.g. for building a render signal on top of it
    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    /// Zero the storage and rewind both indices.
    ///
    /// Only possible before the buffer is split, when no other thread can
    /// touch the samples. Returns `false` if another handle still shares the
    /// region.
    pub fn reset(&mut self) -> bool {
        match Arc::get_mut(&mut self.region) {
            Some(region) => {
                region.clear();
                true
            }
            None => false,
        }
    }

    /// Hand out the single producer and single consumer for this buffer
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let channels = self.region.layout().max_channels();
        let producer = RingProducer {
            region: Arc::clone(&self.region),
            active_channels: channels,
        };
        let consumer = RingConsumer {
            region: self.region,
            active_channels: channels,
        };
        (producer, consumer)
    }
}

/// Point-in-time view of a ring for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingSnapshot {
    pub read_index: usize,
    pub write_index: usize,
    pub frames_available: usize,
    pub frames_free: usize,
    pub capacity: usize,
    pub active_channels: usize,
    pub overruns: u64,
    pub underrun_frames: u64,
}

impl RingSnapshot {
    /// Read the shared state of `region` from any thread
    pub fn capture(region: &SharedRegion) -> Self {
        let control = region.control();
        let frames_available = control.frames_available();
        Self {
            read_index: control.read_index(),
            write_index: control.write_index(),
            frames_available,
            frames_free: region.capacity() - frames_available,
            capacity: region.capacity(),
            active_channels: control.producer_channels(),
            overruns: control.overruns(),
            underrun_frames: control.underrun_frames(),
        }
    }
}

fn snapshot(region: &SharedRegion, active_channels: usize) -> RingSnapshot {
    RingSnapshot {
        active_channels,
        ..RingSnapshot::capture(region)
    }
}

fn check_channel_count(region: &SharedRegion, channels: usize) -> Result<()> {
    let max = region.layout().max_channels();
    if channels == 0 {
        return Err(BridgeError::ZeroChannels);
    }
    if channels > max {
        return Err(BridgeError::ChannelCountExceeded {
            requested: channels,
            max,
        });
    }
    Ok(())
}

/// Producer end: the only handle that advances `write_index`
#[derive(Debug)]
pub struct RingProducer {
    region: Arc<SharedRegion>,
    active_channels: usize,
}

impl RingProducer {
    /// Copy `frames` frames from `input` into the ring.
    ///
    /// Succeeds only if `frames_free() >= frames`; otherwise nothing is written
    /// and `false` is returned. Channels missing from `input`, or channel
    /// slices shorter than `frames`, are written as silence.
    ///
    /// Channels at or above the active count are silenced for the same slots,
    /// so a consumer that later reads these frames at a wider count never sees
    /// samples from an earlier lap.
    pub fn push<S: AsRef<[f32]>>(&mut self, input: &[S], frames: usize) -> bool {
        let control = self.region.control();
        let capacity = self.region.capacity();

        // Acquire pairs with the consumer's release decrement, so the slots we
        // are about to overwrite have been fully read.
        let available = control.frames_available.load(Ordering::Acquire);
        if frames > capacity - available {
            control.overruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if frames == 0 {
            return true;
        }

        let write = control.write_index.load(Ordering::Relaxed);
        let first = frames.min(capacity - write);
        let second = frames - first;

        for channel in 0..self.region.layout().max_channels() {
            let src: &[f32] = if channel < self.active_channels {
                input.get(channel).map(|s| s.as_ref()).unwrap_or(&[])
            } else {
                &[]
            };
            // SAFETY: [write, write + first) and [0, second) are free slots
            // that the consumer will not read until we publish them below.
            unsafe {
                self.write_segment(channel, write, src, 0, first);
                self.write_segment(channel, 0, src, first, second);
            }
        }

        control
            .write_index
            .store((write + frames) % capacity, Ordering::Release);
        control.frames_available.fetch_add(frames, Ordering::AcqRel);
        true
    }

    /// Write `len` frames of `src[offset..]` at `start`, padding with silence.
    ///
    /// # Safety
    /// `[start, start + len)` must be free slots of the ring.
    unsafe fn write_segment(&self, channel: usize, start: usize, src: &[f32], offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let src = src.get(offset..).unwrap_or(&[]);
        let copied = src.len().min(len);
        self.region.write_channel(channel, start, &src[..copied]);
        if copied < len {
            self.region.fill_channel(channel, start + copied, len - copied, 0.0);
        }
    }

    /// Restrict subsequent pushes to the first `channels` channels.
    ///
    /// The new count is published in the control block so the consumer can
    /// follow it with [`RingConsumer::producer_channels`].
    pub fn adapt_channel_count(&mut self, channels: usize) -> Result<()> {
        check_channel_count(&self.region, channels)?;
        self.active_channels = channels;
        self.region
            .control()
            .active_channels
            .store(channels, Ordering::Release);
        Ok(())
    }

    pub fn active_channels(&self) -> usize {
        self.active_channels
    }

    pub fn frames_available(&self) -> usize {
        self.region.control().frames_available()
    }

    pub fn frames_free(&self) -> usize {
        self.region.capacity() - self.frames_available()
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn layout(&self) -> &RegionLayout {
        self.region.layout()
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn snapshot(&self) -> RingSnapshot {
        snapshot(&self.region, self.active_channels)
    }
}

/// Consumer end: the only handle that advances `read_index`
#[derive(Debug)]
pub struct RingConsumer {
    region: Arc<SharedRegion>,
    active_channels: usize,
}

impl RingConsumer {
    /// Copy up to `frames` frames into `output`, zero-filling on underrun.
    ///
    /// Every output channel receives exactly `frames` samples (or its own
    /// length if shorter): buffered data first, silence for the rest. Output
    /// channels beyond the active channel count are silenced. Returns the number
    /// of buffered frames actually consumed.
    pub fn pull<S: AsMut<[f32]>>(&mut self, output: &mut [S], frames: usize) -> usize {
        let control = self.region.control();
        let capacity = self.region.capacity();

        // Acquire pairs with the producer's release increment, so every sample
        // counted here is visible.
        let available = control.frames_available.load(Ordering::Acquire);
        let copied = frames.min(available);
        let read = control.read_index.load(Ordering::Relaxed);
        let first = copied.min(capacity - read);
        let second = copied - first;

        for (channel, out) in output.iter_mut().enumerate() {
            let out = out.as_mut();
            let len = frames.min(out.len());
            let out = &mut out[..len];

            if channel >= self.active_channels {
                out.fill(0.0);
                continue;
            }

            let (head, tail) = out.split_at_mut(first.min(len));
            let tail_len = second.min(tail.len());
            // SAFETY: [read, read + first) and [0, second) hold published
            // frames that the producer will not overwrite until we release them.
            unsafe {
                self.region.read_channel(channel, read, head);
                self.region.read_channel(channel, 0, &mut tail[..tail_len]);
            }
            tail[tail_len..].fill(0.0);
        }

        if copied > 0 {
            control
                .read_index
                .store((read + copied) % capacity, Ordering::Release);
            control.frames_available.fetch_sub(copied, Ordering::AcqRel);
        }
        if copied < frames {
            control
                .underrun_frames
                .fetch_add((frames - copied) as u64, Ordering::Relaxed);
        }
        copied
    }

    /// Restrict subsequent pulls to the first `channels` channels
    pub fn adapt_channel_count(&mut self, channels: usize) -> Result<()> {
        check_channel_count(&self.region, channels)?;
        self.active_channels = channels;
        Ok(())
    }

    pub fn active_channels(&self) -> usize {
        self.active_channels
    }

    pub fn frames_available(&self) -> usize {
        self.region.control().frames_available()
    }

    pub fn frames_free(&self) -> usize {
        self.region.capacity() - self.frames_available()
    }

    /// Channel count most recently published by the producer
    pub fn producer_channels(&self) -> usize {
        self.region.control().producer_channels()
    }

    /// True once at least `frames` frames can be pulled without zero-fill
    pub fn is_frame_available(&self, frames: usize) -> bool {
        self.frames_available() >= frames
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn layout(&self) -> &RegionLayout {
        self.region.layout()
    }

    pub fn region(&self) -> &Arc<SharedRegion> {
        &self.region
    }

    pub fn snapshot(&self) -> RingSnapshot {
        snapshot(&self.region, self.active_channels)
    }
}
