//! Shared memory region: a fixed-size control block plus one fixed-capacity
//! sample array per channel.
//!
//! A [`RegionLayout`] is a plain description of the region (capacity,
//! channel count, batch size, offsets). It is `Copy` and serde-friendly so it
//! can travel inside an initialization payload; each thread then works through
//! its own thin handle onto the same [`SharedRegion`].

use crossbeam::utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::cell::UnsafeCell;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use super::error::{BridgeError, Result};

/// `request_render` value while the worker is idle
pub const RENDER_IDLE: u32 = 0;

/// `request_render` value once work has been requested
pub const RENDER_REQUESTED: u32 = 1;

/// Geometry of a shared region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLayout {
    capacity: usize,
    max_channels: usize,
    #[serde(default)]
    batch_frames: Option<usize>,
}

impl RegionLayout {
    /// Describe a region holding `capacity` frames of up to `max_channels` channels
    pub fn new(capacity: usize, max_channels: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(BridgeError::ZeroCapacity);
        }
        if max_channels == 0 {
            return Err(BridgeError::ZeroChannels);
        }
        capacity
            .checked_mul(max_channels)
            .and_then(|samples| samples.checked_mul(size_of::<f32>()))
            .ok_or(BridgeError::CapacityOverflow)?;

        Ok(Self {
            capacity,
            max_channels,
            batch_frames: None,
        })
    }

    /// Attach the worker batch threshold to the layout
    pub fn with_batch(mut self, batch_frames: usize) -> Result<Self> {
        if batch_frames > self.capacity {
            return Err(BridgeError::BatchExceedsCapacity {
                batch: batch_frames,
                capacity: self.capacity,
            });
        }
        if batch_frames == 0 {
            return Err(BridgeError::BatchNotQuantumMultiple {
                batch: 0,
                quantum: 1,
            });
        }
        self.batch_frames = Some(batch_frames);
        Ok(self)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn batch_frames(&self) -> Option<usize> {
        self.batch_frames
    }

    /// Offset, in samples, of the first sample of `channel`
    pub fn channel_offset(&self, channel: usize) -> usize {
        channel * self.capacity
    }

    /// Total samples across all channels
    pub fn sample_len(&self) -> usize {
        self.capacity * self.max_channels
    }

    /// Bytes needed for the control block and sample storage together
    pub fn byte_size(&self) -> usize {
        size_of::<ControlBlock>() + self.sample_len() * size_of::<f32>()
    }
}

/// Atomically accessed state of one ring buffer.
///
/// Each field has a single writer: the producer owns `write_index`,
/// `overruns` and `active_channels`, the consumer owns `read_index` and
/// `underrun_frames`, and
/// `frames_available` is only ever incremented by the producer and decremented
/// by the consumer.
#[derive(Debug, Default)]
pub struct ControlBlock {
    pub(crate) read_index: CachePadded<AtomicUsize>,
    pub(crate) write_index: CachePadded<AtomicUsize>,
    pub(crate) frames_available: CachePadded<AtomicUsize>,
    pub(crate) request_render: CachePadded<AtomicU32>,
    pub(crate) active_channels: AtomicUsize,
    pub(crate) ready: AtomicBool,
    pub(crate) shutdown: AtomicBool,
    pub(crate) overruns: AtomicU64,
    pub(crate) underrun_frames: AtomicU64,
    pub(crate) wakes: AtomicU64,
}

impl ControlBlock {
    pub fn read_index(&self) -> usize {
        self.read_index.load(Ordering::Acquire)
    }

    pub fn write_index(&self) -> usize {
        self.write_index.load(Ordering::Acquire)
    }

    pub fn frames_available(&self) -> usize {
        self.frames_available.load(Ordering::Acquire)
    }

    /// Channel count the producer is currently writing
    pub fn producer_channels(&self) -> usize {
        self.active_channels.load(Ordering::Acquire)
    }

    pub fn request_render(&self) -> u32 {
        self.request_render.load(Ordering::Acquire)
    }

    /// Pushes rejected for lack of space
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Frames zero-filled by `pull` because the ring ran dry
    pub fn underrun_frames(&self) -> u64 {
        self.underrun_frames.load(Ordering::Relaxed)
    }

    /// Idle → requested transitions that issued a wake
    pub fn wakes(&self) -> u64 {
        self.wakes.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.read_index.store(0, Ordering::Release);
        self.write_index.store(0, Ordering::Release);
        self.frames_available.store(0, Ordering::Release);
        self.request_render.store(RENDER_IDLE, Ordering::Release);
    }
}

/// Control block plus preallocated sample storage.
///
/// Samples are stored channel-major: channel `c` occupies
/// `[c * capacity, (c + 1) * capacity)`. The storage is never resized.
pub struct SharedRegion {
    layout: RegionLayout,
    control: ControlBlock,
    samples: Box<[UnsafeCell<f32>]>,
}

// SAFETY: sample storage is only touched through the unsafe accessors below.
// Callers (the ring producer and consumer) guarantee that a given sample range
// is written by at most one thread and never read while being written, using
// acquire/release ordering on `frames_available`.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    pub fn new(layout: RegionLayout) -> Self {
        let samples = (0..layout.sample_len())
            .map(|_| UnsafeCell::new(0.0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let control = ControlBlock::default();
        control
            .active_channels
            .store(layout.max_channels, Ordering::Relaxed);

        Self {
            layout,
            control,
            samples,
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn control(&self) -> &ControlBlock {
        &self.control
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    #[inline]
    fn sample_ptr(&self, channel: usize, start: usize) -> *mut f32 {
        debug_assert!(channel < self.layout.max_channels);
        debug_assert!(start <= self.layout.capacity);
        let offset = self.layout.channel_offset(channel) + start;
        // SAFETY: offset is within the allocation (checked by the debug
        // assertions above and the callers' contracts).
        unsafe { UnsafeCell::raw_get(self.samples.as_ptr().add(offset)) }
    }

    /// Copy `src` into `channel` starting at frame `start`.
    ///
    /// # Safety
    /// `start + src.len() <= capacity`, `channel < max_channels`, and no other
    /// thread may access that range for the duration of the call.
    #[inline]
    pub(crate) unsafe fn write_channel(&self, channel: usize, start: usize, src: &[f32]) {
        debug_assert!(start + src.len() <= self.layout.capacity);
        std::ptr::copy_nonoverlapping(src.as_ptr(), self.sample_ptr(channel, start), src.len());
    }

    /// Fill `len` frames of `channel` starting at `start` with `value`.
    ///
    /// # Safety
    /// Same contract as [`Self::write_channel`].
    #[inline]
    pub(crate) unsafe fn fill_channel(&self, channel: usize, start: usize, len: usize, value: f32) {
        debug_assert!(start + len <= self.layout.capacity);
        let dst = std::slice::from_raw_parts_mut(self.sample_ptr(channel, start), len);
        dst.fill(value);
    }

    /// Copy frames of `channel` starting at `start` into `dst`.
    ///
    /// # Safety
    /// `start + dst.len() <= capacity`, `channel < max_channels`, and the range
    /// must not be written concurrently.
    #[inline]
    pub(crate) unsafe fn read_channel(&self, channel: usize, start: usize, dst: &mut [f32]) {
        debug_assert!(start + dst.len() <= self.layout.capacity);
        std::ptr::copy_nonoverlapping(self.sample_ptr(channel, start), dst.as_mut_ptr(), dst.len());
    }

    /// Zero every sample and reset indices and the request flag.
    pub(crate) fn clear(&mut self) {
        for sample in self.samples.iter_mut() {
            *sample.get_mut() = 0.0;
        }
        self.control.clear();
    }
}

impl std::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("layout", &self.layout)
            .field("control", &self.control)
            .finish_non_exhaustive()
    }
}
