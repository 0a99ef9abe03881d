//! Render request signalling between the real-time side and the worker
//!
//! The `request_render` word of a ring's control block is the flag. The
//! worker sleeps with [`std::thread::park_timeout`] and the requester wakes it
//! through the worker's [`Thread`] handle. On Linux, Windows and macOS std
//! backs that handle with a futex, `WaitOnAddress` or a dispatch semaphore,
//! so `unpark` is a single atomic swap plus at most one wake syscall and never
//! takes a lock on the requesting thread.
//!
//! ```text
//!   Idle ──request()──▶ Requested ──wait() returns──▶ Running ──wait()──▶ Idle
//!    ▲  (flag 0→1, one wake)       (flag cleared first)      │
//!    └───────────────────────────────────────────────────────┘
//! ```
//!
//! Only the 0 → 1 edge unparks the worker. Because the worker clears the flag
//! before it runs a batch, a request that lands mid-batch sets the flag again
//! and the next `wait()` returns immediately instead of sleeping.

use crossbeam::utils::Backoff;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use super::layout::{ControlBlock, SharedRegion, RENDER_IDLE, RENDER_REQUESTED};

/// How the worker waits for a render request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitPolicy {
    /// Park the worker thread until woken or the timeout expires
    #[default]
    Block,
    /// Busy-wait with exponential backoff, never sleeping in the kernel
    Spin,
}

/// Result of one [`RenderWaiter::wait`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Work was requested; the flag has already been cleared
    Requested,
    /// The full timeout elapsed with nothing pending
    TimedOut,
    /// The bridge is shutting down
    Shutdown,
}

/// Thread that waits on the signal, registered by the waiter on first use
type WorkerSlot = Arc<OnceLock<Thread>>;

/// Unsplit signal bound to the control block of one ring
pub struct RenderSignal {
    region: Arc<SharedRegion>,
}

impl RenderSignal {
    pub fn new(region: Arc<SharedRegion>) -> Self {
        Self { region }
    }

    /// Requesting half for the real-time side, waiting half for the worker
    pub fn split(self, policy: WaitPolicy) -> (RenderRequester, RenderWaiter) {
        let worker = WorkerSlot::default();
        let requester = RenderRequester {
            region: Arc::clone(&self.region),
            worker: Arc::clone(&worker),
        };
        let waiter = RenderWaiter {
            region: self.region,
            worker,
            policy,
        };
        (requester, waiter)
    }
}

/// Real-time side of the signal. Never blocks.
#[derive(Clone)]
pub struct RenderRequester {
    region: Arc<SharedRegion>,
    worker: WorkerSlot,
}

impl RenderRequester {
    /// Flag that a batch is ready and wake the worker on the idle → requested edge.
    ///
    /// Returns `true` if this call performed the transition (and the wake).
    pub fn request(&self) -> bool {
        let control = self.control();
        if control.request_render.swap(RENDER_REQUESTED, Ordering::AcqRel) == RENDER_IDLE {
            control.wakes.fetch_add(1, Ordering::Relaxed);
            self.wake();
            true
        } else {
            false
        }
    }

    pub fn is_requested(&self) -> bool {
        self.control().request_render() != RENDER_IDLE
    }

    /// Whether the worker has entered its wait loop
    pub fn is_worker_ready(&self) -> bool {
        self.control().is_ready()
    }

    /// Ask the worker to leave its loop and wake it
    pub fn shutdown(&self) {
        self.control().shutdown.store(true, Ordering::Release);
        self.wake();
    }

    pub fn wakes(&self) -> u64 {
        self.control().wakes()
    }

    // A worker that has not registered yet polls the flag before it first
    // parks, so skipping the unpark cannot lose the request.
    fn wake(&self) {
        if let Some(worker) = self.worker.get() {
            worker.unpark();
        }
    }

    fn control(&self) -> &ControlBlock {
        self.region.control()
    }
}

impl std::fmt::Debug for RenderRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRequester")
            .field("request_render", &self.control().request_render())
            .field("wakes", &self.wakes())
            .finish()
    }
}

/// Worker side of the signal.
///
/// The first thread to call [`mark_ready`](Self::mark_ready) or
/// [`wait`](Self::wait) becomes the thread that requests wake; keep waiting
/// on that thread.
pub struct RenderWaiter {
    region: Arc<SharedRegion>,
    worker: WorkerSlot,
    policy: WaitPolicy,
}

impl RenderWaiter {
    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }

    /// Register the calling thread and publish that the worker is about to
    /// start waiting
    pub fn mark_ready(&self) {
        self.register();
        self.control().ready.store(true, Ordering::Release);
    }

    /// Clear the request flag, returning whether it was set
    pub fn take_request(&self) -> bool {
        self.control()
            .request_render
            .swap(RENDER_IDLE, Ordering::AcqRel)
            != RENDER_IDLE
    }

    /// Wait for a render request.
    ///
    /// Returns immediately if a request is already pending. Early returns
    /// from the underlying park (a wake token left over from a request that
    /// was already consumed, or a spurious wake) go back to sleep for the
    /// rest of the timeout, so [`WaitOutcome::TimedOut`] means the whole
    /// timeout elapsed with nothing pending.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitOutcome {
        self.register();
        let deadline = timeout.map(|t| Instant::now() + t);
        let backoff = Backoff::new();

        loop {
            if let Some(outcome) = self.poll() {
                return outcome;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitOutcome::TimedOut;
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            match self.policy {
                WaitPolicy::Block => match remaining {
                    Some(remaining) => thread::park_timeout(remaining),
                    None => thread::park(),
                },
                WaitPolicy::Spin => {
                    if backoff.is_completed() {
                        thread::yield_now();
                    } else {
                        backoff.snooze();
                    }
                }
            }
        }
    }

    fn register(&self) {
        self.worker.get_or_init(thread::current);
    }

    fn poll(&self) -> Option<WaitOutcome> {
        if self.control().is_shutdown() {
            Some(WaitOutcome::Shutdown)
        } else if self.take_request() {
            Some(WaitOutcome::Requested)
        } else {
            None
        }
    }

    fn control(&self) -> &ControlBlock {
        self.region.control()
    }
}

impl std::fmt::Debug for RenderWaiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderWaiter")
            .field("policy", &self.policy)
            .field("request_render", &self.control().request_render())
            .finish()
    }
}
