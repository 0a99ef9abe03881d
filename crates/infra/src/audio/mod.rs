//! Real-time and worker sides of the bridge, and the hosts that drive them
//!
//! - `realtime`: per-quantum adapter for the audio callback
//! - `worker`: batch loop for the non-real-time thread
//! - `engine`: assembles both sides from a `BridgeConfig`
//! - `batcher`: single-threaded variant that runs the kernel inline
//! - `clock`: simulated device clock
//! - `cpal_backend`: output device host (feature `cpal-host`)

pub mod batcher;
pub mod clock;
#[cfg(feature = "cpal-host")]
pub mod cpal_backend;
pub mod engine;
pub mod realtime;
pub mod worker;

pub use batcher::InlineBatcher;
pub use clock::{ClockHandle, ClockReport, RenderClock, SineSource};
#[cfg(feature = "cpal-host")]
pub use cpal_backend::CpalOutputHost;
pub use engine::{Bridge, BridgeMonitor, BridgeStats, RunningBridge};
pub use realtime::{AudioThreadAdapter, QuantumReport};
pub use worker::{WorkerHandle, WorkerStats, WorkerThreadAdapter};
