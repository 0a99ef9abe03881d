//! # renderq-infra
//!
//! Thread-facing runtime for the render bridge: the adapter that runs inside
//! the real-time callback, the worker loop that sleeps between batches, and the
//! hosts that drive them (a simulated render clock and, with the `cpal-host`
//! feature, a real output device).

pub mod audio;
pub mod error;

pub use audio::{
    AudioThreadAdapter, Bridge, BridgeMonitor, BridgeStats, InlineBatcher, QuantumReport,
    RenderClock, RunningBridge, WorkerHandle, WorkerThreadAdapter,
};
pub use error::HostError;
