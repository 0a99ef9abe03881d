//! # renderq-core
//!
//! Domain layer for moving render quanta between a real-time audio callback
//! and a worker thread.
//!
//! ```text
//! audio callback ──push──▶ input RingBuffer ──pull──▶ worker ──▶ Kernel
//!       ▲                        │                               │
//!       │                  RenderSignal (request/wake)           │
//!       └────pull──── output RingBuffer ◀──────────push──────────┘
//! ```
//!
//! Everything reachable from the audio side (`push`, `pull`, `request`) is
//! allocation-free and bounded by the number of frames copied. `request`
//! wakes the worker with a thread unpark, which never locks on the caller.

#![warn(clippy::all)]

pub mod domain;

pub use domain::{
    BridgeConfig, BridgeError, ClockConfig, Kernel, KernelConfig, RegionLayout, RenderQuantum,
    RenderSignal, RenderqConfig, RingBuffer, RingConsumer, RingProducer, RingSnapshot, WaitPolicy,
};
