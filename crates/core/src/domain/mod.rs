//! Domain entities and real-time rules

pub mod audio;
pub mod config;
pub mod error;
pub mod kernel;
pub mod layout;
pub mod ring;
pub mod signal;

pub use audio::{RenderQuantum, SampleRate, RENDER_QUANTUM_FRAMES};
pub use config::{BridgeConfig, ClockConfig, ConfigError, RenderqConfig};
pub use error::{BridgeError, Result};
pub use kernel::{FnKernel, GainKernel, IdentityKernel, Kernel, KernelConfig};
pub use layout::{ControlBlock, RegionLayout, SharedRegion};
pub use ring::{RingBuffer, RingConsumer, RingProducer, RingSnapshot};
pub use signal::{RenderRequester, RenderSignal, RenderWaiter, WaitOutcome, WaitPolicy};
