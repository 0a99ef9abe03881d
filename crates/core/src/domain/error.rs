//! Construction-time errors.
//!
//! Overruns and underruns are not errors: they surface as a `false` push or a
//! zero-filled pull and are tracked by diagnostic counters only.

use thiserror::Error;

/// Errors that can occur while building or reconfiguring a bridge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Ring capacity must hold at least one frame
    #[error("ring capacity must be at least one frame")]
    ZeroCapacity,

    /// At least one channel must be allocated / active
    #[error("channel count must be at least 1")]
    ZeroChannels,

    /// Requested channel count is larger than the preallocated maximum
    #[error("channel count {requested} exceeds the maximum channel count {max}")]
    ChannelCountExceeded { requested: usize, max: usize },

    #[error("render quantum must be at least one frame")]
    ZeroRenderQuantum,

    #[error("sample rate must be at least 1 Hz")]
    ZeroSampleRate,

    /// Worker batch must be a whole number of render quanta
    #[error("batch size {batch} is not a non-zero multiple of the render quantum {quantum}")]
    BatchNotQuantumMultiple { batch: usize, quantum: usize },

    #[error("batch size {batch} exceeds ring capacity {capacity}")]
    BatchExceedsCapacity { batch: usize, capacity: usize },

    /// Sample storage size does not fit in the address space
    #[error("ring storage size overflows usize")]
    CapacityOverflow,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BridgeError::ChannelCountExceeded {
            requested: 9,
            max: 8,
        };
        assert!(err.to_string().contains("exceeds the maximum channel count"));

        let err = BridgeError::BatchNotQuantumMultiple {
            batch: 500,
            quantum: 128,
        };
        assert_eq!(
            err.to_string(),
            "batch size 500 is not a non-zero multiple of the render quantum 128"
        );
    }
}
