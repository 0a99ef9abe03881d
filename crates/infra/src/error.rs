//! Host and runtime errors
//!
//! None of these can be raised from inside a render callback.

use renderq_core::domain::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid bridge configuration: {0}")]
    Config(#[from] BridgeError),

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    Panicked(&'static str),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

pub type Result<T> = std::result::Result<T, HostError>;
