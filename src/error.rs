//! Error types

use thiserror::Error;

use crate::engine::EngineStatus;
use crate::params::ParamId;

/// Errors reported to the non-real-time side.
///
/// Nothing in here is ever produced inside the audio callback.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown parameter {0}")]
    UnknownParameter(ParamId),

    #[error("unknown state key '{0}'")]
    UnknownState(String),

    #[error("empty value for state '{0}'")]
    EmptyState(&'static str),

    #[error("value for state '{key}' is {len} bytes, at most {max} fit")]
    StateTooLong {
        key: &'static str,
        len: usize,
        max: usize,
    },

    #[error("no edit in progress for parameter {0}")]
    NotEditing(ParamId),

    /// The audio side hasn't drained its queue; the request was dropped
    #[error("control queue is full")]
    QueueFull,

    #[error("cannot {op} while the engine is {status:?}")]
    InvalidTransition {
        op: &'static str,
        status: EngineStatus,
    },

    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f64),

    #[cfg(feature = "cpal_sink")]
    #[error("unsupported device sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[cfg(feature = "cpal_sink")]
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal_sink")]
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
