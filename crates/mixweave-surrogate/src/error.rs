//! Surrogate error types.

use mixweave_kernel::{CompositionError, DispatchError};

pub mod failure_class {
    pub const JSON: &str = "record_json_invalid";
    pub const IO: &str = "record_io_error";
    pub const CORRUPT: &str = "record_corrupt";
}

#[derive(Debug, thiserror::Error)]
pub enum SurrogateError {
    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line {0}: io error: {1}")]
    Io(usize, String),

    #[error("line {0}: {1}")]
    Parse(usize, String),

    /// The record parses but does not describe a reconstructible instance.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl SurrogateError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }

    pub fn failure_class(&self) -> &'static str {
        match self {
            Self::Json(_) | Self::Parse(..) => failure_class::JSON,
            Self::Io(..) => failure_class::IO,
            Self::Corrupt(_) => failure_class::CORRUPT,
            Self::Composition(inner) => inner.failure_class(),
            Self::Dispatch(inner) => inner.failure_class(),
        }
    }
}
