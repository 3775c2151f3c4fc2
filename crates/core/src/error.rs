//! Error types for Rivulet.

use alloc::string::String;
use thiserror::Error;

/// Result type alias for Rivulet operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for Rivulet operations.
///
/// Removing an absent key is not an error; it is a silent no-op. Only APIs
/// that assert presence report [`Error::MissingKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required argument was out of range.
    #[error("Invalid argument {name}: {message}")]
    InvalidArgument {
        name: &'static str,
        message: String,
    },
    /// A lookup that asserts presence did not find its key.
    #[error("Key not found")]
    MissingKey,
    /// A stream stopped after a fatal per-item failure.
    #[error("Stream faulted: {message}")]
    StreamFaulted {
        message: String,
    },
}

impl Error {
    /// Creates an invalid argument error.
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Creates a stream faulted error.
    pub fn stream_faulted(message: impl Into<String>) -> Self {
        Error::StreamFaulted {
            message: message.into(),
        }
    }

    /// Returns true if this is an invalid argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidArgument { .. })
    }
}
