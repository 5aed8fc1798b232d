//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting between values and Rust types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value has a kind the target type cannot accept.
    #[error("cannot convert {found} value to {expected}")]
    TypeMismatch {
        /// Name of the target type.
        expected: &'static str,
        /// Kind of the value that was supplied.
        found: &'static str,
    },

    /// The value is of an acceptable kind but does not fit the target.
    #[error("value {value} is out of range for {target}")]
    OutOfRange {
        /// Name of the target type.
        target: &'static str,
        /// Rendered value.
        value: String,
    },

    /// Text could not be parsed into the target type.
    #[error("cannot parse text as {target}: {message}")]
    InvalidText {
        /// Name of the target type.
        target: &'static str,
        /// Parser message.
        message: String,
    },
}

impl CodecError {
    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(target: &'static str, value: impl ToString) -> Self {
        Self::OutOfRange {
            target,
            value: value.to_string(),
        }
    }

    /// Creates an invalid text error.
    pub fn invalid_text(target: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidText {
            target,
            message: message.into(),
        }
    }

    /// Returns the name of the type the conversion was aiming for.
    #[must_use]
    pub fn target(&self) -> &'static str {
        match self {
            Self::TypeMismatch { expected, .. } => expected,
            Self::OutOfRange { target, .. } | Self::InvalidText { target, .. } => target,
        }
    }
}
