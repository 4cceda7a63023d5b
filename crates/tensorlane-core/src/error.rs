//! Error types for kernel execution.
//!
//! Every fallible operation in the workspace returns [`KernelError`]. Each
//! variant maps onto a coarse [`ErrorCode`] so callers that only care about
//! the failure class (layer bug vs. bad parameters vs. resource contention)
//! can branch without matching on every variant.

use std::fmt;
use thiserror::Error;

/// Coarse failure class carried by every [`KernelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorCode {
    /// The layer cannot execute the request (unsupported type or relationship).
    LayerErr,
    /// A parameter object or argument is missing or malformed.
    ParamErr,
    /// A shared resource (scratch arena) is unavailable.
    ResourceErr,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::LayerErr => "LAYER_ERR",
            ErrorCode::ParamErr => "PARAM_ERR",
            ErrorCode::ResourceErr => "RESOURCE_ERR",
        };
        f.write_str(name)
    }
}

/// Errors produced by the kernel layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// The layer reached a state it cannot execute.
    ///
    /// Raised when the fast-path executor is handed a `General` or `Unknown`
    /// broadcast relationship. This is a caller or graph-construction bug and
    /// retrying with the same shapes fails the same way.
    #[error("Layer error: {reason}")]
    LayerError {
        /// Description of the failure
        reason: String,
    },

    /// No kernel exists for the requested numeric kind.
    #[error("Unsupported data type: {data_type}")]
    UnsupportedDataType {
        /// Name of the rejected data type
        data_type: String,
    },

    /// A required parameter object is absent or an argument is invalid.
    #[error("Parameter error: {reason}")]
    ParamError {
        /// Description of the invalid parameter
        reason: String,
    },

    /// Two shapes cannot be combined.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Expected shape
        expected: String,
        /// Actual shape
        actual: String,
    },

    /// A caller buffer is shorter than the layout requires.
    #[error("Buffer too small: {name} needs {required} elements, got {actual}")]
    BufferTooSmall {
        /// Which buffer was short
        name: &'static str,
        /// Elements required
        required: usize,
        /// Elements supplied
        actual: usize,
    },

    /// A microkernel descriptor has no generated routine.
    #[error("Unsupported microkernel configuration: {reason}")]
    UnsupportedConfiguration {
        /// Description of the rejected configuration
        reason: String,
    },

    /// Another call currently holds the execution context's scratch arena.
    #[error("Workspace of the execution context is already in use")]
    WorkspaceBusy,
}

impl KernelError {
    /// Create a LayerError with a custom reason.
    pub fn layer_error<S: Into<String>>(reason: S) -> Self {
        Self::LayerError {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedDataType error.
    pub fn unsupported_data_type<S: fmt::Display>(data_type: S) -> Self {
        Self::UnsupportedDataType {
            data_type: data_type.to_string(),
        }
    }

    /// Create a ParamError with a custom reason.
    pub fn param_error<S: Into<String>>(reason: S) -> Self {
        Self::ParamError {
            reason: reason.into(),
        }
    }

    /// Create a ShapeMismatch error.
    pub fn shape_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: fmt::Display,
        S2: fmt::Display,
    {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a BufferTooSmall error.
    pub fn buffer_too_small(name: &'static str, required: usize, actual: usize) -> Self {
        Self::BufferTooSmall {
            name,
            required,
            actual,
        }
    }

    /// Create an UnsupportedConfiguration error.
    pub fn unsupported_configuration<S: Into<String>>(reason: S) -> Self {
        Self::UnsupportedConfiguration {
            reason: reason.into(),
        }
    }

    /// The failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            KernelError::LayerError { .. }
            | KernelError::UnsupportedDataType { .. }
            | KernelError::UnsupportedConfiguration { .. } => ErrorCode::LayerErr,
            KernelError::ParamError { .. }
            | KernelError::ShapeMismatch { .. }
            | KernelError::BufferTooSmall { .. } => ErrorCode::ParamErr,
            KernelError::WorkspaceBusy => ErrorCode::ResourceErr,
        }
    }

    /// Ensure `actual >= required`, naming the buffer on failure.
    pub fn check_len(name: &'static str, required: usize, actual: usize) -> Result<()> {
        if actual < required {
            Err(Self::buffer_too_small(name, required, actual))
        } else {
            Ok(())
        }
    }
}

/// Result type alias for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = KernelError::layer_error("unsupported broadcast type");
        assert!(matches!(err, KernelError::LayerError { .. }));
        assert_eq!(err.to_string(), "Layer error: unsupported broadcast type");

        let err = KernelError::shape_mismatch("[1, 4, 2, 2]", "[1, 3, 2, 2]");
        assert!(matches!(err, KernelError::ShapeMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected [1, 4, 2, 2], got [1, 3, 2, 2]"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(KernelError::layer_error("x").code(), ErrorCode::LayerErr);
        assert_eq!(
            KernelError::unsupported_data_type("half").code(),
            ErrorCode::LayerErr
        );
        assert_eq!(KernelError::param_error("x").code(), ErrorCode::ParamErr);
        assert_eq!(
            KernelError::buffer_too_small("output", 16, 8).code(),
            ErrorCode::ParamErr
        );
        assert_eq!(KernelError::WorkspaceBusy.code(), ErrorCode::ResourceErr);
        assert_eq!(ErrorCode::ParamErr.to_string(), "PARAM_ERR");
    }

    #[test]
    fn test_check_len() {
        assert!(KernelError::check_len("input", 8, 8).is_ok());
        let err = KernelError::check_len("input", 8, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Buffer too small: input needs 8 elements, got 4"
        );
    }

    #[test]
    fn test_error_display() {
        let errors = vec![
            KernelError::layer_error("general relationship on the fast path"),
            KernelError::unsupported_data_type("int8"),
            KernelError::param_error("layer param is nil"),
            KernelError::unsupported_configuration("row block 12"),
            KernelError::WorkspaceBusy,
        ];

        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
