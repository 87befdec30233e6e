use thiserror::Error;

use crate::tensor::{DType, Device};

/// Every failure an indexing call can report. Nothing is retried, and a
/// failed `set` leaves the target storage untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexingError {
    /// Bounds violations, wrong specifier count, mask shape mismatch
    #[error("IndexError: {0}")]
    Index(String),
    /// Zero step, unbroadcastable shapes
    #[error("ValueError: {0}")]
    Value(String),
    #[error("dtype mismatch: expected {expected}, found {found}")]
    DTypeMismatch { expected: DType, found: DType },
    #[error("device mismatch: expected {expected}, found {found}")]
    DeviceMismatch { expected: Device, found: Device },
}

impl IndexingError {
    pub fn index(msg: impl Into<String>) -> Self {
        IndexingError::Index(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        IndexingError::Value(msg.into())
    }

    pub fn is_index_error(&self) -> bool {
        matches!(self, IndexingError::Index(_))
    }

    pub fn is_value_error(&self) -> bool {
        matches!(self, IndexingError::Value(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexingError>;

/// Early return with an `IndexError`, formatted like `format!`
macro_rules! index_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::IndexingError::Index(format!($($arg)*)))
    };
}

/// Early return with a `ValueError`, formatted like `format!`
macro_rules! value_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::IndexingError::Value(format!($($arg)*)))
    };
}

pub(crate) use index_bail;
pub(crate) use value_bail;
