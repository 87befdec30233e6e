pub mod config;
pub mod error;
pub mod index;
pub mod tensor;

pub use config::{Config, IndexConfig};
pub use error::{IndexingError, Result};
pub use index::{format_expression, get, set, IndexValue, Indexer, Slice, TensorIndex};
pub use tensor::{DType, Device, Scalar, Tensor};
