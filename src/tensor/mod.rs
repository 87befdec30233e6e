/// dtype, device and quantization tags
mod dtype;
/// Shape/stride/offset arithmetic and strided iteration
pub mod layout;
/// Scalar values and the coercion of assigned scalars
pub mod scalar;
/// Typed, shareable backing buffers
pub mod storage;
/// The Tensor handle, views and constructors
mod tensor;

pub use dtype::{DType, Device, QParams};
pub use layout::Layout;
pub use scalar::{scalar_to_tensor, Scalar};
pub use storage::Element;
pub use tensor::Tensor;
