use std::fmt::Display;

use log::trace;

use super::dtype::{DType, Device};
use super::storage::Element;
use super::tensor::Tensor;
use crate::config::IndexConfig;
use crate::error::{IndexingError, Result};

/// A single untyped value, the right-hand side of `t[...] = 3`
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// Wrap basetype to Scalar type
macro_rules! from_overloads {
    ($otype:tt, $cast_to:tt, $opt:ident) => {
        impl From<$otype> for Scalar {
            fn from(i: $otype) -> Self {
                Scalar::$opt(i as $cast_to)
            }
        }
    };
}

from_overloads!(i32, i64, Int);
from_overloads!(i64, i64, Int);
from_overloads!(u8, i64, Int);
from_overloads!(u32, i64, Int);
from_overloads!(isize, i64, Int);
from_overloads!(f32, f64, Float);
from_overloads!(f64, f64, Float);
from_overloads!(bool, bool, Bool);

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
        }
    }
}

impl Scalar {
    /// Convert to element type `T`, failing if the value does not fit
    pub fn to_element<T: Element>(self) -> Result<T> {
        T::from_scalar(self).ok_or_else(|| {
            IndexingError::value(format!("value {} cannot be converted to type {} without overflow", self, T::DTYPE))
        })
    }

    /// Zero-dimensional tensor of `dtype` on `device` holding this value
    pub fn to_tensor(self, dtype: DType, device: Device) -> Result<Tensor> {
        let t = match dtype {
            DType::F32 => Tensor::scalar(self.to_element::<f32>()?),
            DType::F64 => Tensor::scalar(self.to_element::<f64>()?),
            DType::I64 => Tensor::scalar(self.to_element::<i64>()?),
            DType::I32 => Tensor::scalar(self.to_element::<i32>()?),
            DType::U8 => Tensor::scalar(self.to_element::<u8>()?),
            DType::Bool => Tensor::scalar(self.to_element::<bool>()?),
            DType::QInt8 | DType::QUInt8 => {
                return Err(IndexingError::value(format!(
                    "cannot build a {} tensor from a scalar without quantization parameters",
                    dtype
                )))
            }
        };
        Ok(t.to_device(device))
    }
}

/// Coerce an assigned scalar into the tensor the write path copies from.
///
/// Normally the scalar takes the target's dtype and device. Quantized targets
/// are the one exception: the scalar becomes a float tensor on the default
/// device, and the write quantizes it with the target's parameters.
pub fn scalar_to_tensor(v: Scalar, target: &Tensor, config: &IndexConfig) -> Result<Tensor> {
    if target.dtype().is_quantized() {
        trace!("coercing scalar {} for quantized target as {}", v, config.quantized_scalar_dtype);
        return v.to_tensor(config.quantized_scalar_dtype, config.default_device);
    }
    v.to_tensor(target.dtype(), target.device())
}
