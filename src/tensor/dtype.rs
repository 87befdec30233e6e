use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter};

/// Element type of a storage buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DType {
    F32,
    F64,
    I64,
    I32,
    U8,
    Bool,
    /// signed 8 bit affine quantized
    QInt8,
    /// unsigned 8 bit affine quantized
    QUInt8,
}

impl DType {
    pub fn is_quantized(&self) -> bool {
        matches!(self, DType::QInt8 | DType::QUInt8)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// dtypes accepted as integer index arrays
    pub fn is_index(&self) -> bool {
        matches!(self, DType::I64 | DType::I32)
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F64 | DType::I64 => 8,
            DType::F32 | DType::I32 => 4,
            DType::U8 | DType::Bool | DType::QInt8 | DType::QUInt8 => 1,
        }
    }
}

/// Where a tensor nominally lives. Every buffer is host memory, the tag only
/// enforces that one indexing call never mixes devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    Cpu,
    Virtual(usize),
}

impl Default for Device {
    fn default() -> Self {
        Device::Cpu
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Virtual(i) => write!(f, "virtual:{}", i),
        }
    }
}

/// Per-tensor affine quantization parameters, `real = (q - zero_point) * scale`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QParams {
    pub scale: f64,
    pub zero_point: i64,
}

impl QParams {
    pub fn quantize(&self, v: f64, lo: i64, hi: i64) -> i64 {
        let q = (v / self.scale).round() as i64 + self.zero_point;
        q.clamp(lo, hi)
    }

    pub fn dequantize(&self, q: i64) -> f64 {
        (q - self.zero_point) as f64 * self.scale
    }
}
