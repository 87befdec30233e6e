use std::fmt::{Debug, Display};

use super::dtype::{DType, Device, QParams};
use super::scalar::Scalar;
use crate::error::{IndexingError, Result};

/// Typed backing buffer, one variant per dtype
#[derive(Clone, Debug, PartialEq)]
pub enum StorageData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I64(Vec<i64>),
    I32(Vec<i32>),
    U8(Vec<u8>),
    Bool(Vec<bool>),
    QInt8(Vec<i8>),
    QUInt8(Vec<u8>),
}

/// Apply the same expression to whichever buffer is inside, rebuilding the
/// same variant from the result
macro_rules! map_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            StorageData::F32($v) => StorageData::F32($body),
            StorageData::F64($v) => StorageData::F64($body),
            StorageData::I64($v) => StorageData::I64($body),
            StorageData::I32($v) => StorageData::I32($body),
            StorageData::U8($v) => StorageData::U8($body),
            StorageData::Bool($v) => StorageData::Bool($body),
            StorageData::QInt8($v) => StorageData::QInt8($body),
            StorageData::QUInt8($v) => StorageData::QUInt8($body),
        }
    };
}

/// Same as map_data, but the expression produces a plain value
macro_rules! visit_data {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            StorageData::F32($v) => $body,
            StorageData::F64($v) => $body,
            StorageData::I64($v) => $body,
            StorageData::I32($v) => $body,
            StorageData::U8($v) => $body,
            StorageData::Bool($v) => $body,
            StorageData::QInt8($v) => $body,
            StorageData::QUInt8($v) => $body,
        }
    };
}

impl StorageData {
    pub fn dtype(&self) -> DType {
        match self {
            StorageData::F32(_) => DType::F32,
            StorageData::F64(_) => DType::F64,
            StorageData::I64(_) => DType::I64,
            StorageData::I32(_) => DType::I32,
            StorageData::U8(_) => DType::U8,
            StorageData::Bool(_) => DType::Bool,
            StorageData::QInt8(_) => DType::QInt8,
            StorageData::QUInt8(_) => DType::QUInt8,
        }
    }

    pub fn len(&self) -> usize {
        visit_data!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plain element types a tensor can be built from and read back into
pub trait Element: Copy + Debug + Display + PartialEq + 'static {
    const DTYPE: DType;
    fn into_data(data: Vec<Self>) -> StorageData;
    fn as_slice(data: &StorageData) -> Option<&[Self]>;
    fn from_scalar(s: Scalar) -> Option<Self>;
}

macro_rules! numeric_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;
            fn into_data(data: Vec<Self>) -> StorageData {
                StorageData::$variant(data)
            }
            fn as_slice(data: &StorageData) -> Option<&[Self]> {
                match data {
                    StorageData::$variant(v) => Some(v),
                    _ => None,
                }
            }
            fn from_scalar(s: Scalar) -> Option<Self> {
                match s {
                    Scalar::Bool(b) => num::cast(b as u8),
                    Scalar::Int(i) => num::cast(i),
                    Scalar::Float(f) => num::cast(f),
                }
            }
        }
    };
}

numeric_element!(f32, F32);
numeric_element!(f64, F64);
numeric_element!(i64, I64);
numeric_element!(i32, I32);
numeric_element!(u8, U8);

impl Element for bool {
    const DTYPE: DType = DType::Bool;
    fn into_data(data: Vec<Self>) -> StorageData {
        StorageData::Bool(data)
    }
    fn as_slice(data: &StorageData) -> Option<&[Self]> {
        match data {
            StorageData::Bool(v) => Some(v),
            _ => None,
        }
    }
    fn from_scalar(s: Scalar) -> Option<Self> {
        match s {
            Scalar::Bool(b) => Some(b),
            Scalar::Int(i) => Some(i != 0),
            Scalar::Float(f) => Some(f != 0.0),
        }
    }
}

/// A shared buffer plus the metadata every view of it agrees on
#[derive(Clone, Debug, PartialEq)]
pub struct Storage {
    data: StorageData,
    device: Device,
    qparams: Option<QParams>,
}

impl Storage {
    pub fn new(data: StorageData, device: Device) -> Storage {
        Storage { data, device, qparams: None }
    }

    pub fn quantized(data: StorageData, device: Device, qparams: QParams) -> Storage {
        Storage { data, device, qparams: Some(qparams) }
    }

    pub fn with_device(self, device: Device) -> Storage {
        Storage { device, ..self }
    }

    pub fn data(&self) -> &StorageData {
        &self.data
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn qparams(&self) -> Option<QParams> {
        self.qparams
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy the elements at `offsets` into a fresh, densely packed storage
    pub fn gather(&self, offsets: &[usize]) -> Storage {
        let data = map_data!(&self.data, v => offsets.iter().map(|&o| v[o]).collect());
        Storage { data, device: self.device, qparams: self.qparams }
    }

    /// Write `src[src_offsets[i]]` to `self[dst[i]]` for every i.
    /// The dtype check happens before the first element is written. Besides
    /// identical dtypes, float sources are quantized into quantized targets,
    /// and quantized sources with other parameters are requantized.
    pub fn scatter(&mut self, dst: &[usize], src: &Storage, src_offsets: &[usize]) -> Result<()> {
        debug_assert_eq!(dst.len(), src_offsets.len());
        let qparams = self.qparams;
        let requantize = self.dtype().is_quantized()
            && (src.dtype().is_float() || (src.dtype() == self.dtype() && src.qparams != qparams));
        match (&mut self.data, &src.data) {
            (target, _) if requantize => {
                let qparams = qparams.ok_or_else(|| {
                    IndexingError::value("quantized storage is missing its quantization parameters")
                })?;
                let values = src.read_f64(src_offsets)?;
                match target {
                    StorageData::QInt8(d) => dst.iter().zip(values).for_each(|(&o, v)| {
                        d[o] = qparams.quantize(v, i8::MIN as i64, i8::MAX as i64) as i8;
                    }),
                    StorageData::QUInt8(d) => dst.iter().zip(values).for_each(|(&o, v)| {
                        d[o] = qparams.quantize(v, u8::MIN as i64, u8::MAX as i64) as u8;
                    }),
                    _ => unreachable!("target dtype checked above"),
                }
            }
            (StorageData::F32(d), StorageData::F32(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::F64(d), StorageData::F64(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::I64(d), StorageData::I64(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::I32(d), StorageData::I32(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::U8(d), StorageData::U8(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::Bool(d), StorageData::Bool(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::QInt8(d), StorageData::QInt8(s)) => copy_strided(d, dst, s, src_offsets),
            (StorageData::QUInt8(d), StorageData::QUInt8(s)) => copy_strided(d, dst, s, src_offsets),
            (target, source) => {
                return Err(IndexingError::DTypeMismatch {
                    expected: target.dtype(),
                    found: source.dtype(),
                })
            }
        }
        Ok(())
    }

    /// Read integer index data, `I64` and `I32` only
    pub fn read_i64(&self, offsets: &[usize]) -> Result<Vec<i64>> {
        match &self.data {
            StorageData::I64(v) => Ok(offsets.iter().map(|&o| v[o]).collect()),
            StorageData::I32(v) => Ok(offsets.iter().map(|&o| v[o] as i64).collect()),
            other => Err(IndexingError::index(format!(
                "tensors used as indices must be long or int tensors, got {}",
                other.dtype()
            ))),
        }
    }

    /// Read mask data, `Bool` and the legacy `U8` masks
    pub fn read_mask(&self, offsets: &[usize]) -> Result<Vec<bool>> {
        match &self.data {
            StorageData::Bool(v) => Ok(offsets.iter().map(|&o| v[o]).collect()),
            StorageData::U8(v) => Ok(offsets.iter().map(|&o| v[o] != 0).collect()),
            other => Err(IndexingError::index(format!(
                "tensors used as masks must be bool or byte tensors, got {}",
                other.dtype()
            ))),
        }
    }

    /// Real values of float or quantized data
    pub fn read_f64(&self, offsets: &[usize]) -> Result<Vec<f64>> {
        let q = self.qparams;
        let dequant = |x: i64| -> Result<f64> {
            q.map(|q| q.dequantize(x))
                .ok_or_else(|| IndexingError::value("quantized storage is missing its quantization parameters"))
        };
        match &self.data {
            StorageData::F32(v) => Ok(offsets.iter().map(|&o| v[o] as f64).collect()),
            StorageData::F64(v) => Ok(offsets.iter().map(|&o| v[o]).collect()),
            StorageData::QInt8(v) => offsets.iter().map(|&o| dequant(v[o] as i64)).collect(),
            StorageData::QUInt8(v) => offsets.iter().map(|&o| dequant(v[o] as i64)).collect(),
            other => Err(IndexingError::DTypeMismatch { expected: DType::F64, found: other.dtype() }),
        }
    }

    /// String form of each element at `offsets`, for display
    pub fn format_elems(&self, offsets: &[usize]) -> Vec<String> {
        visit_data!(&self.data, v => offsets.iter().map(|&o| format!("{}", v[o])).collect())
    }
}

fn copy_strided<T: Copy>(dst: &mut [T], dst_offsets: &[usize], src: &[T], src_offsets: &[usize]) {
    dst_offsets
        .iter()
        .zip(src_offsets.iter())
        .for_each(|(&d, &s)| dst[d] = src[s]);
}
