use std::cell::{Ref, RefCell, RefMut};
use std::fmt::Display;
use std::rc::Rc;

use ndarray::{ArrayD, IxDyn};
use num::NumCast;

use super::dtype::{DType, Device, QParams};
use super::layout::{carry_over, Layout};
use super::storage::{Element, Storage, StorageData};
use crate::error::{index_bail, value_bail, IndexingError, Result};
use crate::index::{self, IndexValue, TensorIndex};

/////////////////////////////////////////////////////////////////////
// The Tensor handle: shared storage plus owned layout metadata.
// Cloning a Tensor, or taking a basic view of it, shares the storage;
// only gather style operations allocate a fresh one.
/////////////////////////////////////////////////////////////////////
#[derive(Clone)]
pub struct Tensor {
    storage: Rc<RefCell<Storage>>,
    layout: Layout,
}

impl Tensor {
    pub(crate) fn from_storage(storage: Storage, layout: Layout) -> Tensor {
        Tensor { storage: Rc::new(RefCell::new(storage)), layout }
    }

    /// A view of the same storage with another layout
    pub(crate) fn with_layout(&self, layout: Layout) -> Tensor {
        Tensor { storage: Rc::clone(&self.storage), layout }
    }

    pub fn from_vec<T: Element>(data: Vec<T>, shape: &[usize]) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            value_bail!("cannot build a tensor of shape {:?} from {} elements", shape, data.len());
        }
        Ok(Tensor::from_storage(Storage::new(T::into_data(data), Device::Cpu), Layout::contiguous(shape)))
    }

    pub fn from_slice<T: Element>(data: &[T]) -> Tensor {
        Tensor::from_storage(Storage::new(T::into_data(data.to_vec()), Device::Cpu), Layout::contiguous(&[data.len()]))
    }

    pub fn scalar<T: Element>(v: T) -> Tensor {
        Tensor::from_storage(Storage::new(T::into_data(vec![v]), Device::Cpu), Layout::contiguous(&[]))
    }

    pub fn full<T: Element>(shape: &[usize], v: T) -> Tensor {
        let numel = shape.iter().product();
        Tensor::from_storage(Storage::new(T::into_data(vec![v; numel]), Device::Cpu), Layout::contiguous(shape))
    }

    pub fn zeros<T: Element + num::Zero>(shape: &[usize]) -> Tensor {
        Tensor::full(shape, T::zero())
    }

    /// 1-D tensor holding 0, 1, ..., n-1
    pub fn arange<T: Element + NumCast>(n: usize) -> Result<Tensor> {
        let data = (0..n)
            .map(|i| num::cast::<usize, T>(i).ok_or_else(|| IndexingError::value(format!("{} does not fit in {}", i, T::DTYPE))))
            .collect::<Result<Vec<T>>>()?;
        Ok(Tensor::from_slice(&data))
    }

    pub fn from_array<T: Element>(arr: &ArrayD<T>) -> Tensor {
        let data: Vec<T> = arr.iter().copied().collect();
        Tensor::from_storage(Storage::new(T::into_data(data), Device::Cpu), Layout::contiguous(arr.shape()))
    }

    pub fn to_array<T: Element>(&self) -> Result<ArrayD<T>> {
        let data = self.to_vec::<T>()?;
        ArrayD::from_shape_vec(IxDyn(self.shape()), data).map_err(|e| IndexingError::value(e.to_string()))
    }

    /// Elements in row-major order of the view
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        let storage = self.storage();
        let data = T::as_slice(storage.data())
            .ok_or(IndexingError::DTypeMismatch { expected: T::DTYPE, found: storage.dtype() })?;
        Ok(self.layout.offsets().map(|o| data[o]).collect())
    }

    /// Relabel onto `device`, copying the data
    pub fn to_device(&self, device: Device) -> Tensor {
        let offsets: Vec<usize> = self.layout.offsets().collect();
        let storage = self.storage().gather(&offsets).with_device(device);
        Tensor::from_storage(storage, Layout::contiguous(self.shape()))
    }

    /// Affine-quantize a float tensor
    pub fn quantize(&self, scale: f64, zero_point: i64, dtype: DType) -> Result<Tensor> {
        let qparams = QParams { scale, zero_point };
        let offsets: Vec<usize> = self.layout.offsets().collect();
        let values = self.storage().read_f64(&offsets)?;
        let data = match dtype {
            DType::QInt8 => StorageData::QInt8(
                values.iter().map(|&v| qparams.quantize(v, i8::MIN as i64, i8::MAX as i64) as i8).collect(),
            ),
            DType::QUInt8 => StorageData::QUInt8(
                values.iter().map(|&v| qparams.quantize(v, u8::MIN as i64, u8::MAX as i64) as u8).collect(),
            ),
            other => value_bail!("{} is not a quantized dtype", other),
        };
        Ok(Tensor::from_storage(Storage::quantized(data, self.device(), qparams), Layout::contiguous(self.shape())))
    }

    /// Real values of a float or quantized tensor, as f64
    pub fn dequantize(&self) -> Result<Tensor> {
        let offsets: Vec<usize> = self.layout.offsets().collect();
        let values = self.storage().read_f64(&offsets)?;
        Ok(Tensor::from_storage(Storage::new(StorageData::F64(values), self.device()), Layout::contiguous(self.shape())))
    }

    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    pub fn stride(&self) -> &[isize] {
        self.layout.strides()
    }

    pub fn storage_offset(&self) -> usize {
        self.layout.offset()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    pub fn numel(&self) -> usize {
        self.layout.numel()
    }

    pub fn dtype(&self) -> DType {
        self.storage().dtype()
    }

    pub fn device(&self) -> Device {
        self.storage().device()
    }

    pub fn qparams(&self) -> Option<QParams> {
        self.storage().qparams()
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Whether both tensors view the same storage
    pub fn same_storage(&self, other: &Tensor) -> bool {
        Rc::ptr_eq(&self.storage, &other.storage)
    }

    pub(crate) fn storage(&self) -> Ref<'_, Storage> {
        self.storage.borrow()
    }

    pub(crate) fn storage_mut(&self) -> RefMut<'_, Storage> {
        self.storage.borrow_mut()
    }

    /// View of `len` entries along `dim`, starting at `start`
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Tensor> {
        Ok(self.with_layout(self.layout.narrow(dim, start, len)?))
    }

    /// View with `dim` removed, fixed at `index`; negative indices count from the end
    pub fn select(&self, dim: usize, index: i64) -> Result<Tensor> {
        if dim >= self.rank() {
            index_bail!("dimension {} is out of range for a tensor of rank {}", dim, self.rank());
        }
        let size = self.shape()[dim] as i64;
        if index < -size || index >= size {
            index_bail!("index {} is out of bounds for dimension {} with size {}", index, dim, size);
        }
        let index = if index < 0 { index + size } else { index };
        Ok(self.with_layout(self.layout.select(dim, index as usize)?))
    }

    pub fn unsqueeze(&self, dim: usize) -> Result<Tensor> {
        Ok(self.with_layout(self.layout.unsqueeze(dim)?))
    }

    /// Arbitrary view of the storage; every reachable offset must be inside it
    pub fn as_strided(&self, shape: &[usize], strides: &[isize], offset: usize) -> Result<Tensor> {
        if shape.len() != strides.len() {
            value_bail!("mismatch in length of strides {:?} and shape {:?}", strides, shape);
        }
        let layout = Layout::new(shape, strides, offset);
        if let Some((lo, hi)) = layout.offset_bounds() {
            let len = self.storage().len() as isize;
            if lo < 0 || hi >= len {
                index_bail!(
                    "as_strided: shape {:?} strides {:?} offset {} is out of bounds for storage of size {}",
                    shape, strides, offset, len
                );
            }
        }
        Ok(self.with_layout(layout))
    }

    pub fn broadcast_as(&self, shape: &[usize]) -> Result<Tensor> {
        Ok(self.with_layout(self.layout.broadcast_as(shape)?))
    }

    /// Densely packed copy in row-major order, always a new storage
    pub fn contiguous(&self) -> Tensor {
        let offsets: Vec<usize> = self.layout.offsets().collect();
        let storage = self.storage().gather(&offsets);
        Tensor::from_storage(storage, Layout::contiguous(self.shape()))
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Tensor> {
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            value_bail!("shape {:?} is invalid for input of size {}", shape, self.numel());
        }
        let base = if self.is_contiguous() { self.clone() } else { self.contiguous() };
        Ok(base.with_layout(Layout::new(shape, &super::layout::compute_strides(shape), base.storage_offset())))
    }

    /// Coordinates of the true (non-zero) elements, as an `i64` tensor of
    /// shape `(num_true, rank)` in row-major scan order
    pub fn nonzero(&self) -> Result<Tensor> {
        let offsets: Vec<usize> = self.layout.offsets().collect();
        let mask = self.storage().read_mask(&offsets)?;
        let rank = self.rank();
        let mut coords = Vec::new();
        let mut cur = vec![0usize; rank];
        let mut count = 0;
        for m in mask {
            if m {
                coords.extend(cur.iter().map(|&c| c as i64));
                count += 1;
            }
            carry_over(&mut cur, self.shape());
        }
        Tensor::from_vec(coords, &[count, rank])
    }

    /// `self[indices]`, see [`index::get`]
    pub fn index(&self, indices: &[TensorIndex]) -> Result<Tensor> {
        index::get(self, indices)
    }

    /// `self[indices] = value`, see [`index::set`]
    pub fn index_put_(&self, indices: &[TensorIndex], value: impl Into<IndexValue>) -> Result<&Tensor> {
        index::set(self, indices, value)?;
        Ok(self)
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tensor[{:?}, {}]", self.shape(), self.dtype())
    }
}

impl Display for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let offsets: Vec<usize> = self.layout.offsets().collect();
        let elems = self.storage().format_elems(&offsets);
        pretty_write(f, &elems, self.shape())
    }
}

/// The enum to facilitate the logic for labeling indicies for the pretty write function
enum TensorDisplayType {
    Scalar,
    Matrix,
    Tensor3D(usize),
    TensorND(Vec<usize>),
}

impl TensorDisplayType {
    fn new(ndim: usize) -> Self {
        if ndim > 3 {
            Self::TensorND(vec![0; ndim-2])
        } else if ndim == 3 {
            Self::Tensor3D(0)
        } else if ndim == 2 {
            Self::Matrix
        } else {
            Self::Scalar
        }
    }
    /// Increase the current index by 1, mod/carry over whatever dimension at that index
    fn increment(&mut self, dim: &[usize]) {
        match self {
            Self::Tensor3D(i) => {*i += 1;}
            Self::TensorND(d) => {
                let ndim = d.len();
                carry_over(d, &dim[0..ndim]);
            }
            _ => {}
        }
    }
    /// Convert the index to a String, for pretty_write
    fn show(&self) -> String {
        match self {
            Self::Tensor3D(i) => format!("({})\n", i),
            Self::TensorND(d) => format!("({})\n", itertools::join(d.iter(), ",")),
            _ => "".to_string()
        }
    }
}

/// A pretty display representation of a tensor
/// 1. Automatically pads uneven elements, so that columns are aligned
/// 2. Partitions on the matrix level, higher order structures are labeled by index
///
/// *eg*. A rank 3 tensor of shape [2, 2, 2] is printed as
/// (0)
/// [x, x]
/// [x, x]
///
/// (1)
/// [x, x]
/// [x, x]
///
/// rank 0 tensors print their single element, empty tensors print `[]`
fn pretty_write(f: &mut std::fmt::Formatter<'_>, elems: &[String], dim: &[usize]) -> std::fmt::Result {
    let ndim = dim.len();
    if ndim == 0 {
        return write!(f, "{}", elems.first().map(String::as_str).unwrap_or(""));
    }
    if elems.is_empty() {
        return write!(f, "[]");
    }
    let mat_dim = if ndim > 1 {
        (dim[ndim - 2], dim[ndim - 1])
    } else {
        (1, dim[0])
    };
    let mat_elem = mat_dim.0 * mat_dim.1;
    let padded = format_pad_elem(elems);

    let mut mat_id = TensorDisplayType::new(ndim);
    let blocks: Vec<String> = padded
        .chunks(mat_elem)
        .map(|c| {
            let s = format!("{}{}", mat_id.show(), format_matrix_str(c, mat_dim));
            mat_id.increment(dim);
            s
        })
        .collect();
    write!(f, "{}", blocks.join("\n"))
}

/// Pads each element in the arr so that every string representation has the same length
fn format_pad_elem(arr: &[String]) -> Vec<String> {
    let max_str_len = arr.iter().map(|x| x.chars().count()).max().unwrap_or(0);
    arr.iter()
        .map(|x| format!("{}{}", x, " ".repeat(max_str_len - x.chars().count())))
        .collect()
}

/// Format one block of elements into matrix rows, `[a, b]` per line
fn format_matrix_str(block: &[String], matrix_dim: (usize, usize)) -> String {
    let (m, n) = matrix_dim;
    (0..m)
        .map(|i| format!("[{}]", block[i * n..(i + 1) * n].join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_size() {
        assert!(Tensor::from_vec(vec![1.0f32; 5], &[2, 3]).unwrap_err().is_value_error());
        let t = Tensor::from_vec(vec![1.0f32; 6], &[2, 3]).unwrap();
        assert_eq!(t.stride(), &[3, 1]);
        assert_eq!(t.storage_offset(), 0);
        assert_eq!(t.dtype(), DType::F32);
    }

    #[test]
    fn views_share_storage() {
        let t = Tensor::arange::<i64>(12).unwrap().reshape(&[3, 4]).unwrap();
        let row = t.select(0, -1).unwrap();
        assert!(row.same_storage(&t));
        assert_eq!(row.to_vec::<i64>().unwrap(), vec![8, 9, 10, 11]);
        let col = t.narrow(1, 1, 2).unwrap();
        assert_eq!(col.to_vec::<i64>().unwrap(), vec![1, 2, 5, 6, 9, 10]);
        assert!(!t.contiguous().same_storage(&t));
    }

    #[test]
    fn as_strided_bounds() {
        let t = Tensor::arange::<f32>(6).unwrap();
        let v = t.as_strided(&[2, 2], &[3, 1], 1).unwrap();
        assert_eq!(v.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 4.0, 5.0]);
        assert!(t.as_strided(&[2, 2], &[3, 1], 3).unwrap_err().is_index_error());
        assert!(t.as_strided(&[3], &[-1], 1).unwrap_err().is_index_error());
    }

    #[test]
    fn nonzero_row_major() {
        let m = Tensor::from_vec(vec![true, false, false, true, true, false], &[2, 3]).unwrap();
        let nz = m.nonzero().unwrap();
        assert_eq!(nz.shape(), &[3, 2]);
        assert_eq!(nz.to_vec::<i64>().unwrap(), vec![0, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn ndarray_interop() {
        let a = ndarray::Array::from_shape_vec(IxDyn(&[2, 2]), vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let t = Tensor::from_array(&a);
        let back = t.select(1, 1).unwrap().to_array::<f64>().unwrap();
        assert_eq!(back.as_slice().unwrap(), &[2.0, 4.0]);
        assert!(t.to_vec::<f32>().unwrap_err() == IndexingError::DTypeMismatch { expected: DType::F32, found: DType::F64 });
    }

    #[test]
    fn quantize_round_trip() {
        let t = Tensor::from_vec(vec![0.5f32, 1.0, -1.0], &[3]).unwrap();
        let q = t.quantize(0.5, 2, DType::QUInt8).unwrap();
        assert_eq!(q.dtype(), DType::QUInt8);
        assert_eq!(q.dequantize().unwrap().to_vec::<f64>().unwrap(), vec![0.5, 1.0, -1.0]);
        assert_eq!(q.qparams(), Some(QParams { scale: 0.5, zero_point: 2 }));
        assert_eq!(t.qparams(), None);
    }

    #[test]
    fn unsqueeze_adds_unit_dim() {
        let t = Tensor::arange::<i64>(6).unwrap().reshape(&[2, 3]).unwrap();
        let u = t.unsqueeze(1).unwrap();
        assert_eq!(u.shape(), &[2, 1, 3]);
        assert!(u.same_storage(&t));
        assert_eq!(u.to_vec::<i64>().unwrap(), t.to_vec::<i64>().unwrap());
        assert_eq!(t.unsqueeze(2).unwrap().shape(), &[2, 3, 1]);
        assert!(t.unsqueeze(3).unwrap_err().is_index_error());
    }

    #[test]
    fn pretty_print() {
        let t = Tensor::arange::<i64>(8).unwrap().reshape(&[2, 2, 2]).unwrap();
        assert_eq!(format!("{}", t), "(0)\n[0, 1]\n[2, 3]\n(1)\n[4, 5]\n[6, 7]");
        let v = Tensor::from_vec(vec![1i64, 10], &[2]).unwrap();
        assert_eq!(format!("{}", v), "[1 , 10]");
        assert_eq!(format!("{}", Tensor::scalar(3i64)), "3");
        assert_eq!(format!("{}", Tensor::zeros::<f32>(&[0, 2])), "[]");
    }
}
