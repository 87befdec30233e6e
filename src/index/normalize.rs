use log::{trace, warn};

use super::spec::{Slice, TensorIndex};
use crate::config::IndexConfig;
use crate::error::{index_bail, IndexingError, Result};
use crate::tensor::{DType, Device, Tensor};

/// A specifier after normalization. Ellipsis is gone, zero-dimensional index
/// tensors are folded into their scalar forms and index tensors are classified.
#[derive(Clone, Debug)]
pub(crate) enum Planned<'a> {
    NewAxis,
    Boolean(bool),
    Integer(i64),
    Slice(Slice),
    IntArray(&'a Tensor),
    Mask(&'a Tensor),
}

impl<'a> Planned<'a> {
    /// number of source dimensions this entry consumes
    pub(crate) fn consumed(&self) -> usize {
        match self {
            Planned::NewAxis | Planned::Boolean(_) => 0,
            Planned::Integer(_) | Planned::Slice(_) | Planned::IntArray(_) => 1,
            Planned::Mask(m) => m.rank(),
        }
    }

    pub(crate) fn is_advanced(&self) -> bool {
        matches!(self, Planned::IntArray(_) | Planned::Mask(_))
    }
}

/// The expanded expression, with exactly `rank` consumed dimensions
#[derive(Debug)]
pub(crate) struct IndexPlan<'a> {
    pub items: Vec<Planned<'a>>,
}

impl<'a> IndexPlan<'a> {
    pub(crate) fn has_advanced(&self) -> bool {
        self.items.iter().any(Planned::is_advanced)
    }
}

/// Classify one specifier. Zero-dimensional tensors read their single value.
fn classify<'a>(index: &'a TensorIndex, target: &Tensor, config: &IndexConfig) -> Result<Option<Planned<'a>>> {
    let planned = match index {
        TensorIndex::Ellipsis => return Ok(None),
        TensorIndex::None => Planned::NewAxis,
        TensorIndex::Integer(i) => Planned::Integer(*i),
        TensorIndex::Boolean(b) => Planned::Boolean(*b),
        TensorIndex::Slice(s) => Planned::Slice(*s),
        TensorIndex::Tensor(t) => {
            if t.device() != target.device() && t.device() != Device::Cpu {
                return Err(IndexingError::DeviceMismatch { expected: target.device(), found: t.device() });
            }
            match t.dtype() {
                DType::I64 | DType::I32 if t.rank() == 0 => Planned::Integer(t.storage().read_i64(&[t.storage_offset()])?[0]),
                DType::Bool if t.rank() == 0 => Planned::Boolean(t.storage().read_mask(&[t.storage_offset()])?[0]),
                DType::I64 | DType::I32 => Planned::IntArray(t),
                DType::Bool => Planned::Mask(t),
                DType::U8 if config.allow_uint8_masks => {
                    warn!("indexing with a u8 tensor is deprecated, use a bool tensor instead");
                    if t.rank() == 0 {
                        Planned::Boolean(t.storage().read_mask(&[t.storage_offset()])?[0])
                    } else {
                        Planned::Mask(t)
                    }
                }
                other => index_bail!("tensors used as indices must be long, int, byte or bool tensors, got {}", other),
            }
        }
    };
    Ok(Some(planned))
}

/// Expand `indices` against `target`: resolve the ellipsis, pad trailing
/// dimensions with full slices, and check masks against the dimensions they cover.
pub(crate) fn normalize<'a>(target: &Tensor, indices: &'a [TensorIndex], config: &IndexConfig) -> Result<IndexPlan<'a>> {
    let rank = target.rank();
    let ellipses = indices.iter().filter(|i| matches!(i, TensorIndex::Ellipsis)).count();
    if ellipses > 1 {
        index_bail!("an index can only have a single ellipsis ('...')");
    }

    let mut classified = Vec::with_capacity(indices.len());
    for index in indices {
        classified.push(classify(index, target, config)?);
    }
    let specified: usize = classified.iter().flatten().map(Planned::consumed).sum();
    if specified > rank {
        index_bail!("too many indices for tensor of dimension {}", rank);
    }
    let missing = rank - specified;

    let mut items = Vec::with_capacity(classified.len() + missing);
    let mut src_dim = 0;
    for (position, entry) in classified.into_iter().enumerate() {
        match entry {
            None => {
                items.extend((0..missing).map(|_| Planned::Slice(Slice::full())));
                src_dim += missing;
            }
            Some(Planned::Mask(m)) => {
                let covered = &target.shape()[src_dim..src_dim + m.rank()];
                if m.shape() != covered {
                    index_bail!(
                        "The shape of the mask {:?} at index {} does not match the shape of the indexed tensor {:?} at index {}",
                        m.shape(), position, covered, src_dim
                    );
                }
                src_dim += m.rank();
                items.push(Planned::Mask(m));
            }
            Some(p) => {
                src_dim += p.consumed();
                items.push(p);
            }
        }
    }
    if ellipses == 0 {
        items.extend((0..missing).map(|_| Planned::Slice(Slice::full())));
    }
    trace!("normalized {} specifiers into {} against rank {}", indices.len(), items.len(), rank);
    Ok(IndexPlan { items })
}
