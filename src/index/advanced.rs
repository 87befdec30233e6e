use itertools::Itertools;
use log::{debug, trace};

use super::basic::AdvancedSlot;
use crate::error::{index_bail, IndexingError, Result};
use crate::tensor::layout::{broadcast_shapes, Dims, StridedIndex};
use crate::tensor::{Layout, Tensor};

/// An integer index array bound to one view dimension, already validated and
/// with negative entries wrapped
struct BoundIndex {
    dim: usize,
    shape: Dims,
    values: Vec<i64>,
}

/// Where every element of an advanced indexing result lives in the target storage
pub(crate) struct AdvancedPlan {
    pub shape: Dims,
    pub offsets: Vec<usize>,
}

/// Turn the recorded slots into one coordinate array per consumed dimension.
/// A rank-K mask yields K arrays of shape `(num_true,)`, co-indexed in row-major order.
fn materialize(slots: &[(usize, AdvancedSlot)]) -> Result<Vec<(usize, Tensor)>> {
    let mut arrays = Vec::new();
    for (dim, slot) in slots {
        match slot {
            AdvancedSlot::IntArray(t) => arrays.push((*dim, t.clone())),
            AdvancedSlot::Mask(m) => {
                let coords = m.nonzero()?;
                for k in 0..m.rank() {
                    arrays.push((dim + k, coords.select(1, k as i64)?));
                }
            }
        }
    }
    Ok(arrays)
}

/// Read an index array and check every entry against the size of its dimension
fn bind(dim: usize, index: &Tensor, size: usize) -> Result<BoundIndex> {
    let offsets: Vec<usize> = index.layout().offsets().collect();
    let mut values = index.storage().read_i64(&offsets)?;
    let size_i = size as i64;
    for v in values.iter_mut() {
        if *v < -size_i || *v >= size_i {
            index_bail!("index {} is out of bounds for dimension {} with size {}", v, dim, size);
        }
        if *v < 0 {
            *v += size_i;
        }
    }
    Ok(BoundIndex { dim, shape: index.shape().into(), values })
}

/// Resolve the advanced part of an expression against the view left by the basic pass.
///
/// All index arrays are broadcast together. When they sit on adjacent view
/// dimensions the broadcast shape replaces those dimensions in place, otherwise
/// it moves to the front and the remaining dimensions follow in order.
pub(crate) fn resolve(view: &Tensor, slots: &[(usize, AdvancedSlot)]) -> Result<AdvancedPlan> {
    let arrays = materialize(slots)?;
    let bound = arrays
        .iter()
        .map(|(dim, t)| bind(*dim, t, view.shape()[*dim]))
        .collect::<Result<Vec<_>>>()?;

    let index_shape = broadcast_shapes(bound.iter().map(|b| b.shape.as_slice())).map_err(|_| {
        let shapes = bound.iter().map(|b| format!("{:?}", b.shape.as_slice())).join(", ");
        IndexingError::value(format!(
            "shape mismatch: indexing tensors could not be broadcast together with shapes {}",
            shapes
        ))
    })?;

    let adv_dims: Vec<usize> = bound.iter().map(|b| b.dim).collect();
    let adjacent = adv_dims.windows(2).all(|w| w[1] == w[0] + 1);
    let first = adv_dims[0];
    let rest: Vec<usize> = (0..view.rank()).filter(|d| !adv_dims.contains(d)).collect();
    let (outer, inner): (Vec<usize>, Vec<usize>) = if adjacent {
        rest.into_iter().partition(|&d| d < first)
    } else {
        (Vec::new(), rest)
    };
    debug!(
        "advanced indexing on view dims {:?} broadcast to {:?}, {}",
        adv_dims,
        index_shape.as_slice(),
        if adjacent { "kept in place" } else { "moved to front" }
    );

    // storage delta contributed by the index arrays, per broadcast position
    let strides = view.stride();
    let mut index_deltas = vec![0isize; index_shape.iter().product()];
    for b in &bound {
        let positions = Layout::contiguous(&b.shape).broadcast_as(&index_shape)?;
        let stride = strides[b.dim];
        for (delta, pos) in index_deltas.iter_mut().zip(positions.offsets()) {
            *delta += b.values[pos] as isize * stride;
        }
    }

    let pick = |dims: &[usize]| -> (Dims, Vec<isize>) {
        (dims.iter().map(|&d| view.shape()[d]).collect(), dims.iter().map(|&d| strides[d]).collect())
    };
    let (outer_shape, outer_strides) = pick(&outer);
    let (inner_shape, inner_strides) = pick(&inner);
    let inner_deltas: Vec<isize> = StridedIndex::new(&inner_shape, &inner_strides, 0).collect();

    let base = view.storage_offset() as isize;
    let mut offsets = Vec::with_capacity(outer_shape.iter().product::<usize>() * index_deltas.len() * inner_deltas.len());
    for o in StridedIndex::new(&outer_shape, &outer_strides, base) {
        for a in &index_deltas {
            offsets.extend(inner_deltas.iter().map(|i| (o + a + i) as usize));
        }
    }

    let shape: Dims = outer_shape.iter().chain(index_shape.iter()).chain(inner_shape.iter()).copied().collect();
    trace!("advanced result shape {:?}, {} elements", shape.as_slice(), offsets.len());
    Ok(AdvancedPlan { shape, offsets })
}

/// Copy the selected elements into a fresh, contiguous tensor
pub(crate) fn gather(view: &Tensor, plan: &AdvancedPlan) -> Tensor {
    let storage = view.storage().gather(&plan.offsets);
    Tensor::from_storage(storage, Layout::contiguous(&plan.shape))
}
