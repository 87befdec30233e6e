use log::trace;

use super::normalize::{IndexPlan, Planned};
use super::spec::Slice;
use crate::error::{index_bail, value_bail, Result};
use crate::tensor::layout::{Dims, Strides};
use crate::tensor::{Layout, Tensor};

/// What one basic specifier contributes to the resulting view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Contribution {
    /// new dimension (size, stride), `None` when the dimension is removed
    pub dim: Option<(usize, isize)>,
    pub offset_delta: isize,
}

/// `Integer(i)` against a dimension of `size` with `stride`
pub(crate) fn resolve_integer(i: i64, size: usize, stride: isize, dim: usize) -> Result<Contribution> {
    let size_i = size as i64;
    if i < -size_i || i >= size_i {
        index_bail!("index {} is out of bounds for dimension {} with size {}", i, dim, size);
    }
    let i = if i < 0 { i + size_i } else { i };
    Ok(Contribution { dim: None, offset_delta: i as isize * stride })
}

/// `Slice(start, stop, step)` against a dimension of `size` with `stride`.
/// Out of range bounds are clamped, never an error.
pub(crate) fn resolve_slice(s: &Slice, size: usize, stride: isize) -> Result<Contribution> {
    let step = s.step.unwrap_or(1);
    if step == 0 {
        value_bail!("slice step cannot be zero");
    }
    let size = size as i64;
    let wrap = |x: i64| if x < 0 { x + size } else { x };
    let (start, stop) = if step > 0 {
        let start = s.start.map(wrap).unwrap_or(0).clamp(0, size);
        let stop = s.stop.map(wrap).unwrap_or(size).clamp(0, size);
        (start, stop)
    } else {
        // -1 here means "before index 0"
        let start = s.start.map(wrap).unwrap_or(size - 1).clamp(-1, size - 1);
        let stop = s.stop.map(wrap).unwrap_or(-1).clamp(-1, size - 1);
        (start, stop)
    };
    let len = ceil_div(stop - start, step).max(0) as usize;
    let offset_delta = if len > 0 { start as isize * stride } else { 0 };
    // a stride over at most one element is never walked
    let new_stride = if len > 1 { stride * step as isize } else { stride };
    Ok(Contribution { dim: Some((len, new_stride)), offset_delta })
}

/// `None` and scalar booleans
pub(crate) fn resolve_new_axis(keep: bool) -> Contribution {
    Contribution { dim: Some((keep as usize, 0)), offset_delta: 0 }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) == (b < 0)) { q + 1 } else { q }
}

/// An advanced specifier left in place by the basic pass, at `dim` of the view
#[derive(Clone, Debug)]
pub(crate) enum AdvancedSlot {
    IntArray(Tensor),
    Mask(Tensor),
}

/// The view produced by the basic specifiers, with the advanced ones recorded
/// against the view dimensions they still occupy
pub(crate) struct BasicResolution {
    pub view: Tensor,
    pub advanced: Vec<(usize, AdvancedSlot)>,
}

/// Apply every basic specifier of `plan` to `target` left to right.
/// Dimensions under advanced specifiers pass through untouched.
pub(crate) fn resolve(target: &Tensor, plan: &IndexPlan<'_>) -> Result<BasicResolution> {
    let src_shape = target.shape();
    let src_strides = target.stride();
    let mut shape = Dims::new();
    let mut strides = Strides::new();
    let mut offset = target.storage_offset() as isize;
    let mut advanced = Vec::new();
    let mut src_dim = 0;

    let mut push = |c: Contribution, shape: &mut Dims, strides: &mut Strides| {
        if let Some((size, stride)) = c.dim {
            shape.push(size);
            strides.push(stride);
        }
        offset += c.offset_delta;
    };

    for item in &plan.items {
        match item {
            Planned::NewAxis => push(resolve_new_axis(true), &mut shape, &mut strides),
            Planned::Boolean(b) => push(resolve_new_axis(*b), &mut shape, &mut strides),
            Planned::Integer(i) => {
                let c = resolve_integer(*i, src_shape[src_dim], src_strides[src_dim], src_dim)?;
                push(c, &mut shape, &mut strides);
                src_dim += 1;
            }
            Planned::Slice(s) => {
                let c = resolve_slice(s, src_shape[src_dim], src_strides[src_dim])?;
                push(c, &mut shape, &mut strides);
                src_dim += 1;
            }
            Planned::IntArray(t) => {
                advanced.push((shape.len(), AdvancedSlot::IntArray((*t).clone())));
                shape.push(src_shape[src_dim]);
                strides.push(src_strides[src_dim]);
                src_dim += 1;
            }
            Planned::Mask(m) => {
                advanced.push((shape.len(), AdvancedSlot::Mask((*m).clone())));
                for _ in 0..m.rank() {
                    shape.push(src_shape[src_dim]);
                    strides.push(src_strides[src_dim]);
                    src_dim += 1;
                }
            }
        }
    }
    trace!("basic view shape {:?} strides {:?} offset {}", shape, strides, offset);
    let view = target.with_layout(Layout::new(&shape, &strides, offset as usize));
    Ok(BasicResolution { view, advanced })
}
