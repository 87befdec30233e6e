use smallvec::SmallVec;

use crate::error::{index_bail, value_bail, Result};

pub type Dims = SmallVec<[usize; 6]>;
pub type Strides = SmallVec<[isize; 6]>;

/// Shape, strides and storage offset of a strided view.
/// Strides are signed element steps, a reversed slice walks backwards through storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    shape: Dims,
    strides: Strides,
    offset: usize,
}

impl Layout {
    pub fn new(shape: &[usize], strides: &[isize], offset: usize) -> Layout {
        assert_eq!(shape.len(), strides.len(), "shape and strides must have the same rank");
        Layout { shape: shape.into(), strides: strides.into(), offset }
    }

    /// Row-major layout starting at storage offset 0
    pub fn contiguous(shape: &[usize]) -> Layout {
        Layout { shape: shape.into(), strides: compute_strides(shape), offset: 0 }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_contiguous(&self) -> bool {
        let expected = compute_strides(&self.shape);
        self.shape
            .iter()
            .zip(self.strides.iter().zip(expected.iter()))
            .all(|(&d, (s, e))| d <= 1 || s == e)
    }

    /// Smallest and largest storage offsets this layout touches, `None` if it is empty
    pub fn offset_bounds(&self) -> Option<(isize, isize)> {
        if self.numel() == 0 {
            return None;
        }
        let base = self.offset as isize;
        let (lo, hi) = self.shape.iter().zip(self.strides.iter()).fold((base, base), |(lo, hi), (&d, &s)| {
            let reach = (d as isize - 1) * s;
            if reach < 0 { (lo + reach, hi) } else { (lo, hi + reach) }
        });
        Some((lo, hi))
    }

    /// Keep `len` entries of `dim` starting at `start`
    pub fn narrow(&self, dim: usize, start: usize, len: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        let size = self.shape[dim];
        if start + len > size {
            index_bail!(
                "narrow [{}:{}] is out of bounds for dimension {} with size {}",
                start, start + len, dim, size
            );
        }
        let mut out = self.clone();
        out.shape[dim] = len;
        if len > 0 {
            out.offset = shift(self.offset, start as isize * self.strides[dim]);
        }
        Ok(out)
    }

    /// Remove `dim`, fixing it at `index`
    pub fn select(&self, dim: usize, index: usize) -> Result<Layout> {
        self.check_dim(dim)?;
        let size = self.shape[dim];
        if index >= size {
            index_bail!("index {} is out of bounds for dimension {} with size {}", index, dim, size);
        }
        let mut out = self.clone();
        out.offset = shift(self.offset, index as isize * self.strides[dim]);
        out.shape.remove(dim);
        out.strides.remove(dim);
        Ok(out)
    }

    /// Insert a unit dimension before `dim`
    pub fn unsqueeze(&self, dim: usize) -> Result<Layout> {
        if dim > self.rank() {
            index_bail!("dimension {} is out of range for unsqueeze on rank {}", dim, self.rank());
        }
        let mut out = self.clone();
        out.shape.insert(dim, 1);
        out.strides.insert(dim, 0);
        Ok(out)
    }

    /// View this layout as `shape`, stretching size-1 and missing leading dimensions with stride 0
    pub fn broadcast_as(&self, shape: &[usize]) -> Result<Layout> {
        if shape.len() < self.rank() {
            value_bail!("cannot broadcast shape {:?} to the lower rank shape {:?}", self.shape(), shape);
        }
        let lead = shape.len() - self.rank();
        let mut strides: Strides = SmallVec::from_elem(0, shape.len());
        for (i, (&d, &s)) in self.shape.iter().zip(self.strides.iter()).enumerate() {
            let target = shape[lead + i];
            if d == target {
                strides[lead + i] = s;
            } else if d != 1 {
                value_bail!("shape mismatch: cannot broadcast {:?} to {:?}", self.shape(), shape);
            }
        }
        Ok(Layout { shape: shape.into(), strides, offset: self.offset })
    }

    /// Storage offsets in row-major order of the view
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        self.strided_index().map(|o| o as usize)
    }

    pub fn strided_index(&self) -> StridedIndex<'_> {
        StridedIndex::new(&self.shape, &self.strides, self.offset as isize)
    }

    fn check_dim(&self, dim: usize) -> Result<()> {
        if dim >= self.rank() {
            index_bail!("dimension {} is out of range for a tensor of rank {}", dim, self.rank());
        }
        Ok(())
    }
}

fn shift(offset: usize, delta: isize) -> usize {
    (offset as isize + delta) as usize
}

/// Walks every multi-index of a strided shape and yields the signed storage offset
pub struct StridedIndex<'a> {
    dims: &'a [usize],
    strides: &'a [isize],
    base: isize,
    cur_dim: Dims,
    last: bool,
}

impl<'a> StridedIndex<'a> {
    pub fn new(dims: &'a [usize], strides: &'a [isize], base: isize) -> Self {
        let last = dims.iter().any(|&d| d == 0);
        StridedIndex { dims, strides, base, cur_dim: SmallVec::from_elem(0, dims.len()), last }
    }
}

impl<'a> Iterator for StridedIndex<'a> {
    type Item = isize;
    fn next(&mut self) -> Option<Self::Item> {
        if self.last {
            return None;
        }
        let idx = self.strides.iter()
            .zip(self.cur_dim.iter())
            .fold(self.base, |acc, (stride, idx)| acc + stride * *idx as isize);

        // if the first dimension overflows, there are no more elements
        self.last = carry_over(&mut self.cur_dim, self.dims);
        Some(idx)
    }
}

/// Increase the index by 1, and carry over to higher dimensions if appliciable
/// returns true if index is full, false otherwise
pub fn carry_over(index: &mut [usize], dims: &[usize]) -> bool {
    let mut carry_over = true;
    index.iter_mut().rev()
        .zip(dims.iter().rev())
        .for_each(|(x, s)| {
            if carry_over {
                *x += 1;
                carry_over = false;
            }
            if *x >= *s {
                *x = 0;
                carry_over = true;
            }
        });
    carry_over
}

/// Computes the stride from dimensions, the last stride is always 1
pub fn compute_strides(dims: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::with_capacity(dims.len());
    let mut k = 1isize;
    for i in (0..dims.len()).rev() {
        strides.push(k);
        k *= dims[i].max(1) as isize;
    }
    strides.reverse();
    strides
}

/// Broadcasts two shapes: trailing dimensions are aligned, size 1 stretches
pub fn co_broadcast(shape1: &[usize], shape2: &[usize]) -> Result<Dims> {
    // Swap the order if shape2 is longer.
    if shape2.len() > shape1.len() {
        return co_broadcast(shape2, shape1);
    }
    let mut out: Dims = shape1.into();
    let k = shape1.len() - shape2.len();
    for (out, &s2) in out[k..].iter_mut().zip(shape2) {
        if *out != s2 {
            if *out == 1 {
                *out = s2
            } else if s2 != 1 {
                value_bail!("shape mismatch: shapes {:?} and {:?} cannot be broadcast together", shape1, shape2);
            }
        }
    }
    Ok(out)
}

/// Common broadcast shape of any number of shapes
pub fn broadcast_shapes<'s, I>(shapes: I) -> Result<Dims>
where
    I: IntoIterator<Item = &'s [usize]>,
{
    shapes
        .into_iter()
        .try_fold(Dims::new(), |acc, s| co_broadcast(&acc, s))
}
