use std::fmt::Display;
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo};

use crate::tensor::Tensor;

/// A half-open, step-aware range along one axis. Missing parts take their
/// defaults from the sign of the step when the slice is resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl Slice {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Slice {
        Slice { start, stop, step }
    }

    /// `::`
    pub fn full() -> Slice {
        Slice::default()
    }

    /// `start:stop`
    pub fn range(start: i64, stop: i64) -> Slice {
        Slice { start: Some(start), stop: Some(stop), step: None }
    }

    /// `::step`
    pub fn every(step: i64) -> Slice {
        Slice { start: None, stop: None, step: Some(step) }
    }

    pub fn with_step(self, step: i64) -> Slice {
        Slice { step: Some(step), ..self }
    }
}

/// One axis selector of an index expression
#[derive(Clone, Debug)]
pub enum TensorIndex {
    /// new unit axis, consumes nothing
    None,
    /// as many full slices as needed to align the rest with the trailing dimensions
    Ellipsis,
    Integer(i64),
    /// `true` adds a unit axis, `false` an empty one
    Boolean(bool),
    Slice(Slice),
    /// bool mask over one or more dimensions, or integer index array
    Tensor(Tensor),
}

impl TensorIndex {
    pub fn is_advanced(&self) -> bool {
        matches!(self, TensorIndex::Tensor(t) if t.rank() > 0)
    }
}

macro_rules! integer_index {
    ($($t:ty),*) => {
        $(impl From<$t> for TensorIndex {
            fn from(i: $t) -> Self {
                TensorIndex::Integer(i as i64)
            }
        })*
    };
}

integer_index!(i32, i64, isize, usize);

impl From<bool> for TensorIndex {
    fn from(b: bool) -> Self {
        TensorIndex::Boolean(b)
    }
}

impl From<Slice> for TensorIndex {
    fn from(s: Slice) -> Self {
        TensorIndex::Slice(s)
    }
}

impl From<Tensor> for TensorIndex {
    fn from(t: Tensor) -> Self {
        TensorIndex::Tensor(t)
    }
}

impl From<&Tensor> for TensorIndex {
    fn from(t: &Tensor) -> Self {
        TensorIndex::Tensor(t.clone())
    }
}

impl From<Range<i64>> for TensorIndex {
    fn from(r: Range<i64>) -> Self {
        TensorIndex::Slice(Slice::range(r.start, r.end))
    }
}

impl From<RangeInclusive<i64>> for TensorIndex {
    fn from(r: RangeInclusive<i64>) -> Self {
        // an end of i64::MAX leaves the stop open
        TensorIndex::Slice(Slice::new(Some(*r.start()), r.end().checked_add(1), None))
    }
}

impl From<RangeFrom<i64>> for TensorIndex {
    fn from(r: RangeFrom<i64>) -> Self {
        TensorIndex::Slice(Slice::new(Some(r.start), None, None))
    }
}

impl From<RangeTo<i64>> for TensorIndex {
    fn from(r: RangeTo<i64>) -> Self {
        TensorIndex::Slice(Slice::new(None, Some(r.end), None))
    }
}

impl From<RangeFull> for TensorIndex {
    fn from(_: RangeFull) -> Self {
        TensorIndex::Slice(Slice::full())
    }
}

impl Display for Slice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let part = |p: Option<i64>| p.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}:{}", part(self.start), part(self.stop), part(self.step))
    }
}

impl Display for TensorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TensorIndex::None => write!(f, "None"),
            TensorIndex::Ellipsis => write!(f, "..."),
            TensorIndex::Integer(i) => write!(f, "{}", i),
            TensorIndex::Boolean(b) => write!(f, "{}", b),
            TensorIndex::Slice(s) => write!(f, "{}", s),
            TensorIndex::Tensor(t) => write!(f, "{:?}", t),
        }
    }
}

/// Render an expression as `(a, b, c)`, for diagnostics only
pub fn format_expression(indices: &[TensorIndex]) -> String {
    format!("({})", itertools::join(indices.iter(), ", "))
}
