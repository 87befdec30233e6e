/// The closed set of axis selectors and their diagnostic formatting
mod spec;
/// Ellipsis expansion, specifier counting and mask shape checks
mod normalize;
/// View arithmetic for None / Integer / Boolean / Slice
mod basic;
/// Mask materialization, index broadcasting and gather / scatter placement
mod advanced;

#[cfg(test)]
mod tests;

use log::debug;

pub use spec::{format_expression, Slice, TensorIndex};

use crate::config::IndexConfig;
use crate::error::{value_bail, IndexingError, Result};
use crate::tensor::layout::Dims;
use crate::tensor::{scalar_to_tensor, Scalar, Tensor};

/// The right-hand side of an assignment
#[derive(Clone, Debug)]
pub enum IndexValue {
    Tensor(Tensor),
    Scalar(Scalar),
}

impl From<Tensor> for IndexValue {
    fn from(t: Tensor) -> Self {
        IndexValue::Tensor(t)
    }
}

impl From<&Tensor> for IndexValue {
    fn from(t: &Tensor) -> Self {
        IndexValue::Tensor(t.clone())
    }
}

impl From<Scalar> for IndexValue {
    fn from(s: Scalar) -> Self {
        IndexValue::Scalar(s)
    }
}

macro_rules! scalar_value {
    ($($t:ty),*) => {
        $(impl From<$t> for IndexValue {
            fn from(v: $t) -> Self {
                IndexValue::Scalar(Scalar::from(v))
            }
        })*
    };
}

scalar_value!(i32, i64, u8, f32, f64, bool);

/// Where a resolved expression lands in the target storage
enum Target {
    /// pure basic indexing, a view of the target
    View(Tensor),
    /// advanced indexing, explicit storage offsets laid out in `shape`
    Scattered { shape: Dims, offsets: Vec<usize> },
}

impl Target {
    fn shape(&self) -> &[usize] {
        match self {
            Target::View(v) => v.shape(),
            Target::Scattered { shape, .. } => shape,
        }
    }
}

/// Runs get/set with a fixed configuration
#[derive(Clone, Debug, Default)]
pub struct Indexer {
    config: IndexConfig,
}

impl Indexer {
    pub fn new(config: IndexConfig) -> Indexer {
        Indexer { config }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn resolve(&self, tensor: &Tensor, indices: &[TensorIndex]) -> Result<Target> {
        if is_identity(indices) {
            debug!("identity expression {}, aliasing the input", format_expression(indices));
            return Ok(Target::View(tensor.clone()));
        }
        let plan = normalize::normalize(tensor, indices, &self.config)?;
        let basic = basic::resolve(tensor, &plan)?;
        if !plan.has_advanced() {
            debug!("basic indexing {}, view of shape {:?}", format_expression(indices), basic.view.shape());
            return Ok(Target::View(basic.view));
        }
        let adv = advanced::resolve(&basic.view, &basic.advanced)?;
        Ok(Target::Scattered { shape: adv.shape, offsets: adv.offsets })
    }

    /// `tensor[indices]`. Basic expressions return a view sharing the input's
    /// storage, advanced ones a freshly allocated copy.
    pub fn get(&self, tensor: &Tensor, indices: &[TensorIndex]) -> Result<Tensor> {
        match self.resolve(tensor, indices)? {
            Target::View(v) => Ok(v),
            Target::Scattered { shape, offsets } => {
                let plan = advanced::AdvancedPlan { shape, offsets };
                Ok(advanced::gather(tensor, &plan))
            }
        }
    }

    /// `tensor[indices] = value`, in place. The value is broadcast to the
    /// indexed shape; every check runs before the first element is written.
    pub fn set(&self, tensor: &Tensor, indices: &[TensorIndex], value: impl Into<IndexValue>) -> Result<()> {
        let value = match value.into() {
            IndexValue::Scalar(s) => scalar_to_tensor(s, tensor, &self.config)?,
            IndexValue::Tensor(t) => t,
        };
        check_value(tensor, &value)?;

        let target = self.resolve(tensor, indices)?;
        let value = broadcast_value(&value, target.shape())?;
        // read before write when the value views the target's own storage
        let value = if value.same_storage(tensor) { value.contiguous() } else { value };

        let dst: Vec<usize> = match &target {
            Target::View(v) => v.layout().offsets().collect(),
            Target::Scattered { offsets, .. } => offsets.clone(),
        };
        let src: Vec<usize> = value.layout().offsets().collect();
        debug!("writing {} elements into {:?}", dst.len(), tensor);
        let source = value.storage();
        tensor.storage_mut().scatter(&dst, &source, &src)
    }
}

/// An empty expression or a lone ellipsis selects the whole tensor
fn is_identity(indices: &[TensorIndex]) -> bool {
    matches!(indices, [] | [TensorIndex::Ellipsis])
}

/// The assigned tensor must have the target's dtype (float into quantized is
/// the one cast the write performs) and device (zero-dimensional values may
/// come from anywhere)
fn check_value(target: &Tensor, value: &Tensor) -> Result<()> {
    let (expected, found) = (target.dtype(), value.dtype());
    if expected != found && !(expected.is_quantized() && found.is_float()) {
        return Err(IndexingError::DTypeMismatch { expected, found });
    }
    if value.device() != target.device() && value.rank() > 0 {
        return Err(IndexingError::DeviceMismatch { expected: target.device(), found: value.device() });
    }
    Ok(())
}

/// Drop the value's leading unit dimensions, then broadcast it to `shape`
fn broadcast_value(value: &Tensor, shape: &[usize]) -> Result<Tensor> {
    let lead = value.shape().iter().take_while(|&&d| d == 1).count();
    let layout = value.layout();
    let squeezed = value.as_strided(&layout.shape()[lead..], &layout.strides()[lead..], layout.offset())?;
    match squeezed.broadcast_as(shape) {
        Ok(b) => Ok(b),
        Err(_) => value_bail!(
            "shape mismatch: value tensor of shape {:?} cannot be broadcast to indexing result of shape {:?}",
            value.shape(),
            shape
        ),
    }
}

/// `tensor[indices]` with the default configuration
pub fn get(tensor: &Tensor, indices: &[TensorIndex]) -> Result<Tensor> {
    Indexer::default().get(tensor, indices)
}

/// `tensor[indices] = value` with the default configuration
pub fn set(tensor: &Tensor, indices: &[TensorIndex], value: impl Into<IndexValue>) -> Result<()> {
    Indexer::default().set(tensor, indices, value)
}
