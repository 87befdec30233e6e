use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use super::*;
use crate::tensor::{DType, Device};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn grid(shape: &[usize]) -> Tensor {
    let n = shape.iter().product();
    Tensor::arange::<i64>(n).unwrap().reshape(shape).unwrap()
}

fn ints(t: &Tensor) -> Vec<i64> {
    t.to_vec::<i64>().unwrap()
}

fn floats(t: &Tensor) -> Vec<f32> {
    t.to_vec::<f32>().unwrap()
}

#[test]
fn basic_results_are_views() {
    init();
    let expressions = vec![
        vec![TensorIndex::from(1), TensorIndex::from(Slice::every(2))],
        vec![TensorIndex::from(..), TensorIndex::from(-1)],
        vec![TensorIndex::None, TensorIndex::Ellipsis, TensorIndex::from(Slice::range(1, 3))],
        vec![TensorIndex::from(Slice::every(-1)), TensorIndex::from(true)],
        vec![TensorIndex::from(Tensor::scalar(2i64)), TensorIndex::from(1..=2)],
    ];
    for expr in &expressions {
        let t = grid(&[3, 4]);
        let v = get(&t, expr).unwrap();
        assert!(v.same_storage(&t), "expression {}", format_expression(expr));

        set(&v, &[], 100i64).unwrap();
        assert!(ints(&v).iter().all(|&x| x == 100));
        let written = ints(&t).iter().filter(|&&x| x == 100).count();
        assert_eq!(written, v.numel(), "expression {}", format_expression(expr));
    }
}

#[test]
fn row_then_every_other_column() {
    let t = grid(&[3, 4]);
    let v = get(&t, &[TensorIndex::from(1), TensorIndex::from(Slice::every(2))]).unwrap();
    assert_eq!(v.shape(), &[2]);
    assert_eq!(ints(&v), vec![4, 6]);
}

#[test]
fn advanced_results_are_copies() {
    init();
    let rows = Tensor::from_slice(&[0i64, 2]);
    let cols = Tensor::from_vec(vec![3i64, 3, 0], &[3, 1]).unwrap();
    let mask = Tensor::from_vec((0..12).map(|i| i % 5 == 0).collect(), &[3, 4]).unwrap();
    let expressions = vec![
        vec![TensorIndex::from(&rows)],
        vec![TensorIndex::from(&mask)],
        vec![TensorIndex::from(..), TensorIndex::from(&cols)],
        vec![TensorIndex::from(1), TensorIndex::from(&rows)],
        vec![TensorIndex::from(&rows), TensorIndex::from(&cols)],
    ];
    for expr in &expressions {
        let t = grid(&[3, 4]);
        let out = get(&t, expr).unwrap();
        assert!(!out.same_storage(&t), "expression {}", format_expression(expr));

        set(&out, &[TensorIndex::Ellipsis], -1i64).unwrap();
        assert_eq!(ints(&t), (0..12).collect::<Vec<i64>>(), "expression {}", format_expression(expr));
    }
}

#[test]
fn set_of_get_changes_nothing() {
    init();
    let arr = ArrayD::<f32>::random(IxDyn(&[4, 5, 6]), Uniform::new(-1.0f32, 1.0));
    let t = Tensor::from_array(&arr);
    let before = floats(&t);

    let dup = Tensor::from_slice(&[3i64, 0, 3, -1]);
    let mask = Tensor::from_slice(&[true, false, true, true]);
    let expressions = vec![
        vec![TensorIndex::from(1), TensorIndex::Ellipsis],
        vec![TensorIndex::Ellipsis, TensorIndex::from(Slice::every(-2))],
        vec![TensorIndex::from(&dup)],
        vec![TensorIndex::from(&mask), TensorIndex::from(2)],
        vec![TensorIndex::None, TensorIndex::Ellipsis, TensorIndex::from(2)],
        vec![TensorIndex::from(Slice::range(1, 3)), TensorIndex::from(&dup), TensorIndex::from(Slice::every(2))],
        vec![TensorIndex::from(&dup), TensorIndex::from(..), TensorIndex::from(&dup)],
    ];
    for expr in &expressions {
        let current = get(&t, expr).unwrap();
        set(&t, expr, &current).unwrap();
        assert_eq!(floats(&t), before, "expression {}", format_expression(expr));
    }
}

#[test]
fn identity_expressions_alias() {
    init();
    let t = grid(&[3, 4]);
    for expr in [vec![], vec![TensorIndex::Ellipsis], vec![TensorIndex::from(..)]] {
        let v = get(&t, &expr).unwrap();
        assert_eq!(v.shape(), t.shape());
        assert_eq!(ints(&v), ints(&t));
        assert!(v.same_storage(&t));
    }
}

#[test]
fn negative_integer_counts_from_the_end() {
    let t = grid(&[3, 4]);
    let last = get(&t, &[TensorIndex::from(-1)]).unwrap();
    let third = get(&t, &[TensorIndex::from(2)]).unwrap();
    assert_eq!(ints(&last), ints(&third));
    assert_eq!(ints(&last), vec![8, 9, 10, 11]);
}

#[test]
fn mask_selects_true_positions() {
    let t = Tensor::arange::<i64>(5).unwrap();
    let mask = Tensor::from_slice(&[true, false, true, false, true]);
    let out = get(&t, &[TensorIndex::from(&mask)]).unwrap();
    assert_eq!(out.shape(), &[3]);
    assert_eq!(ints(&out), vec![0, 2, 4]);
}

#[test]
fn new_axis_then_integer() {
    let t = grid(&[2, 3]);
    let out = get(&t, &[TensorIndex::None, TensorIndex::from(1)]).unwrap();
    assert_eq!(out.shape(), &[1, 3]);
    assert_eq!(ints(&out), vec![3, 4, 5]);
}

#[test]
fn scalar_booleans() {
    let t = grid(&[2, 3]);
    let out = get(&t, &[TensorIndex::from(true), TensorIndex::from(1)]).unwrap();
    assert_eq!(out.shape(), &[1, 3]);
    let out = get(&t, &[TensorIndex::from(false)]).unwrap();
    assert_eq!(out.shape(), &[0, 2, 3]);
    assert_eq!(out.numel(), 0);
}

#[test]
fn duplicate_indices_keep_one_assigned_value() {
    init();
    let t = Tensor::zeros::<f32>(&[3]);
    let idx = Tensor::from_slice(&[0i64, 0, 1]);
    set(&t, &[TensorIndex::from(&idx)], Tensor::from_slice(&[1.0f32, 2.0, 3.0])).unwrap();
    let out = floats(&t);
    assert!(out[0] == 1.0 || out[0] == 2.0);
    assert_eq!(out[1], 3.0);
    assert_eq!(out[2], 0.0);
}

#[test]
fn too_many_indices_leaves_target_alone() {
    let t = grid(&[2, 3]);
    let expr = [TensorIndex::from(0), TensorIndex::from(0), TensorIndex::from(0)];
    let err = set(&t, &expr, 9i64).unwrap_err();
    assert_eq!(err.to_string(), "IndexError: too many indices for tensor of dimension 2");
    assert_eq!(ints(&t), (0..6).collect::<Vec<i64>>());
}

#[test]
fn scalar_fills_the_selection() {
    let t = Tensor::zeros::<f32>(&[2, 3]);
    set(&t, &[TensorIndex::Ellipsis, TensorIndex::from(1)], 7.0).unwrap();
    assert_eq!(floats(&t), vec![0.0, 7.0, 0.0, 0.0, 7.0, 0.0]);
}

#[test]
fn scalar_into_quantized_target() {
    init();
    let t = Tensor::zeros::<f32>(&[4]).quantize(0.5, 0, DType::QInt8).unwrap();
    set(&t, &[TensorIndex::from(Slice::range(1, 3))], 1.5).unwrap();
    assert_eq!(t.dtype(), DType::QInt8);
    assert_eq!(t.dequantize().unwrap().to_vec::<f64>().unwrap(), vec![0.0, 1.5, 1.5, 0.0]);

    set(&t, &[TensorIndex::from(0)], Tensor::scalar(-1.0f64)).unwrap();
    assert_eq!(t.dequantize().unwrap().to_vec::<f64>().unwrap(), vec![-1.0, 1.5, 1.5, 0.0]);

    let err = set(&t, &[TensorIndex::from(0)], Tensor::scalar(3i64)).unwrap_err();
    assert_eq!(err, IndexingError::DTypeMismatch { expected: DType::QInt8, found: DType::I64 });
}

#[test]
fn quantized_value_with_other_scale_is_requantized() {
    let t = Tensor::zeros::<f32>(&[2]).quantize(0.5, 0, DType::QInt8).unwrap();
    let v = Tensor::from_slice(&[1.0f32, 2.0]).quantize(0.1, 0, DType::QInt8).unwrap();
    set(&t, &[], &v).unwrap();
    assert_eq!(t.qparams(), Some(crate::tensor::QParams { scale: 0.5, zero_point: 0 }));
    assert_eq!(t.dequantize().unwrap().to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
}

#[test]
fn leading_unit_dims_of_value_are_dropped() {
    let t = Tensor::zeros::<i64>(&[2, 3]);
    let value = Tensor::from_vec(vec![1i64, 2, 3], &[1, 1, 3]).unwrap();
    set(&t, &[TensorIndex::from(..)], &value).unwrap();
    assert_eq!(ints(&t), vec![1, 2, 3, 1, 2, 3]);

    let row = Tensor::from_vec(vec![4i64, 5, 6], &[1, 3]).unwrap();
    set(&t, &[TensorIndex::from(1)], &row).unwrap();
    assert_eq!(ints(&t), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn dtype_mismatch_leaves_target_alone() {
    let t = Tensor::zeros::<f32>(&[3]);
    let err = set(&t, &[], Tensor::from_slice(&[1i64, 2, 3])).unwrap_err();
    assert_eq!(err, IndexingError::DTypeMismatch { expected: DType::F32, found: DType::I64 });
    assert_eq!(floats(&t), vec![0.0; 3]);
}

#[test]
fn unbroadcastable_value_leaves_target_alone() {
    let t = grid(&[2, 3]);
    let err = set(&t, &[TensorIndex::from(..)], Tensor::from_slice(&[1i64, 2])).unwrap_err();
    assert!(err.is_value_error());
    assert_eq!(
        err.to_string(),
        "ValueError: shape mismatch: value tensor of shape [2] cannot be broadcast to indexing result of shape [2, 3]"
    );
    assert_eq!(ints(&t), (0..6).collect::<Vec<i64>>());
}

#[test]
fn value_device_must_match_unless_zero_dim() {
    let t = Tensor::zeros::<f32>(&[3]).to_device(Device::Virtual(0));
    let err = set(&t, &[], Tensor::from_slice(&[1.0f32, 2.0, 3.0])).unwrap_err();
    assert_eq!(err, IndexingError::DeviceMismatch { expected: Device::Virtual(0), found: Device::Cpu });
    set(&t, &[TensorIndex::from(1)], Tensor::scalar(5.0f32)).unwrap();
    assert_eq!(floats(&t), vec![0.0, 5.0, 0.0]);
}

#[test]
fn overlapping_value_is_read_before_write() {
    let t = Tensor::arange::<i64>(5).unwrap();
    let src = get(&t, &[TensorIndex::from(Slice::range(0, 4))]).unwrap();
    set(&t, &[TensorIndex::from(Slice::range(1, 5))], &src).unwrap();
    assert_eq!(ints(&t), vec![0, 0, 1, 2, 3]);
}

#[test]
fn mask_assignment() {
    let t = grid(&[2, 3]);
    let odd = Tensor::from_vec(vec![false, true, false, true, false, true], &[2, 3]).unwrap();
    set(&t, &[TensorIndex::from(&odd)], 0i64).unwrap();
    assert_eq!(ints(&t), vec![0, 0, 2, 0, 4, 0]);
}

#[test]
fn advanced_assignment_through_basic_view() {
    let t = Tensor::zeros::<i64>(&[3, 4]);
    let cols = Tensor::from_slice(&[3i64, 1]);
    set(&t, &[TensorIndex::from(-2), TensorIndex::from(&cols)], Tensor::from_slice(&[8i64, 9])).unwrap();
    assert_eq!(ints(&t), vec![0, 0, 0, 0, 0, 9, 0, 8, 0, 0, 0, 0]);
}

#[test]
fn tensor_methods_delegate() {
    let t = grid(&[2, 2]);
    t.index_put_(&[TensorIndex::from(0)], 5i64).unwrap().index_put_(&[TensorIndex::from(1), TensorIndex::from(1)], 6i64).unwrap();
    assert_eq!(ints(&t.index(&[TensorIndex::from(..)]).unwrap()), vec![5, 5, 2, 6]);
}

#[test]
fn byte_masks_can_be_disabled() {
    let t = grid(&[3]);
    let expr = [TensorIndex::from(Tensor::from_slice(&[1u8, 0, 1]))];
    assert_eq!(ints(&get(&t, &expr).unwrap()), vec![0, 2]);
    let strict = Indexer::new(IndexConfig { allow_uint8_masks: false, ..Default::default() });
    assert!(strict.get(&t, &expr).unwrap_err().is_index_error());
}

#[test]
fn zero_step_is_value_error() {
    let t = grid(&[3]);
    let err = get(&t, &[TensorIndex::from(Slice::every(0))]).unwrap_err();
    assert_eq!(err.to_string(), "ValueError: slice step cannot be zero");
}

#[test]
fn empty_selection_assignment_is_noop() {
    let t = grid(&[2, 3]);
    let none = Tensor::full(&[2], false);
    set(&t, &[TensorIndex::from(&none)], Tensor::from_slice(&[7i64, 7, 7])).unwrap();
    assert_eq!(ints(&t), (0..6).collect::<Vec<i64>>());
}

#[test]
fn failed_advanced_assignment_leaves_target_alone() {
    init();
    let original: Vec<i64> = (0..12).collect();
    let cases = vec![
        vec![TensorIndex::from(Tensor::from_slice(&[0i64, 1, 5]))],
        vec![TensorIndex::from(..), TensorIndex::from(Tensor::from_slice(&[-5i64, 0]))],
        vec![TensorIndex::from(Tensor::from_slice(&[0i64, 1])), TensorIndex::from(Tensor::from_slice(&[0i64, 1, 2]))],
        vec![TensorIndex::from(Tensor::from_slice(&[true, false]))],
        vec![TensorIndex::from(1), TensorIndex::from(Tensor::full(&[3], true))],
    ];
    for expr in &cases {
        let t = grid(&[3, 4]);
        let err = set(&t, expr, 9i64).unwrap_err();
        assert!(err.is_index_error() || err.is_value_error(), "expression {}", format_expression(expr));
        assert_eq!(ints(&t), original, "expression {}", format_expression(expr));
    }

    let t = grid(&[3, 4]);
    let rows = Tensor::from_slice(&[0i64, 2]);
    let err = set(&t, &[TensorIndex::from(&rows)], Tensor::from_slice(&[1i64, 2, 3])).unwrap_err();
    assert!(err.is_value_error());
    assert_eq!(ints(&t), original);
}

#[test]
fn indexer_keeps_its_config() {
    let config = IndexConfig { allow_uint8_masks: false, ..Default::default() };
    let indexer = Indexer::new(config.clone());
    assert_eq!(indexer.config(), &config);
    assert_eq!(Indexer::default().config(), &IndexConfig::default());
}
