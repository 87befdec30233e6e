use anyhow::{Context, Result};
use log::info;

use grownet_index::{format_expression, DType, IndexConfig, Indexer, Slice, Tensor, TensorIndex};

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).context(format!("Failed to read {}", path))?;
            IndexConfig::from_ron(&text)?
        }
        None => IndexConfig::default(),
    };
    info!("using {:?}", config);
    let indexer = Indexer::new(config);

    let t = Tensor::arange::<f32>(24)?.reshape(&[2, 3, 4])?;
    println!("t =\n{}", t);

    let expr = vec![TensorIndex::Ellipsis, TensorIndex::from(Slice::every(-2))];
    let view = indexer.get(&t, &expr)?;
    println!("t{} =\n{}", format_expression(&expr), view);

    let rows = Tensor::from_slice(&[2i64, 0]);
    let expr = vec![TensorIndex::from(1), TensorIndex::from(&rows), TensorIndex::None];
    let copy = indexer.get(&t, &expr)?;
    println!("t{} =\n{}", format_expression(&expr), copy);

    let mask = Tensor::from_vec(vec![true, false, true, false], &[4])?;
    let expr = vec![TensorIndex::Ellipsis, TensorIndex::from(&mask)];
    indexer.set(&t, &expr, -1.0)?;
    println!("after t{} = -1\n{}", format_expression(&expr), t);

    let q = Tensor::zeros::<f32>(&[2, 2]).quantize(0.25, 0, DType::QUInt8)?;
    indexer.set(&q, &[TensorIndex::from(0)], 1.75)?;
    println!("quantized after q[0] = 1.75\n{}", q.dequantize()?);
    Ok(())
}
