//! Train/test partitioning.

use crate::error::Result;
use polars::prelude::*;
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;

/// Test subset size for `rows` rows: the nearest integer to `test_size * rows`,
/// with an exact half rounding down so the leftover row goes to training.
pub fn test_rows(test_size: f64, rows: usize) -> usize {
    let exact = test_size * rows as f64;
    let floor = exact.floor();
    let n = if exact - floor > 0.5 { floor + 1.0 } else { floor };
    (n.max(0.0) as usize).min(rows)
}

/// Shuffled row indices. Reproducible when `seed` is set.
pub fn shuffled_indices(rows: usize, seed: Option<u64>) -> Vec<IdxSize> {
    let mut idx: Vec<IdxSize> = (0..rows as IdxSize).collect();
    match seed {
        Some(seed) => idx.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => idx.shuffle(&mut rand::rng()),
    }
    idx
}

#[derive(Debug, Clone)]
pub struct Split {
    pub train: DataFrame,
    pub test: DataFrame,
}

/// Partition `frame` into train and test. The first `test_rows` shuffled indices
/// form the test subset; each subset keeps the shuffled order.
///
/// # Errors
///
/// Propagates Polars errors from the row gather.
pub fn split_frame(frame: &DataFrame, test_size: f64, seed: Option<u64>) -> Result<Split> {
    let rows = frame.height();
    let test_n = test_rows(test_size, rows);
    let mut idx = shuffled_indices(rows, seed);
    let train_idx = idx.split_off(test_n);

    let test = frame.take(&IdxCa::from_vec("test".into(), idx))?;
    let train = frame.take(&IdxCa::from_vec("train".into(), train_idx))?;
    Ok(Split { train, test })
}
