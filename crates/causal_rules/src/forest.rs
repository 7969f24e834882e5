//! Tree-ensemble engines behind the rule generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::tree::{RegressionTree, TreeParams};

/// Fraction of rows drawn when bootstrapping without replacement.
const SUBSAMPLE_FRACTION: f64 = 0.632;

const BOOST_LEARNING_RATE: f64 = 0.1;

/// Fit `ntrees` bootstrap-aggregated trees in parallel.
///
/// Each tree gets its own seed derived from `seed` so the ensemble is
/// reproducible regardless of scheduling.
pub fn fit_bagged(
    cols: &[Vec<f64>],
    target: &[f64],
    params: &TreeParams,
    ntrees: usize,
    replace: bool,
    seed: u64,
) -> Vec<RegressionTree> {
    let n = target.len();
    (0..ntrees)
        .into_par_iter()
        .map(|idx| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(idx as u64));
            let rows: Vec<u32> = if replace {
                (0..n).map(|_| rng.random_range(0..n) as u32).collect()
            } else {
                let m = ((n as f64) * SUBSAMPLE_FRACTION).ceil() as usize;
                sample_without_replacement(n, m.min(n), &mut rng)
            };
            RegressionTree::fit(cols, target, &rows, params, &mut rng)
        })
        .collect()
}

/// Fit `ntrees` gradient-boosted trees on squared-error residuals.
///
/// Boosting is inherently sequential; each round fits the full sample with
/// shrinkage applied to the fitted values.
pub fn fit_boosted(
    cols: &[Vec<f64>],
    target: &[f64],
    params: &TreeParams,
    ntrees: usize,
    seed: u64,
) -> Vec<RegressionTree> {
    let n = target.len();
    let rows: Vec<u32> = (0..n as u32).collect();
    let base = target.iter().sum::<f64>() / n as f64;
    let mut predictions = vec![base; n];
    let mut trees = Vec::with_capacity(ntrees);

    for idx in 0..ntrees {
        let residuals: Vec<f64> = target
            .iter()
            .zip(predictions.iter())
            .map(|(t, p)| t - p)
            .collect();
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(idx as u64));
        let tree = RegressionTree::fit(cols, &residuals, &rows, params, &mut rng);
        for (i, pred) in predictions.iter_mut().enumerate() {
            *pred += BOOST_LEARNING_RATE * tree.predict_row(cols, i);
        }
        trees.push(tree);
    }
    trees
}

fn sample_without_replacement(n: usize, m: usize, rng: &mut StdRng) -> Vec<u32> {
    let mut all: Vec<u32> = (0..n as u32).collect();
    for i in 0..m {
        let j = rng.random_range(i..n);
        all.swap(i, j);
    }
    all.truncate(m);
    all
}
