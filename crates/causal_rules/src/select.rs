//! Sparse rule selection on the inference subsample.
//!
//! The workhorse is an L1-penalized linear fit by cyclical coordinate
//! descent over standardized indicator columns, with per-column penalty
//! weights `(rule length)^penalty_rl`. Selection either runs stability
//! selection (subsampled paths, selection-frequency cutoff, expected
//! false-selection bound) or a single 5-fold cross-validated fit.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::conf::HyperParams;
use crate::error::{Error, Result};
use crate::matrix::RuleMatrix;
use crate::rules::Rule;

const N_LAMBDA: usize = 50;
const LAMBDA_RATIO: f64 = 1e-3;
const CD_MAX_SWEEPS: usize = 1000;
const CD_TOL: f64 = 1e-6;
const N_SUBSAMPLES: usize = 100;
const N_FOLDS: usize = 5;

/// Select a minimal subset of rules explaining the ITE.
///
/// Returns the indices of the selected columns in their original order;
/// possibly empty. Deterministic for a fixed `seed`.
pub fn select_rules(
    matrix: &RuleMatrix,
    rules: &[Rule],
    ite: &[f64],
    hyper: &HyperParams,
    seed: u64,
) -> Result<Vec<usize>> {
    if matrix.ncols() != rules.len() {
        return Err(Error::InvalidInput(format!(
            "rule matrix has {} columns but {} rules were given",
            matrix.ncols(),
            rules.len()
        )));
    }
    if matrix.nrows() != ite.len() {
        return Err(Error::InvalidInput(format!(
            "rule matrix has {} rows but the ite vector has {}",
            matrix.nrows(),
            ite.len()
        )));
    }
    if rules.is_empty() {
        return Ok(Vec::new());
    }

    let weights: Vec<f64> = rules
        .iter()
        .map(|r| (r.len() as f64).powf(hyper.penalty_rl))
        .collect();

    if hyper.stability_selection {
        Ok(stability_select(
            matrix.values(),
            ite,
            &weights,
            hyper.cutoff,
            hyper.pfer,
            seed,
        ))
    } else {
        Ok(cv_select(matrix.values(), ite, &weights, seed))
    }
}

// ---------------------------------------------------------------------------
// Standardization
// ---------------------------------------------------------------------------

struct Standardized {
    xs: DMatrix<f64>,
    yc: DVector<f64>,
    included: Vec<bool>,
    means: Vec<f64>,
    sds: Vec<f64>,
    y_mean: f64,
}

/// Center and scale the chosen rows; zero-variance columns are excluded
/// from the fit entirely (their coefficient stays zero).
fn standardize(raw: &DMatrix<f64>, ite: &[f64], rows: &[usize]) -> Standardized {
    let m = rows.len();
    let k = raw.ncols();
    let mut xs = DMatrix::zeros(m, k);
    let mut included = vec![false; k];
    let mut means = vec![0.0; k];
    let mut sds = vec![1.0; k];

    for j in 0..k {
        let mean = rows.iter().map(|&i| raw[(i, j)]).sum::<f64>() / m as f64;
        let var = rows
            .iter()
            .map(|&i| (raw[(i, j)] - mean) * (raw[(i, j)] - mean))
            .sum::<f64>()
            / m as f64;
        means[j] = mean;
        if var > 0.0 {
            let sd = var.sqrt();
            sds[j] = sd;
            included[j] = true;
            for (r, &i) in rows.iter().enumerate() {
                xs[(r, j)] = (raw[(i, j)] - mean) / sd;
            }
        }
    }

    let y_mean = rows.iter().map(|&i| ite[i]).sum::<f64>() / m as f64;
    let yc = DVector::from_iterator(m, rows.iter().map(|&i| ite[i] - y_mean));
    Standardized {
        xs,
        yc,
        included,
        means,
        sds,
        y_mean,
    }
}

// ---------------------------------------------------------------------------
// Coordinate descent
// ---------------------------------------------------------------------------

fn soft_threshold(rho: f64, t: f64) -> f64 {
    if rho > t {
        rho - t
    } else if rho < -t {
        rho + t
    } else {
        0.0
    }
}

/// One lasso fit at a fixed lambda, warm-started from `beta`; the residual
/// vector is kept in sync incrementally.
fn coordinate_descent(
    std: &Standardized,
    weights: &[f64],
    lambda: f64,
    beta: &mut DVector<f64>,
    residual: &mut DVector<f64>,
) {
    let n = std.xs.nrows() as f64;
    for _ in 0..CD_MAX_SWEEPS {
        let mut max_delta = 0.0f64;
        for j in 0..std.xs.ncols() {
            if !std.included[j] {
                continue;
            }
            let xj = std.xs.column(j);
            let old = beta[j];
            let rho = xj.dot(residual) / n + old;
            let new = soft_threshold(rho, lambda * weights[j]);
            if new != old {
                residual.axpy(old - new, &xj, 1.0);
                beta[j] = new;
            }
            max_delta = max_delta.max((new - old).abs());
        }
        if max_delta < CD_TOL {
            break;
        }
    }
}

fn lambda_grid(std: &Standardized, weights: &[f64]) -> Vec<f64> {
    let n = std.xs.nrows() as f64;
    let mut lambda_max = 0.0f64;
    for j in 0..std.xs.ncols() {
        if std.included[j] {
            let w = weights[j].max(1e-12);
            lambda_max = lambda_max.max((std.xs.column(j).dot(&std.yc) / n).abs() / w);
        }
    }
    if lambda_max <= 0.0 {
        return Vec::new();
    }
    (0..N_LAMBDA)
        .map(|i| lambda_max * LAMBDA_RATIO.powf(i as f64 / (N_LAMBDA - 1) as f64))
        .collect()
}

/// Walk the lambda path from sparse to dense, recording columns in the
/// order they first enter the active set, until `q` have entered.
fn path_entry_order(std: &Standardized, weights: &[f64], q: usize) -> Vec<usize> {
    let grid = lambda_grid(std, weights);
    let mut beta = DVector::zeros(std.xs.ncols());
    let mut residual = std.yc.clone();
    let mut entered: Vec<usize> = Vec::new();

    for &lambda in &grid {
        coordinate_descent(std, weights, lambda, &mut beta, &mut residual);
        for j in 0..std.xs.ncols() {
            if beta[j] != 0.0 && !entered.contains(&j) {
                entered.push(j);
            }
        }
        if entered.len() >= q {
            break;
        }
    }
    entered.truncate(q);
    entered
}

// ---------------------------------------------------------------------------
// Stability selection
// ---------------------------------------------------------------------------

/// Meinshausen-Buhlmann stability selection: the per-subsample active-set
/// size `q` is the largest integer with expected false selections
/// `q^2 / ((2*cutoff - 1) * k)` below `pfer`.
fn stability_select(
    raw: &DMatrix<f64>,
    ite: &[f64],
    weights: &[f64],
    cutoff: f64,
    pfer: f64,
    seed: u64,
) -> Vec<usize> {
    let n = raw.nrows();
    let k = raw.ncols();
    let m = (n / 2).max(1);
    let q = ((pfer * (2.0 * cutoff - 1.0) * k as f64).sqrt().floor() as usize).clamp(1, k);

    let hits: Vec<Vec<usize>> = (0..N_SUBSAMPLES)
        .into_par_iter()
        .map(|b| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(b as u64));
            let rows = sample_rows(n, m, &mut rng);
            let std = standardize(raw, ite, &rows);
            path_entry_order(&std, weights, q)
        })
        .collect();

    let mut counts = vec![0usize; k];
    for entered in &hits {
        for &j in entered {
            counts[j] += 1;
        }
    }

    (0..k)
        .filter(|&j| counts[j] as f64 / N_SUBSAMPLES as f64 >= cutoff)
        .collect()
}

fn sample_rows(n: usize, m: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut all: Vec<usize> = (0..n).collect();
    for i in 0..m.min(n) {
        let j = rng.random_range(i..n);
        all.swap(i, j);
    }
    all.truncate(m.min(n));
    all
}

// ---------------------------------------------------------------------------
// Cross-validated selection
// ---------------------------------------------------------------------------

fn cv_select(raw: &DMatrix<f64>, ite: &[f64], weights: &[f64], seed: u64) -> Vec<usize> {
    let n = raw.nrows();
    let k = raw.ncols();
    let all_rows: Vec<usize> = (0..n).collect();
    let full = standardize(raw, ite, &all_rows);
    let grid = lambda_grid(&full, weights);
    if grid.is_empty() {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    for i in (1..n).rev() {
        let j = rng.random_range(0..=i);
        order.swap(i, j);
    }

    let folds = N_FOLDS.min(n);
    let mut mse = vec![0.0f64; grid.len()];
    for f in 0..folds {
        let val: Vec<usize> = order
            .iter()
            .enumerate()
            .filter(|(pos, _)| pos % folds == f)
            .map(|(_, &i)| i)
            .collect();
        let train: Vec<usize> = order
            .iter()
            .enumerate()
            .filter(|(pos, _)| pos % folds != f)
            .map(|(_, &i)| i)
            .collect();
        if train.is_empty() || val.is_empty() {
            continue;
        }

        let std = standardize(raw, ite, &train);
        let mut beta = DVector::zeros(k);
        let mut residual = std.yc.clone();
        for (g, &lambda) in grid.iter().enumerate() {
            coordinate_descent(&std, weights, lambda, &mut beta, &mut residual);
            for &i in &val {
                let mut pred = std.y_mean;
                for j in 0..k {
                    if std.included[j] && beta[j] != 0.0 {
                        pred += beta[j] * (raw[(i, j)] - std.means[j]) / std.sds[j];
                    }
                }
                let err = ite[i] - pred;
                mse[g] += err * err;
            }
        }
    }

    let mut best = 0usize;
    for g in 1..grid.len() {
        if mse[g] < mse[best] {
            best = g;
        }
    }

    // refit on the full sample, warm-starting down the path to the winner
    let mut beta = DVector::zeros(k);
    let mut residual = full.yc.clone();
    for &lambda in grid.iter().take(best + 1) {
        coordinate_descent(&full, weights, lambda, &mut beta, &mut residual);
    }

    (0..k).filter(|&j| beta[j].abs() > 1e-9).collect()
}
