//! The three discovery-side rule filters.
//!
//! Each filter takes the rule indicator matrix and returns the indices of
//! the surviving columns in their original order, so the caller can subset
//! both the rule list and the matrix consistently. An empty rule set passes
//! through every filter unchanged.

use itertools::izip;

use crate::error::{Error, Result};
use crate::matrix::RuleMatrix;

/// Drop rules whose relative variance decay on the ITE falls below
/// `t_decay`. Returns the kept indices together with their decay scores,
/// which the correlation filter uses as relevance ranking.
pub fn filter_irrelevant(
    matrix: &RuleMatrix,
    ite: &[f64],
    t_decay: f64,
) -> Result<(Vec<usize>, Vec<f64>)> {
    if matrix.nrows() != ite.len() {
        return Err(Error::InvalidInput(format!(
            "rule matrix has {} rows but the ite vector has {}",
            matrix.nrows(),
            ite.len()
        )));
    }

    let n = ite.len() as f64;
    let mean = ite.iter().sum::<f64>() / n;
    let var_total = ite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

    let mut kept = Vec::new();
    let mut scores = Vec::new();
    for j in 0..matrix.ncols() {
        let decay = variance_decay(matrix, j, ite, var_total);
        if decay >= t_decay {
            kept.push(j);
            scores.push(decay);
        }
    }
    Ok((kept, scores))
}

/// Relative reduction of ITE variance when splitting the sample on the
/// indicator of rule `j`. Zero when the total variance vanishes or the
/// rule does not separate the sample.
fn variance_decay(matrix: &RuleMatrix, j: usize, ite: &[f64], var_total: f64) -> f64 {
    if var_total <= 0.0 {
        return 0.0;
    }
    let column = matrix.values().column(j);

    let mut sum = [0.0f64; 2];
    let mut sq = [0.0f64; 2];
    let mut count = [0usize; 2];
    for (&ind, &v) in izip!(column.iter(), ite.iter()) {
        let side = usize::from(ind != 0.0);
        sum[side] += v;
        sq[side] += v * v;
        count[side] += 1;
    }

    let n = ite.len() as f64;
    let within: f64 = (0..2)
        .map(|side| {
            if count[side] == 0 {
                0.0
            } else {
                sq[side] - sum[side] * sum[side] / count[side] as f64
            }
        })
        .sum::<f64>()
        / n;
    ((var_total - within) / var_total).max(0.0)
}

/// Drop rules whose support is below `t_ext` or above `1 - t_ext`.
pub fn filter_extreme(matrix: &RuleMatrix, t_ext: f64) -> Result<Vec<usize>> {
    if matrix.ncols() > 0 && matrix.nrows() == 0 {
        return Err(Error::InvalidInput(
            "rule matrix has columns but no rows".to_string(),
        ));
    }
    Ok((0..matrix.ncols())
        .filter(|&j| {
            let support = matrix.support(j);
            support >= t_ext && support <= 1.0 - t_ext
        })
        .collect())
}

/// Drop the lower-scored member of every rule pair whose indicator columns
/// correlate beyond `t_corr` in absolute value.
///
/// Rules are visited in decreasing relevance score; without scores the
/// generation order ranks them, so the earlier-generated rule of a
/// conflicting pair is kept. The first rule visited in any correlated group
/// always survives.
pub fn filter_correlated(
    matrix: &RuleMatrix,
    scores: Option<&[f64]>,
    t_corr: f64,
) -> Result<Vec<usize>> {
    let k = matrix.ncols();
    if let Some(scores) = scores {
        if scores.len() != k {
            return Err(Error::InvalidInput(format!(
                "rule matrix has {} columns but {} relevance scores were given",
                k,
                scores.len()
            )));
        }
    }

    let mut order: Vec<usize> = (0..k).collect();
    if let Some(scores) = scores {
        // stable sort keeps generation order among equal scores
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let mut kept: Vec<usize> = Vec::new();
    for &j in &order {
        let conflict = kept
            .iter()
            .any(|&i| pearson(matrix, i, j).abs() > t_corr);
        if !conflict {
            kept.push(j);
        }
    }
    kept.sort_unstable();
    Ok(kept)
}

fn pearson(matrix: &RuleMatrix, i: usize, j: usize) -> f64 {
    let n = matrix.nrows() as f64;
    if n == 0.0 {
        return 0.0;
    }
    let a = matrix.values().column(i);
    let b = matrix.values().column(j);
    let ma = a.sum() / n;
    let mb = b.sum() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in izip!(a.iter(), b.iter()) {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    }
    if va <= 0.0 || vb <= 0.0 {
        return 0.0;
    }
    cov / (va.sqrt() * vb.sqrt())
}
