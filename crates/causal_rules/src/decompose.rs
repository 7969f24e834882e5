//! CATE decomposition: unpenalized refit of the selected rules with
//! per-rule inference.
//!
//! Selection and inference are deliberately separate stages: the selector
//! decides which indicator columns enter, this module refits them without a
//! penalty and attaches standard errors and p-values, so the inferential
//! output is auditable on its own.

use core::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{Error, Result};
use crate::matrix::RuleMatrix;
use crate::rules::Rule;

/// Label of the intercept row of a [`CateTable`].
pub const BASELINE_LABEL: &str = "baseline";

const CONFIDENCE_LEVEL: f64 = 0.95;

/// One row of the decomposition summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CateRow {
    pub rule: String,
    pub estimate: f64,
    pub std_error: f64,
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Decomposition summary: the baseline row first, then one row per
/// surviving rule in discovery order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CateTable {
    pub rows: Vec<CateRow>,
}

impl fmt::Display for CateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<40} {:>10} {:>10} {:>10}",
            "Rule", "Estimate", "Std.Error", "p-value"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<40} {:>10.4} {:>10.4} {:>10.4}",
                row.rule, row.estimate, row.std_error, row.p_value
            )?;
        }
        Ok(())
    }
}

/// The fitted linear decomposition: an intercept plus one coefficient per
/// surviving rule. Predicts per-unit effects from a rule indicator matrix.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CateModel {
    pub rule_names: Vec<String>,
    /// Intercept first, then one coefficient per rule.
    pub coefficients: Vec<f64>,
}

impl CateModel {
    /// Predict one effect per row of `matrix`.
    ///
    /// The matrix columns must match the model's rules by name and order.
    pub fn predict(&self, matrix: &RuleMatrix) -> Result<Vec<f64>> {
        if matrix.names() != self.rule_names.as_slice() {
            return Err(Error::InvalidInput(
                "rule matrix columns do not match the fitted rules".to_string(),
            ));
        }
        let n = matrix.nrows();
        let mut out = vec![self.coefficients[0]; n];
        for (j, coef) in self.coefficients.iter().skip(1).enumerate() {
            for i in 0..n {
                out[i] += coef * matrix.values()[(i, j)];
            }
        }
        Ok(out)
    }
}

/// A fitted decomposition together with its summary and surviving rules.
#[derive(Clone, Debug)]
pub struct CateDecomposition {
    pub model: CateModel,
    pub summary: CateTable,
    /// Indices (into the input rule list) of the significant rules.
    pub kept: Vec<usize>,
}

/// Fit the unpenalized decomposition and filter insignificant rules.
///
/// Refits iteratively, dropping the worst rule with p-value above
/// `t_pvalue` each round; the intercept is always retained. An empty rule
/// set yields the intercept-only model whose estimate is the mean ITE.
pub fn decompose(
    matrix: &RuleMatrix,
    rules: &[Rule],
    ite: &[f64],
    t_pvalue: f64,
) -> Result<CateDecomposition> {
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
    if ite.is_empty() {
        return Err(Error::InvalidInput("empty ite vector".to_string()));
    }

    let mut kept: Vec<usize> = (0..rules.len()).collect();
    loop {
        let fit = least_squares(matrix, &kept, ite)?;

        // p-values of the rule coefficients (intercept excluded)
        let worst = kept
            .iter()
            .enumerate()
            .map(|(pos, _)| (pos, fit.p_values[pos + 1]))
            .filter(|(_, p)| *p > t_pvalue)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match worst {
            Some((pos, _)) => {
                kept.remove(pos);
            }
            None => {
                let rows = summary_rows(&fit, &kept, rules);
                let model = CateModel {
                    rule_names: kept.iter().map(|&j| rules[j].expression()).collect(),
                    coefficients: fit.coefficients.clone(),
                };
                return Ok(CateDecomposition {
                    model,
                    summary: CateTable { rows },
                    kept,
                });
            }
        }
    }
}

struct LeastSquaresFit {
    coefficients: Vec<f64>,
    std_errors: Vec<f64>,
    p_values: Vec<f64>,
    t_quantile: f64,
}

/// Plain least squares of `ite` on the kept indicator columns plus an
/// intercept, via the SVD pseudo-inverse so collinear survivors cannot
/// abort the fit.
fn least_squares(matrix: &RuleMatrix, kept: &[usize], ite: &[f64]) -> Result<LeastSquaresFit> {
    let n = ite.len();
    let k = kept.len();

    let mut x = DMatrix::zeros(n, k + 1);
    for i in 0..n {
        x[(i, 0)] = 1.0;
    }
    for (c, &j) in kept.iter().enumerate() {
        for i in 0..n {
            x[(i, c + 1)] = matrix.values()[(i, j)];
        }
    }
    let y = DVector::from_column_slice(ite);

    let xtx = x.transpose() * &x;
    let xtx_inv = xtx
        .pseudo_inverse(1e-12)
        .map_err(|e| Error::Estimation(format!("least squares failed: {}", e)))?;
    let beta = &xtx_inv * (x.transpose() * &y);

    let residuals = &y - &x * &beta;
    let df = n as f64 - (k + 1) as f64;
    let sigma2 = if df > 0.0 {
        residuals.dot(&residuals) / df
    } else {
        0.0
    };

    let t_dist = if df > 0.0 {
        StudentsT::new(0.0, 1.0, df).ok()
    } else {
        None
    };
    let t_quantile = t_dist
        .as_ref()
        .map(|d| d.inverse_cdf(0.5 + CONFIDENCE_LEVEL / 2.0))
        .unwrap_or(f64::NAN);

    let mut coefficients = Vec::with_capacity(k + 1);
    let mut std_errors = Vec::with_capacity(k + 1);
    let mut p_values = Vec::with_capacity(k + 1);
    for c in 0..k + 1 {
        let est = beta[c];
        let var = (sigma2 * xtx_inv[(c, c)]).max(0.0);
        let se = var.sqrt();
        let p = match (&t_dist, se > 0.0) {
            (Some(d), true) => 2.0 * (1.0 - d.cdf((est / se).abs())),
            // a zero standard error leaves no uncertainty about the sign
            (_, false) if est.abs() > 1e-12 => 0.0,
            _ => 1.0,
        };
        coefficients.push(est);
        std_errors.push(se);
        p_values.push(p);
    }

    Ok(LeastSquaresFit {
        coefficients,
        std_errors,
        p_values,
        t_quantile,
    })
}

fn summary_rows(fit: &LeastSquaresFit, kept: &[usize], rules: &[Rule]) -> Vec<CateRow> {
    let mut rows = Vec::with_capacity(kept.len() + 1);
    rows.push(make_row(BASELINE_LABEL.to_string(), fit, 0));
    for (pos, &j) in kept.iter().enumerate() {
        rows.push(make_row(rules[j].expression(), fit, pos + 1));
    }
    rows
}

fn make_row(rule: String, fit: &LeastSquaresFit, c: usize) -> CateRow {
    let margin = fit.t_quantile * fit.std_errors[c];
    CateRow {
        rule,
        estimate: fit.coefficients[c],
        std_error: fit.std_errors[c],
        p_value: fit.p_values[c],
        ci_lower: fit.coefficients[c] - margin,
        ci_upper: fit.coefficients[c] + margin,
    }
}
