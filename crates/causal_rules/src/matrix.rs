//! Binary rule indicator matrices.

use nalgebra::DMatrix;
use polars::prelude::*;

use crate::error::{Error, Result};
use crate::rules::Rule;

/// One column of 0/1 indicators per rule, one row per observation.
///
/// Always regenerable from the covariates and the rule set; building is
/// deterministic and independent of any filtering history.
#[derive(Clone, Debug)]
pub struct RuleMatrix {
    names: Vec<String>,
    values: DMatrix<f64>,
}

impl RuleMatrix {
    /// Evaluate every rule row-wise against `covariates`.
    pub fn build(covariates: &DataFrame, rules: &[Rule]) -> Result<Self> {
        let n = covariates.height();
        let k = rules.len();
        let mut values = DMatrix::zeros(n, k);
        let mut names = Vec::with_capacity(k);
        for (j, rule) in rules.iter().enumerate() {
            let mask = rule.evaluate(covariates)?;
            for (i, hit) in mask.into_iter().enumerate() {
                if hit {
                    values[(i, j)] = 1.0;
                }
            }
            names.push(rule.expression());
        }
        Ok(RuleMatrix { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Fraction of observations satisfying rule `j`.
    pub fn support(&self, j: usize) -> f64 {
        if self.nrows() == 0 {
            return 0.0;
        }
        self.values.column(j).sum() / self.nrows() as f64
    }

    /// Keep only the given columns, in the given order.
    pub fn select_columns(&self, keep: &[usize]) -> RuleMatrix {
        let names = keep.iter().map(|&j| self.names[j].clone()).collect();
        let values = self.values.select_columns(keep.iter());
        RuleMatrix { names, values }
    }
}
