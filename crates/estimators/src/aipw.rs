//! Doubly robust AIPW estimation of per-unit treatment effects.

use polars::prelude::*;

use crate::api::{design_matrix, validate_inputs, EstimateError, IteEstimator};
use crate::glm::{LinearModel, LogisticModel};

const PROPENSITY_CLIP: (f64, f64) = (0.01, 0.99);

/// Augmented inverse propensity weighting.
///
/// Propensity scores come from a ridge-stabilized logistic regression,
/// outcome surfaces from one ridge model per treatment arm. The per-unit
/// estimate is the AIPW pseudo-outcome
/// `mu1 - mu0 + z*(y - mu1)/e - (1-z)*(y - mu0)/(1-e)`.
pub struct Aipw {
    pub l2_propensity: f64,
    pub l2_outcome: f64,
}

impl Default for Aipw {
    fn default() -> Self {
        Aipw {
            l2_propensity: 1e-3,
            l2_outcome: 1e-3,
        }
    }
}

impl IteEstimator for Aipw {
    fn estimate(&self, y: &[f64], z: &[f64], x: &DataFrame) -> Result<Vec<f64>, EstimateError> {
        validate_inputs(y, z, x)?;
        let (_, xm) = design_matrix(x, None)?;
        let n = y.len();

        let propensity = LogisticModel::fit(&xm, z, self.l2_propensity)?;
        let e = propensity.predict_proba(&xm);

        let treated_rows: Vec<usize> = (0..n).filter(|&i| z[i] == 1.0).collect();
        let control_rows: Vec<usize> = (0..n).filter(|&i| z[i] == 0.0).collect();
        let fit_arm = |rows: &[usize]| -> Result<LinearModel, EstimateError> {
            let xa = xm.select_rows(rows.iter());
            let ya: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
            LinearModel::fit(&xa, &ya, self.l2_outcome)
        };
        let mu1 = fit_arm(&treated_rows)?.predict(&xm);
        let mu0 = fit_arm(&control_rows)?.predict(&xm);

        let ite = (0..n)
            .map(|i| {
                let e_i = e[i].clamp(PROPENSITY_CLIP.0, PROPENSITY_CLIP.1);
                mu1[i] - mu0[i] + z[i] * (y[i] - mu1[i]) / e_i
                    - (1.0 - z[i]) * (y[i] - mu0[i]) / (1.0 - e_i)
            })
            .collect();
        Ok(ite)
    }
}
