//! Meta-learner style ITE estimators built on the GLM module.

use nalgebra::DMatrix;
use polars::prelude::*;

use crate::api::{column_values, design_matrix, validate_inputs, EstimateError, IteEstimator};
use crate::glm::{LinearModel, PoissonModel};

/// Single outcome model over covariates, treatment, and their interactions.
/// The per-unit effect is the prediction difference between the two
/// counterfactual treatment assignments.
pub struct SLearner {
    pub l2: f64,
}

impl Default for SLearner {
    fn default() -> Self {
        SLearner { l2: 1e-3 }
    }
}

impl SLearner {
    fn augmented(xm: &DMatrix<f64>, z: &[f64]) -> DMatrix<f64> {
        let n = xm.nrows();
        let p = xm.ncols();
        let mut out = DMatrix::zeros(n, 2 * p + 1);
        out.view_mut((0, 0), (n, p)).copy_from(xm);
        for i in 0..n {
            out[(i, p)] = z[i];
            for j in 0..p {
                out[(i, p + 1 + j)] = z[i] * xm[(i, j)];
            }
        }
        out
    }
}

impl IteEstimator for SLearner {
    fn estimate(&self, y: &[f64], z: &[f64], x: &DataFrame) -> Result<Vec<f64>, EstimateError> {
        validate_inputs(y, z, x)?;
        let (_, xm) = design_matrix(x, None)?;
        let model = LinearModel::fit(&Self::augmented(&xm, z), y, self.l2)?;

        let ones = vec![1.0; y.len()];
        let zeros = vec![0.0; y.len()];
        let p1 = model.predict(&Self::augmented(&xm, &ones));
        let p0 = model.predict(&Self::augmented(&xm, &zeros));
        Ok(p1.iter().zip(p0.iter()).map(|(a, b)| a - b).collect())
    }
}

/// One outcome model per treatment arm; the per-unit effect is the
/// difference of the two arm predictions.
pub struct TLearner {
    pub l2: f64,
}

impl Default for TLearner {
    fn default() -> Self {
        TLearner { l2: 1e-3 }
    }
}

impl IteEstimator for TLearner {
    fn estimate(&self, y: &[f64], z: &[f64], x: &DataFrame) -> Result<Vec<f64>, EstimateError> {
        validate_inputs(y, z, x)?;
        let (_, xm) = design_matrix(x, None)?;
        let n = y.len();

        let fit_arm = |arm: f64| -> Result<LinearModel, EstimateError> {
            let rows: Vec<usize> = (0..n).filter(|&i| z[i] == arm).collect();
            let xa = xm.select_rows(rows.iter());
            let ya: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
            LinearModel::fit(&xa, &ya, self.l2)
        };
        let mu1 = fit_arm(1.0)?.predict(&xm);
        let mu0 = fit_arm(0.0)?.predict(&xm);
        Ok(mu1.iter().zip(mu0.iter()).map(|(a, b)| a - b).collect())
    }
}

/// Poisson T-learner for count outcomes with an optional exposure offset.
///
/// When `offset` names a covariate, that column is treated as a positive
/// exposure, enters the per-arm models as a log offset and is excluded from
/// the design. The per-unit effect is the rate difference at unit exposure.
pub struct TPoisson {
    pub offset: Option<String>,
    pub l2: f64,
}

impl TPoisson {
    pub fn new(offset: Option<String>) -> Self {
        TPoisson { offset, l2: 1e-3 }
    }
}

impl IteEstimator for TPoisson {
    fn estimate(&self, y: &[f64], z: &[f64], x: &DataFrame) -> Result<Vec<f64>, EstimateError> {
        validate_inputs(y, z, x)?;
        let (_, xm) = design_matrix(x, self.offset.as_deref())?;
        let n = y.len();

        let log_offset = match self.offset.as_deref() {
            Some(name) => {
                let exposure = column_values(x, name)?;
                if exposure.iter().any(|&v| v <= 0.0) {
                    return Err(EstimateError::InvalidInput(format!(
                        "offset covariate '{}' must be strictly positive",
                        name
                    )));
                }
                Some(exposure.iter().map(|v| v.ln()).collect::<Vec<f64>>())
            }
            None => None,
        };

        let fit_arm = |arm: f64| -> Result<PoissonModel, EstimateError> {
            let rows: Vec<usize> = (0..n).filter(|&i| z[i] == arm).collect();
            let xa = xm.select_rows(rows.iter());
            let ya: Vec<f64> = rows.iter().map(|&i| y[i]).collect();
            let oa: Option<Vec<f64>> = log_offset
                .as_ref()
                .map(|o| rows.iter().map(|&i| o[i]).collect());
            PoissonModel::fit(&xa, &ya, oa.as_deref(), self.l2)
        };
        let r1 = fit_arm(1.0)?.predict_rate(&xm);
        let r0 = fit_arm(0.0)?.predict_rate(&xm);
        Ok(r1.iter().zip(r0.iter()).map(|(a, b)| a - b).collect())
    }
}
