//! Small generalized linear models used by the bundled ITE estimators.
//!
//! All fits go through dense normal equations; systems are solved by
//! Cholesky with an SVD pseudo-inverse fallback for rank-deficient designs.

use nalgebra::{DMatrix, DVector};

use crate::api::EstimateError;

const IRLS_MAX_ITER: usize = 100;
const IRLS_TOL: f64 = 1e-8;

/// Prepend an all-ones intercept column.
pub fn with_intercept(x: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let mut out = DMatrix::zeros(n, x.ncols() + 1);
    for i in 0..n {
        out[(i, 0)] = 1.0;
    }
    out.view_mut((0, 1), (n, x.ncols())).copy_from(x);
    out
}

/// Solve `a * beta = b` for a symmetric positive semi-definite `a`.
fn solve_spd(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>, EstimateError> {
    if let Some(chol) = a.clone().cholesky() {
        return Ok(chol.solve(&b));
    }
    let pinv = a
        .pseudo_inverse(1e-12)
        .map_err(|e| EstimateError::Numerical(e.to_string()))?;
    Ok(pinv * b)
}

/// Ridge penalty matrix that leaves the intercept unpenalized.
fn penalty(n: f64, l2: f64, ncols: usize) -> DMatrix<f64> {
    let mut p = DMatrix::zeros(ncols, ncols);
    for j in 1..ncols {
        p[(j, j)] = l2 * n;
    }
    p
}

/// Linear model with an L2 penalty on the non-intercept coefficients.
#[derive(Clone, Debug)]
pub struct LinearModel {
    pub coefficients: DVector<f64>,
}

impl LinearModel {
    pub fn fit(x: &DMatrix<f64>, y: &[f64], l2: f64) -> Result<Self, EstimateError> {
        if x.nrows() != y.len() || y.is_empty() {
            return Err(EstimateError::InvalidInput(
                "design matrix and response are misaligned".to_string(),
            ));
        }
        let xd = with_intercept(x);
        let yv = DVector::from_column_slice(y);
        let mut xtx = xd.transpose() * &xd;
        xtx += penalty(x.nrows() as f64, l2, xd.ncols());
        let xty = xd.transpose() * yv;
        let coefficients = solve_spd(xtx, xty)?;
        Ok(LinearModel { coefficients })
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> Vec<f64> {
        let xd = with_intercept(x);
        (&xd * &self.coefficients).iter().copied().collect()
    }
}

/// Logistic regression fitted by iteratively reweighted least squares.
#[derive(Clone, Debug)]
pub struct LogisticModel {
    pub coefficients: DVector<f64>,
}

impl LogisticModel {
    pub fn fit(x: &DMatrix<f64>, y: &[f64], l2: f64) -> Result<Self, EstimateError> {
        if x.nrows() != y.len() || y.is_empty() {
            return Err(EstimateError::InvalidInput(
                "design matrix and response are misaligned".to_string(),
            ));
        }
        if y.iter().any(|&v| v != 0.0 && v != 1.0) {
            return Err(EstimateError::InvalidInput(
                "logistic response must be binary 0/1".to_string(),
            ));
        }

        let xd = with_intercept(x);
        let n = xd.nrows();
        let k = xd.ncols();
        let pen = penalty(n as f64, l2, k);
        let mut beta = DVector::zeros(k);

        for _ in 0..IRLS_MAX_ITER {
            let eta = &xd * &beta;
            let mut weights = DVector::zeros(n);
            let mut working = DVector::zeros(n);
            for i in 0..n {
                let p = 1.0 / (1.0 + (-eta[i]).exp());
                let w = (p * (1.0 - p)).max(1e-6);
                weights[i] = w;
                working[i] = eta[i] + (y[i] - p) / w;
            }

            // X^T W X and X^T W z without materializing W
            let mut xw = xd.clone();
            for i in 0..n {
                for j in 0..k {
                    xw[(i, j)] *= weights[i];
                }
            }
            let xtwx = xd.transpose() * &xw + &pen;
            let xtwz = xw.transpose() * &working;
            let next = solve_spd(xtwx, xtwz)?;

            let delta = (&next - &beta).amax();
            beta = next;
            if delta < IRLS_TOL {
                return Ok(LogisticModel { coefficients: beta });
            }
        }
        Err(EstimateError::Numerical(
            "logistic regression did not converge".to_string(),
        ))
    }

    pub fn predict_proba(&self, x: &DMatrix<f64>) -> Vec<f64> {
        let xd = with_intercept(x);
        (&xd * &self.coefficients)
            .iter()
            .map(|eta| 1.0 / (1.0 + (-eta).exp()))
            .collect()
    }
}

/// Poisson regression with a log link and an optional log-exposure offset.
#[derive(Clone, Debug)]
pub struct PoissonModel {
    pub coefficients: DVector<f64>,
}

impl PoissonModel {
    pub fn fit(
        x: &DMatrix<f64>,
        y: &[f64],
        offset: Option<&[f64]>,
        l2: f64,
    ) -> Result<Self, EstimateError> {
        if x.nrows() != y.len() || y.is_empty() {
            return Err(EstimateError::InvalidInput(
                "design matrix and response are misaligned".to_string(),
            ));
        }
        if y.iter().any(|&v| v < 0.0) {
            return Err(EstimateError::InvalidInput(
                "poisson response must be non-negative".to_string(),
            ));
        }
        if let Some(o) = offset {
            if o.len() != y.len() {
                return Err(EstimateError::InvalidInput(
                    "offset length must match the response".to_string(),
                ));
            }
        }

        let xd = with_intercept(x);
        let n = xd.nrows();
        let k = xd.ncols();
        let pen = penalty(n as f64, l2, k);
        let mut beta = DVector::zeros(k);
        // Start the intercept at log of the mean rate to keep IRLS stable
        let mean_y = y.iter().sum::<f64>() / n as f64;
        beta[0] = mean_y.max(1e-12).ln();

        for _ in 0..IRLS_MAX_ITER {
            let mut eta = &xd * &beta;
            if let Some(o) = offset {
                for i in 0..n {
                    eta[i] += o[i];
                }
            }
            let mut weights = DVector::zeros(n);
            let mut working = DVector::zeros(n);
            for i in 0..n {
                let mu = eta[i].exp().clamp(1e-8, 1e12);
                weights[i] = mu;
                let off = offset.map(|o| o[i]).unwrap_or(0.0);
                working[i] = (eta[i] - off) + (y[i] - mu) / mu;
            }

            let mut xw = xd.clone();
            for i in 0..n {
                for j in 0..k {
                    xw[(i, j)] *= weights[i];
                }
            }
            let xtwx = xd.transpose() * &xw + &pen;
            let xtwz = xw.transpose() * &working;
            let next = solve_spd(xtwx, xtwz)?;

            let delta = (&next - &beta).amax();
            beta = next;
            if delta < IRLS_TOL {
                return Ok(PoissonModel { coefficients: beta });
            }
        }
        Err(EstimateError::Numerical(
            "poisson regression did not converge".to_string(),
        ))
    }

    /// Predicted event rate at unit exposure.
    pub fn predict_rate(&self, x: &DMatrix<f64>) -> Vec<f64> {
        let xd = with_intercept(x);
        (&xd * &self.coefficients)
            .iter()
            .map(|eta| eta.exp())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[test]
    fn linear_model_recovers_exact_coefficients() {
        // y = 1 + 2*x0 - 0.5*x1, no noise
        let n = 40;
        let x = DMatrix::from_fn(n, 2, |i, j| {
            if j == 0 {
                (i % 7) as f64
            } else {
                ((i * 3) % 5) as f64
            }
        });
        let y: Vec<f64> = (0..n)
            .map(|i| 1.0 + 2.0 * x[(i, 0)] - 0.5 * x[(i, 1)])
            .collect();
        let model = LinearModel::fit(&x, &y, 0.0).expect("fit");
        assert!((model.coefficients[0] - 1.0).abs() < 1e-8);
        assert!((model.coefficients[1] - 2.0).abs() < 1e-8);
        assert!((model.coefficients[2] + 0.5).abs() < 1e-8);

        let pred = model.predict(&x);
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-8);
        }
    }

    #[test]
    fn logistic_model_orders_probabilities() {
        // Larger x -> more likely 1, with overlap so IRLS converges
        let n = 60;
        let x = DMatrix::from_fn(n, 1, |i, _| (i % 10) as f64 / 10.0);
        let y: Vec<f64> = (0..n)
            .map(|i| {
                let v = (i % 10) as f64 / 10.0;
                if (i * 13 + 5) % 10 < 3 {
                    // a band of label noise prevents perfect separation
                    if v > 0.5 { 0.0 } else { 1.0 }
                } else if v > 0.5 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        let model = LogisticModel::fit(&x, &y, 1e-3).expect("fit");
        let lo = DMatrix::from_row_slice(1, 1, &[0.1]);
        let hi = DMatrix::from_row_slice(1, 1, &[0.9]);
        let p_lo = model.predict_proba(&lo)[0];
        let p_hi = model.predict_proba(&hi)[0];
        assert!(p_lo < p_hi, "p(0.1)={} should be below p(0.9)={}", p_lo, p_hi);
        assert!(p_lo > 0.0 && p_hi < 1.0);
    }

    #[test]
    fn poisson_model_matches_constant_rate() {
        // Constant response -> intercept-only fit at log(mean)
        let n = 30;
        let x = DMatrix::zeros(n, 1);
        let y = vec![4.0; n];
        let model = PoissonModel::fit(&x, &y, None, 0.0).expect("fit");
        let rate = model.predict_rate(&x)[0];
        assert!((rate - 4.0).abs() < 1e-6, "rate {} should be 4", rate);
    }
}
