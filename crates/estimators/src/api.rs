use nalgebra::DMatrix;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aipw::Aipw;
use crate::learners::{SLearner, TLearner, TPoisson};

#[derive(Debug)]
pub enum EstimateError {
    InvalidInput(String),
    Numerical(String),
    Unsupported(String),
}

impl EstimateError {
    pub fn to_string(&self) -> String {
        match self {
            EstimateError::InvalidInput(msg) => format!("Invalid input: {}", msg),
            EstimateError::Numerical(msg) => format!("Numerical error: {}", msg),
            EstimateError::Unsupported(msg) => format!("Unsupported method: {}", msg),
        }
    }
}

/// Uniform contract for individual treatment effect estimation.
///
/// Implementations take the outcome `y`, the binary treatment `z` and the
/// covariate table `x`, and return one effect estimate per row of `x`.
pub trait IteEstimator {
    fn estimate(&self, y: &[f64], z: &[f64], x: &DataFrame) -> Result<Vec<f64>, EstimateError>;
}

/// Method selectors understood by [`build_estimator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IteMethod {
    Aipw,
    SLearner,
    TLearner,
    TPoisson,
    Bart,
    Cf,
}

impl IteMethod {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aipw" => Some(IteMethod::Aipw),
            "slearner" => Some(IteMethod::SLearner),
            "tlearner" => Some(IteMethod::TLearner),
            "tpoisson" => Some(IteMethod::TPoisson),
            "bart" => Some(IteMethod::Bart),
            "cf" => Some(IteMethod::Cf),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IteMethod::Aipw => "aipw",
            IteMethod::SLearner => "slearner",
            IteMethod::TLearner => "tlearner",
            IteMethod::TPoisson => "tpoisson",
            IteMethod::Bart => "bart",
            IteMethod::Cf => "cf",
        }
    }
}

/// Instantiate the estimator for a method selector.
///
/// `offset` names the exposure covariate for count-outcome methods; it is
/// ignored by the others. `bart` and `cf` are recognized selectors without a
/// bundled implementation and yield `EstimateError::Unsupported`.
pub fn build_estimator(
    method: IteMethod,
    offset: Option<&str>,
) -> Result<Box<dyn IteEstimator>, EstimateError> {
    match method {
        IteMethod::Aipw => Ok(Box::new(Aipw::default())),
        IteMethod::SLearner => Ok(Box::new(SLearner::default())),
        IteMethod::TLearner => Ok(Box::new(TLearner::default())),
        IteMethod::TPoisson => Ok(Box::new(TPoisson::new(offset.map(|s| s.to_string())))),
        IteMethod::Bart | IteMethod::Cf => Err(EstimateError::Unsupported(format!(
            "no bundled implementation for '{}'",
            method.name()
        ))),
    }
}

/// Check that `y`, `z` and `x` describe the same units and that `z` is 0/1.
pub fn validate_inputs(y: &[f64], z: &[f64], x: &DataFrame) -> Result<(), EstimateError> {
    if y.len() != z.len() || y.len() != x.height() {
        return Err(EstimateError::InvalidInput(format!(
            "misaligned inputs: outcome has {} rows, treatment {}, covariates {}",
            y.len(),
            z.len(),
            x.height()
        )));
    }
    if y.is_empty() {
        return Err(EstimateError::InvalidInput("empty input".to_string()));
    }
    if z.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(EstimateError::InvalidInput(
            "treatment must be binary 0/1".to_string(),
        ));
    }
    let treated = z.iter().filter(|&&v| v == 1.0).count();
    if treated == 0 || treated == z.len() {
        return Err(EstimateError::InvalidInput(
            "both treatment arms must be non-empty".to_string(),
        ));
    }
    Ok(())
}

/// Materialize a covariate table as a dense f64 matrix.
///
/// Columns listed in `exclude` are skipped. Non-numeric columns and null
/// entries are rejected eagerly so the numeric routines never see them.
pub fn design_matrix(
    x: &DataFrame,
    exclude: Option<&str>,
) -> Result<(Vec<String>, DMatrix<f64>), EstimateError> {
    let names: Vec<String> = x
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| Some(name.as_str()) != exclude)
        .collect();

    let n = x.height();
    let mut data: Vec<f64> = Vec::with_capacity(n * names.len());
    for name in &names {
        data.extend(column_values(x, name)?);
    }
    let matrix = DMatrix::from_iterator(n, names.len(), data.into_iter());
    Ok((names, matrix))
}

/// Extract one named column as a complete f64 vector.
pub fn column_values(x: &DataFrame, name: &str) -> Result<Vec<f64>, EstimateError> {
    let column = x
        .column(name)
        .map_err(|_| EstimateError::InvalidInput(format!("covariate '{}' not found", name)))?;

    let is_numeric = matches!(
        column.dtype(),
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    );
    if !is_numeric {
        return Err(EstimateError::InvalidInput(format!(
            "covariate '{}' is not numeric",
            name
        )));
    }

    let series = column
        .as_series()
        .ok_or_else(|| {
            EstimateError::InvalidInput(format!("covariate '{}' is not a series", name))
        })?
        .cast(&DataType::Float64)
        .map_err(|e| EstimateError::InvalidInput(e.to_string()))?;
    let ca = series
        .f64()
        .map_err(|e| EstimateError::InvalidInput(e.to_string()))?;
    if ca.null_count() > 0 {
        return Err(EstimateError::InvalidInput(format!(
            "covariate '{}' contains null values",
            name
        )));
    }
    Ok(ca.into_no_null_iter().collect())
}
