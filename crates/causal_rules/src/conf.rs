//! Method and hyper parameter sets.
//!
//! Both structures are validated once at the pipeline boundary and threaded
//! read-only through every stage afterwards.

use estimators::api::IteMethod;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Choices that shape the estimation strategy of a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodParams {
    /// Fraction of rows assigned to the discovery subsample.
    pub ratio_dis: f64,
    /// ITE method used on the discovery subsample.
    pub ite_method_dis: IteMethod,
    /// ITE method used on the inference subsample.
    pub ite_method_inf: IteMethod,
    /// Restrict rule generation to these covariates (all when `None`).
    pub intervention_vars: Option<Vec<String>>,
    /// Exposure covariate for count-outcome methods.
    pub offset: Option<String>,
}

impl Default for MethodParams {
    fn default() -> Self {
        MethodParams {
            ratio_dis: 0.5,
            ite_method_dis: IteMethod::Aipw,
            ite_method_inf: IteMethod::Aipw,
            intervention_vars: None,
            offset: None,
        }
    }
}

impl MethodParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.ratio_dis > 0.0 && self.ratio_dis < 1.0) {
            return Err(Error::InvalidInput(format!(
                "ratio_dis must lie in (0, 1), got {}",
                self.ratio_dis
            )));
        }
        if let Some(vars) = &self.intervention_vars {
            if vars.is_empty() {
                return Err(Error::InvalidInput(
                    "intervention_vars must not be an empty list".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Tuning knobs for rule generation, filtering, selection and decomposition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HyperParams {
    /// Number of bootstrap-aggregated trees.
    pub ntrees_rf: usize,
    /// Number of gradient-boosted trees.
    pub ntrees_gbm: usize,
    /// Minimum number of samples in each tree leaf.
    pub node_size: usize,
    /// Maximum number of leaves per tree.
    pub max_nodes: usize,
    /// Maximum tree depth, and so the maximum conditions per rule.
    pub max_depth: usize,
    /// Bootstrap with replacement when true, subsampling otherwise.
    pub replace: bool,
    /// Minimum relative variance decay for a rule to stay relevant.
    pub t_decay: f64,
    /// Support bounds: rules outside [t_ext, 1 - t_ext] are extreme.
    pub t_ext: f64,
    /// Pairwise correlation above which one of two rules is dropped.
    pub t_corr: f64,
    /// Significance level for the decomposition stage.
    pub t_pvalue: f64,
    /// Use stability selection instead of a single cross-validated fit.
    pub stability_selection: bool,
    /// Selection frequency a rule must reach under stability selection.
    pub cutoff: f64,
    /// Bound on the expected number of falsely selected rules.
    pub pfer: f64,
    /// Exponent of the rule-length penalty weight in the L1 fit.
    pub penalty_rl: f64,
}

impl Default for HyperParams {
    fn default() -> Self {
        HyperParams {
            ntrees_rf: 20,
            ntrees_gbm: 20,
            node_size: 20,
            max_nodes: 5,
            max_depth: 3,
            replace: true,
            t_decay: 0.025,
            t_ext: 0.01,
            t_corr: 1.0,
            t_pvalue: 0.05,
            stability_selection: true,
            cutoff: 0.9,
            pfer: 1.0,
            penalty_rl: 1.0,
        }
    }
}

impl HyperParams {
    pub fn validate(&self) -> Result<()> {
        if self.node_size == 0 {
            return Err(Error::InvalidInput("node_size must be at least 1".to_string()));
        }
        if self.max_nodes < 2 {
            return Err(Error::InvalidInput(
                "max_nodes must be at least 2 for any split to happen".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(Error::InvalidInput("max_depth must be at least 1".to_string()));
        }
        if self.t_decay < 0.0 {
            return Err(Error::InvalidInput(format!(
                "t_decay must be non-negative, got {}",
                self.t_decay
            )));
        }
        if !(self.t_ext > 0.0 && self.t_ext < 0.5) {
            return Err(Error::InvalidInput(format!(
                "t_ext must lie in (0, 0.5), got {}",
                self.t_ext
            )));
        }
        if !(self.t_corr > 0.0) {
            return Err(Error::InvalidInput(format!(
                "t_corr must be positive, got {}",
                self.t_corr
            )));
        }
        if !(self.t_pvalue > 0.0 && self.t_pvalue < 1.0) {
            return Err(Error::InvalidInput(format!(
                "t_pvalue must lie in (0, 1), got {}",
                self.t_pvalue
            )));
        }
        if !(self.cutoff > 0.5 && self.cutoff <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "cutoff must lie in (0.5, 1], got {}",
                self.cutoff
            )));
        }
        if !(self.pfer > 0.0) {
            return Err(Error::InvalidInput(format!(
                "pfer must be positive, got {}",
                self.pfer
            )));
        }
        if self.penalty_rl < 0.0 {
            return Err(Error::InvalidInput(format!(
                "penalty_rl must be non-negative, got {}",
                self.penalty_rl
            )));
        }
        Ok(())
    }
}
