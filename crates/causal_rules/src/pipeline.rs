//! End-to-end orchestration: split, discover, infer, decompose, predict.

use estimators::api::{build_estimator, IteEstimator as _};
use log::{debug, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::conf::{HyperParams, MethodParams};
use crate::dataset::Dataset;
use crate::decompose::{decompose, CateModel, CateTable};
use crate::error::{Error, Result};
use crate::filter::{filter_correlated, filter_extreme, filter_irrelevant};
use crate::generate::generate_rules;
use crate::matrix::RuleMatrix;
use crate::rules::Rule;
use crate::select::select_rules;

/// How many rules survived each pipeline stage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleCounts {
    pub generated: usize,
    pub after_irrelevance: usize,
    pub after_extremity: usize,
    pub after_correlation: usize,
    pub selected: usize,
    pub significant: usize,
}

/// The rule discovery pipeline, configured once and reusable across runs.
pub struct RuleEnsemble {
    method: MethodParams,
    hyper: HyperParams,
}

impl RuleEnsemble {
    /// Validate both parameter sets once; they are read-only afterwards.
    pub fn new(method: MethodParams, hyper: HyperParams) -> Result<Self> {
        method.validate()?;
        hyper.validate()?;
        Ok(RuleEnsemble { method, hyper })
    }

    /// Run the full pipeline on one observation set.
    ///
    /// When `ite` is supplied it is split alongside the other fields and
    /// used as-is on both subsamples; otherwise the configured methods
    /// estimate it per subsample. Any stage failure aborts the run.
    pub fn fit(
        &self,
        outcome: &[f64],
        treatment: &[f64],
        covariates: &DataFrame,
        ite: Option<&[f64]>,
        seed: u64,
    ) -> Result<RuleEnsembleFit> {
        let data = Dataset::new(
            outcome.to_vec(),
            treatment.to_vec(),
            covariates.clone(),
            ite.map(|v| v.to_vec()),
        )?;

        // split
        let (discovery, inference) = data.honest_split(self.method.ratio_dis, seed)?;
        info!(
            "honest split: {} discovery rows, {} inference rows",
            discovery.len(),
            inference.len()
        );

        // discover
        let ite_dis = self.subsample_ite(&discovery, self.method.ite_method_dis)?;
        let candidates = generate_rules(
            &discovery.covariates,
            &ite_dis,
            self.method.intervention_vars.as_deref(),
            &self.hyper,
            seed.wrapping_add(1),
        )?;
        let mut counts = RuleCounts {
            generated: candidates.len(),
            ..RuleCounts::default()
        };
        info!("generated {} candidate rules", counts.generated);

        let dis_matrix = RuleMatrix::build(&discovery.covariates, &candidates)?;
        let (kept, scores) = filter_irrelevant(&dis_matrix, &ite_dis, self.hyper.t_decay)?;
        let rules = subset(&candidates, &kept);
        counts.after_irrelevance = rules.len();

        let dis_matrix = dis_matrix.select_columns(&kept);
        let kept = filter_extreme(&dis_matrix, self.hyper.t_ext)?;
        let scores = subset(&scores, &kept);
        let rules = subset(&rules, &kept);
        counts.after_extremity = rules.len();

        let dis_matrix = dis_matrix.select_columns(&kept);
        let kept = filter_correlated(&dis_matrix, Some(&scores), self.hyper.t_corr)?;
        let rules = subset(&rules, &kept);
        counts.after_correlation = rules.len();
        debug!(
            "filters kept {} of {} candidate rules",
            counts.after_correlation, counts.generated
        );

        // infer
        let ite_inf = self.subsample_ite(&inference, self.method.ite_method_inf)?;
        let inf_matrix = RuleMatrix::build(&inference.covariates, &rules)?;
        let kept = select_rules(
            &inf_matrix,
            &rules,
            &ite_inf,
            &self.hyper,
            seed.wrapping_add(2),
        )?;
        let rules = subset(&rules, &kept);
        counts.selected = rules.len();

        let inf_matrix = inf_matrix.select_columns(&kept);
        let decomposition = decompose(&inf_matrix, &rules, &ite_inf, self.hyper.t_pvalue)?;
        let rules = subset(&rules, &decomposition.kept);
        counts.significant = rules.len();
        info!(
            "{} rules selected, {} significant after decomposition",
            counts.selected, counts.significant
        );

        // predict over the full input population
        let full_matrix = RuleMatrix::build(covariates, &rules)?;
        let ite_predictions = decomposition.model.predict(&full_matrix)?;

        // done
        Ok(RuleEnsembleFit {
            rules,
            cate: decomposition.summary,
            counts,
            method: self.method.clone(),
            hyper: self.hyper.clone(),
            ite_predictions,
            model: decomposition.model,
        })
    }

    fn subsample_ite(&self, data: &Dataset, method: estimators::api::IteMethod) -> Result<Vec<f64>> {
        if let Some(ite) = &data.ite {
            return Ok(ite.clone());
        }
        let estimator = build_estimator(method, self.method.offset.as_deref())
            .map_err(|e| Error::Estimation(e.to_string()))?;
        estimator
            .estimate(&data.outcome, &data.treatment, &data.covariates)
            .map_err(Error::from)
    }
}

/// The assembled run artifact: surviving rules, the CATE summary, stage
/// counts, the echoed parameters and per-unit predictions over the full
/// input population.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleEnsembleFit {
    pub rules: Vec<Rule>,
    pub cate: CateTable,
    pub counts: RuleCounts,
    pub method: MethodParams,
    pub hyper: HyperParams,
    pub ite_predictions: Vec<f64>,
    model: CateModel,
}

impl RuleEnsembleFit {
    /// Predict per-unit effects for new covariates.
    ///
    /// With no surviving rule this is the constant baseline estimate for
    /// every unit.
    pub fn predict(&self, covariates: &DataFrame) -> Result<Vec<f64>> {
        let matrix = RuleMatrix::build(covariates, &self.rules)?;
        self.model.predict(&matrix)
    }

    /// The fitted decomposition model.
    pub fn model(&self) -> &CateModel {
        &self.model
    }
}

fn subset<T: Clone>(items: &[T], keep: &[usize]) -> Vec<T> {
    keep.iter().map(|&j| items[j].clone()).collect()
}
