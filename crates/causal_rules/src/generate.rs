//! Candidate rule generation from shallow tree ensembles.

use polars::prelude::*;

use crate::conf::HyperParams;
use crate::error::{Error, Result};
use crate::forest::{fit_bagged, fit_boosted};
use crate::rules::{dedup_rules, numeric_column, Condition, Op, Rule};
use crate::tree::{NodeKind, RegressionTree, TreeParams};

/// Offset between the bagged and boosted seed streams so the two ensembles
/// never share a per-tree rng.
const BOOST_SEED_OFFSET: u64 = 0x9e37_79b9;

/// Generate candidate rules by fitting tree ensembles on `(covariates, ite)`
/// and extracting every root-to-node decision path as a conjunction.
///
/// Split variables are restricted to `intervention_vars` when provided.
/// Returns an empty set (not an error) when both tree counts are zero.
pub fn generate_rules(
    covariates: &DataFrame,
    ite: &[f64],
    intervention_vars: Option<&[String]>,
    params: &HyperParams,
    seed: u64,
) -> Result<Vec<Rule>> {
    if ite.len() != covariates.height() {
        return Err(Error::InvalidInput(format!(
            "ite has {} rows but the covariates have {}",
            ite.len(),
            covariates.height()
        )));
    }

    let names: Vec<String> = match intervention_vars {
        Some(vars) => {
            for var in vars {
                if covariates.column(var).is_err() {
                    return Err(Error::InvalidInput(format!(
                        "intervention variable '{}' is not a covariate",
                        var
                    )));
                }
            }
            vars.to_vec()
        }
        None => covariates
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };

    if params.ntrees_rf == 0 && params.ntrees_gbm == 0 {
        return Ok(Vec::new());
    }

    // Materialize the split columns once; tree fitting rejects missing
    // values so the scans never have to branch on them.
    let mut cols: Vec<Vec<f64>> = Vec::with_capacity(names.len());
    for name in &names {
        let values = numeric_column(covariates, name)?;
        let mut dense = Vec::with_capacity(values.len());
        for v in values {
            match v {
                Some(v) => dense.push(v),
                None => {
                    return Err(Error::InvalidInput(format!(
                        "covariate '{}' contains null values",
                        name
                    )))
                }
            }
        }
        cols.push(dense);
    }

    let rf_params = TreeParams {
        node_size: params.node_size,
        max_nodes: params.max_nodes,
        max_depth: params.max_depth,
        mtry: Some((names.len() / 3).max(1)),
    };
    let gbm_params = TreeParams {
        mtry: None,
        ..rf_params.clone()
    };

    let mut trees = fit_bagged(
        &cols,
        ite,
        &rf_params,
        params.ntrees_rf,
        params.replace,
        seed,
    );
    trees.extend(fit_boosted(
        &cols,
        ite,
        &gbm_params,
        params.ntrees_gbm,
        seed.wrapping_add(BOOST_SEED_OFFSET),
    ));

    let mut rules = Vec::new();
    for tree in &trees {
        extract_paths(tree, &names, &mut rules)?;
    }
    Ok(dedup_rules(rules))
}

/// Walk a fitted tree and emit one rule per root-to-node path (internal
/// nodes included), conditions accumulated along the way.
fn extract_paths(tree: &RegressionTree, names: &[String], out: &mut Vec<Rule>) -> Result<()> {
    let nodes = tree.nodes();
    let mut stack: Vec<(usize, Vec<Condition>)> = vec![(0, Vec::new())];
    while let Some((idx, path)) = stack.pop() {
        if let NodeKind::Split {
            column,
            threshold,
            left,
            right,
        } = &nodes[idx].kind
        {
            let mut left_path = path.clone();
            left_path.push(Condition::new(names[*column].clone(), Op::Le, *threshold));
            out.push(Rule::new(left_path.clone())?);

            let mut right_path = path;
            right_path.push(Condition::new(names[*column].clone(), Op::Gt, *threshold));
            out.push(Rule::new(right_path.clone())?);

            stack.push((*left, left_path));
            stack.push((*right, right_path));
        }
    }
    Ok(())
}
