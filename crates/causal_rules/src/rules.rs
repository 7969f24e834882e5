//! Decision rules as explicit condition lists.
//!
//! A [`Rule`] is an ordered conjunction of covariate threshold conditions.
//! The condition list is the canonical representation: deduplication and
//! indicator building operate on it, and the string expression is a pure
//! projection for display.

use core::fmt;
use std::cmp::Ordering;
use std::collections::HashSet;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Comparison operator of a single threshold condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Le,
    Gt,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Le => write!(f, "<="),
            Op::Gt => write!(f, ">"),
        }
    }
}

/// One `covariate <op> threshold` condition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub covariate: String,
    pub op: Op,
    pub threshold: f64,
}

impl Condition {
    pub fn new(covariate: impl Into<String>, op: Op, threshold: f64) -> Self {
        Condition {
            covariate: covariate.into(),
            op,
            threshold,
        }
    }

    /// Evaluate against one value; a missing value never satisfies.
    pub fn holds(&self, value: Option<f64>) -> bool {
        match value {
            None => false,
            Some(v) => match self.op {
                Op::Le => v <= self.threshold,
                Op::Gt => v > self.threshold,
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.covariate, self.op, self.threshold)
    }
}

/// A conjunction of threshold conditions over named covariates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    conditions: Vec<Condition>,
}

impl Rule {
    /// Build a rule from raw conditions.
    ///
    /// Conditions are brought into canonical order (covariate, operator,
    /// threshold) and redundant conditions on the same covariate and
    /// operator collapse to the tightest one. An empty condition list is
    /// rejected.
    pub fn new(conditions: Vec<Condition>) -> Result<Self> {
        if conditions.is_empty() {
            return Err(Error::InvalidInput(
                "a rule needs at least one condition".to_string(),
            ));
        }

        let mut merged: Vec<Condition> = Vec::with_capacity(conditions.len());
        for cond in conditions {
            if !cond.threshold.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "non-finite threshold in condition on '{}'",
                    cond.covariate
                )));
            }
            match merged
                .iter_mut()
                .find(|c| c.covariate == cond.covariate && c.op == cond.op)
            {
                Some(existing) => {
                    // x<=a & x<=b tightens to the smaller bound, x>a & x>b
                    // to the larger one
                    existing.threshold = match cond.op {
                        Op::Le => existing.threshold.min(cond.threshold),
                        Op::Gt => existing.threshold.max(cond.threshold),
                    };
                }
                None => merged.push(cond),
            }
        }

        merged.sort_by(|a, b| {
            a.covariate
                .cmp(&b.covariate)
                .then_with(|| match (a.op, b.op) {
                    (Op::Le, Op::Gt) => Ordering::Less,
                    (Op::Gt, Op::Le) => Ordering::Greater,
                    _ => Ordering::Equal,
                })
                .then_with(|| a.threshold.partial_cmp(&b.threshold).unwrap_or(Ordering::Equal))
        });

        Ok(Rule { conditions: merged })
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Number of conditions; the "length" used by the selection penalty.
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Canonical string expression, e.g. `x1>0.5 & x2<=0.3`.
    pub fn expression(&self) -> String {
        let parts: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        parts.join(" & ")
    }

    /// Evaluate the conjunction row-wise against a covariate table.
    ///
    /// Fails if a condition references an unknown or non-numeric covariate.
    /// Null entries never satisfy a condition.
    pub fn evaluate(&self, covariates: &DataFrame) -> Result<Vec<bool>> {
        let mut mask = vec![true; covariates.height()];
        for cond in &self.conditions {
            let values = numeric_column(covariates, &cond.covariate)?;
            for (m, v) in mask.iter_mut().zip(values.into_iter()) {
                *m = *m && cond.holds(v);
            }
        }
        Ok(mask)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression())
    }
}

/// Drop duplicate rules, keeping the first occurrence of each expression.
pub fn dedup_rules(rules: Vec<Rule>) -> Vec<Rule> {
    let mut seen: HashSet<String> = HashSet::with_capacity(rules.len());
    let mut out = Vec::with_capacity(rules.len());
    for rule in rules {
        if seen.insert(rule.expression()) {
            out.push(rule);
        }
    }
    out
}

/// Fetch one covariate column as `Option<f64>` values.
pub(crate) fn numeric_column(covariates: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = covariates
        .column(name)
        .map_err(|_| Error::InvalidInput(format!("unknown covariate '{}'", name)))?;

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
        return Err(Error::InvalidInput(format!(
            "covariate '{}' is not numeric",
            name
        )));
    }

    let series = column
        .as_series()
        .ok_or_else(|| Error::InvalidInput(format!("covariate '{}' is not a series", name)))?
        .cast(&DataType::Float64)
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let ca = series.f64().map_err(|e| Error::InvalidInput(e.to_string()))?;
    Ok(ca.into_iter().collect())
}
