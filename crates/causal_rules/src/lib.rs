//! # Causal Rules
//!
//! Discovery and validation of interpretable decision rules that decompose
//! heterogeneous treatment effects.
//!
//! The pipeline honest-splits the data into discovery and inference
//! subsamples, generates candidate rules from shallow tree ensembles fitted
//! on estimated individual treatment effects, shrinks the candidate set
//! through irrelevance, extremity and correlation filters, selects a minimal
//! subset with a penalized linear model, and refits the survivors without a
//! penalty to obtain per-rule effect estimates with uncertainty.
//!
//! ## Example
//!
//! ```rust,ignore
//! use causal_rules::{HyperParams, MethodParams, RuleEnsemble};
//!
//! let ensemble = RuleEnsemble::new(MethodParams::default(), HyperParams::default())?;
//! let fit = ensemble.fit(&outcome, &treatment, &covariates, None, 42)?;
//! println!("{}", fit.cate);
//! ```

pub mod conf;
pub mod dataset;
pub mod decompose;
pub mod error;
pub mod filter;
pub mod forest;
pub mod generate;
pub mod matrix;
pub mod pipeline;
pub mod rules;
pub mod select;
pub mod tree;

pub use conf::{HyperParams, MethodParams};
pub use estimators::api::IteMethod;
pub use dataset::Dataset;
pub use decompose::{CateDecomposition, CateModel, CateRow, CateTable};
pub use error::{Error, Result};
pub use matrix::RuleMatrix;
pub use pipeline::{RuleCounts, RuleEnsemble, RuleEnsembleFit};
pub use rules::{Condition, Op, Rule};
