//! # Estimators
//!
//! Individual treatment effect (ITE) estimators behind a uniform interface.
//!
//! Every estimator consumes an outcome vector, a binary treatment vector and
//! a numeric covariate table, and returns one treatment-effect estimate per
//! unit. The pipeline that consumes these estimates selects the concrete
//! method once, at its boundary, through [`api::build_estimator`].

pub mod aipw;
pub mod api;
pub mod glm;
pub mod learners;
