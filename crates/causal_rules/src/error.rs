use thiserror::Error;

/// Errors surfaced by the rule discovery pipeline.
///
/// Validation failures are raised at component boundaries before any numeric
/// work starts; estimation failures come from the ITE collaborators and are
/// propagated without retry. An empty rule set is never an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("estimation failed: {0}")]
    Estimation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<estimators::api::EstimateError> for Error {
    fn from(e: estimators::api::EstimateError) -> Self {
        match e {
            estimators::api::EstimateError::InvalidInput(msg) => Error::InvalidInput(msg),
            other => Error::Estimation(other.to_string()),
        }
    }
}
