use prose_model::ModelError;
use thiserror::Error;

/// Errors raised while applying a step to a document.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no node at position {0}")]
    NoNode(usize),

    #[error("invalid step: {0}")]
    Invalid(String),
}

pub type StepResult<T> = Result<T, StepError>;
