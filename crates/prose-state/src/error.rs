use prose_model::ModelError;
use prose_transform::StepError;
use thiserror::Error;

/// Reasons a transaction is rejected. The state it was applied to is left
/// untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid transaction: {0}")]
    Invalid(String),

    #[error("transaction built against state {built} applied to state {current}")]
    Stale { built: u64, current: u64 },
}

impl From<StepError> for TransactionError {
    fn from(err: StepError) -> Self {
        TransactionError::Invalid(err.to_string())
    }
}

impl From<ModelError> for TransactionError {
    fn from(err: ModelError) -> Self {
        TransactionError::Invalid(err.to_string())
    }
}

/// A plugin failed while deriving its next value. The host keeps the previous
/// value and carries on with the remaining plugins.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("plugin `{plugin}` failed: {message}")]
pub struct PluginApplyError {
    pub plugin: String,
    pub message: String,
}

impl PluginApplyError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginApplyError {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// A rule pattern failed to compile.
#[derive(Debug, Error)]
pub enum InputRuleError {
    #[error("invalid input rule pattern: {0}")]
    Pattern(#[from] regex::Error),
}
