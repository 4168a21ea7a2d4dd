use thiserror::Error;

/// Failures while building the feature plugins.
#[derive(Debug, Error)]
pub enum PluginSetupError {
    #[error("invalid plugin pattern: {0}")]
    Pattern(#[from] regex::Error),
}
