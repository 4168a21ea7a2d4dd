use prose_markdown::MarkdownError;
use prose_model::SchemaError;
use prose_plugins::PluginSetupError;
use prose_state::{InputRuleError, PluginApplyError, TransactionError};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Setup = 2,
    Rejected = 3,
    Destroyed = 4,
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("markdown schema failed to compile: {0}")]
    Schema(#[from] SchemaError),

    #[error("markdown bridge setup failed: {0}")]
    Markdown(#[from] MarkdownError),

    #[error("feature plugin setup failed: {0}")]
    Plugins(#[from] PluginSetupError),

    #[error("input rule setup failed: {0}")]
    InputRules(#[from] InputRuleError),

    #[error("plugin initialization failed: {0}")]
    Init(#[from] PluginApplyError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("editor has been destroyed")]
    Destroyed,
}

impl EditorError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Schema(_) | Self::Markdown(_) | Self::Plugins(_) | Self::InputRules(_) | Self::Init(_) => ExitCode::Setup,
            Self::Transaction(_) => ExitCode::Rejected,
            Self::Destroyed => ExitCode::Destroyed,
        }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use prose_model::{NodeSpec, SchemaRegistry};

    #[test]
    fn schema_failures_are_setup_errors() {
        let err = SchemaRegistry::new()
            .register_node("doc", NodeSpec::new().content("missing+"))
            .register_node("text", NodeSpec::new().group("inline"))
            .compile()
            .expect_err("unknown content name");

        let err = EditorError::from(err);

        assert!(matches!(err, EditorError::Schema(_)));
        assert_eq!(err.exit_code(), ExitCode::Setup);
    }
}
