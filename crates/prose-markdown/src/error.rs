use prose_model::{ModelError, SchemaError};
use thiserror::Error;

/// Errors raised when the markdown bridge is set up against a schema.
/// Parsing itself never fails.
#[derive(Debug, Error)]
pub enum MarkdownError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("schema has no `{0}` type required by the markdown bridge")]
    MissingType(String),
}
