use std::fmt;

use thiserror::Error;

/// Errors raised while compiling a schema. Fatal to startup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema validation failed:\n{0}")]
    Validation(SchemaValidationErrors),
}

impl SchemaError {
    pub fn errors(&self) -> &[SchemaValidationError] {
        match self {
            SchemaError::Validation(errors) => &errors.0,
        }
    }
}

/// Container for compile failures, formatted as a bullet list.
#[derive(Debug)]
pub struct SchemaValidationErrors(pub Vec<SchemaValidationError>);

impl fmt::Display for SchemaValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "- {err}")?;
        }
        Ok(())
    }
}

impl SchemaValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &SchemaValidationError> {
        self.0.iter()
    }
}

/// Single compile failure tied to the node or mark it was found on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaValidationError {
    pub subject: String,
    pub message: String,
}

impl SchemaValidationError {
    pub(crate) fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        SchemaValidationError {
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Errors raised by document model operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("position {pos} out of range [0, {size}]")]
    OutOfRange { pos: usize, size: usize },

    #[error("invalid content for `{node}`: {detail}")]
    InvalidContent { node: String, detail: String },

    #[error("missing required attribute `{attr}` on `{owner}`")]
    MissingAttr { owner: String, attr: String },

    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("unknown mark type `{0}`")]
    UnknownMarkType(String),

    #[error("replace failed: {0}")]
    Replace(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
