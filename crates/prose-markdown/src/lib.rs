//! Markdown bridge for prose documents.
//!
//! [`MarkdownParser`] runs an ordered pipeline of tokenizer stages (block
//! rules, then core rewrites, then inline rules) and builds a document from
//! the token stream. [`MarkdownSerializer`] writes documents back to
//! normalized Markdown.

mod block;
mod core;
mod error;
mod heading;
mod inline;
mod parser;
mod schema;
mod serializer;
mod stages;
mod token;

pub use block::{split_front_matter, BlockState};
pub use crate::core::parse_todo_dates;
pub use error::MarkdownError;
pub use heading::{generate_anchor, normalize_heading_text};
pub use inline::{outline, InlineState};
pub use parser::{MarkdownParser, TokenSpec, TOKEN_SPECS};
pub use schema::{markdown_registry, markdown_schema};
pub use serializer::MarkdownSerializer;
pub use stages::{default_stages, BlockRule, CoreRule, InlineRule, ParserStage, Tokenizer};
pub use token::{Nesting, Token};

/// Parses `source` with the default pipeline over [`markdown_schema`].
pub fn parse(source: &str) -> Result<prose_model::Node, MarkdownError> {
    let parser = MarkdownParser::new(markdown_schema()?)?;
    Ok(parser.parse(source))
}

/// Serializes `doc` with the default serializer.
pub fn serialize(doc: &prose_model::Node) -> String {
    MarkdownSerializer::new().serialize(doc)
}
