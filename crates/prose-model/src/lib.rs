//! Schema registry and immutable document model.
//!
//! Documents are trees of [`Node`]s whose positions count tokens: one per
//! character of text, one per leaf, and an opening plus a closing token around
//! every other node's content. Nodes are persistent; edits share every
//! untouched subtree with the previous version.

mod attrs;
mod content;
mod error;
mod fragment;
mod mark;
mod node;
mod replace;
mod resolve;
mod schema;
mod selection;

pub use attrs::{AttrValue, Attrs};
pub use content::ContentMatch;
pub use error::{ModelError, ModelResult, SchemaError, SchemaValidationError, SchemaValidationErrors};
pub use fragment::Fragment;
pub use mark::{mark_set, Mark};
pub use node::{byte_offset, char_len, char_slice, Node};
pub use replace::Slice;
pub use resolve::ResolvedPos;
pub use schema::{AttrSpec, MarkSpec, MarkType, NodeSpec, NodeType, Schema, SchemaRegistry};
pub use selection::Selection;
