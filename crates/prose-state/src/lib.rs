//! Editor state and everything derived from it.
//!
//! An [`EditorState`] owns the document, the selection and one value per
//! registered plugin. Hosts build a [`Transaction`], apply it, and get a new
//! state back; plugins derive their next value from every transaction and
//! expose [`Decoration`]s for rendering.

mod commands;
mod decoration;
mod error;
mod input_rules;
mod plugin;
mod state;
mod transaction;

pub use commands::{
    block_active, insert_text, list_active, mark_active, set_block_type, toggle_mark, wrap_in_list, Command,
    CommandBinding, Dispatch,
};
pub use decoration::{deco_attrs, Decoration, DecorationAttrs, DecorationKind, DecorationSet, Widget, WidgetAction};
pub use error::{InputRuleError, PluginApplyError, TransactionError};
pub use input_rules::{mark_rule, text_rule, textblock_type_rule, wrapping_rule, InputMatch, InputRule, InputRules, RuleHandler};
pub use plugin::{ApplyContext, PluginKey, PluginRegistry, PluginSpec, Plugins};
pub use state::{Applied, EditorState};
pub use transaction::{Transaction, ADD_TO_HISTORY, POINTER};
