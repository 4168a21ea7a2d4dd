//! Feature plugins for the prose editor.
//!
//! Each feature is a [`PluginSpec`](prose_state::PluginSpec) deriving its
//! state from document changes and exposing decorations. UI intent reaches a
//! plugin only through its typed meta on a transaction; the helper functions
//! here (`focus_tag`, `toggle_heading`, `toggle_todo`, ...) build those
//! transactions.

mod clock;
mod error;
mod folding_headings;
mod folding_tags;
mod scan;
mod toc;
mod todo;
mod variables;
mod word_count;

use prose_config::{Config, PluginName};
use prose_state::{PluginKey, PluginRegistry};
use tracing::debug;

pub use clock::{fixed_clock, system_clock, Clock};
pub use error::PluginSetupError;
pub use folding_headings::{
    toggle_heading, FoldHeading, FoldingHeadings, HeadingFoldMeta, HeadingFoldState, FOLD_WIDGET_KEY,
};
pub use folding_tags::{focus_tag, FoldingTags, TagFoldMeta, TagFoldState, ELLIPSIS_KEY_PREFIX, HIDDEN_CLASS};
pub use toc::{render_numbered, toc_entries, TableOfContents, TocEntry, TocState};
pub use todo::{
    stamp_created_dates, todo_entries, toggle_hide_completed, toggle_todo, HideCompleted, HideCompletedState,
    TodoEntry, TodoList, TodoState, CHECKBOX_WIDGET_KEY,
};
pub use variables::{
    VariableContext, VariableDef, VariableDefs, VariableFn, VariableRef, Variables, VariablesState,
    VARIABLE_WIDGET_KEY,
};
pub use word_count::{
    count_words, document_words, refresh_word_count, show_word_count, textblock_words, word_tallies, TallyScope,
    WordCount, WordCountMeta, WordCountState, WordTally, WORD_COUNT_WIDGET_KEY,
};

/// Keys of the features [`register_features`] registered.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureKeys {
    pub folding_tags: Option<PluginKey<FoldingTags>>,
    pub folding_headings: Option<PluginKey<FoldingHeadings>>,
    pub todo: Option<PluginKey<TodoList>>,
    pub hide_completed: Option<PluginKey<HideCompleted>>,
    pub toc: Option<PluginKey<TableOfContents>>,
    pub word_count: Option<PluginKey<WordCount>>,
    pub variables: Option<PluginKey<Variables>>,
}

/// Registers every feature enabled in `config`. Variables come last so the
/// `toc` variable can read the table of contents of the same state.
pub fn register_features(
    registry: &mut PluginRegistry,
    config: &Config,
    clock: Clock,
) -> Result<FeatureKeys, PluginSetupError> {
    let enabled = |name| config.plugins.is_enabled(name);
    let mut keys = FeatureKeys::default();

    if enabled(PluginName::FoldingTags) {
        let anchor = folding_tags::anchor_pattern()?;
        keys.folding_tags = Some(registry.register_with(|key| FoldingTags::with_anchor(key, anchor)));
    }
    if enabled(PluginName::FoldingHeadings) {
        keys.folding_headings = Some(registry.register_with(FoldingHeadings::new));
    }
    if enabled(PluginName::Todo) {
        keys.todo = Some(registry.register(TodoList::new(config.todo.date_format.clone(), clock.clone())));
        keys.hide_completed = Some(registry.register(HideCompleted::new(config.todo.hide_completed)));
    }
    if enabled(PluginName::Toc) {
        keys.toc = Some(registry.register(TableOfContents));
    }
    if enabled(PluginName::WordCount) {
        keys.word_count = Some(registry.register(WordCount::new(config.word_count.show)));
    }
    if enabled(PluginName::Variables) {
        let defs = VariableDefs::builtin(keys.toc).with_constants(&config.variables.values);
        keys.variables = Some(registry.register(Variables::new(defs, clock)?));
    }
    debug!(plugins = registry.len(), "registered feature plugins");
    Ok(keys)
}
