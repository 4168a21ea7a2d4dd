use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use prose_model::{Mark, Node, Schema, Selection};
use tracing::{debug, error};

use crate::decoration::{Decoration, DecorationSet, Widget};
use crate::error::{PluginApplyError, TransactionError};
use crate::plugin::{guarded, PluginValue, Plugins};
use crate::transaction::Transaction;

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

fn next_state_id() -> u64 {
    NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Immutable editor state: document, selection, stored marks and one value
/// per plugin. Applying a transaction produces a new state; the old one is
/// never modified.
#[derive(Clone)]
pub struct EditorState {
    id: u64,
    schema: Schema,
    doc: Node,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
    plugins: Plugins,
    values: Vec<PluginValue>,
}

/// Result of [`EditorState::apply_transaction`].
pub struct Applied {
    pub state: EditorState,
    pub transaction: Transaction,
    /// Plugins that failed and kept their previous value.
    pub plugin_errors: Vec<PluginApplyError>,
}

impl EditorState {
    /// Creates a state over `doc` with the cursor at the start of the first
    /// textblock, initializing plugins in registration order.
    pub fn create(schema: Schema, doc: Node, plugins: Plugins) -> Result<Self, PluginApplyError> {
        let selection = Selection::at_start(&doc);
        let mut state = EditorState {
            id: next_state_id(),
            schema,
            doc,
            selection,
            stored_marks: None,
            plugins: plugins.clone(),
            values: Vec::with_capacity(plugins.len()),
        };
        for plugin in plugins.iter() {
            let value = guarded(plugin.name(), || Ok(plugin.init(&state)))?;
            state.values.push(value);
        }
        Ok(state)
    }

    /// Unique identity of this state value.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    /// Marks text typed at the cursor would get.
    pub fn cursor_marks(&self) -> Vec<Mark> {
        match &self.stored_marks {
            Some(marks) => marks.clone(),
            None => self
                .doc
                .resolve(self.selection.head())
                .map(|pos| pos.marks())
                .unwrap_or_default(),
        }
    }

    pub fn plugins(&self) -> &Plugins {
        &self.plugins
    }

    pub fn tr(&self) -> Transaction {
        Transaction::new(self)
    }

    pub(crate) fn plugin_value(&self, index: usize) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(index).map(|value| value.as_ref())
    }

    /// Applies `tr`, discarding plugin failure reports.
    pub fn apply(&self, tr: Transaction) -> Result<EditorState, TransactionError> {
        self.apply_transaction(tr).map(|applied| applied.state)
    }

    /// Validates `tr` and derives the next state. A rejected transaction
    /// leaves `self` as the current state.
    pub fn apply_transaction(&self, tr: Transaction) -> Result<Applied, TransactionError> {
        if let Err(err) = self.validate(&tr) {
            debug!(error = %err, "rejected transaction");
            return Err(err);
        }
        let mut next = EditorState {
            id: next_state_id(),
            schema: self.schema.clone(),
            doc: tr.doc().clone(),
            selection: tr.selection(),
            stored_marks: tr.resolve_stored_marks(),
            plugins: self.plugins.clone(),
            values: self.values.clone(),
        };
        let mut plugin_errors = Vec::new();
        for (index, plugin) in self.plugins.iter().enumerate() {
            let result = guarded(plugin.name(), || plugin.apply(&tr, &self.values[index], self, &next));
            match result {
                Ok(value) => next.values[index] = value,
                Err(err) => {
                    error!(plugin = %err.plugin, error = %err.message, "plugin apply failed; keeping previous value");
                    plugin_errors.push(err);
                }
            }
        }
        debug!(
            from = self.id,
            to = next.id,
            steps = tr.steps().len(),
            doc_changed = tr.doc_changed(),
            "applied transaction"
        );
        Ok(Applied {
            state: next,
            transaction: tr,
            plugin_errors,
        })
    }

    fn validate(&self, tr: &Transaction) -> Result<(), TransactionError> {
        if tr.base_id() != self.id {
            return Err(TransactionError::Stale {
                built: tr.base_id(),
                current: self.id,
            });
        }
        if let Some(err) = tr.failure() {
            return Err(err.clone());
        }
        if tr.doc_changed() {
            tr.doc().check()?;
        }
        let selection = tr.selection();
        tr.doc().resolve(selection.anchor())?;
        tr.doc().resolve(selection.head())?;
        Ok(())
    }

    /// Every plugin's current decoration set, in registration order.
    pub fn decoration_sets(&self) -> Vec<DecorationSet> {
        self.plugins
            .iter()
            .zip(&self.values)
            .filter_map(|(plugin, value)| {
                match guarded(plugin.name(), || Ok(plugin.decorations(value, self))) {
                    Ok(set) => set,
                    Err(err) => {
                        error!(plugin = %err.plugin, error = %err.message, "plugin decorations failed");
                        None
                    }
                }
            })
            .collect()
    }

    /// Decorations from all plugins touching `from..=to`, sorted by position.
    pub fn decorations_for(&self, from: usize, to: usize) -> Vec<Decoration> {
        let mut found: Vec<Decoration> = self
            .decoration_sets()
            .iter()
            .flat_map(|set| set.find(from, to).into_iter().cloned().collect::<Vec<_>>())
            .collect();
        found.sort_by_key(|deco| (deco.from(), deco.to()));
        found
    }

    /// The widget with `key` at `pos`, if any plugin shows one there.
    pub fn widget_at(&self, pos: usize, key: &str) -> Option<Widget> {
        self.decorations_for(pos, pos).into_iter().find_map(|deco| match deco.widget_ref() {
            Some(widget) if deco.from() == pos && widget.key() == key => Some(widget.clone()),
            _ => None,
        })
    }
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("id", &self.id)
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field("stored_marks", &self.stored_marks)
            .field("plugins", &self.plugins)
            .finish()
    }
}
