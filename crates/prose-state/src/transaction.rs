use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use prose_model::{AttrValue, Attrs, Fragment, Mark, MarkType, Node, NodeType, Schema, Selection, Slice};
use prose_transform::{Mappable, Mapping, Step, Transform};

use crate::error::TransactionError;
use crate::plugin::{PluginKey, PluginSpec};
use crate::state::EditorState;

/// Meta key telling history tracking to skip a transaction.
pub const ADD_TO_HISTORY: &str = "addToHistory";

/// Meta key marking a transaction caused by a pointer gesture.
pub const POINTER: &str = "pointer";

type MetaValue = Arc<dyn Any + Send + Sync>;

/// A batch of edits built against one [`EditorState`].
///
/// Every mutating call appends steps through the underlying [`Transform`]
/// and extends the mapping; [`EditorState::apply`] commits the batch or
/// rejects it whole. A mutator that fails poisons the transaction, so the
/// steps recorded before it are never committed on their own.
#[derive(Clone)]
pub struct Transaction {
    transform: Transform,
    base: u64,
    base_selection: Selection,
    base_stored_marks: Option<Vec<Mark>>,
    selection: Option<(Selection, usize)>,
    stored_marks: Option<Option<Vec<Mark>>>,
    plugin_meta: BTreeMap<usize, MetaValue>,
    meta: BTreeMap<String, AttrValue>,
    failed: Option<TransactionError>,
}

impl Transaction {
    pub fn new(state: &EditorState) -> Self {
        Transaction {
            transform: Transform::new(state.schema().clone(), state.doc().clone()),
            base: state.id(),
            base_selection: state.selection(),
            base_stored_marks: state.stored_marks().map(<[Mark]>::to_vec),
            selection: None,
            stored_marks: None,
            plugin_meta: BTreeMap::new(),
            meta: BTreeMap::new(),
            failed: None,
        }
    }

    /// Identity of the state this transaction was started from.
    pub fn base_id(&self) -> u64 {
        self.base
    }

    pub fn schema(&self) -> &Schema {
        self.transform.schema()
    }

    pub fn before(&self) -> &Node {
        self.transform.before()
    }

    pub fn doc(&self) -> &Node {
        self.transform.doc()
    }

    pub fn steps(&self) -> &[Step] {
        self.transform.steps()
    }

    pub fn mapping(&self) -> &Mapping {
        self.transform.mapping()
    }

    pub fn doc_changed(&self) -> bool {
        self.transform.doc_changed()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The first mutator error, if any. [`EditorState::apply`] rejects a
    /// transaction that has one.
    pub fn failure(&self) -> Option<&TransactionError> {
        self.failed.as_ref()
    }

    fn record<T, E: Into<TransactionError>>(&mut self, result: Result<T, E>) -> Result<&mut Self, TransactionError> {
        match result {
            Ok(_) => Ok(self),
            Err(err) => {
                let err = err.into();
                self.failed.get_or_insert_with(|| err.clone());
                Err(err)
            }
        }
    }

    pub fn step(&mut self, step: Step) -> Result<&mut Self, TransactionError> {
        let result = self.transform.step(step).map(|_| ());
        self.record(result)
    }

    /// Inserts `text` at `pos` with the marks text typed there would get.
    pub fn insert_text(&mut self, text: &str, pos: usize) -> Result<&mut Self, TransactionError> {
        let result = self.marks_at(pos).and_then(|marks| {
            self.transform.insert_text(pos, text, marks)?;
            Ok(())
        });
        self.record(result)
    }

    /// Replaces the current selection with `text`, carrying stored marks when
    /// there are any. The cursor ends up after the inserted text.
    pub fn replace_selection_with_text(&mut self, text: &str) -> Result<&mut Self, TransactionError> {
        let result = self.try_replace_selection_with_text(text);
        self.record(result)
    }

    fn try_replace_selection_with_text(&mut self, text: &str) -> Result<(), TransactionError> {
        let selection = self.selection();
        let (from, to) = (selection.from(), selection.to());
        let marks = match self.current_stored_marks() {
            Some(marks) => marks,
            None => self.marks_at(from)?,
        };
        let steps = self.mapping().len();
        self.transform.replace_text(from, to, text, marks)?;
        let end = self.mapping().slice(steps).map(to, 1);
        let cursor = Selection::cursor(self.doc(), end)?;
        self.selection = Some((cursor, self.mapping().len()));
        Ok(())
    }

    pub fn replace(&mut self, from: usize, to: usize, content: Fragment) -> Result<&mut Self, TransactionError> {
        let result = self.transform.replace_with(from, to, content).map(|_| ());
        self.record(result)
    }

    pub fn replace_slice(&mut self, from: usize, to: usize, slice: Slice) -> Result<&mut Self, TransactionError> {
        let result = self.transform.replace(from, to, slice).map(|_| ());
        self.record(result)
    }

    pub fn replace_text(&mut self, from: usize, to: usize, text: &str, marks: Vec<Mark>) -> Result<&mut Self, TransactionError> {
        let result = self.transform.replace_text(from, to, text, marks).map(|_| ());
        self.record(result)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransactionError> {
        let result = self.transform.delete(from, to).map(|_| ());
        self.record(result)
    }

    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> Result<&mut Self, TransactionError> {
        let result = self.transform.add_mark(from, to, mark).map(|_| ());
        self.record(result)
    }

    pub fn remove_mark(&mut self, from: usize, to: usize, mark_type: &MarkType) -> Result<&mut Self, TransactionError> {
        let result = self.transform.remove_mark(from, to, mark_type).map(|_| ());
        self.record(result)
    }

    /// Merges `attrs` over the attributes of the node at `pos`.
    pub fn set_node_attrs(&mut self, pos: usize, attrs: Attrs) -> Result<&mut Self, TransactionError> {
        let result = self.transform.set_node_attrs(pos, attrs).map(|_| ());
        self.record(result)
    }

    pub fn set_node_attr(&mut self, pos: usize, name: &str, value: impl Into<AttrValue>) -> Result<&mut Self, TransactionError> {
        let result = self.transform.set_node_attr(pos, name, value).map(|_| ());
        self.record(result)
    }

    pub fn set_node_markup(&mut self, pos: usize, node_type: Option<&NodeType>, attrs: Attrs) -> Result<&mut Self, TransactionError> {
        let result = self.transform.set_node_markup(pos, node_type, attrs).map(|_| ());
        self.record(result)
    }

    pub fn set_block_type(&mut self, from: usize, to: usize, node_type: &NodeType, attrs: Attrs) -> Result<&mut Self, TransactionError> {
        let result = self.transform.set_block_type(from, to, node_type, attrs).map(|_| ());
        self.record(result)
    }

    pub fn wrap(&mut self, start: usize, end: usize, wrappers: &[(NodeType, Attrs)]) -> Result<&mut Self, TransactionError> {
        let result = self.transform.wrap(start, end, wrappers).map(|_| ());
        self.record(result)
    }

    /// Sets the selection in the coordinates of the current document. Later
    /// steps map it forward.
    pub fn set_selection(&mut self, selection: Selection) -> Result<&mut Self, TransactionError> {
        let doc = self.transform.doc();
        let result = doc.resolve(selection.anchor()).and_then(|_| doc.resolve(selection.head()));
        if result.is_ok() {
            self.selection = Some((selection, self.mapping().len()));
        }
        self.record(result)
    }

    pub fn selection_set(&self) -> bool {
        self.selection.is_some()
    }

    /// The selection in the coordinates of the current document.
    pub fn selection(&self) -> Selection {
        let doc = self.transform.doc();
        let (selection, mapping) = match &self.selection {
            Some((selection, at)) => (*selection, self.mapping().slice(*at)),
            None => (self.base_selection, self.mapping().clone()),
        };
        if mapping.is_empty() {
            return selection;
        }
        selection.map(doc, |pos, assoc| {
            let result = mapping.map_result(pos, assoc);
            (result.pos, result.deleted())
        })
    }

    pub fn set_stored_marks(&mut self, marks: Option<Vec<Mark>>) -> &mut Self {
        self.stored_marks = Some(marks);
        self
    }

    pub fn add_stored_mark(&mut self, mark: &Mark) -> Result<&mut Self, TransactionError> {
        let result = self.cursor_marks();
        if let Ok(current) = &result {
            self.stored_marks = Some(Some(mark.add_to_set(current)));
        }
        self.record(result)
    }

    pub fn remove_stored_mark(&mut self, mark_type: &MarkType) -> Result<&mut Self, TransactionError> {
        let result = self.cursor_marks();
        if let Ok(current) = &result {
            self.stored_marks = Some(Some(mark_type.remove_from_set(current)));
        }
        self.record(result)
    }

    pub fn stored_marks_set(&self) -> bool {
        self.stored_marks.is_some()
    }

    /// Stored marks the resulting state will carry.
    pub(crate) fn resolve_stored_marks(&self) -> Option<Vec<Mark>> {
        match &self.stored_marks {
            Some(marks) => marks.clone(),
            None if self.selection_set() || self.doc_changed() => None,
            None => self.base_stored_marks.clone(),
        }
    }

    /// Addresses `value` to the plugin behind `key`.
    pub fn set_meta<P: PluginSpec>(&mut self, key: &PluginKey<P>, value: P::Meta) -> &mut Self {
        self.plugin_meta.insert(key.index(), Arc::new(value));
        self
    }

    pub fn get_meta<P: PluginSpec>(&self, key: &PluginKey<P>) -> Option<&P::Meta> {
        self.plugin_meta(key.index()).and_then(|value| value.downcast_ref::<P::Meta>())
    }

    pub(crate) fn plugin_meta(&self, index: usize) -> Option<&(dyn Any + Send + Sync)> {
        self.plugin_meta.get(&index).map(|value| value.as_ref())
    }

    /// Sets a named meta entry such as [`ADD_TO_HISTORY`].
    pub fn set_named_meta(&mut self, name: &str, value: impl Into<AttrValue>) -> &mut Self {
        self.meta.insert(name.to_string(), value.into());
        self
    }

    pub fn named_meta(&self, name: &str) -> Option<&AttrValue> {
        self.meta.get(name)
    }

    pub fn add_to_history(&self) -> bool {
        self.named_meta(ADD_TO_HISTORY).and_then(AttrValue::as_bool) != Some(false)
    }

    pub fn is_pointer(&self) -> bool {
        self.named_meta(POINTER).and_then(AttrValue::as_bool) == Some(true)
    }

    fn current_stored_marks(&self) -> Option<Vec<Mark>> {
        match &self.stored_marks {
            Some(marks) => marks.clone(),
            None if self.doc_changed() => None,
            None => self.base_stored_marks.clone(),
        }
    }

    fn cursor_marks(&self) -> Result<Vec<Mark>, TransactionError> {
        match self.current_stored_marks() {
            Some(marks) => Ok(marks),
            None => self.marks_at(self.selection().head()),
        }
    }

    fn marks_at(&self, pos: usize) -> Result<Vec<Mark>, TransactionError> {
        Ok(self.transform.doc().resolve(pos)?.marks())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("base", &self.base)
            .field("steps", &self.steps())
            .field("selection", &self.selection)
            .field("stored_marks", &self.stored_marks)
            .field("plugin_meta", &self.plugin_meta.keys().collect::<Vec<_>>())
            .field("meta", &self.meta)
            .field("failed", &self.failed)
            .finish()
    }
}
