//! Todo lists.
//!
//! [`TodoList`] tracks every todo item and shows a checkbox widget at the start
//! of each one; clicking it toggles the item and stamps its dates.
//! [`HideCompleted`] hides checked items while its toggle is on.

use chrono::NaiveDateTime;
use prose_model::{AttrValue, Node};
use prose_state::{
    deco_attrs, ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginKey, PluginSpec,
    Transaction, TransactionError, Widget,
};

use crate::clock::Clock;
use crate::folding_tags::HIDDEN_CLASS;
use crate::scan::find_nodes;

pub const CHECKBOX_WIDGET_KEY: &str = "todo-checkbox";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TodoEntry {
    /// Position before the list item.
    pub pos: usize,
    pub checked: bool,
    pub created: Option<String>,
    pub closed: Option<String>,
    pub text: String,
}

/// Todo items of `doc` in document order.
pub fn todo_entries(doc: &Node) -> Vec<TodoEntry> {
    find_nodes(doc, is_todo_item)
        .into_iter()
        .map(|found| TodoEntry {
            pos: found.pos,
            checked: checked(&found.node).unwrap_or(false),
            created: string_attr(&found.node, "todo_created"),
            closed: string_attr(&found.node, "todo_closed"),
            text: found
                .node
                .first_child()
                .map(Node::text_content)
                .unwrap_or_default(),
        })
        .collect()
}

fn is_todo_item(node: &Node) -> bool {
    node.type_name() == "list_item" && checked(node).is_some()
}

fn checked(node: &Node) -> Option<bool> {
    node.attr("todo_checked").and_then(AttrValue::as_bool)
}

fn string_attr(node: &Node, name: &str) -> Option<String> {
    node.attr(name)
        .and_then(AttrValue::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Toggles the todo item at `pos`. Checking stamps the closed date with
/// today; unchecking clears it. A missing created date is stamped too.
pub fn toggle_todo(
    state: &EditorState,
    pos: usize,
    date_format: &str,
    now: NaiveDateTime,
) -> Result<Transaction, TransactionError> {
    let item = state
        .doc()
        .node_at(pos)
        .filter(is_todo_item)
        .ok_or_else(|| TransactionError::Invalid(format!("no todo item at {pos}")))?;
    let today = now.format(date_format).to_string();
    let now_checked = !checked(&item).unwrap_or(false);

    let mut attrs = item.attrs().clone();
    attrs.insert("todo_checked".into(), AttrValue::Bool(now_checked));
    attrs.insert(
        "todo_closed".into(),
        if now_checked { AttrValue::from(today.as_str()) } else { AttrValue::Null },
    );
    if string_attr(&item, "todo_created").is_none() {
        attrs.insert("todo_created".into(), AttrValue::from(today.as_str()));
    }

    let mut tr = state.tr();
    tr.set_node_attrs(pos, attrs)?;
    Ok(tr)
}

/// Stamps today's date on todo items that have no created date yet.
pub fn stamp_created_dates(state: &EditorState, date_format: &str, now: NaiveDateTime) -> Option<Transaction> {
    let missing: Vec<TodoEntry> = todo_entries(state.doc())
        .into_iter()
        .filter(|entry| entry.created.is_none())
        .collect();
    if missing.is_empty() {
        return None;
    }
    let today = now.format(date_format).to_string();
    let mut tr = state.tr();
    for entry in missing {
        tr.set_node_attr(entry.pos, "todo_created", today.as_str()).ok()?;
    }
    Some(tr)
}

#[derive(Clone, Debug, Default)]
pub struct TodoState {
    entries: Vec<TodoEntry>,
    decorations: DecorationSet,
}

impl TodoState {
    pub fn entries(&self) -> &[TodoEntry] {
        &self.entries
    }

    pub fn open(&self) -> impl Iterator<Item = &TodoEntry> {
        self.entries.iter().filter(|entry| !entry.checked)
    }
}

/// Derives the todo items of the document and their checkbox widgets.
pub struct TodoList {
    date_format: String,
    clock: Clock,
}

impl TodoList {
    pub fn new(date_format: impl Into<String>, clock: Clock) -> Self {
        TodoList {
            date_format: date_format.into(),
            clock,
        }
    }

    fn build(&self, doc: &Node) -> TodoState {
        let entries = todo_entries(doc);
        let decorations = entries
            .iter()
            .map(|entry| Decoration::widget(entry.pos + 1, self.checkbox(entry)))
            .collect();
        TodoState {
            decorations: DecorationSet::create(doc, decorations),
            entries,
        }
    }

    fn checkbox(&self, entry: &TodoEntry) -> Widget {
        let pos = entry.pos;
        let date_format = self.date_format.clone();
        let clock = self.clock.clone();
        let label = if entry.checked { "[x]" } else { "[ ]" };
        Widget::new(CHECKBOX_WIDGET_KEY, label)
            .with_side(-1)
            .with_action(move |state: &EditorState| toggle_todo(state, pos, &date_format, clock()).ok())
    }
}

impl PluginSpec for TodoList {
    type State = TodoState;
    type Meta = ();

    fn name(&self) -> &str {
        "todo"
    }

    fn init(&self, state: &EditorState) -> TodoState {
        self.build(state.doc())
    }

    fn apply(&self, cx: ApplyContext<'_, ()>, value: &TodoState) -> Result<TodoState, PluginApplyError> {
        if cx.doc_changed() {
            return Ok(self.build(cx.new_state.doc()));
        }
        Ok(value.clone())
    }

    fn decorations(&self, value: &TodoState, _state: &EditorState) -> Option<DecorationSet> {
        Some(value.decorations.clone())
    }
}

#[derive(Clone, Debug, Default)]
pub struct HideCompletedState {
    hidden: bool,
    decorations: DecorationSet,
}

impl HideCompletedState {
    pub fn is_hiding(&self) -> bool {
        self.hidden
    }

    /// Ranges of completed items, whether or not they are hidden.
    pub fn completed_ranges(&self) -> Vec<(usize, usize)> {
        self.decorations.iter().map(|deco| (deco.from(), deco.to())).collect()
    }
}

/// Hides checked todo items. A `true` meta flips the toggle.
pub struct HideCompleted {
    hidden_initially: bool,
}

impl HideCompleted {
    pub fn new(hidden_initially: bool) -> Self {
        HideCompleted { hidden_initially }
    }
}

fn completed_decorations(doc: &Node) -> DecorationSet {
    let decorations = find_nodes(doc, |node| is_todo_item(node) && checked(node) == Some(true))
        .into_iter()
        .map(|found| Decoration::node(found.pos, found.end(), deco_attrs([("class", HIDDEN_CLASS)])))
        .collect();
    DecorationSet::create(doc, decorations)
}

impl PluginSpec for HideCompleted {
    type State = HideCompletedState;
    type Meta = bool;

    fn name(&self) -> &str {
        "hide-completed"
    }

    fn init(&self, state: &EditorState) -> HideCompletedState {
        HideCompletedState {
            hidden: self.hidden_initially,
            decorations: completed_decorations(state.doc()),
        }
    }

    fn apply(
        &self,
        cx: ApplyContext<'_, bool>,
        value: &HideCompletedState,
    ) -> Result<HideCompletedState, PluginApplyError> {
        let hidden = if cx.meta == Some(&true) { !value.hidden } else { value.hidden };
        let decorations = if cx.doc_changed() {
            completed_decorations(cx.new_state.doc())
        } else {
            value.decorations.clone()
        };
        Ok(HideCompletedState { hidden, decorations })
    }

    fn decorations(&self, value: &HideCompletedState, _state: &EditorState) -> Option<DecorationSet> {
        value.hidden.then(|| value.decorations.clone())
    }
}

/// A transaction flipping the hide-completed toggle.
pub fn toggle_hide_completed(state: &EditorState, key: &PluginKey<HideCompleted>) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(key, true);
    tr
}
