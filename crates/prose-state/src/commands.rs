//! Commands: `(state, dispatch?) -> bool`. Called without a dispatcher a
//! command only reports whether it would apply.

use std::sync::Arc;

use prose_model::{Attrs, Fragment, MarkType, Node, NodeType, Selection};
use tracing::debug;

use crate::error::TransactionError;
use crate::state::EditorState;
use crate::transaction::Transaction;

pub type Dispatch<'a> = &'a mut dyn FnMut(Transaction);

pub type Command = Arc<dyn Fn(&EditorState, Option<Dispatch<'_>>) -> bool + Send + Sync>;

type Predicate = Arc<dyn Fn(&EditorState) -> bool + Send + Sync>;

/// Runs `build` on a fresh transaction and dispatches it when it succeeds
/// and leaves a valid document.
fn run_with<F>(state: &EditorState, dispatch: Option<Dispatch<'_>>, build: F) -> bool
where
    F: FnOnce(&mut Transaction) -> Result<(), TransactionError>,
{
    let mut tr = state.tr();
    if let Err(err) = build(&mut tr) {
        debug!(error = %err, "command not applicable");
        return false;
    }
    if let Err(err) = tr.doc().check() {
        debug!(error = %err, "command would produce invalid content");
        return false;
    }
    if let Some(dispatch) = dispatch {
        dispatch(tr);
    }
    true
}

/// Whether `mark_type` can be applied to the current selection.
fn mark_applies(state: &EditorState, mark_type: &MarkType) -> bool {
    let selection = state.selection();
    if selection.is_empty() {
        return state
            .doc()
            .resolve(selection.head())
            .map(|pos| pos.parent().inline_content() && pos.parent().node_type().allows_mark_type(mark_type))
            .unwrap_or(false);
    }
    let mut applies = false;
    state.doc().nodes_between(selection.from(), selection.to(), &mut |node: &Node, _, _, _| {
        if applies {
            return false;
        }
        applies = node.inline_content() && node.node_type().allows_mark_type(mark_type);
        true
    });
    applies
}

/// Adds the mark to the selection, or removes it when the selection already
/// has it anywhere. On an empty selection toggles the stored marks.
pub fn toggle_mark(mark_type: MarkType, attrs: Attrs) -> Command {
    Arc::new(move |state: &EditorState, dispatch: Option<Dispatch<'_>>| {
        if !mark_applies(state, &mark_type) {
            return false;
        }
        let Ok(mark) = mark_type.create(attrs.clone()) else {
            return false;
        };
        let selection = state.selection();
        run_with(state, dispatch, |tr| {
            if selection.is_empty() {
                let current = state.cursor_marks();
                let next = if mark_type.is_in_set(&current).is_some() {
                    mark_type.remove_from_set(&current)
                } else {
                    mark.add_to_set(&current)
                };
                tr.set_stored_marks(Some(next));
            } else if state.doc().range_has_mark(selection.from(), selection.to(), &mark_type) {
                tr.remove_mark(selection.from(), selection.to(), &mark_type)?;
            } else {
                tr.add_mark(selection.from(), selection.to(), &mark)?;
            }
            Ok(())
        })
    })
}

pub fn mark_active(state: &EditorState, mark_type: &MarkType) -> bool {
    let selection = state.selection();
    if selection.is_empty() {
        return mark_type.is_in_set(&state.cursor_marks()).is_some();
    }
    state.doc().range_has_mark(selection.from(), selection.to(), mark_type)
}

fn has_attrs(node: &Node, attrs: &Attrs) -> bool {
    attrs.iter().all(|(name, value)| node.attr(name) == Some(value))
}

/// Textblocks touched by the selection.
fn selected_textblocks(state: &EditorState) -> Vec<(usize, Node)> {
    let selection = state.selection();
    let mut blocks = Vec::new();
    state.doc().nodes_between(selection.from(), selection.to(), &mut |node: &Node, pos, _, _| {
        if node.is_textblock() {
            blocks.push((pos, node.clone()));
            return false;
        }
        true
    });
    blocks
}

/// Turns the selected textblocks into `node_type`.
pub fn set_block_type(node_type: NodeType, attrs: Attrs) -> Command {
    Arc::new(move |state: &EditorState, dispatch: Option<Dispatch<'_>>| {
        let changes = selected_textblocks(state)
            .iter()
            .any(|(_, node)| node.node_type() != &node_type || !has_attrs(node, &attrs));
        if !changes {
            return false;
        }
        let selection = state.selection();
        run_with(state, dispatch, |tr| {
            tr.set_block_type(selection.from(), selection.to(), &node_type, attrs.clone())?;
            Ok(())
        })
    })
}

/// Every selected textblock has `node_type` and carries `attrs`.
pub fn block_active(state: &EditorState, node_type: &NodeType, attrs: &Attrs) -> bool {
    let blocks = selected_textblocks(state);
    !blocks.is_empty()
        && blocks
            .iter()
            .all(|(_, node)| node.node_type() == node_type && has_attrs(node, attrs))
}

/// Range of sibling blocks covering the selection: the parent depth, and
/// the positions before the first and after the last block.
fn block_range(state: &EditorState) -> Option<(usize, usize, usize)> {
    let selection = state.selection();
    let from = state.doc().resolve(selection.from()).ok()?;
    let to = state.doc().resolve(selection.to()).ok()?;
    let mut depth = from.shared_depth(selection.to());
    // Step out of textblocks so the range spans whole blocks.
    while depth > 0 && from.node(depth).inline_content() {
        depth -= 1;
    }
    let start = if depth == from.depth() {
        selection.from()
    } else {
        from.before(depth + 1)?
    };
    let end = if depth == to.depth() {
        selection.to()
    } else {
        to.after(depth + 1)?
    };
    Some((depth, start, end))
}

/// Wraps the selected blocks in a list of `list_type`, one item per block.
pub fn wrap_in_list(list_type: NodeType, attrs: Attrs) -> Command {
    Arc::new(move |state: &EditorState, dispatch: Option<Dispatch<'_>>| {
        if list_active(state, &list_type) {
            return false;
        }
        let Some((depth, start, end)) = block_range(state) else {
            return false;
        };
        let Some(item_type) = state.schema().node_type("list_item").cloned() else {
            return false;
        };
        let selection = state.selection();
        run_with(state, dispatch, |tr| {
            let resolved = state.doc().resolve(start)?;
            let offset = resolved.start(depth);
            let blocks = resolved.node(depth).content().cut(start - offset, end - offset).to_vec();
            if blocks.len() == 1 {
                tr.wrap(start, end, &[(list_type.clone(), attrs.clone()), (item_type.clone(), Attrs::new())])?;
                return Ok(());
            }
            let items = blocks
                .into_iter()
                .map(|block| item_type.create(Attrs::new(), Fragment::from_node(block), Vec::new()))
                .collect::<Result<Vec<_>, _>>()?;
            let list = list_type.create(attrs.clone(), Fragment::from_nodes(items), Vec::new())?;
            tr.replace(start, end, Fragment::from_node(list))?;
            let shift = |pos: usize| pos + 2 + 2 * block_index(state.doc(), depth, start, pos);
            let anchor = shift(selection.anchor());
            let head = shift(selection.head());
            let selection = Selection::text(tr.doc(), anchor, head)?;
            tr.set_selection(selection)?;
            Ok(())
        })
    })
}

/// Index, among the blocks of the range starting at `start`, of the block
/// containing `pos`.
fn block_index(doc: &Node, depth: usize, start: usize, pos: usize) -> usize {
    let first = doc.resolve(start).map(|r| r.index(depth)).unwrap_or(0);
    let own = doc.resolve(pos).map(|r| r.index(depth)).unwrap_or(first);
    own.saturating_sub(first)
}

/// The innermost list around the selection has `list_type`.
pub fn list_active(state: &EditorState, list_type: &NodeType) -> bool {
    let Ok(pos) = state.doc().resolve(state.selection().from()) else {
        return false;
    };
    (0..=pos.depth())
        .rev()
        .map(|depth| pos.node(depth))
        .find(|node| node.node_type().content_expr().starts_with("list_item"))
        .is_some_and(|node| node.node_type() == list_type)
}

/// Replaces the selection with `text`.
pub fn insert_text(text: impl Into<String>) -> Command {
    let text = text.into();
    Arc::new(move |state: &EditorState, dispatch: Option<Dispatch<'_>>| {
        let Ok(pos) = state.doc().resolve(state.selection().from()) else {
            return false;
        };
        if !pos.parent().inline_content() {
            return false;
        }
        run_with(state, dispatch, |tr| {
            tr.replace_selection_with_text(&text)?;
            Ok(())
        })
    })
}

/// A command together with the predicates menus and key bindings consume.
///
/// Bindings are values: [`CommandBinding::derive`] and the `with_*`
/// methods return new bindings and never touch the one they start from.
#[derive(Clone)]
pub struct CommandBinding {
    label: String,
    command: Command,
    active: Predicate,
    enabled: Predicate,
}

impl CommandBinding {
    /// A binding that is never active and enabled whenever the command
    /// applies.
    pub fn new(label: impl Into<String>, command: Command) -> Self {
        let check = command.clone();
        CommandBinding {
            label: label.into(),
            command,
            active: Arc::new(|_: &EditorState| false),
            enabled: Arc::new(move |state: &EditorState| check(state, None)),
        }
    }

    pub fn mark(label: impl Into<String>, mark_type: MarkType, attrs: Attrs) -> Self {
        let command = toggle_mark(mark_type.clone(), attrs);
        CommandBinding::new(label, command)
            .with_active(move |state: &EditorState| mark_active(state, &mark_type))
    }

    pub fn block(label: impl Into<String>, node_type: NodeType, attrs: Attrs) -> Self {
        let command = set_block_type(node_type.clone(), attrs.clone());
        CommandBinding::new(label, command)
            .with_active(move |state: &EditorState| block_active(state, &node_type, &attrs))
    }

    pub fn list(label: impl Into<String>, list_type: NodeType, attrs: Attrs) -> Self {
        let command = wrap_in_list(list_type.clone(), attrs);
        CommandBinding::new(label, command)
            .with_active(move |state: &EditorState| list_active(state, &list_type))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Runs the command unless the binding is disabled.
    pub fn run(&self, state: &EditorState, dispatch: Option<Dispatch<'_>>) -> bool {
        !self.is_disabled(state) && (self.command)(state, dispatch)
    }

    pub fn is_active(&self, state: &EditorState) -> bool {
        (self.active)(state)
    }

    pub fn is_disabled(&self, state: &EditorState) -> bool {
        !(self.enabled)(state)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_active<F>(mut self, active: F) -> Self
    where
        F: Fn(&EditorState) -> bool + Send + Sync + 'static,
    {
        self.active = Arc::new(active);
        self
    }

    /// Extra enable condition, combined with the existing one.
    pub fn with_enabled<F>(mut self, enabled: F) -> Self
    where
        F: Fn(&EditorState) -> bool + Send + Sync + 'static,
    {
        let base = self.enabled.clone();
        self.enabled = Arc::new(move |state: &EditorState| base(state) && enabled(state));
        self
    }

    /// Builds a derived binding from a copy of this one.
    pub fn derive<F>(&self, transform: F) -> CommandBinding
    where
        F: FnOnce(CommandBinding) -> CommandBinding,
    {
        transform(self.clone())
    }
}

impl std::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBinding").field("label", &self.label).finish()
    }
}
