use prose_model::{Attrs, Fragment, Mark, Node, NodeType, Slice};

use crate::error::{StepError, StepResult};
use crate::map::{MapRange, StepMap};

/// Atomic document edit. Every step produces a position map and can be
/// inverted against the document it was applied to.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Replaces `from..to` with a slice.
    Replace { from: usize, to: usize, slice: Slice },
    /// Replaces `from..to` with a slice while keeping `gap_from..gap_to`,
    /// which is reinserted into the slice at `insert`. Used to wrap content
    /// without disturbing positions inside it.
    ReplaceAround {
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        slice: Slice,
        insert: usize,
    },
    AddMark { from: usize, to: usize, mark: Mark },
    RemoveMark { from: usize, to: usize, mark: Mark },
    /// Changes the type and attributes of the node at `pos`, keeping content.
    SetNodeMarkup {
        pos: usize,
        node_type: NodeType,
        attrs: Attrs,
    },
}

impl Step {
    pub fn apply(&self, doc: &Node) -> StepResult<Node> {
        match self {
            Step::Replace { from, to, slice } => Ok(doc.replace(*from, *to, slice)?),
            Step::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                slice,
                insert,
            } => {
                let gap = doc.slice(*gap_from, *gap_to)?;
                if gap.open_start != 0 || gap.open_end != 0 {
                    return Err(StepError::Invalid("gap is not a flat range".to_string()));
                }
                let inserted = slice.insert_at(*insert, &gap.content)?;
                Ok(doc.replace(*from, *to, &inserted)?)
            }
            Step::AddMark { from, to, mark } => Ok(map_inline(doc, 0, *from, *to, &|node, parent| {
                if parent.node_type().allows_mark_type(mark.mark_type()) {
                    node.with_marks(mark.add_to_set(node.marks()))
                } else {
                    node.clone()
                }
            })),
            Step::RemoveMark { from, to, mark } => Ok(map_inline(doc, 0, *from, *to, &|node, _| {
                node.with_marks(mark.remove_from_set(node.marks()))
            })),
            Step::SetNodeMarkup {
                pos,
                node_type,
                attrs,
            } => {
                let node = node_at(doc, *pos)?;
                let updated = node.with_markup(node_type.clone(), attrs.clone());
                let slice = Slice::from_fragment(Fragment::from_node(updated));
                Ok(doc.replace(*pos, pos + node.node_size(), &slice)?)
            }
        }
    }

    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, slice } => StepMap::replaced(*from, to - from, slice.size()),
            Step::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                slice,
                insert,
            } => StepMap::new(vec![
                MapRange {
                    start: *from,
                    old_size: gap_from - from,
                    new_size: *insert,
                },
                MapRange {
                    start: *gap_to,
                    old_size: to - gap_to,
                    new_size: slice.size().saturating_sub(*insert),
                },
            ]),
            Step::AddMark { .. } | Step::RemoveMark { .. } | Step::SetNodeMarkup { .. } => {
                StepMap::identity()
            }
        }
    }

    /// The step that undoes this one, given the document it was applied to.
    pub fn invert(&self, doc: &Node) -> StepResult<Step> {
        match self {
            Step::Replace { from, to, slice } => Ok(Step::Replace {
                from: *from,
                to: from + slice.size(),
                slice: doc.slice(*from, *to)?,
            }),
            Step::ReplaceAround {
                from,
                to,
                gap_from,
                gap_to,
                slice,
                insert,
            } => {
                let gap = gap_to - gap_from;
                let removed = doc
                    .slice(*from, *to)?
                    .remove_between(gap_from - from, gap_to - from)?;
                Ok(Step::ReplaceAround {
                    from: *from,
                    to: from + slice.size() + gap,
                    gap_from: from + insert,
                    gap_to: from + insert + gap,
                    slice: removed,
                    insert: gap_from - from,
                })
            }
            Step::AddMark { from, to, mark } => Ok(Step::RemoveMark {
                from: *from,
                to: *to,
                mark: mark.clone(),
            }),
            Step::RemoveMark { from, to, mark } => Ok(Step::AddMark {
                from: *from,
                to: *to,
                mark: mark.clone(),
            }),
            Step::SetNodeMarkup { pos, .. } => {
                let node = node_at(doc, *pos)?;
                Ok(Step::SetNodeMarkup {
                    pos: *pos,
                    node_type: node.node_type().clone(),
                    attrs: node.attrs().clone(),
                })
            }
        }
    }
}

fn node_at(doc: &Node, pos: usize) -> StepResult<Node> {
    match doc.node_at(pos) {
        Some(node) if !node.is_text() => Ok(node),
        _ => Err(StepError::NoNode(pos)),
    }
}

/// Rebuilds `node` with `f` applied to every inline node overlapping
/// `from..to`. Text is split at the range edges. `start` is the absolute
/// position of the node's content.
fn map_inline(node: &Node, start: usize, from: usize, to: usize, f: &dyn Fn(&Node, &Node) -> Node) -> Node {
    let mut children = Vec::with_capacity(node.child_count());
    let mut pos = start;
    for child in node.children() {
        let end = pos + child.node_size();
        if end <= from || pos >= to {
            children.push(child.clone());
        } else if child.is_text() {
            let cut_from = from.max(pos) - pos;
            let cut_to = to.min(end) - pos;
            if cut_from > 0 {
                children.push(child.cut(0, cut_from));
            }
            children.push(f(&child.cut(cut_from, cut_to), node));
            if cut_to < child.node_size() {
                children.push(child.cut(cut_to, child.node_size()));
            }
        } else if child.is_inline() {
            children.push(f(child, node));
        } else {
            children.push(map_inline(child, pos + 1, from, to, f));
        }
        pos = end;
    }
    node.copy(Fragment::from_nodes(children))
}
