//! Slices and the structural replace algorithm.
//!
//! A slice is a fragment whose edges may be open: its first `open_start`
//! levels on the left continue nodes from the surrounding document, and the
//! same for `open_end` on the right. Replacing a range with a slice joins the
//! open edges into the nodes at the cut points.

use crate::error::{ModelError, ModelResult};
use crate::fragment::Fragment;
use crate::node::Node;
use crate::resolve::ResolvedPos;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slice {
    pub content: Fragment,
    pub open_start: usize,
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Self {
        Slice {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Self {
        Slice::default()
    }

    /// Closed slice around a fragment.
    pub fn from_fragment(content: Fragment) -> Self {
        Slice::new(content, 0, 0)
    }

    /// Positions this slice adds when inserted.
    pub fn size(&self) -> usize {
        self.content
            .size()
            .saturating_sub(self.open_start + self.open_end)
    }

    pub fn is_empty(&self) -> bool {
        self.content.size() == 0
    }

    /// Inserts `fragment` at slice position `pos`, descending into open nodes.
    pub fn insert_at(&self, pos: usize, fragment: &Fragment) -> ModelResult<Slice> {
        let content = insert_into(&self.content, pos + self.open_start, fragment)?;
        Ok(Slice::new(content, self.open_start, self.open_end))
    }

    /// Removes the flat range `from..to` (slice positions) from the slice.
    pub fn remove_between(&self, from: usize, to: usize) -> ModelResult<Slice> {
        let content = remove_range(&self.content, from + self.open_start, to + self.open_start)?;
        Ok(Slice::new(content, self.open_start, self.open_end))
    }
}

fn insert_into(content: &Fragment, dist: usize, insert: &Fragment) -> ModelResult<Fragment> {
    let (index, offset) = content.find_index(dist)?;
    match content.child(index) {
        Some(child) if offset != dist && !child.is_text() => {
            let inner = insert_into(child.content(), dist - offset - 1, insert)?;
            Ok(content.replace_child(index, child.copy(inner)))
        }
        _ => Ok(content
            .cut(0, dist)
            .append(insert)
            .append(&content.cut(dist, content.size()))),
    }
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> ModelResult<Fragment> {
    let (index, offset) = content.find_index(from)?;
    let (index_to, offset_to) = content.find_index(to)?;
    match content.child(index) {
        Some(child) if offset != from && !child.is_text() => {
            if index != index_to {
                return Err(ModelError::Replace("removing a non-flat range".to_string()));
            }
            let inner = remove_range(child.content(), from - offset - 1, to - offset - 1)?;
            Ok(content.replace_child(index, child.copy(inner)))
        }
        _ => {
            let flat_end = offset_to == to || content.child(index_to).map_or(true, Node::is_text);
            if !flat_end {
                return Err(ModelError::Replace("removing a non-flat range".to_string()));
            }
            Ok(content.cut(0, from).append(&content.cut(to, content.size())))
        }
    }
}

pub(crate) fn replace(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice) -> ModelResult<Node> {
    if slice.open_start > from.depth() {
        return Err(ModelError::Replace(
            "inserted content deeper than insertion position".to_string(),
        ));
    }
    if slice.open_end > to.depth()
        || from.depth() - slice.open_start != to.depth() - slice.open_end
    {
        return Err(ModelError::Replace("inconsistent open depths".to_string()));
    }
    replace_outer(from, to, slice, 0)
}

fn replace_outer(from: &ResolvedPos, to: &ResolvedPos, slice: &Slice, depth: usize) -> ModelResult<Node> {
    let index = from.index(depth);
    let node = from.node(depth);
    if index == to.index(depth) && depth < from.depth() - slice.open_start {
        let inner = replace_outer(from, to, slice, depth + 1)?;
        return Ok(node.copy(node.content().replace_child(index, inner)));
    }
    if slice.content.size() == 0 {
        return Ok(close(node, replace_two_way(from, to, depth)?));
    }
    if slice.open_start == 0 && slice.open_end == 0 && from.depth() == depth && to.depth() == depth {
        let parent = from.parent();
        let content = parent.content();
        let joined = content
            .cut(0, from.parent_offset())
            .append(&slice.content)
            .append(&content.cut(to.parent_offset(), content.size()));
        return Ok(close(parent, joined));
    }
    let (start, end) = prepare_slice_for_replace(slice, from)?;
    Ok(close(node, replace_three_way(from, &start, &end, to, depth)?))
}

fn check_join(main: &Node, sub: &Node) -> ModelResult<()> {
    if sub.node_type().compatible_content(main.node_type()) {
        Ok(())
    } else {
        Err(ModelError::Replace(format!(
            "cannot join {} onto {}",
            sub.type_name(),
            main.type_name()
        )))
    }
}

fn joinable(before: &ResolvedPos, after: &ResolvedPos, depth: usize) -> ModelResult<Node> {
    let node = before.node(depth).clone();
    check_join(&node, after.node(depth))?;
    Ok(node)
}

fn add_range(start: Option<&ResolvedPos>, end: Option<&ResolvedPos>, depth: usize, target: &mut Vec<Node>) {
    let Some(anchor) = end.or(start) else {
        return;
    };
    let node = anchor.node(depth);
    let mut start_index = 0;
    let end_index = end.map_or(node.child_count(), |end| end.index(depth));
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            if let Some(after) = start.node_after() {
                target.push(after);
            }
            start_index += 1;
        }
    }
    for index in start_index..end_index {
        if let Some(child) = node.child(index) {
            target.push(child.clone());
        }
    }
    if let Some(end) = end {
        if end.depth() == depth && end.text_offset() > 0 {
            if let Some(before) = end.node_before() {
                target.push(before);
            }
        }
    }
}

fn close(node: &Node, content: Fragment) -> Node {
    node.copy(content)
}

fn replace_three_way(
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> ModelResult<Fragment> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?)
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?)
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(left), Some(right)) if start.index(depth) == end.index(depth) => {
            check_join(left, right)?;
            content.push(close(left, replace_three_way(from, start, end, to, depth + 1)?));
        }
        _ => {
            if let Some(left) = &open_start {
                content.push(close(left, replace_two_way(from, start, depth + 1)?));
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(right) = &open_end {
                content.push(close(right, replace_two_way(end, to, depth + 1)?));
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

fn replace_two_way(from: &ResolvedPos, to: &ResolvedPos, depth: usize) -> ModelResult<Fragment> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let node = joinable(from, to, depth + 1)?;
        content.push(close(&node, replace_two_way(from, to, depth + 1)?));
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_nodes(content))
}

/// Wraps the slice in copies of the ancestors of `along` so its open edges
/// can be resolved like document positions.
fn prepare_slice_for_replace(slice: &Slice, along: &ResolvedPos) -> ModelResult<(ResolvedPos, ResolvedPos)> {
    let extra = along.depth() - slice.open_start;
    let mut node = along.node(extra).copy(slice.content.clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from_node(node));
    }
    let start = node.resolve(slice.open_start + extra)?;
    let end_pos = node
        .content_size()
        .checked_sub(slice.open_end + extra)
        .ok_or_else(|| ModelError::Replace("slice open end exceeds its content".to_string()))?;
    let end = node.resolve(end_pos)?;
    Ok((start, end))
}
