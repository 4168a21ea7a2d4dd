//! Document walks shared by the feature plugins.

use prose_model::{char_len, Node};
use prose_state::Transaction;
use prose_transform::{Mappable, Step};

/// A node and the position just before it.
#[derive(Clone, Debug)]
pub(crate) struct Located {
    pub pos: usize,
    pub node: Node,
}

impl Located {
    pub fn end(&self) -> usize {
        self.pos + self.node.node_size()
    }
}

/// Every node matching `predicate`, in document order.
pub(crate) fn find_nodes<P>(doc: &Node, mut predicate: P) -> Vec<Located>
where
    P: FnMut(&Node) -> bool,
{
    let mut found = Vec::new();
    doc.descendants(|node, pos, _, _| {
        if predicate(node) {
            found.push(Located { pos, node: node.clone() });
        }
        true
    });
    found
}

/// Text children of a textblock with the position of their first character.
pub(crate) fn text_runs(block: &Node, block_pos: usize) -> Vec<(usize, String)> {
    let mut runs = Vec::new();
    let mut offset = block_pos + 1;
    for child in block.children() {
        if let Some(text) = child.text() {
            runs.push((offset, text.to_string()));
        }
        offset += child.node_size();
    }
    runs
}

/// Character offset of byte index `byte` in `text`.
pub(crate) fn char_offset(text: &str, byte: usize) -> usize {
    char_len(&text[..byte])
}

/// Textblocks and list items: the units folding hides.
pub(crate) fn is_foldable(node: &Node) -> bool {
    node.is_textblock() || node.type_name() == "list_item"
}

pub(crate) fn is_heading(node: &Node) -> bool {
    node.type_name() == "heading"
}

/// Heading level, clamped to 1..=6.
pub(crate) fn heading_level(node: &Node) -> u8 {
    node.attr("level")
        .and_then(|value| value.as_int())
        .unwrap_or(1)
        .clamp(1, 6) as u8
}

/// Whether `node` is or contains a heading.
pub(crate) fn contains_heading(node: &Node) -> bool {
    if is_heading(node) {
        return true;
    }
    let mut found = false;
    node.descendants(|child, _, _, _| {
        if is_heading(child) {
            found = true;
        }
        !found
    });
    found
}

/// Textblocks an edit touched, taken from the document before and after each
/// step. Wherever the edit happened, these are the blocks whose derived state
/// may be out of date.
pub(crate) fn touched_textblocks(tr: &Transaction) -> Vec<Node> {
    let docs = tr.transform().docs();
    let maps = tr.mapping().maps();
    let mut found = Vec::new();
    for (index, step) in tr.steps().iter().enumerate() {
        let (Some(before), Some(map)) = (docs.get(index), maps.get(index)) else {
            continue;
        };
        let after = docs.get(index + 1).unwrap_or(tr.doc());
        let mut ranges = Vec::new();
        match step {
            // Position maps of markup changes are empty.
            Step::SetNodeMarkup { pos, .. } => ranges.push((*pos, pos + 1, *pos, pos + 1)),
            _ => map.for_each(|old_start, old_end, new_start, new_end| {
                ranges.push((old_start, old_end, new_start, new_end));
            }),
        }
        for (old_start, old_end, new_start, new_end) in ranges {
            collect_textblocks(before, old_start, old_end, &mut found);
            collect_textblocks(after, new_start, new_end, &mut found);
        }
    }
    found
}

fn collect_textblocks(doc: &Node, from: usize, to: usize, found: &mut Vec<Node>) {
    let to = to.min(doc.content_size());
    doc.nodes_between(from.min(to), to, &mut |node: &Node, _: usize, _: &Node, _: usize| {
        if node.is_textblock() {
            found.push(node.clone());
            return false;
        }
        true
    });
}

/// Maps `pos` forward, or `None` when the position was deleted.
pub(crate) fn map_pos(mapping: &impl Mappable, pos: usize, assoc: i8) -> Option<usize> {
    let result = mapping.map_result(pos, assoc);
    (!result.deleted()).then_some(result.pos)
}
