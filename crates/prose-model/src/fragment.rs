use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::node::Node;

/// Ordered child sequence of a node, with its cached token size.
///
/// Adjacent text nodes with identical marks are always merged and empty text
/// nodes dropped, so equal content has exactly one representation.
#[derive(Clone, Default)]
pub struct Fragment {
    children: Vec<Node>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Fragment::default()
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut fragment = Fragment::empty();
        for node in nodes {
            fragment.push(node);
        }
        fragment
    }

    pub fn from_node(node: Node) -> Self {
        Fragment::from_nodes([node])
    }

    fn push(&mut self, node: Node) {
        if node.is_text() && node.node_size() == 0 {
            return;
        }
        if let Some(last) = self.children.last_mut() {
            if let Some(joined) = last.join_text(&node) {
                self.size += node.node_size();
                *last = joined;
                return;
            }
        }
        self.size += node.node_size();
        self.children.push(node);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.children.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.children.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.children.iter()
    }

    pub fn to_vec(&self) -> Vec<Node> {
        self.children.clone()
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        let mut out = self.clone();
        for node in other.iter() {
            out.push(node.clone());
        }
        out
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        let mut children = self.children.clone();
        if index < children.len() {
            children[index] = node;
        }
        Fragment::from_nodes(children)
    }

    /// Cuts out the part between `from` and `to`, cutting into children at the
    /// edges.
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to >= self.size {
            return self.clone();
        }
        let mut out = Fragment::empty();
        if to <= from {
            return out;
        }
        let mut pos = 0;
        for child in &self.children {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                let piece = if pos < from || end > to {
                    if child.is_text() {
                        child.cut(from.saturating_sub(pos), (to - pos).min(child.node_size()))
                    } else {
                        child.cut(
                            from.saturating_sub(pos + 1),
                            (to - pos).saturating_sub(1).min(child.content_size()),
                        )
                    }
                } else {
                    child.clone()
                };
                out.push(piece);
            }
            pos = end;
        }
        out
    }

    /// Index of the child at `pos` and that child's start offset. A position on
    /// a child boundary resolves to the child after it.
    pub fn find_index(&self, pos: usize) -> ModelResult<(usize, usize)> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size {
            return Ok((self.children.len(), pos));
        }
        if pos > self.size {
            return Err(ModelError::OutOfRange {
                pos,
                size: self.size,
            });
        }
        let mut cur = 0;
        for (index, child) in self.children.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos {
                    return Ok((index + 1, end));
                }
                return Ok((index, cur));
            }
            cur = end;
        }
        Ok((self.children.len(), self.size))
    }

    /// Visits nodes overlapping `from..to`, relative to this fragment. The
    /// callback receives the node, its absolute position, its parent and its
    /// index; returning `false` skips the node's children.
    pub fn nodes_between<F>(&self, from: usize, to: usize, parent: &Node, node_start: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        let mut pos = 0;
        for (index, child) in self.children.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, index) && child.content_size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    to.saturating_sub(start).min(child.content_size()),
                    child,
                    node_start + start,
                    f,
                );
            }
            pos = end;
        }
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.children == other.children
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.children.iter()).finish()
    }
}

impl From<Node> for Fragment {
    fn from(node: Node) -> Self {
        Fragment::from_node(node)
    }
}

impl From<Vec<Node>> for Fragment {
    fn from(nodes: Vec<Node>) -> Self {
        Fragment::from_nodes(nodes)
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.children.iter()
    }
}
