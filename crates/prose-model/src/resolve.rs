use crate::error::{ModelError, ModelResult};
use crate::mark::Mark;
use crate::node::Node;

#[derive(Clone, Debug)]
struct PathEntry {
    node: Node,
    index: usize,
    offset: usize,
}

/// A document position resolved into the chain of ancestors that contain it.
#[derive(Clone, Debug)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub(crate) fn resolve(doc: &Node, pos: usize) -> ModelResult<Self> {
        if pos > doc.content_size() {
            return Err(ModelError::OutOfRange {
                pos,
                size: doc.content_size(),
            });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset)?;
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let child = match node.child(index) {
                Some(child) if !child.is_text() => child.clone(),
                _ => break,
            };
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(ResolvedPos {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Number of ancestors between the document and the innermost parent.
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    pub fn parent(&self) -> &Node {
        &self.path[self.depth()].node
    }

    pub fn doc(&self) -> &Node {
        &self.path[0].node
    }

    /// Ancestor at `depth`, clamped to the innermost parent.
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth.min(self.depth())].node
    }

    /// Index into the ancestor at `depth`.
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth.min(self.depth())].index
    }

    /// Index pointing after this position in the ancestor at `depth`.
    pub fn index_after(&self, depth: usize) -> usize {
        let depth = depth.min(self.depth());
        let inside = depth < self.depth() || self.text_offset() > 0;
        self.index(depth) + usize::from(inside)
    }

    /// Start position of the content of the ancestor at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        match depth.min(self.depth()) {
            0 => 0,
            d => self.path[d - 1].offset + 1,
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content_size()
    }

    /// Position before the ancestor at `depth`. The document has none.
    pub fn before(&self, depth: usize) -> Option<usize> {
        match depth.min(self.depth()) {
            0 => None,
            d => Some(self.path[d - 1].offset),
        }
    }

    pub fn after(&self, depth: usize) -> Option<usize> {
        self.before(depth)
            .map(|before| before + self.node(depth).node_size())
    }

    /// Offset into the text node the position points into, zero on a boundary.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let child = parent.child(index)?;
        let offset = self.text_offset();
        if offset > 0 {
            Some(child.cut(offset, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        let offset = self.text_offset();
        if offset > 0 {
            return parent.child(index).map(|child| child.cut(0, offset));
        }
        if index == 0 {
            return None;
        }
        parent.child(index - 1).cloned()
    }

    /// Marks that text inserted here would get: those of the node before,
    /// minus non-inclusive marks that do not continue after.
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content().is_empty() {
            return Vec::new();
        }
        if self.text_offset() > 0 {
            return parent
                .child(index)
                .map(|child| child.marks().to_vec())
                .unwrap_or_default();
        }
        let before = if index > 0 { parent.child(index - 1) } else { None };
        let after = parent.child(index);
        let (main, other) = match (before, after) {
            (Some(before), after) => (before, after),
            (None, Some(after)) => (after, None),
            (None, None) => return Vec::new(),
        };
        let mut marks = main.marks().to_vec();
        for mark in main.marks() {
            let continues = other.is_some_and(|node| mark.is_in_set(node.marks()));
            if !mark.mark_type().is_inclusive() && !continues {
                marks = mark.remove_from_set(&marks);
            }
        }
        marks
    }

    /// Deepest depth whose ancestor contains both this position and `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }

    /// Depth of the innermost ancestor that is a textblock.
    pub fn textblock_depth(&self) -> Option<usize> {
        (0..=self.depth()).rev().find(|&d| self.node(d).is_textblock())
    }
}
