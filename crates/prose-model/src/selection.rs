use crate::error::{ModelError, ModelResult};
use crate::node::Node;
use crate::resolve::ResolvedPos;

/// Selection over a document: a text range between anchor and head, or a
/// whole selected node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selection {
    Text { anchor: usize, head: usize },
    Node { from: usize, to: usize },
}

impl Selection {
    pub fn text(doc: &Node, anchor: usize, head: usize) -> ModelResult<Self> {
        doc.resolve(anchor)?;
        doc.resolve(head)?;
        Ok(Selection::Text { anchor, head })
    }

    pub fn cursor(doc: &Node, pos: usize) -> ModelResult<Self> {
        Selection::text(doc, pos, pos)
    }

    /// Selects the non-text node starting at `pos`.
    pub fn node(doc: &Node, pos: usize) -> ModelResult<Self> {
        match doc.resolve(pos)?.node_after() {
            Some(node) if !node.is_text() => Ok(Selection::Node {
                from: pos,
                to: pos + node.node_size(),
            }),
            _ => Err(ModelError::InvalidSelection(format!(
                "no node to select at position {pos}"
            ))),
        }
    }

    /// Cursor at the start of the first textblock, or position 0.
    pub fn at_start(doc: &Node) -> Self {
        let mut found = None;
        doc.descendants(|node, pos, _, _| {
            if found.is_some() {
                return false;
            }
            if node.is_textblock() {
                found = Some(pos + 1);
                return false;
            }
            true
        });
        let pos = found.unwrap_or(0);
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    /// Cursor at the end of the last textblock, or the end of the document.
    pub fn at_end(doc: &Node) -> Self {
        let mut found = None;
        doc.descendants(|node, pos, _, _| {
            if node.is_textblock() {
                found = Some(pos + 1 + node.content_size());
                return false;
            }
            true
        });
        let pos = found.unwrap_or(doc.content_size());
        Selection::Text {
            anchor: pos,
            head: pos,
        }
    }

    /// Selects the whole document content.
    pub fn all(doc: &Node) -> Self {
        Selection::Text {
            anchor: 0,
            head: doc.content_size(),
        }
    }

    pub fn anchor(&self) -> usize {
        match *self {
            Selection::Text { anchor, .. } => anchor,
            Selection::Node { from, .. } => from,
        }
    }

    pub fn head(&self) -> usize {
        match *self {
            Selection::Text { head, .. } => head,
            Selection::Node { to, .. } => to,
        }
    }

    pub fn from(&self) -> usize {
        self.anchor().min(self.head())
    }

    pub fn to(&self) -> usize {
        self.anchor().max(self.head())
    }

    pub fn is_empty(&self) -> bool {
        self.anchor() == self.head()
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Selection::Node { .. })
    }

    pub fn selected_node(&self, doc: &Node) -> Option<Node> {
        match *self {
            Selection::Node { from, .. } => doc.node_at(from),
            Selection::Text { .. } => None,
        }
    }

    pub fn resolve_from(&self, doc: &Node) -> ModelResult<ResolvedPos> {
        doc.resolve(self.from())
    }

    pub fn resolve_head(&self, doc: &Node) -> ModelResult<ResolvedPos> {
        doc.resolve(self.head())
    }

    /// Maps the selection through a change. `map` takes a position and an
    /// association and returns the new position and whether the content
    /// around it was deleted. A node selection whose node is gone collapses
    /// to a cursor.
    pub fn map<F>(&self, doc: &Node, map: F) -> Selection
    where
        F: Fn(usize, i8) -> (usize, bool),
    {
        let limit = doc.content_size();
        match *self {
            Selection::Text { anchor, head } => {
                let anchor = map(anchor, 1).0.min(limit);
                let head = map(head, 1).0.min(limit);
                Selection::Text { anchor, head }
            }
            Selection::Node { from, .. } => {
                let (pos, deleted) = map(from, 1);
                let pos = pos.min(limit);
                if !deleted {
                    if let Ok(selection) = Selection::node(doc, pos) {
                        return selection;
                    }
                }
                Selection::Text {
                    anchor: pos,
                    head: pos,
                }
            }
        }
    }
}
