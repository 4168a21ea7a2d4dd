use std::fmt;
use std::sync::Arc;

use crate::attrs::{AttrValue, Attrs};
use crate::error::{ModelError, ModelResult};
use crate::fragment::Fragment;
use crate::mark::{mark_set, Mark};
use crate::replace::{replace, Slice};
use crate::resolve::ResolvedPos;
use crate::schema::{MarkType, NodeType};

struct NodeData {
    node_type: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<String>,
    size: usize,
}

/// Persistent document node. Cloning shares the subtree; every edit builds a
/// new spine and reuses untouched children.
///
/// Sizes follow the flattened token model: a text node counts its characters,
/// a leaf counts 1, and any other node counts its content plus an opening and
/// a closing token.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl Node {
    pub(crate) fn new(node_type: NodeType, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> Self {
        let size = if node_type.is_leaf() {
            1
        } else {
            content.size() + 2
        };
        Node(Arc::new(NodeData {
            node_type,
            attrs,
            content,
            marks,
            text: None,
            size,
        }))
    }

    pub(crate) fn new_text(node_type: NodeType, text: String, marks: Vec<Mark>) -> Self {
        let size = char_len(&text);
        Node(Arc::new(NodeData {
            node_type,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            text: Some(text),
            size,
        }))
    }

    /// Whether both handles point at the same shared subtree.
    pub fn ptr_eq(a: &Node, b: &Node) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn node_type(&self) -> &NodeType {
        &self.0.node_type
    }

    pub fn type_name(&self) -> &str {
        self.0.node_type.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.0.attrs.get(name)
    }

    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_inline(&self) -> bool {
        self.0.node_type.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.0.node_type.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.node_type.is_textblock()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.node_type.is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.0.node_type.is_atom()
    }

    pub fn inline_content(&self) -> bool {
        self.0.node_type.inline_content()
    }

    pub fn node_size(&self) -> usize {
        self.0.size
    }

    pub fn content_size(&self) -> usize {
        self.0.content.size()
    }

    pub fn child_count(&self) -> usize {
        self.0.content.child_count()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.0.content.child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last_child()
    }

    pub fn children(&self) -> std::slice::Iter<'_, Node> {
        self.0.content.iter()
    }

    /// Depth-first walk over all descendants. The visitor gets the node, its
    /// position, its parent and its index; returning `false` skips its subtree.
    pub fn descendants<F>(&self, mut f: F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        self.nodes_between(0, self.content_size(), &mut f);
    }

    pub fn nodes_between<F>(&self, from: usize, to: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        self.0.content.nodes_between(from, to, self, 0, f);
    }

    pub fn text_content(&self) -> String {
        match self.text() {
            Some(text) => text.to_string(),
            None => self.text_between(0, self.content_size(), "", ""),
        }
    }

    /// Text between two content positions. Textblocks and non-empty block
    /// leaves are separated by `block_separator`; inline leaves render as
    /// `leaf_text`.
    pub fn text_between(&self, from: usize, to: usize, block_separator: &str, leaf_text: &str) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(from, to, &mut |node: &Node, pos: usize, _: &Node, _: usize| {
            let node_text = match node.text() {
                Some(value) => {
                    let start = from.max(pos) - pos;
                    let end = to.saturating_sub(pos).min(node.node_size());
                    char_slice(value, start, end).to_string()
                }
                None if node.is_leaf() => leaf_text.to_string(),
                None => String::new(),
            };
            let separates = (node.is_block() && node.is_leaf() && !node_text.is_empty())
                || node.is_textblock();
            if separates && !block_separator.is_empty() {
                if first {
                    first = false;
                } else {
                    text.push_str(block_separator);
                }
            }
            text.push_str(&node_text);
            true
        });
        text
    }

    /// Same node with different content.
    pub fn copy(&self, content: Fragment) -> Node {
        Node::new(
            self.0.node_type.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
        )
    }

    pub fn with_marks(&self, marks: Vec<Mark>) -> Node {
        if self.0.marks == marks {
            return self.clone();
        }
        Node(Arc::new(NodeData {
            node_type: self.0.node_type.clone(),
            attrs: self.0.attrs.clone(),
            content: self.0.content.clone(),
            marks,
            text: self.0.text.clone(),
            size: self.0.size,
        }))
    }

    /// Text node with replaced text. Non-text nodes are returned unchanged.
    pub fn with_text(&self, text: impl Into<String>) -> Node {
        if !self.is_text() {
            return self.clone();
        }
        Node::new_text(self.0.node_type.clone(), text.into(), self.0.marks.clone())
    }

    pub fn with_markup(&self, node_type: NodeType, attrs: Attrs) -> Node {
        Node::new(node_type, attrs, self.0.content.clone(), self.0.marks.clone())
    }

    pub(crate) fn join_text(&self, other: &Node) -> Option<Node> {
        match (self.text(), other.text()) {
            (Some(a), Some(b)) if self.0.marks == other.0.marks => {
                Some(self.with_text(format!("{a}{b}")))
            }
            _ => None,
        }
    }

    /// Cuts a node down to the part between two content positions.
    pub fn cut(&self, from: usize, to: usize) -> Node {
        if let Some(text) = self.text() {
            if from == 0 && to >= self.0.size {
                return self.clone();
            }
            return self.with_text(char_slice(text, from, to));
        }
        if from == 0 && to >= self.content_size() {
            return self.clone();
        }
        self.copy(self.0.content.cut(from, to))
    }

    pub fn slice(&self, from: usize, to: usize) -> ModelResult<Slice> {
        if from > to {
            return Err(ModelError::Replace(format!("inverted range {from}..{to}")));
        }
        if from == to {
            return Ok(Slice::empty());
        }
        let start = self.resolve(from)?;
        let end = self.resolve(to)?;
        let depth = start.shared_depth(to);
        let offset = start.start(depth);
        let node = start.node(depth);
        let content = node.content().cut(start.pos() - offset, end.pos() - offset);
        Ok(Slice::new(content, start.depth() - depth, end.depth() - depth))
    }

    /// Replaces `from..to` with `slice`, joining open slice edges into the
    /// surrounding nodes.
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> ModelResult<Node> {
        if from > to {
            return Err(ModelError::Replace(format!("inverted range {from}..{to}")));
        }
        let start = self.resolve(from)?;
        let end = self.resolve(to)?;
        replace(&start, &end, slice)
    }

    /// The node directly after content position `pos`.
    pub fn node_at(&self, pos: usize) -> Option<Node> {
        let mut node: &Node = self;
        let mut pos = pos;
        loop {
            let (index, offset) = node.content().find_index(pos).ok()?;
            let child = node.child(index)?;
            if offset == pos || child.is_text() {
                return Some(child.clone());
            }
            pos -= offset + 1;
            node = child;
        }
    }

    pub fn resolve(&self, pos: usize) -> ModelResult<ResolvedPos> {
        ResolvedPos::resolve(self, pos)
    }

    /// Checks content expressions and mark sets over the whole subtree.
    pub fn check(&self) -> ModelResult<()> {
        if !self.0.node_type.valid_content(&self.0.content) {
            let children: Vec<&str> = self.children().map(Node::type_name).collect();
            return Err(ModelError::InvalidContent {
                node: self.type_name().to_string(),
                detail: format!(
                    "[{}] does not match `{}`",
                    children.join(", "),
                    self.0.node_type.content_expr()
                ),
            });
        }
        if mark_set(self.0.marks.iter().cloned()) != self.0.marks {
            return Err(ModelError::InvalidContent {
                node: self.type_name().to_string(),
                detail: format!("invalid mark set {:?}", self.0.marks),
            });
        }
        for child in self.children() {
            child.check()?;
        }
        Ok(())
    }

    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(other.node_type(), other.attrs(), other.marks())
    }

    pub fn has_markup(&self, node_type: &NodeType, attrs: &Attrs, marks: &[Mark]) -> bool {
        &self.0.node_type == node_type && &self.0.attrs == attrs && self.0.marks == marks
    }

    /// Structural equality that skips the named attributes at every level.
    pub fn eq_ignoring(&self, other: &Node, ignored: &[&str]) -> bool {
        if Node::ptr_eq(self, other) {
            return true;
        }
        let visible = |attrs: &Attrs| -> Attrs {
            attrs
                .iter()
                .filter(|(key, _)| !ignored.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        };
        self.0.node_type == other.0.node_type
            && self.0.text == other.0.text
            && self.0.marks == other.0.marks
            && visible(&self.0.attrs) == visible(&other.0.attrs)
            && self.child_count() == other.child_count()
            && self
                .children()
                .zip(other.children())
                .all(|(a, b)| a.eq_ignoring(b, ignored))
    }

    pub fn range_has_mark(&self, from: usize, to: usize, mark_type: &MarkType) -> bool {
        let mut found = false;
        if to > from {
            self.nodes_between(from, to, &mut |node: &Node, _, _, _| {
                if mark_type.is_in_set(node.marks()).is_some() {
                    found = true;
                }
                !found
            });
        }
        found
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Node::ptr_eq(self, other)
            || (self.0.node_type == other.0.node_type
                && self.0.text == other.0.text
                && self.0.attrs == other.0.attrs
                && self.0.marks == other.0.marks
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = match self.text() {
            Some(text) => format!("{text:?}"),
            None => {
                let mut out = self.type_name().to_string();
                if !self.0.attrs.is_empty() {
                    let attrs: Vec<String> = self
                        .0
                        .attrs
                        .iter()
                        .map(|(key, value)| format!("{key}={value}"))
                        .collect();
                    out.push_str(&format!("[{}]", attrs.join(", ")));
                }
                if !self.0.content.is_empty() {
                    let children: Vec<String> =
                        self.children().map(|child| format!("{child:?}")).collect();
                    out.push_str(&format!("({})", children.join(", ")));
                }
                out
            }
        };
        for mark in self.0.marks.iter().rev() {
            out = format!("{}({out})", mark.name());
        }
        f.write_str(&out)
    }
}

/// Number of positions a string occupies.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Substring by character positions, clamped to the string.
pub fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let start = byte_offset(text, from);
    let end = byte_offset(text, to).max(start);
    &text[start..end]
}

/// Byte index of the character at position `chars`, or the string length.
pub fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}
