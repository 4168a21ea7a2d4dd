use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use prose_model::Node;
use prose_transform::Mappable;

use crate::state::EditorState;
use crate::transaction::Transaction;

/// Presentation attributes carried by inline and node decorations.
pub type DecorationAttrs = BTreeMap<String, String>;

/// Click handler attached to a widget. Receives the current state and may
/// return a transaction for the host to dispatch.
pub type WidgetAction = Arc<dyn Fn(&EditorState) -> Option<Transaction> + Send + Sync>;

/// Content inserted at a single position.
#[derive(Clone)]
pub struct Widget {
    key: String,
    label: String,
    side: i8,
    action: Option<WidgetAction>,
}

impl Widget {
    /// `key` names the kind of widget (used to route clicks); `label` is its
    /// rendered content.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Widget {
            key: key.into(),
            label: label.into(),
            side: 0,
            action: None,
        }
    }

    /// Negative sides stay before content inserted at the widget position.
    pub fn with_side(mut self, side: i8) -> Self {
        self.side = side;
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&EditorState) -> Option<Transaction> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn side(&self) -> i8 {
        self.side
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }

    /// Runs the click action against `state`.
    pub fn click(&self, state: &EditorState) -> Option<Transaction> {
        self.action.as_ref().and_then(|action| action(state))
    }
}

impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.label == other.label && self.side == other.side
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("side", &self.side)
            .field("action", &self.action.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DecorationKind {
    /// Styles the inline content in a range.
    Inline(DecorationAttrs),
    /// Styles the single node spanning the range.
    Node(DecorationAttrs),
    Widget(Widget),
}

/// A positioned annotation. Widgets have `from == to`.
#[derive(Clone, Debug, PartialEq)]
pub struct Decoration {
    from: usize,
    to: usize,
    kind: DecorationKind,
}

impl Decoration {
    pub fn inline(from: usize, to: usize, attrs: DecorationAttrs) -> Self {
        Decoration {
            from,
            to,
            kind: DecorationKind::Inline(attrs),
        }
    }

    pub fn node(from: usize, to: usize, attrs: DecorationAttrs) -> Self {
        Decoration {
            from,
            to,
            kind: DecorationKind::Node(attrs),
        }
    }

    pub fn widget(pos: usize, widget: Widget) -> Self {
        Decoration {
            from: pos,
            to: pos,
            kind: DecorationKind::Widget(widget),
        }
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    pub fn kind(&self) -> &DecorationKind {
        &self.kind
    }

    pub fn is_widget(&self) -> bool {
        matches!(self.kind, DecorationKind::Widget(_))
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, DecorationKind::Node(_))
    }

    pub fn is_inline(&self) -> bool {
        matches!(self.kind, DecorationKind::Inline(_))
    }

    pub fn attrs(&self) -> Option<&DecorationAttrs> {
        match &self.kind {
            DecorationKind::Inline(attrs) | DecorationKind::Node(attrs) => Some(attrs),
            DecorationKind::Widget(_) => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs().and_then(|attrs| attrs.get(name)).map(String::as_str)
    }

    pub fn widget_ref(&self) -> Option<&Widget> {
        match &self.kind {
            DecorationKind::Widget(widget) => Some(widget),
            _ => None,
        }
    }

    /// Carries the decoration through a change, or drops it when what it
    /// annotated is gone.
    pub fn map(&self, mapping: &impl Mappable) -> Option<Decoration> {
        match &self.kind {
            DecorationKind::Widget(widget) => {
                let assoc = if widget.side < 0 { -1 } else { 1 };
                let result = mapping.map_result(self.from, assoc);
                if result.deleted() {
                    return None;
                }
                Some(Decoration {
                    from: result.pos,
                    to: result.pos,
                    kind: self.kind.clone(),
                })
            }
            DecorationKind::Inline(_) => {
                let from = mapping.map(self.from, 1);
                let to = mapping.map(self.to, -1);
                (from < to).then(|| Decoration {
                    from,
                    to,
                    kind: self.kind.clone(),
                })
            }
            DecorationKind::Node(_) => {
                let from = mapping.map_result(self.from, 1);
                let to = mapping.map_result(self.to, -1);
                if (from.deleted() && to.deleted()) || from.pos >= to.pos {
                    return None;
                }
                Some(Decoration {
                    from: from.pos,
                    to: to.pos,
                    kind: self.kind.clone(),
                })
            }
        }
    }

    fn overlaps(&self, from: usize, to: usize) -> bool {
        self.from <= to && self.to >= from
    }

    fn fits(&self, size: usize) -> bool {
        self.from <= self.to && self.to <= size
    }
}

/// Persistent, position-sorted collection of decorations. Cloning is cheap.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecorationSet {
    decorations: Arc<Vec<Decoration>>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        DecorationSet::default()
    }

    /// Builds a set over `doc`. Decorations reaching past the end of the
    /// document are dropped.
    pub fn create(doc: &Node, decorations: Vec<Decoration>) -> Self {
        let size = doc.content_size();
        let mut decorations: Vec<Decoration> = decorations
            .into_iter()
            .filter(|deco| deco.fits(size))
            .collect();
        decorations.sort_by_key(|deco| (deco.from, deco.to));
        DecorationSet {
            decorations: Arc::new(decorations),
        }
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Decoration> {
        self.decorations.iter()
    }

    /// Decorations touching `from..=to`.
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decorations
            .iter()
            .filter(|deco| deco.overlaps(from, to))
            .collect()
    }

    pub fn find_by<P>(&self, mut predicate: P) -> Vec<&Decoration>
    where
        P: FnMut(&Decoration) -> bool,
    {
        self.decorations.iter().filter(|deco| predicate(deco)).collect()
    }

    /// Remaps every decoration through `mapping` into `doc`, dropping those
    /// whose target was deleted.
    pub fn map(&self, mapping: &impl Mappable, doc: &Node) -> DecorationSet {
        if self.is_empty() {
            return self.clone();
        }
        let mapped = self.decorations.iter().filter_map(|deco| deco.map(mapping)).collect();
        DecorationSet::create(doc, mapped)
    }

    pub fn add(&self, doc: &Node, decorations: Vec<Decoration>) -> DecorationSet {
        let mut all = self.decorations.as_ref().clone();
        all.extend(decorations);
        DecorationSet::create(doc, all)
    }

    /// A copy without the decorations matching `predicate`.
    pub fn remove<P>(&self, mut predicate: P) -> DecorationSet
    where
        P: FnMut(&Decoration) -> bool,
    {
        let kept = self
            .decorations
            .iter()
            .filter(|deco| !predicate(deco))
            .cloned()
            .collect();
        DecorationSet {
            decorations: Arc::new(kept),
        }
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.iter()
    }
}

/// Attribute map from `(name, value)` pairs.
pub fn deco_attrs<I, K, V>(pairs: I) -> DecorationAttrs
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prose_transform::{Mapping, StepMap};

    fn hidden() -> DecorationAttrs {
        deco_attrs([("class", "hidden")])
    }

    #[test]
    fn insertion_before_shifts_by_inserted_length() {
        let deco = Decoration::inline(5, 9, hidden());
        let mapping = Mapping::from_maps(vec![StepMap::replaced(2, 0, 3)]);
        let mapped = deco.map(&mapping).expect("kept");
        assert_eq!((mapped.from(), mapped.to()), (8, 12));
    }

    #[test]
    fn deleting_the_range_drops_inline_and_node_decorations() {
        let mapping = Mapping::from_maps(vec![StepMap::replaced(4, 6, 0)]);
        assert!(Decoration::inline(5, 9, hidden()).map(&mapping).is_none());
        assert!(Decoration::node(4, 10, hidden()).map(&mapping).is_none());
    }

    #[test]
    fn widgets_inside_a_deletion_are_dropped() {
        let mapping = Mapping::from_maps(vec![StepMap::replaced(4, 6, 0)]);
        assert!(Decoration::widget(6, Widget::new("w", "x")).map(&mapping).is_none());
        let after = Decoration::widget(12, Widget::new("w", "x")).map(&mapping).expect("kept");
        assert_eq!(after.from(), 6);
    }

    #[test]
    fn widget_side_decides_insertion_association() {
        let mapping = Mapping::from_maps(vec![StepMap::replaced(3, 0, 2)]);
        let before = Decoration::widget(3, Widget::new("w", "").with_side(-1));
        let after = Decoration::widget(3, Widget::new("w", ""));
        assert_eq!(before.map(&mapping).map(|d| d.from()), Some(3));
        assert_eq!(after.map(&mapping).map(|d| d.from()), Some(5));
    }

    #[test]
    fn find_returns_touching_decorations() {
        let doc = prose_test_support::doc(vec![prose_test_support::p(vec![prose_test_support::t(
            "hello world",
        )])]);
        let set = DecorationSet::create(
            &doc,
            vec![
                Decoration::inline(7, 12, hidden()),
                Decoration::widget(1, Widget::new("w", "")),
                Decoration::node(0, 13, hidden()),
                Decoration::inline(20, 30, hidden()),
            ],
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.find(2, 6).len(), 1);
        assert_eq!(set.find(1, 1).len(), 2);
        let removed = set.remove(|deco| deco.is_widget());
        assert_eq!(removed.len(), 2);
    }
}
