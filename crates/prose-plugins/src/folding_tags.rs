//! Folding by `#tag`.
//!
//! Every `#tag` anchor in the document becomes a tag. Focusing a tag hides
//! the textblocks and list items that do not mention it; each run of hidden
//! blocks gets an ellipsis widget that expands the run again. The ellipsis
//! at the very start of the document expands everything.

use prose_model::Node;
use prose_state::{
    deco_attrs, ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginKey, PluginSpec,
    Transaction, Widget,
};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::PluginSetupError;
use crate::scan::{char_offset, find_nodes, is_foldable, text_runs, touched_textblocks};

pub const ELLIPSIS_KEY_PREFIX: &str = "ellipse_";
pub const HIDDEN_CLASS: &str = "hidden";

const TAG_ANCHOR: &str = r"#([a-zA-Z0-9_-]+)(?:\W|$)";

pub(crate) fn anchor_pattern() -> Result<Regex, PluginSetupError> {
    Ok(Regex::new(TAG_ANCHOR)?)
}

/// Directed commands for [`FoldingTags`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagFoldMeta {
    /// Hide every block that does not mention the tag.
    Focus(String),
    /// Show the hidden run behind the ellipsis with this key.
    Expand(String),
}

#[derive(Clone, Debug, Default)]
pub struct TagFoldState {
    tags: Vec<String>,
    marks: DecorationSet,
    hidden: DecorationSet,
    focus: Option<String>,
}

impl TagFoldState {
    /// Known tags in document order, without the `#`.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Hidden node ranges.
    pub fn hidden_ranges(&self) -> Vec<(usize, usize)> {
        self.hidden
            .iter()
            .filter(|deco| deco.is_node())
            .map(|deco| (deco.from(), deco.to()))
            .collect()
    }

    /// Whether the node starting at `pos` is hidden.
    pub fn is_hidden(&self, pos: usize) -> bool {
        self.hidden.iter().any(|deco| deco.is_node() && deco.from() == pos)
    }

    /// Ellipsis widgets as `(pos, key)`.
    pub fn ellipses(&self) -> Vec<(usize, String)> {
        self.hidden
            .iter()
            .filter_map(|deco| deco.widget_ref().map(|widget| (deco.from(), widget.key().to_string())))
            .collect()
    }

    fn expand(&mut self, key: &str) {
        let Some(pos) = self
            .ellipses()
            .into_iter()
            .find_map(|(pos, found)| (found == key).then_some(pos))
        else {
            warn!(ellipsis = key, "no hidden run behind ellipsis");
            return;
        };
        if pos == 0 {
            self.hidden = DecorationSet::empty();
        } else {
            self.hidden = self.hidden.remove(|deco| {
                deco.attr("data-run") == Some(key) || deco.widget_ref().is_some_and(|widget| widget.key() == key)
            });
        }
        if self.hidden.is_empty() {
            self.focus = None;
        }
    }
}

pub struct FoldingTags {
    key: PluginKey<FoldingTags>,
    anchor: Regex,
}

impl FoldingTags {
    pub fn new(key: PluginKey<FoldingTags>) -> Result<Self, PluginSetupError> {
        Ok(FoldingTags::with_anchor(key, anchor_pattern()?))
    }

    pub(crate) fn with_anchor(key: PluginKey<FoldingTags>, anchor: Regex) -> Self {
        FoldingTags { key, anchor }
    }

    /// Tags and their highlight decorations: one per `#tag` anchor and one per
    /// later mention of a known tag.
    fn scan(&self, doc: &Node) -> (Vec<String>, DecorationSet) {
        let blocks = find_nodes(doc, Node::is_textblock);
        let mut tags: Vec<String> = Vec::new();
        let mut decorations = Vec::new();
        for block in &blocks {
            for (start, text) in text_runs(&block.node, block.pos) {
                for captures in self.anchor.captures_iter(&text) {
                    let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                        continue;
                    };
                    let from = start + char_offset(&text, whole.start());
                    let to = from + 1 + name.as_str().chars().count();
                    decorations.push(Decoration::inline(
                        from,
                        to,
                        deco_attrs([("class", "tag-anchor"), ("data-tag", name.as_str())]),
                    ));
                    if !tags.iter().any(|tag| tag == name.as_str()) {
                        tags.push(name.as_str().to_string());
                    }
                }
            }
        }
        for block in &blocks {
            for (start, text) in text_runs(&block.node, block.pos) {
                for tag in &tags {
                    for offset in mentions(&text, tag) {
                        let from = start + offset;
                        decorations.push(Decoration::inline(
                            from,
                            from + tag.chars().count(),
                            deco_attrs([("class", "tag"), ("data-tag", tag.as_str())]),
                        ));
                    }
                }
            }
        }
        (tags, DecorationSet::create(doc, decorations))
    }

    /// Whether `node` holds an anchor or mentions one of `tags`.
    fn touches_tags(&self, node: &Node, tags: &[String]) -> bool {
        let text = node.text_content();
        self.anchor.is_match(&text) || tags.iter().any(|tag| !mentions(&text, tag).is_empty())
    }

    fn hide(&self, doc: &Node, tag: &str) -> DecorationSet {
        let mut decorations = Vec::new();
        let mut runs = 0;
        let mut current: Option<String> = None;
        doc.descendants(|node, pos, _, _| {
            if !is_foldable(node) {
                return true;
            }
            if node.text_content().contains(tag) {
                current = None;
                return true;
            }
            let run = match &current {
                Some(run) => run.clone(),
                None => {
                    let run = format!("{ELLIPSIS_KEY_PREFIX}{runs}");
                    runs += 1;
                    decorations.push(Decoration::widget(pos, self.ellipsis(&run)));
                    current = Some(run.clone());
                    run
                }
            };
            decorations.push(Decoration::node(
                pos,
                pos + node.node_size(),
                deco_attrs([("class", HIDDEN_CLASS), ("data-run", run.as_str())]),
            ));
            true
        });
        debug!(tag, runs, "focused tag");
        DecorationSet::create(doc, decorations)
    }

    fn ellipsis(&self, run: &str) -> Widget {
        let key = self.key;
        let run_key = run.to_string();
        Widget::new(run, "...")
            .with_side(-1)
            .with_action(move |state: &EditorState| {
                let mut tr = state.tr();
                tr.set_meta(&key, TagFoldMeta::Expand(run_key.clone()));
                Some(tr)
            })
    }
}

impl PluginSpec for FoldingTags {
    type State = TagFoldState;
    type Meta = TagFoldMeta;

    fn name(&self) -> &str {
        "folding-tags"
    }

    fn init(&self, state: &EditorState) -> TagFoldState {
        let (tags, marks) = self.scan(state.doc());
        TagFoldState {
            tags,
            marks,
            ..TagFoldState::default()
        }
    }

    fn apply(&self, cx: ApplyContext<'_, TagFoldMeta>, value: &TagFoldState) -> Result<TagFoldState, PluginApplyError> {
        let doc = cx.new_state.doc();
        let mapping = cx.tr.mapping();
        let mut next = TagFoldState {
            tags: value.tags.clone(),
            marks: value.marks.map(mapping, doc),
            hidden: value.hidden.map(mapping, doc),
            focus: value.focus.clone(),
        };

        if cx.doc_changed() {
            let touched = touched_textblocks(cx.tr)
                .iter()
                .any(|node| self.touches_tags(node, &value.tags));
            if touched {
                let (tags, marks) = self.scan(doc);
                next.tags = tags;
                next.marks = marks;
            }
        }

        match cx.meta {
            Some(TagFoldMeta::Focus(tag)) => {
                next.hidden = self.hide(doc, tag);
                next.focus = Some(tag.clone());
            }
            Some(TagFoldMeta::Expand(run)) => next.expand(run),
            None => {}
        }
        Ok(next)
    }

    fn decorations(&self, value: &TagFoldState, state: &EditorState) -> Option<DecorationSet> {
        Some(value.marks.add(state.doc(), value.hidden.iter().cloned().collect()))
    }
}

/// A transaction focusing `tag`.
pub fn focus_tag(state: &EditorState, key: &PluginKey<FoldingTags>, tag: &str) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(key, TagFoldMeta::Focus(tag.trim_start_matches('#').to_string()));
    tr
}

/// Character offsets where `tag` appears as a whole word.
fn mentions(text: &str, tag: &str) -> Vec<usize> {
    if tag.is_empty() {
        return Vec::new();
    }
    let is_word = |ch: char| ch.is_alphanumeric() || ch == '_';
    text.match_indices(tag)
        .filter(|(start, _)| {
            let before = text[..*start].chars().next_back();
            let after = text[start + tag.len()..].chars().next();
            !before.is_some_and(is_word) && !after.is_some_and(is_word)
        })
        .map(|(start, _)| char_offset(text, start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_respect_word_boundaries() {
        assert_eq!(mentions("work #work working work", "work"), vec![0, 6, 19]);
        assert_eq!(mentions("é work", "work"), vec![2]);
        assert!(mentions("rework", "work").is_empty());
    }
}
