//! Folding by heading.
//!
//! Each non-empty heading gets a toggle widget at the start of its text. A
//! collapsed heading hides the textblocks, list items and rules that follow
//! it, up to the next heading of the same or a higher rank.

use prose_model::Node;
use prose_state::{
    deco_attrs, ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginKey, PluginSpec, Widget,
};
use tracing::warn;

use crate::folding_tags::HIDDEN_CLASS;
use crate::scan::{contains_heading, find_nodes, heading_level, is_foldable, is_heading, map_pos, touched_textblocks};

pub const FOLD_WIDGET_KEY: &str = "fold-heading";

/// Directed commands for [`FoldingHeadings`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeadingFoldMeta {
    /// Toggle the heading with this title and level.
    Toggle { title: String, level: u8 },
    /// Toggle every heading.
    ToggleAll,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldHeading {
    pub pos: usize,
    pub level: u8,
    pub title: String,
    pub collapsed: bool,
}

#[derive(Clone, Debug, Default)]
pub struct HeadingFoldState {
    headings: Vec<FoldHeading>,
    decorations: DecorationSet,
}

impl HeadingFoldState {
    pub fn headings(&self) -> &[FoldHeading] {
        &self.headings
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    /// Hidden node ranges.
    pub fn hidden_ranges(&self) -> Vec<(usize, usize)> {
        self.decorations
            .iter()
            .filter(|deco| deco.is_node())
            .map(|deco| (deco.from(), deco.to()))
            .collect()
    }

    fn is_collapsed_at(&self, pos: usize) -> bool {
        self.headings.iter().any(|heading| heading.pos == pos && heading.collapsed)
    }
}

pub struct FoldingHeadings {
    key: PluginKey<FoldingHeadings>,
}

impl FoldingHeadings {
    pub fn new(key: PluginKey<FoldingHeadings>) -> Self {
        FoldingHeadings { key }
    }

    /// Rebuilds every widget and hidden range; headings found collapsed in
    /// `previous` stay collapsed.
    fn build(&self, doc: &Node, previous: &HeadingFoldState) -> HeadingFoldState {
        let headings: Vec<FoldHeading> = find_nodes(doc, is_heading)
            .into_iter()
            .filter(|found| found.node.content_size() > 0)
            .map(|found| FoldHeading {
                pos: found.pos,
                level: heading_level(&found.node),
                title: found.node.text_content(),
                collapsed: previous.is_collapsed_at(found.pos),
            })
            .collect();

        let mut decorations = Vec::new();
        for heading in &headings {
            decorations.push(Decoration::widget(heading.pos + 1, self.toggle_widget(heading)));
            if heading.collapsed {
                decorations.extend(hide_section(doc, heading));
            }
        }
        HeadingFoldState {
            decorations: DecorationSet::create(doc, decorations),
            headings,
        }
    }

    fn toggle_widget(&self, heading: &FoldHeading) -> Widget {
        let key = self.key;
        let meta = HeadingFoldMeta::Toggle {
            title: heading.title.clone(),
            level: heading.level,
        };
        let label = if heading.collapsed { "▸" } else { "▾" };
        Widget::new(FOLD_WIDGET_KEY, label)
            .with_side(-1)
            .with_action(move |state: &EditorState| {
                let mut tr = state.tr();
                tr.set_meta(&key, meta.clone());
                Some(tr)
            })
    }
}

impl PluginSpec for FoldingHeadings {
    type State = HeadingFoldState;
    type Meta = HeadingFoldMeta;

    fn name(&self) -> &str {
        "folding-headings"
    }

    fn init(&self, state: &EditorState) -> HeadingFoldState {
        self.build(state.doc(), &HeadingFoldState::default())
    }

    fn apply(
        &self,
        cx: ApplyContext<'_, HeadingFoldMeta>,
        value: &HeadingFoldState,
    ) -> Result<HeadingFoldState, PluginApplyError> {
        let doc = cx.new_state.doc();
        let mapping = cx.tr.mapping();
        let mut mapped = HeadingFoldState {
            headings: value
                .headings
                .iter()
                .filter_map(|heading| {
                    map_pos(mapping, heading.pos, 1).map(|pos| FoldHeading {
                        pos,
                        ..heading.clone()
                    })
                })
                .collect(),
            decorations: value.decorations.map(mapping, doc),
        };

        if let Some(meta) = cx.meta {
            toggle(&mut mapped.headings, meta);
            return Ok(self.build(doc, &mapped));
        }
        if cx.doc_changed() && touched_textblocks(cx.tr).iter().any(contains_heading) {
            return Ok(self.build(doc, &mapped));
        }
        Ok(mapped)
    }

    fn decorations(&self, value: &HeadingFoldState, _state: &EditorState) -> Option<DecorationSet> {
        Some(value.decorations.clone())
    }
}

fn toggle(headings: &mut [FoldHeading], meta: &HeadingFoldMeta) {
    match meta {
        HeadingFoldMeta::ToggleAll => {
            for heading in headings.iter_mut() {
                heading.collapsed = !heading.collapsed;
            }
        }
        HeadingFoldMeta::Toggle { title, level } => {
            match headings
                .iter_mut()
                .find(|heading| &heading.title == title && heading.level == *level)
            {
                Some(heading) => heading.collapsed = !heading.collapsed,
                None => warn!(title = %title, heading_level = *level, "no heading to toggle"),
            }
        }
    }
}

/// Node decorations hiding what belongs to `heading`.
fn hide_section(doc: &Node, heading: &FoldHeading) -> Vec<Decoration> {
    let mut decorations = Vec::new();
    let mut hiding = false;
    let mut done = false;
    doc.descendants(|node, pos, _, _| {
        if done {
            return false;
        }
        if pos == heading.pos && is_heading(node) {
            hiding = true;
            return false;
        }
        if !hiding {
            return true;
        }
        if is_heading(node) && heading_level(node) <= heading.level {
            done = true;
            return false;
        }
        if is_foldable(node) || node.type_name() == "horizontal_rule" {
            decorations.push(Decoration::node(
                pos,
                pos + node.node_size(),
                deco_attrs([("class", HIDDEN_CLASS)]),
            ));
        }
        true
    });
    decorations
}

/// A transaction toggling the heading at `pos`, if there is one.
pub fn toggle_heading(
    state: &EditorState,
    key: &PluginKey<FoldingHeadings>,
    pos: usize,
) -> Option<prose_state::Transaction> {
    let node = state.doc().node_at(pos).filter(is_heading)?;
    let mut tr = state.tr();
    tr.set_meta(
        key,
        HeadingFoldMeta::Toggle {
            title: node.text_content(),
            level: heading_level(&node),
        },
    );
    Some(tr)
}
