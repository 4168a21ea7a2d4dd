//! Table of contents.
//!
//! Collects the heading hierarchy and tags each heading node with an `id`
//! decoration that links can target.

use prose_markdown::{generate_anchor, normalize_heading_text};
use prose_model::{AttrValue, Node};
use prose_state::{deco_attrs, ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginSpec};

use crate::scan::{contains_heading, find_nodes, heading_level, is_heading, map_pos, touched_textblocks};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub id: String,
    pub level: u8,
    pub text: String,
    /// Position before the heading node.
    pub pos: usize,
}

/// Headings of `doc` in document order.
pub fn toc_entries(doc: &Node) -> Vec<TocEntry> {
    find_nodes(doc, is_heading)
        .into_iter()
        .map(|found| {
            let text = found.node.text_content();
            let id = found
                .node
                .attr("id")
                .and_then(AttrValue::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| generate_anchor(&normalize_heading_text(&text)));
            TocEntry {
                id,
                level: heading_level(&found.node),
                text,
                pos: found.pos,
            }
        })
        .collect()
}

/// One line per entry, prefixed with its hierarchical number: `1:`, `1.1:`,
/// `1.2:`, `2:`. Numbers below a heading restart at each new parent.
pub fn render_numbered(entries: &[TocEntry]) -> String {
    let mut counters = [0usize; 6];
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        let depth = usize::from(entry.level.clamp(1, 6));
        counters[depth - 1] += 1;
        for counter in &mut counters[depth..] {
            *counter = 0;
        }
        let number = counters[..depth]
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".");
        lines.push(format!("{number}: {}", entry.text));
    }
    lines.join("\n")
}

#[derive(Clone, Debug, Default)]
pub struct TocState {
    entries: Vec<TocEntry>,
    decorations: DecorationSet,
}

impl TocState {
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    pub fn render_numbered(&self) -> String {
        render_numbered(&self.entries)
    }
}

fn build(doc: &Node) -> TocState {
    let entries = toc_entries(doc);
    let decorations = entries
        .iter()
        .filter_map(|entry| {
            let node = doc.node_at(entry.pos)?;
            Some(Decoration::node(
                entry.pos,
                entry.pos + node.node_size(),
                deco_attrs([("id", entry.id.as_str()), ("title", entry.id.as_str())]),
            ))
        })
        .collect();
    TocState {
        decorations: DecorationSet::create(doc, decorations),
        entries,
    }
}

pub struct TableOfContents;

impl PluginSpec for TableOfContents {
    type State = TocState;
    type Meta = ();

    fn name(&self) -> &str {
        "toc"
    }

    fn init(&self, state: &EditorState) -> TocState {
        build(state.doc())
    }

    fn apply(&self, cx: ApplyContext<'_, ()>, value: &TocState) -> Result<TocState, PluginApplyError> {
        let doc = cx.new_state.doc();
        if cx.doc_changed() {
            let touched = touched_textblocks(cx.tr).iter().any(contains_heading);
            if touched {
                return Ok(build(doc));
            }
        }
        let mapping = cx.tr.mapping();
        Ok(TocState {
            entries: value
                .entries
                .iter()
                .filter_map(|entry| {
                    map_pos(mapping, entry.pos, 1).map(|pos| TocEntry {
                        pos,
                        ..entry.clone()
                    })
                })
                .collect(),
            decorations: value.decorations.map(mapping, doc),
        })
    }

    fn decorations(&self, value: &TocState, _state: &EditorState) -> Option<DecorationSet> {
        Some(value.decorations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(level: u8, text: &str) -> TocEntry {
        TocEntry {
            id: text.to_lowercase(),
            level,
            text: text.to_string(),
            pos: 0,
        }
    }

    #[test]
    fn numbering_restarts_below_each_parent() {
        let entries = vec![
            entry(1, "Intro"),
            entry(2, "Scope"),
            entry(2, "Terms"),
            entry(1, "Design"),
            entry(2, "Model"),
            entry(3, "Nodes"),
        ];
        assert_eq!(
            render_numbered(&entries),
            "1: Intro\n1.1: Scope\n1.2: Terms\n2: Design\n2.1: Model\n2.1.1: Nodes"
        );
    }

    #[test]
    fn skipped_levels_keep_zero_placeholders() {
        let entries = vec![entry(1, "Top"), entry(3, "Deep")];
        assert_eq!(render_numbered(&entries), "1: Top\n1.0.1: Deep");
    }
}
