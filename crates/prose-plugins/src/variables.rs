//! `{:name}` variables.
//!
//! Every reference to a defined variable is hidden behind an inline
//! `var-anchor` decoration and shown as a widget holding the variable's
//! current value. Values are computed when decorations are requested, so
//! `{:time}` is fresh on every render.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use prose_model::Node;
use prose_state::{
    deco_attrs, ApplyContext, Decoration, DecorationSet, EditorState, PluginApplyError, PluginKey, PluginSpec, Widget,
};
use prose_transform::Mappable;
use regex::Regex;

use crate::clock::Clock;
use crate::error::PluginSetupError;
use crate::scan::{char_offset, find_nodes, text_runs, touched_textblocks};
use crate::toc::{render_numbered, toc_entries, TableOfContents};
use crate::word_count::document_words;

pub const VARIABLE_WIDGET_KEY: &str = "variable";

const REFERENCE: &str = r"\{:([a-zA-Z0-9_-]+)\}";

/// What a value function sees.
pub struct VariableContext<'a> {
    pub state: &'a EditorState,
    pub now: NaiveDateTime,
}

pub type VariableFn = Arc<dyn Fn(&VariableContext<'_>) -> String + Send + Sync>;

#[derive(Clone)]
pub struct VariableDef {
    comment: String,
    value: VariableFn,
}

impl VariableDef {
    pub fn new<F>(comment: impl Into<String>, value: F) -> Self
    where
        F: Fn(&VariableContext<'_>) -> String + Send + Sync + 'static,
    {
        VariableDef {
            comment: comment.into(),
            value: Arc::new(value),
        }
    }

    /// A variable with a fixed value.
    pub fn constant(comment: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        VariableDef::new(comment, move |_| value.clone())
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

impl fmt::Debug for VariableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableDef").field("comment", &self.comment).finish_non_exhaustive()
    }
}

/// Named value functions. `help` is always defined and lists the others.
#[derive(Clone, Debug)]
pub struct VariableDefs {
    defs: BTreeMap<String, VariableDef>,
}

impl Default for VariableDefs {
    fn default() -> Self {
        let mut defs = BTreeMap::new();
        defs.insert(
            "help".to_string(),
            VariableDef::constant("lists the available variables", ""),
        );
        VariableDefs { defs }
    }
}

impl VariableDefs {
    pub fn new() -> Self {
        VariableDefs::default()
    }

    /// `time`, `date`, `toc`, `words` and `help`. `toc` reads the table of
    /// contents plugin when `toc` is given and scans the document otherwise.
    pub fn builtin(toc: Option<PluginKey<TableOfContents>>) -> Self {
        let mut defs = VariableDefs::new();
        defs.insert(
            "time",
            VariableDef::new("the current time", |cx| cx.now.format("%H:%M:%S").to_string()),
        );
        defs.insert(
            "date",
            VariableDef::new("the current date", |cx| cx.now.format("%Y%m%d").to_string()),
        );
        defs.insert(
            "toc",
            VariableDef::new("the table of contents", move |cx| {
                match toc.and_then(|key| key.get_state(cx.state)) {
                    Some(toc_state) => toc_state.render_numbered(),
                    None => render_numbered(&toc_entries(cx.state.doc())),
                }
            }),
        );
        defs.insert(
            "words",
            VariableDef::new("number of words in the document", |cx| {
                document_words(cx.state.doc()).to_string()
            }),
        );
        defs
    }

    /// Adds or replaces a definition. `help` cannot be replaced.
    pub fn insert(&mut self, name: impl Into<String>, def: VariableDef) -> &mut Self {
        let name = name.into();
        if name != "help" {
            self.defs.insert(name, def);
        }
        self
    }

    /// Adds one constant per entry, e.g. the static values from
    /// configuration.
    pub fn with_constants<'a, I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (name, value) in values {
            self.insert(name.clone(), VariableDef::constant("configured value", value.clone()));
        }
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    /// The current value of `name`.
    pub fn evaluate(&self, name: &str, cx: &VariableContext<'_>) -> Option<String> {
        if name == "help" {
            return Some(self.help(cx));
        }
        self.defs.get(name).map(|def| (def.value)(cx))
    }

    fn help(&self, cx: &VariableContext<'_>) -> String {
        self.defs
            .iter()
            .filter(|(name, _)| name.as_str() != "help")
            .map(|(name, def)| format!("{{:{name}}} : {} : {}", def.comment, (def.value)(cx)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A `{:name}` reference to a defined variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableRef {
    pub pos: usize,
    /// Length of `{:name}` in characters.
    pub width: usize,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct VariablesState {
    refs: Vec<VariableRef>,
}

impl VariablesState {
    pub fn refs(&self) -> &[VariableRef] {
        &self.refs
    }
}

pub struct Variables {
    defs: VariableDefs,
    clock: Clock,
    reference: Regex,
}

impl Variables {
    pub fn new(defs: VariableDefs, clock: Clock) -> Result<Self, PluginSetupError> {
        Ok(Variables {
            defs,
            clock,
            reference: Regex::new(REFERENCE)?,
        })
    }

    pub fn defs(&self) -> &VariableDefs {
        &self.defs
    }

    /// References in `text` whose braces stand alone: preceded by the start
    /// or whitespace and followed by the end or a non-word character.
    fn matches(&self, text: &str) -> Vec<(usize, usize, String)> {
        self.reference
            .captures_iter(text)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let name = captures.get(1)?;
                let before = text[..whole.start()].chars().next_back();
                let after = text[whole.end()..].chars().next();
                let opens = before.map_or(true, char::is_whitespace);
                let closes = after.map_or(true, |ch| !(ch.is_alphanumeric() || ch == '_'));
                (opens && closes && self.defs.contains(name.as_str())).then(|| {
                    (
                        char_offset(text, whole.start()),
                        whole.as_str().chars().count(),
                        name.as_str().to_string(),
                    )
                })
            })
            .collect()
    }

    fn scan(&self, doc: &Node) -> Vec<VariableRef> {
        let mut refs = Vec::new();
        for block in find_nodes(doc, Node::is_textblock) {
            for (start, text) in text_runs(&block.node, block.pos) {
                refs.extend(self.matches(&text).into_iter().map(|(offset, width, name)| VariableRef {
                    pos: start + offset,
                    width,
                    name,
                }));
            }
        }
        refs
    }

    fn has_reference(&self, node: &Node) -> bool {
        !self.matches(&node.text_content()).is_empty()
    }
}

impl PluginSpec for Variables {
    type State = VariablesState;
    type Meta = ();

    fn name(&self) -> &str {
        "variables"
    }

    fn init(&self, state: &EditorState) -> VariablesState {
        VariablesState {
            refs: self.scan(state.doc()),
        }
    }

    fn apply(&self, cx: ApplyContext<'_, ()>, value: &VariablesState) -> Result<VariablesState, PluginApplyError> {
        if cx.doc_changed() {
            let touched = touched_textblocks(cx.tr).iter().any(|node| self.has_reference(node));
            if touched {
                return Ok(VariablesState {
                    refs: self.scan(cx.new_state.doc()),
                });
            }
        }
        let mapping = cx.tr.mapping();
        let refs = value
            .refs
            .iter()
            .filter_map(|reference| {
                let from = mapping.map_result(reference.pos, 1);
                let to = mapping.map_result(reference.pos + reference.width, -1);
                (!from.deleted() && to.pos >= from.pos).then(|| VariableRef {
                    pos: from.pos,
                    width: to.pos - from.pos,
                    name: reference.name.clone(),
                })
            })
            .collect();
        Ok(VariablesState { refs })
    }

    fn decorations(&self, value: &VariablesState, state: &EditorState) -> Option<DecorationSet> {
        let cx = VariableContext {
            state,
            now: (self.clock)(),
        };
        let mut decorations = Vec::with_capacity(value.refs.len() * 2);
        for reference in &value.refs {
            decorations.push(Decoration::inline(
                reference.pos,
                reference.pos + reference.width,
                deco_attrs([("class", "var-anchor"), ("data-variable", reference.name.as_str())]),
            ));
            let label = self.defs.evaluate(&reference.name, &cx).unwrap_or_default();
            decorations.push(Decoration::widget(reference.pos, Widget::new(VARIABLE_WIDGET_KEY, label)));
        }
        Some(DecorationSet::create(state.doc(), decorations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::fixed_clock;
    use chrono::NaiveDate;

    fn plugin() -> Variables {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(7, 5, 0))
            .expect("valid timestamp");
        Variables::new(VariableDefs::builtin(None), fixed_clock(now)).expect("pattern compiles")
    }

    #[test]
    fn references_need_standalone_braces() {
        let variables = plugin();
        let found: Vec<(usize, usize, String)> = variables.matches("at {:time}, x{:date} {:nope} {:date}");
        assert_eq!(found, vec![(3, 7, "time".to_string()), (29, 7, "date".to_string())]);
    }

    #[test]
    fn builtins_are_listed_by_name() {
        let defs = VariableDefs::builtin(None);
        let names: Vec<&str> = defs.names().collect();
        assert_eq!(names, vec!["date", "help", "time", "toc", "words"]);
    }
}
