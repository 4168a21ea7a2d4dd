//! Pattern-triggered edits run as the user types.
//!
//! Each rule's pattern is tested against the text of the cursor's textblock
//! up to the cursor plus the text being typed, and must match at the end.
//! The first rule whose handler produces a transaction wins; the typed text
//! itself is consumed by that transaction.

use std::sync::Arc;

use prose_model::{attrs, char_len, AttrValue, Attrs, Fragment, MarkType, Node, NodeType, Schema, Selection};
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{InputRuleError, TransactionError};
use crate::state::EditorState;
use crate::transaction::Transaction;

/// Longest stretch of text before the cursor a rule can see.
const MAX_MATCH: usize = 500;

/// Stand-in for inline leaves (images, hard breaks) in matched text.
const LEAF_TEXT: &str = "\u{fffc}";

pub type RuleHandler =
    Arc<dyn Fn(&EditorState, &InputMatch<'_>, usize, usize) -> Result<Option<Transaction>, TransactionError> + Send + Sync>;

/// A successful pattern match, anchored to document positions.
pub struct InputMatch<'h> {
    captures: Captures<'h>,
    start: usize,
}

impl InputMatch<'_> {
    pub fn group(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(|m| m.as_str())
    }

    /// Document range of a capture group. Ranges may extend past the cursor
    /// into the typed text, which is not yet in the document.
    pub fn range(&self, index: usize) -> Option<(usize, usize)> {
        let whole = self.captures.get(0)?;
        let group = self.captures.get(index)?;
        let lead = &whole.as_str()[..group.start() - whole.start()];
        let from = self.start + char_len(lead);
        Some((from, from + char_len(group.as_str())))
    }

    /// Document position where the whole match starts.
    pub fn start(&self) -> usize {
        self.start
    }
}

#[derive(Clone)]
pub struct InputRule {
    name: String,
    pattern: Regex,
    handler: RuleHandler,
}

impl InputRule {
    pub fn new<F>(name: impl Into<String>, pattern: &str, handler: F) -> Result<Self, InputRuleError>
    where
        F: Fn(&EditorState, &InputMatch<'_>, usize, usize) -> Result<Option<Transaction>, TransactionError>
            + Send
            + Sync
            + 'static,
    {
        Ok(InputRule {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            handler: Arc::new(handler),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for InputRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Ordered rule list.
#[derive(Clone, Debug, Default)]
pub struct InputRules {
    rules: Vec<InputRule>,
}

impl InputRules {
    pub fn new() -> Self {
        InputRules::default()
    }

    pub fn push(&mut self, rule: InputRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(InputRule::name).collect()
    }

    /// Tests the rules for `text` typed over `from..to`. Returns the
    /// transaction of the first rule that applies.
    pub fn run(&self, state: &EditorState, from: usize, to: usize, text: &str) -> Option<Transaction> {
        let resolved = state.doc().resolve(from).ok()?;
        let parent = resolved.parent();
        if !parent.is_textblock() || parent.node_type().is_code() {
            return None;
        }
        if to < from || to > resolved.end(resolved.depth()) {
            return None;
        }
        if state.cursor_marks().iter().any(|mark| mark.name() == "code") {
            return None;
        }
        let offset = resolved.parent_offset();
        let before = parent.text_between(offset.saturating_sub(MAX_MATCH), offset, "", LEAF_TEXT);
        let haystack = format!("{before}{text}");
        let typed = char_len(text);
        for rule in &self.rules {
            let Some(captures) = rule.pattern.captures(&haystack) else {
                continue;
            };
            let matched = captures.get(0).map_or(0, |m| char_len(m.as_str()));
            if matched < typed || matched - typed > from {
                continue;
            }
            let input = InputMatch {
                captures,
                start: from - (matched - typed),
            };
            match (rule.handler)(state, &input, input.start, to) {
                Ok(Some(tr)) => {
                    debug!(rule = %rule.name, "input rule applied");
                    return Some(tr);
                }
                Ok(None) => {}
                Err(err) => debug!(rule = %rule.name, error = %err, "input rule failed"),
            }
        }
        None
    }

    /// Markdown shortcuts over the node and mark types of `schema`. Rules
    /// whose types the schema lacks are left out.
    pub fn markdown(schema: &Schema, max_heading_level: u8) -> Result<Self, InputRuleError> {
        let mut rules = InputRules::new();
        let node = |name: &str| schema.node_type(name).cloned();
        let mark = |name: &str| schema.mark_type(name).cloned();

        if let Some(hr) = node("horizontal_rule") {
            rules.push(horizontal_rule(hr)?);
        }
        if let Some(heading) = node("heading") {
            let max = max_heading_level.clamp(1, 6);
            let pattern = format!(r"^(#{{1,{max}}})\s$");
            rules.push(textblock_type_rule("heading", &pattern, heading, |m| {
                let level = m.group(1).map_or(1, |hashes| hashes.len() as i64);
                attrs! { "level" => level }
            })?);
        }
        if let Some(code) = node("code_block") {
            rules.push(textblock_type_rule("code_block", r"^```$", code, |_| Attrs::new())?);
        }
        if let Some(quote) = node("blockquote") {
            rules.push(wrapping_rule("blockquote", r"^\s*>\s$", vec![(quote, Attrs::new())], |_, _| false)?);
        }
        if let Some(item) = node("list_item") {
            if let Some(list) = node("ordered_list") {
                rules.push(ordered_list_rule(list, item.clone())?);
            }
            if let Some(list) = node("bullet_list") {
                rules.push(wrapping_rule(
                    "bullet_list",
                    r"^\s*([-+*])\s$",
                    vec![(list, Attrs::new()), (item.clone(), Attrs::new())],
                    |_, _| true,
                )?);
            }
            if let Some(list) = node("todo_list") {
                rules.push(todo_rule(list, item, node("bullet_list"))?);
            }
        }

        let delimited = [
            ("strong", r"\*\*"),
            ("em", r"\*"),
            ("code", "`"),
            ("strike", "~~"),
            ("mark", "=="),
            ("sub", "~"),
            ("sup", r"\^"),
        ];
        for (name, delimiter) in delimited {
            if let Some(mark_type) = mark(name) {
                let pattern = format!(r"(?:^|\s)((?:{delimiter})([^~`*^=_]+)(?:{delimiter}))$");
                rules.push(mark_rule(name, &pattern, mark_type)?);
            }
        }

        rules.push(text_rule("ellipsis", r"(\.\.\.)$", "…")?);
        rules.push(text_rule("en_dash", r"[^-\s]\s?(--)$", "–")?);
        Ok(rules)
    }
}

/// Whether `tr` still describes a valid document.
fn valid(tr: Transaction) -> Option<Transaction> {
    tr.doc().check().ok().map(|_| tr)
}

/// Turns the textblock into `node_type` once the pattern is typed at its
/// start, deleting the matched text.
pub fn textblock_type_rule<F>(name: &str, pattern: &str, node_type: NodeType, attrs: F) -> Result<InputRule, InputRuleError>
where
    F: Fn(&InputMatch<'_>) -> Attrs + Send + Sync + 'static,
{
    InputRule::new(name, pattern, move |state, m, start, end| {
        let mut tr = state.tr();
        tr.delete(start, end)?;
        tr.set_block_type(start, start, &node_type, attrs(m))?;
        Ok(valid(tr))
    })
}

/// Wraps the textblock in `wrappers`, outermost first. When `join` accepts
/// the preceding sibling of the same type, the new wrapper is merged into
/// it.
pub fn wrapping_rule<J>(
    name: &str,
    pattern: &str,
    wrappers: Vec<(NodeType, Attrs)>,
    join: J,
) -> Result<InputRule, InputRuleError>
where
    J: Fn(&InputMatch<'_>, &Node) -> bool + Send + Sync + 'static,
{
    InputRule::new(name, pattern, move |state, m, start, end| {
        let mut tr = state.tr();
        tr.delete(start, end)?;
        wrap_textblock(&mut tr, start, &wrappers, |prev| join(m, prev))?;
        Ok(valid(tr))
    })
}

fn wrap_textblock<J>(tr: &mut Transaction, pos: usize, wrappers: &[(NodeType, Attrs)], join: J) -> Result<(), TransactionError>
where
    J: Fn(&Node) -> bool,
{
    let resolved = tr.doc().resolve(pos)?;
    let depth = resolved.depth();
    let (Some(before), Some(after)) = (resolved.before(depth), resolved.after(depth)) else {
        return Err(TransactionError::Invalid("no textblock to wrap".to_string()));
    };
    let outer = resolved.node(depth - 1);
    let index = resolved.index(depth - 1);
    let previous = index.checked_sub(1).and_then(|i| outer.child(i)).cloned();
    tr.wrap(before, after, wrappers)?;

    let Some((outer_type, _)) = wrappers.first() else {
        return Ok(());
    };
    if let Some(previous) = previous {
        if previous.node_type() == outer_type && join(&previous) {
            let mut joined = tr.clone();
            if joined.delete(before - 1, before + 1).is_ok() && joined.doc().check().is_ok() {
                *tr = joined;
            }
        }
    }
    Ok(())
}

fn ordered_list_rule(list: NodeType, item: NodeType) -> Result<InputRule, InputRuleError> {
    InputRule::new("ordered_list", r"^(\d+)\.\s$", move |state, m, start, end| {
        let order: i64 = m.group(1).and_then(|n| n.parse().ok()).unwrap_or(1);
        let wrappers = [(list.clone(), attrs! { "order" => order }), (item.clone(), Attrs::new())];
        let mut tr = state.tr();
        tr.delete(start, end)?;
        wrap_textblock(&mut tr, start, &wrappers, |prev| {
            let prev_order = prev.attr("order").and_then(AttrValue::as_int).unwrap_or(1);
            prev.child_count() as i64 + prev_order == order
        })?;
        Ok(valid(tr))
    })
}

/// `[ ] ` or `[x] ` starts a todo item. Typed as the first paragraph of a
/// bullet item, the bullet list becomes a todo list instead.
fn todo_rule(list: NodeType, item: NodeType, bullet: Option<NodeType>) -> Result<InputRule, InputRuleError> {
    InputRule::new("todo_list", r"^\s*\[([ xX])\]\s$", move |state, m, start, end| {
        let checked = m.group(1).is_some_and(|mark| mark != " ");
        let mut tr = state.tr();
        tr.delete(start, end)?;
        let resolved = tr.doc().resolve(start)?;
        let depth = resolved.depth();
        let in_bullet_item = depth >= 2
            && resolved.index(depth - 1) == 0
            && resolved.node(depth - 1).node_type() == &item
            && bullet
                .as_ref()
                .is_some_and(|bullet| resolved.node(depth - 2).node_type() == bullet);
        if in_bullet_item {
            let (Some(list_pos), Some(item_pos)) = (resolved.before(depth - 2), resolved.before(depth - 1)) else {
                return Ok(None);
            };
            let tight = resolved.node(depth - 2).attr("tight").cloned().unwrap_or(AttrValue::Bool(false));
            tr.set_node_markup(list_pos, Some(&list), attrs! { "tight" => tight })?;
            tr.set_node_attr(item_pos, "todo_checked", checked)?;
        } else {
            let wrappers = [(list.clone(), Attrs::new()), (item.clone(), attrs! { "todo_checked" => checked })];
            wrap_textblock(&mut tr, start, &wrappers, |_| true)?;
        }
        Ok(valid(tr))
    })
}

/// `---` (or `___ `, `*** `) alone in a paragraph becomes a rule followed by
/// an empty paragraph holding the cursor.
fn horizontal_rule(hr: NodeType) -> Result<InputRule, InputRuleError> {
    InputRule::new("horizontal_rule", r"^(?:---|___\s|\*\*\*\s)$", move |state, _, start, end| {
        let resolved = state.doc().resolve(start)?;
        let depth = resolved.depth();
        let parent = resolved.parent();
        if parent.type_name() != "paragraph" || end != resolved.end(depth) {
            return Ok(None);
        }
        let (Some(before), Some(after)) = (resolved.before(depth), resolved.after(depth)) else {
            return Ok(None);
        };
        let rule = hr.create(Attrs::new(), Fragment::empty(), Vec::new())?;
        let paragraph = parent.node_type().create(Attrs::new(), Fragment::empty(), Vec::new())?;
        let mut tr = state.tr();
        tr.replace(before, after, Fragment::from_nodes([rule, paragraph]))?;
        let cursor = Selection::cursor(tr.doc(), before + 2)?;
        tr.set_selection(cursor)?;
        Ok(valid(tr))
    })
}

/// Wraps the text between a pair of delimiters in `mark_type`, dropping the
/// delimiters. Text typed afterwards does not continue the mark.
pub fn mark_rule(name: &str, pattern: &str, mark_type: MarkType) -> Result<InputRule, InputRuleError> {
    InputRule::new(name, pattern, move |state, m, _, end| {
        let (Some(outer), Some(inner)) = (m.range(1), m.range(2)) else {
            return Ok(None);
        };
        let parent_allows = state
            .doc()
            .resolve(outer.0)
            .map(|pos| pos.parent().node_type().allows_mark_type(&mark_type))
            .unwrap_or(false);
        if !parent_allows {
            return Ok(None);
        }
        let mark = mark_type.create(Attrs::new())?;
        let cursor_marks = state.cursor_marks();
        let mut tr = state.tr();
        if inner.1 < end {
            tr.delete(inner.1, end)?;
        }
        if inner.0 > outer.0 {
            tr.delete(outer.0, inner.0)?;
        }
        let mark_end = outer.0 + (inner.1 - inner.0);
        tr.add_mark(outer.0, mark_end, &mark)?;
        tr.set_stored_marks(Some(mark_type.remove_from_set(&cursor_marks)));
        Ok(valid(tr))
    })
}

/// Replaces capture group 1 (or the whole match) with `replacement`.
pub fn text_rule(name: &str, pattern: &str, replacement: &'static str) -> Result<InputRule, InputRuleError> {
    InputRule::new(name, pattern, move |state, m, start, end| {
        let (from, _) = m.range(1).unwrap_or((start, end));
        let marks = state
            .doc()
            .resolve(from)
            .map(|pos| pos.marks())
            .unwrap_or_default();
        let mut tr = state.tr();
        tr.replace_text(from, end, replacement, marks)?;
        Ok(valid(tr))
    })
}
