use crate::heading::{detect_atx_heading, leading_indent_width, match_setext_depth};
use crate::stages::BlockRule;
use crate::token::Token;

/// Line-oriented tokenizer state for one container level. Containers
/// (blockquotes, list items) strip their markers and tokenize their inner
/// lines in a nested state.
pub struct BlockState<'a> {
    lines: Vec<String>,
    line: usize,
    depth: usize,
    tokens: Vec<Token>,
    rules: &'a [BlockRule],
    blank_between_blocks: bool,
}

impl<'a> BlockState<'a> {
    pub(crate) fn new(lines: Vec<String>, depth: usize, rules: &'a [BlockRule]) -> Self {
        BlockState {
            lines,
            line: 0,
            depth,
            tokens: Vec::new(),
            rules,
            blank_between_blocks: false,
        }
    }

    /// Runs the block rules over every line. Also reports whether a blank
    /// line separated two blocks at this level.
    pub(crate) fn tokenize(mut self) -> (Vec<Token>, bool) {
        let rules = self.rules;
        let mut saw_blank = false;
        let mut seen_block = false;
        while self.line < self.lines.len() {
            if is_blank(&self.lines[self.line]) {
                saw_blank = true;
                self.line += 1;
                continue;
            }
            if saw_blank && seen_block {
                self.blank_between_blocks = true;
            }
            saw_blank = false;

            let start = self.line;
            let matched = rules.iter().any(|rule| (rule.run)(&mut self, false));
            if !matched || self.line <= start {
                self.line = start + 1;
            }
            seen_block = true;
        }
        (self.tokens, self.blank_between_blocks)
    }

    pub fn current(&self) -> &str {
        self.lines.get(self.line).map(String::as_str).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    /// Whether a paragraph-interrupting rule matches at `line`.
    fn interrupts(&mut self, line: usize) -> bool {
        let saved = self.line;
        self.line = line;
        let rules = self.rules;
        let hit = rules
            .iter()
            .filter(|rule| rule.interrupts_paragraph)
            .any(|rule| (rule.run)(self, true));
        self.line = saved;
        hit
    }

    fn nested(&self, lines: Vec<String>) -> (Vec<Token>, bool) {
        BlockState::new(lines, self.depth + 1, self.rules).tokenize()
    }

    fn push_inline_block(&mut self, name: &'static str, open: Token, content: String) {
        self.tokens.push(open);
        self.tokens.push(Token::leaf("inline", content));
        self.tokens.push(Token::close(name));
    }
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Removes up to `cols` columns of leading whitespace. A tab that is only
/// partly consumed leaves its remaining columns as spaces.
pub(crate) fn strip_columns(line: &str, cols: usize) -> String {
    let mut width = 0usize;
    for (idx, ch) in line.char_indices() {
        if width >= cols {
            return line[idx..].to_string();
        }
        match ch {
            ' ' => width += 1,
            '\t' => {
                let next = width + 4 - width % 4;
                if next > cols {
                    let mut rest = " ".repeat(next - cols);
                    rest.push_str(&line[idx + 1..]);
                    return rest;
                }
                width = next;
            }
            _ => return line[idx..].to_string(),
        }
    }
    String::new()
}

/// Locates the closing delimiter of a YAML front matter block opened on the
/// first line.
pub(crate) fn front_matter_end<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    if lines.first()?.as_ref().trim_end() != "---" {
        return None;
    }
    if !lines.get(1)?.as_ref().contains(':') {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, line)| matches!(line.as_ref().trim_end(), "---" | "..."))
        .map(|(idx, _)| idx)
}

/// Splits `source` into its front matter (delimiters included) and body.
pub fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let lines: Vec<&str> = source.split_inclusive('\n').collect();
    let trimmed: Vec<&str> = lines.iter().map(|line| line.trim_end_matches(['\n', '\r'])).collect();
    match front_matter_end(&trimmed) {
        Some(end) => {
            let split = lines[..=end].iter().map(|line| line.len()).sum::<usize>();
            (Some(&source[..split]), &source[split..])
        }
        None => (None, source),
    }
}

pub(crate) fn front_matter(state: &mut BlockState<'_>, silent: bool) -> bool {
    if state.depth != 0 || state.line != 0 {
        return false;
    }
    let Some(end) = front_matter_end(&state.lines) else {
        return false;
    };
    if silent {
        return true;
    }
    let content = state.lines[1..end].join("\n");
    state.push(Token::leaf("front_matter", content));
    state.line = end + 1;
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FencedBlock {
    fence_char: char,
    fence_len: usize,
    indent: usize,
}

fn detect_fence_start(line: &str) -> Option<(FencedBlock, &str)> {
    let indent = leading_indent_width(line);
    if indent > 3 {
        return None;
    }
    let rest = line.trim_start();
    let fence_char = rest.chars().next()?;
    if fence_char != '`' && fence_char != '~' {
        return None;
    }
    let fence_len = rest.chars().take_while(|ch| *ch == fence_char).count();
    if fence_len < 3 {
        return None;
    }
    let info = rest[fence_len..].trim();
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    Some((
        FencedBlock {
            fence_char,
            fence_len,
            indent,
        },
        info,
    ))
}

fn is_closing_fence(line: &str, fence: FencedBlock) -> bool {
    if leading_indent_width(line) > 3 {
        return false;
    }
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|ch| ch == fence.fence_char)
        && trimmed.chars().count() >= fence.fence_len
}

pub(crate) fn fence(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some((fence, info)) = detect_fence_start(state.current()) else {
        return false;
    };
    if silent {
        return true;
    }
    let params = info.to_string();
    let mut body = Vec::new();
    let mut next = state.line + 1;
    while next < state.lines.len() {
        let line = &state.lines[next];
        next += 1;
        if is_closing_fence(line, fence) {
            break;
        }
        body.push(strip_columns(line, fence.indent));
    }
    state.push(Token::leaf("fence", body.join("\n")).with_attr("params", params));
    state.line = next;
    true
}

pub(crate) fn code(state: &mut BlockState<'_>, silent: bool) -> bool {
    if leading_indent_width(state.current()) < 4 {
        return false;
    }
    if silent {
        return true;
    }
    let mut last = state.line;
    let mut next = state.line;
    while next < state.lines.len() {
        let line = &state.lines[next];
        if is_blank(line) {
            next += 1;
        } else if leading_indent_width(line) >= 4 {
            last = next;
            next += 1;
        } else {
            break;
        }
    }
    let body: Vec<String> = state.lines[state.line..=last]
        .iter()
        .map(|line| strip_columns(line, 4))
        .collect();
    state.push(Token::leaf("code_block", body.join("\n")));
    state.line = last + 1;
    true
}

pub(crate) fn heading(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some((level, text)) = detect_atx_heading(state.current()) else {
        return false;
    };
    if silent {
        return true;
    }
    let text = text.to_string();
    state.push_inline_block("heading", Token::open("heading").with_attr("level", level), text);
    state.line += 1;
    true
}

fn is_thematic_break(line: &str) -> bool {
    if leading_indent_width(line) > 3 {
        return false;
    }
    let mut marker = None;
    let mut count = 0usize;
    for ch in line.trim().chars() {
        match ch {
            ' ' | '\t' => {}
            '-' | '*' | '_' if marker.map_or(true, |m| m == ch) => {
                marker = Some(ch);
                count += 1;
            }
            _ => return false,
        }
    }
    count >= 3
}

pub(crate) fn hr(state: &mut BlockState<'_>, silent: bool) -> bool {
    if !is_thematic_break(state.current()) {
        return false;
    }
    if !silent {
        state.push(Token::leaf("hr", ""));
        state.line += 1;
    }
    true
}

fn strip_quote_marker(line: &str) -> Option<String> {
    if leading_indent_width(line) > 3 {
        return None;
    }
    let rest = line.trim_start().strip_prefix('>')?;
    Some(strip_columns(rest, 1))
}

pub(crate) fn blockquote(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some(first) = strip_quote_marker(state.current()) else {
        return false;
    };
    if silent {
        return true;
    }
    let mut inner = vec![first];
    let mut next = state.line + 1;
    while next < state.lines.len() {
        let line = state.lines[next].clone();
        if let Some(stripped) = strip_quote_marker(&line) {
            inner.push(stripped);
            next += 1;
            continue;
        }
        if is_blank(&line) {
            break;
        }
        // Lazy continuation of a paragraph inside the quote.
        let after_text = inner.last().map_or(false, |prev| !is_blank(prev));
        if !after_text || state.interrupts(next) {
            break;
        }
        inner.push(line.trim_start().to_string());
        next += 1;
    }

    let (tokens, _) = state.nested(inner);
    state.push(Token::open("blockquote"));
    state.tokens.extend(tokens);
    state.push(Token::close("blockquote"));
    state.line = next;
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet(char),
    Ordered(char),
    Todo,
}

impl ListKind {
    fn token_name(self) -> &'static str {
        match self {
            ListKind::Bullet(_) => "bullet_list",
            ListKind::Ordered(_) => "ordered_list",
            ListKind::Todo => "todo_list",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ListMarker {
    kind: ListKind,
    number: Option<u64>,
    checked: Option<bool>,
    /// Column where item content starts; continuation lines must reach it.
    content_offset: usize,
    content: String,
}

fn parse_todo_box(text: &str) -> Option<(bool, &str)> {
    let (checked, rest) = if let Some(rest) = text.strip_prefix("[ ]") {
        (false, rest)
    } else if let Some(rest) = text.strip_prefix("[]") {
        (false, rest)
    } else if let Some(rest) = text.strip_prefix("[x]").or_else(|| text.strip_prefix("[X]")) {
        (true, rest)
    } else {
        return None;
    };
    if rest.is_empty() {
        return Some((checked, rest));
    }
    rest.strip_prefix([' ', '\t']).map(|rest| (checked, rest))
}

fn parse_list_marker(line: &str) -> Option<ListMarker> {
    let indent = leading_indent_width(line);
    if indent > 3 {
        return None;
    }
    let rest = line.trim_start();
    let first = rest.chars().next()?;

    let (mut kind, number, marker_width, mut checked) = if matches!(first, '-' | '+' | '*') {
        (ListKind::Bullet(first), None, 1, None)
    } else if first.is_ascii_digit() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits > 9 {
            return None;
        }
        let delim = rest[digits..].chars().next()?;
        if delim != '.' && delim != ')' {
            return None;
        }
        let number = rest[..digits].parse::<u64>().ok()?;
        (ListKind::Ordered(delim), Some(number), digits + 1, None)
    } else if first == '[' {
        let (done, _) = parse_todo_box(rest)?;
        if rest.starts_with("[]") {
            return None;
        }
        (ListKind::Todo, None, 3, Some(done))
    } else {
        return None;
    };

    let after = &rest[marker_width..];
    if !after.is_empty() && !after.starts_with([' ', '\t']) {
        return None;
    }

    let spaces = leading_indent_width(after);
    let (content_offset, mut content) = if after.trim().is_empty() {
        (indent + marker_width + 1, String::new())
    } else if spaces > 4 {
        (indent + marker_width + 1, strip_columns(after, 1))
    } else {
        (indent + marker_width + spaces, after.trim_start().to_string())
    };

    if let ListKind::Bullet(_) = kind {
        if let Some((done, remainder)) = parse_todo_box(&content) {
            kind = ListKind::Todo;
            checked = Some(done);
            content = remainder.trim_start().to_string();
        }
    }

    Some(ListMarker {
        kind,
        number,
        checked,
        content_offset,
        content,
    })
}

pub(crate) fn list(state: &mut BlockState<'_>, silent: bool) -> bool {
    let Some(first) = parse_list_marker(state.current()) else {
        return false;
    };
    if silent {
        return !first.content.is_empty() && first.number.map_or(true, |n| n == 1);
    }

    let kind = first.kind;
    let order = first.number;
    let mut items: Vec<(ListMarker, Vec<String>)> = Vec::new();
    let mut loose = false;
    let mut marker = first;
    let mut next = state.line;

    loop {
        let mut inner = vec![marker.content.clone()];
        let mut blanks = 0usize;
        let mut ended = false;
        next += 1;
        while next < state.lines.len() {
            let line = state.lines[next].clone();
            if is_blank(&line) {
                blanks += 1;
                if blanks >= 2 {
                    ended = true;
                    break;
                }
                inner.push(String::new());
                next += 1;
                continue;
            }
            if leading_indent_width(&line) >= marker.content_offset {
                inner.push(strip_columns(&line, marker.content_offset));
                blanks = 0;
                next += 1;
                continue;
            }
            if parse_list_marker(&line).is_some_and(|m| m.kind == kind) {
                break;
            }
            let after_text = inner.last().map_or(false, |prev| !is_blank(prev));
            if blanks == 0 && after_text && !state.interrupts(next) {
                inner.push(line.trim_start().to_string());
                next += 1;
                continue;
            }
            break;
        }

        // The marker line stays with its item even when it has no content.
        let trailing = inner[1..].iter().rev().take_while(|line| is_blank(line)).count();
        inner.truncate(inner.len() - trailing);
        items.push((marker, inner));

        let following = if ended {
            None
        } else {
            state
                .lines
                .get(next)
                .and_then(|line| parse_list_marker(line))
                .filter(|m| m.kind == kind)
        };
        match following {
            Some(following) => {
                loose |= trailing > 0;
                marker = following;
            }
            None => {
                next -= trailing;
                break;
            }
        }
    }

    let name = kind.token_name();
    let mut open = Token::open(name);
    if let Some(order) = order {
        open.set_attr("order", order as i64);
    }
    let open_index = state.tokens.len();
    state.push(open);
    for (marker, inner) in items {
        let (tokens, blank_inside) = state.nested(inner);
        loose |= blank_inside;
        let mut item = Token::open("list_item");
        if let Some(checked) = marker.checked {
            item.set_attr("todo_checked", checked);
        }
        state.push(item);
        state.tokens.extend(tokens);
        state.push(Token::close("list_item"));
    }
    state.tokens[open_index].set_attr("tight", !loose);
    state.push(Token::close(name));
    state.line = next;
    true
}

pub(crate) fn paragraph(state: &mut BlockState<'_>, silent: bool) -> bool {
    if silent {
        return false;
    }
    let mut lines = vec![state.current().trim_start().to_string()];
    let mut next = state.line + 1;
    let mut setext = None;
    while next < state.lines.len() {
        let line = state.lines[next].clone();
        if is_blank(&line) {
            break;
        }
        if let Some(level) = match_setext_depth(&line) {
            setext = Some(level);
            next += 1;
            break;
        }
        if state.interrupts(next) {
            break;
        }
        lines.push(line.trim_start().to_string());
        next += 1;
    }

    match setext {
        Some(level) => {
            let content = lines.join(" ").trim_end().to_string();
            state.push_inline_block("heading", Token::open("heading").with_attr("level", level), content)
        }
        None => {
            let content = lines.join("\n").trim_end().to_string();
            state.push_inline_block("paragraph", Token::open("paragraph"), content)
        }
    }
    state.line = next;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Tokenizer;
    use crate::token::Nesting;

    fn names(source: &str) -> Vec<String> {
        Tokenizer::default()
            .tokenize(source)
            .iter()
            .map(|token| match token.nesting {
                Nesting::Open => format!("+{}", token.name),
                Nesting::Close => format!("-{}", token.name),
                Nesting::Leaf => token.name.to_string(),
            })
            .collect()
    }

    #[test]
    fn strips_partial_tabs() {
        assert_eq!(strip_columns("\tcode", 2), "  code");
        assert_eq!(strip_columns("    x", 2), "  x");
        assert_eq!(strip_columns(" x", 4), "x");
    }

    #[test]
    fn splits_front_matter() {
        let (front, body) = split_front_matter("---\ntitle: A\n---\n# Body\n");
        assert_eq!(front, Some("---\ntitle: A\n---\n"));
        assert_eq!(body, "# Body\n");
        assert_eq!(split_front_matter("---\n\ntext").0, None);
    }

    #[test]
    fn recognizes_block_structure() {
        assert_eq!(
            names("# Title\n\ntext\n\n---\n\n> quote"),
            vec![
                "+heading", "inline", "-heading", "+paragraph", "inline", "-paragraph", "hr",
                "+blockquote", "+paragraph", "inline", "-paragraph", "-blockquote",
            ]
        );
    }

    #[test]
    fn setext_underline_makes_heading() {
        let tokens = Tokenizer::default().tokenize("Title\n=====\n\nNext\n---");
        assert_eq!(tokens[0].attrs["level"].as_int(), Some(1));
        assert_eq!(tokens[1].content, "Title");
        assert_eq!(tokens[3].attrs["level"].as_int(), Some(2));
    }

    #[test]
    fn fences_keep_content_and_params() {
        let tokens = Tokenizer::default().tokenize("```rust\nfn main() {}\n\n  x\n```\nafter");
        assert_eq!(tokens[0].name, "fence");
        assert_eq!(tokens[0].content, "fn main() {}\n\n  x");
        assert_eq!(tokens[0].attrs["params"].as_str(), Some("rust"));
        assert_eq!(tokens[2].content, "after");
    }

    #[test]
    fn list_tightness_follows_blank_lines() {
        let tight = Tokenizer::default().tokenize("- a\n- b");
        assert_eq!(tight[0].attrs["tight"].as_bool(), Some(true));
        let loose = Tokenizer::default().tokenize("1. a\n\n2. b");
        assert_eq!(loose[0].name, "ordered_list");
        assert_eq!(loose[0].attrs["tight"].as_bool(), Some(false));
        assert_eq!(loose[0].attrs["order"].as_int(), Some(1));
    }

    #[test]
    fn different_markers_start_new_lists() {
        assert_eq!(
            names("- a\n- [ ] b"),
            vec![
                "+bullet_list", "+list_item", "+paragraph", "inline", "-paragraph", "-list_item",
                "-bullet_list", "+todo_list", "+list_item", "+paragraph", "inline", "-paragraph",
                "-list_item", "-todo_list",
            ]
        );
    }

    #[test]
    fn todo_markers_set_checked_state() {
        let tokens = Tokenizer::default().tokenize("- [x] done\n- [ ] open\n[ ] bare");
        let items: Vec<Option<bool>> = tokens
            .iter()
            .filter(|t| t.name == "list_item" && t.nesting == Nesting::Open)
            .map(|t| t.attrs["todo_checked"].as_bool())
            .collect();
        assert_eq!(items, vec![Some(true), Some(false), Some(false)]);
    }

    #[test]
    fn nested_lists_and_lazy_lines() {
        let tokens = Tokenizer::default().tokenize("- a\n  - b\nlazy\n- c");
        let inline: Vec<&str> = tokens
            .iter()
            .filter(|t| t.name == "inline")
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(inline, vec!["a", "b\nlazy", "c"]);
    }
}
