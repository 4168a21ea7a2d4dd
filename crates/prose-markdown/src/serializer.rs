use prose_model::{Mark, Node};
use tracing::debug;

/// Writes documents over the markdown schema back to Markdown text.
///
/// Output is normalized: ATX headings, `-` bullets, fenced code, `---`
/// rules and a blank line between blocks. Parsing the output yields the
/// same document for anything the parser itself produced.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownSerializer;

impl MarkdownSerializer {
    pub fn new() -> Self {
        MarkdownSerializer
    }

    pub fn serialize(&self, doc: &Node) -> String {
        let mut state = SerializerState::default();
        state.render_content(doc);
        state.out
    }
}

/// Delimiters and layout rules for one mark type.
struct MarkSyntax {
    open: &'static str,
    close: &'static str,
    /// May be closed and reopened in a different order around a shared run.
    mixable: bool,
    /// Leading and trailing whitespace is moved outside the delimiters.
    expel_whitespace: bool,
}

fn mark_syntax(name: &str) -> Option<MarkSyntax> {
    let (open, close, mixable, expel_whitespace) = match name {
        "em" => ("*", "*", true, true),
        "strong" => ("**", "**", true, true),
        "underline" => ("_", "_", false, true),
        "strike" => ("~~", "~~", false, true),
        "mark" => ("==", "==", false, true),
        "sup" => ("^", "^", false, true),
        "sub" => ("~", "~", false, true),
        "link" => ("[", "", false, false),
        _ => return None,
    };
    Some(MarkSyntax {
        open,
        close,
        mixable,
        expel_whitespace,
    })
}

fn is_mixable(mark: &Mark) -> bool {
    mark_syntax(mark.name()).is_some_and(|syntax| syntax.mixable)
}

fn expels_whitespace(mark: &Mark) -> bool {
    mark_syntax(mark.name()).is_some_and(|syntax| syntax.expel_whitespace)
}

#[derive(Default)]
struct SerializerState {
    out: String,
    /// Prefix written at the start of every line in the current container.
    delim: String,
    /// Type name of a block that was closed but whose separator is pending.
    closed: Option<String>,
    in_tight_list: bool,
    at_block_start: bool,
}

impl SerializerState {
    fn at_blank(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    /// Emits the separator owed to a closed block: a newline, then
    /// `size - 1` blank lines.
    fn flush_close(&mut self, size: usize) {
        if self.closed.take().is_none() {
            return;
        }
        if !self.at_blank() {
            self.out.push('\n');
        }
        let delim_min = self.delim.trim_end().to_string();
        for _ in 1..size {
            self.out.push_str(&delim_min);
            self.out.push('\n');
        }
    }

    fn close_block(&mut self, node: &Node) {
        self.closed = Some(node.type_name().to_string());
    }

    /// Blocks directly inside a tight list item are separated by a single
    /// newline. A blank line would make the list loose.
    fn flush_pending(&mut self) {
        self.flush_close(if self.in_tight_list { 1 } else { 2 });
    }

    fn write(&mut self, content: &str) {
        self.flush_pending();
        if !self.delim.is_empty() && self.at_blank() {
            self.out.push_str(&self.delim);
        }
        self.out.push_str(content);
    }

    fn wrap_block(&mut self, delim: &str, first_delim: Option<&str>, node: &Node, f: impl FnOnce(&mut Self)) {
        let old = self.delim.clone();
        self.write(first_delim.unwrap_or(delim));
        self.delim.push_str(delim);
        f(self);
        self.delim = old;
        self.close_block(node);
    }

    fn text(&mut self, text: &str, escape: bool) {
        for (idx, line) in text.split('\n').enumerate() {
            if idx > 0 {
                self.out.push('\n');
            }
            self.write("");
            let written = if escape {
                self.escape(line, self.at_block_start || idx > 0)
            } else {
                line.to_string()
            };
            self.out.push_str(&written);
            if !written.is_empty() {
                self.at_block_start = false;
            }
        }
    }

    /// Backslash-escapes characters that would otherwise start inline
    /// syntax. Word-start sensitive markers are only escaped where they
    /// could open.
    fn escape(&self, text: &str, start_of_line: bool) -> String {
        // Indentation at a line start would be read as code or dropped.
        let text = if start_of_line {
            text.trim_start_matches([' ', '\t'])
        } else {
            text
        };
        let chars: Vec<char> = text.chars().collect();
        let mut prev = self.out.chars().next_back();
        let mut out = String::with_capacity(text.len());
        for (idx, &ch) in chars.iter().enumerate() {
            let word_start = prev.map_or(true, |p| !p.is_alphanumeric());
            let escape = match ch {
                '\\' | '*' | '`' | '[' | ']' | '~' => true,
                '_' | '^' => word_start,
                '=' => word_start && chars.get(idx + 1) == Some(&'='),
                _ => false,
            };
            if escape {
                out.push('\\');
            }
            out.push(ch);
            prev = Some(ch);
        }
        if start_of_line {
            escape_line_start(&mut out);
        }
        out
    }

    fn render_content(&mut self, parent: &Node) {
        for (index, child) in parent.children().enumerate() {
            self.render(child, parent, index);
        }
    }

    fn render(&mut self, node: &Node, parent: &Node, index: usize) {
        match node.type_name() {
            "blockquote" => {
                self.flush_pending();
                let prev_tight = std::mem::replace(&mut self.in_tight_list, false);
                self.wrap_block("> ", None, node, |state| state.render_content(node));
                self.in_tight_list = prev_tight;
            }
            "code_block" => self.render_code_block(node),
            "heading" => {
                let level = node.attr("level").and_then(|v| v.as_int()).unwrap_or(1).clamp(1, 6);
                self.write(&format!("{} ", "#".repeat(level as usize)));
                let start = self.out.len();
                self.render_inline(node);
                escape_closing_hashes(&mut self.out, start);
                self.close_block(node);
            }
            "horizontal_rule" => {
                // `---` under a paragraph line would read as a setext heading.
                let after_paragraph = self.in_tight_list && self.closed.as_deref() == Some("paragraph");
                self.write(if after_paragraph { "***" } else { "---" });
                self.close_block(node);
            }
            "bullet_list" => self.render_list(node, "  ", |_| "- ".to_string()),
            "ordered_list" => {
                let start = node.attr("order").and_then(|v| v.as_int()).unwrap_or(1).max(0) as usize;
                let width = (start + node.child_count().saturating_sub(1)).to_string().len();
                let delim = " ".repeat(width + 2);
                self.render_list(node, &delim, |idx| format!("{:>width$}. ", start + idx));
            }
            "todo_list" => {
                let items: Vec<String> = node.children().map(todo_marker).collect();
                self.render_list(node, "  ", |idx| items.get(idx).cloned().unwrap_or_default());
            }
            "list_item" => self.render_content(node),
            "paragraph" => {
                self.render_inline(node);
                self.close_block(node);
            }
            "image" => self.render_image(node),
            "hard_break" => {
                let more_content = parent
                    .children()
                    .skip(index + 1)
                    .any(|sibling| sibling.type_name() != node.type_name());
                if more_content {
                    self.write("\\\n");
                    self.at_block_start = true;
                }
            }
            "text" => {
                if let Some(text) = node.text() {
                    self.text(text, true);
                }
            }
            other => {
                debug!(node = other, "no markdown form, writing content only");
                if node.inline_content() {
                    self.render_inline(node);
                    self.close_block(node);
                } else if node.is_block() {
                    self.render_content(node);
                }
            }
        }
    }

    fn render_code_block(&mut self, node: &Node) {
        let content = node.text_content();
        let params = node.attr("params").and_then(|v| v.as_str()).unwrap_or("");
        // Backticks are not allowed in the info string of a backtick fence.
        let fence_char = if params.contains('`') { '~' } else { '`' };
        let longest = longest_run(&content, fence_char);
        let fence = fence_char.to_string().repeat(if longest >= 3 { longest + 1 } else { 3 });
        self.write(&format!("{fence}{params}\n"));
        self.text(&content, false);
        self.write("\n");
        self.write(&fence);
        self.close_block(node);
    }

    fn render_image(&mut self, node: &Node) {
        let alt = node.attr("alt").and_then(|v| v.as_str()).unwrap_or("");
        let src = node.attr("src").and_then(|v| v.as_str()).unwrap_or("");
        let title = node.attr("title").and_then(|v| v.as_str());
        let alt = self.escape(alt, false);
        self.write(&format!("![{alt}]({}{})", escape_destination(src), title_suffix(title)));
        self.at_block_start = false;
    }

    fn render_list(&mut self, node: &Node, delim: &str, first_delim: impl Fn(usize) -> String) {
        if self.closed.as_deref() == Some(node.type_name()) {
            self.flush_close(3);
        } else {
            self.flush_pending();
        }

        let tight = node.attr("tight").and_then(|v| v.as_bool()).unwrap_or(false);
        let prev_tight = self.in_tight_list;
        self.in_tight_list = tight;
        for (idx, child) in node.children().enumerate() {
            if idx > 0 && tight {
                self.flush_close(1);
            }
            let first = first_delim(idx);
            self.wrap_block(delim, Some(&first), node, |state| state.render(child, node, idx));
        }
        self.in_tight_list = prev_tight;
    }

    fn render_inline(&mut self, parent: &Node) {
        self.at_block_start = true;
        let mut active: Vec<Mark> = Vec::new();
        let mut trailing = String::new();
        for index in 0..=parent.child_count() {
            let node = parent.child(index).cloned();
            self.progress(parent, node, index, &mut active, &mut trailing);
        }
        self.at_block_start = false;
    }

    /// Writes one inline child, closing and opening delimiters so the
    /// active mark stack matches the child's marks. Called once more with
    /// `None` to close whatever is still open.
    fn progress(
        &mut self,
        parent: &Node,
        mut node: Option<Node>,
        index: usize,
        active: &mut Vec<Mark>,
        trailing: &mut String,
    ) {
        let count = parent.child_count();
        let mut marks: Vec<Mark> = node.as_ref().map(|n| n.marks().to_vec()).unwrap_or_default();

        // Marks ending on a hard break would put the closing delimiter at
        // the start of the next line.
        if node.as_ref().is_some_and(|n| n.type_name() == "hard_break") {
            let next = parent.child(index + 1);
            marks.retain(|mark| {
                next.is_some_and(|next| {
                    mark.is_in_set(next.marks())
                        && (!next.is_text() || next.text().is_some_and(|t| !t.trim().is_empty()))
                })
            });
        }

        let mut leading = std::mem::take(trailing);
        if let Some(text_node) = node.clone().filter(Node::is_text) {
            let text = text_node.text().unwrap_or("");
            if marks.iter().any(|m| expels_whitespace(m) && !m.is_in_set(&active[..])) {
                let rest = text.trim_start();
                let lead = &text[..text.len() - rest.len()];
                if !lead.is_empty() {
                    leading.push_str(lead);
                    if rest.is_empty() {
                        node = None;
                        marks = active.clone();
                    } else {
                        node = Some(text_node.with_text(rest));
                    }
                }
            }
        }
        if let Some(text_node) = node.clone().filter(Node::is_text) {
            let text = text_node.text().unwrap_or("");
            let closes_after = |mark: &Mark| {
                index + 1 == count || parent.child(index + 1).map_or(true, |next| !mark.is_in_set(next.marks()))
            };
            if marks.iter().any(|m| expels_whitespace(m) && closes_after(m)) {
                let rest = text.trim_end();
                let trail = &text[rest.len()..];
                if !trail.is_empty() {
                    *trailing = trail.to_string();
                    if rest.is_empty() {
                        node = None;
                        marks = active.clone();
                    } else {
                        node = Some(text_node.with_text(rest));
                    }
                }
            }
        }

        let inner = marks.last().cloned();
        let no_escape = inner.as_ref().is_some_and(|mark| mark.name() == "code");
        let len = marks.len() - usize::from(no_escape);

        // Reorder mixable marks so ones already open stay outermost.
        'outer: for i in 0..len {
            if !is_mixable(&marks[i]) {
                break;
            }
            for j in 0..active.len() {
                if !is_mixable(&active[j]) {
                    break;
                }
                if marks[i] == active[j] {
                    if i > j {
                        let mark = marks.remove(i);
                        marks.insert(j, mark);
                    } else if j > i {
                        let mark = marks.remove(i);
                        marks.insert(j - 1, mark);
                    }
                    continue 'outer;
                }
            }
        }

        let mut keep = 0;
        while keep < active.len().min(len) && marks[keep] == active[keep] {
            keep += 1;
        }
        while keep < active.len() {
            if let Some(mark) = active.pop() {
                let close = mark_close(&mark);
                self.text(&close, false);
            }
        }

        if !leading.is_empty() {
            self.text(&leading, true);
        }

        let Some(node) = node else {
            return;
        };
        while active.len() < len {
            let add = marks[active.len()].clone();
            let open = mark_open(&add);
            self.text(&open, false);
            active.push(add);
            self.at_block_start = false;
        }

        match (no_escape, node.text()) {
            (true, Some(text)) => {
                let (open, close) = code_delimiters(text);
                self.text(&format!("{open}{text}{close}"), false);
            }
            _ => self.render(&node, parent, index),
        }
    }
}

fn mark_open(mark: &Mark) -> String {
    mark_syntax(mark.name()).map(|syntax| syntax.open.to_string()).unwrap_or_default()
}

fn mark_close(mark: &Mark) -> String {
    if mark.name() == "link" {
        let href = mark.attr("href").and_then(|v| v.as_str()).unwrap_or("");
        let title = mark.attr("title").and_then(|v| v.as_str());
        return format!("]({}{})", escape_destination(href), title_suffix(title));
    }
    mark_syntax(mark.name()).map(|syntax| syntax.close.to_string()).unwrap_or_default()
}

/// Backtick delimiters long enough to enclose `text`. Padding spaces are
/// added when the content touches a backtick or is itself space-wrapped.
fn code_delimiters(text: &str) -> (String, String) {
    let longest = longest_run(text, '`');
    let ticks = "`".repeat(longest + 1);
    let space_wrapped = text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty();
    if longest > 0 || space_wrapped {
        (format!("{ticks} "), format!(" {ticks}"))
    } else {
        (ticks.clone(), ticks)
    }
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in text.chars() {
        if ch == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn escape_destination(href: &str) -> String {
    if href.chars().any(char::is_whitespace) {
        let inner = href.replace('<', "\\<").replace('>', "\\>");
        return format!("<{inner}>");
    }
    let mut out = String::with_capacity(href.len());
    for ch in href.chars() {
        if matches!(ch, '(' | ')' | '"') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn title_suffix(title: Option<&str>) -> String {
    match title {
        Some(title) if !title.is_empty() => format!(" \"{}\"", title.replace('"', "\\\"")),
        _ => String::new(),
    }
}

/// Escapes a run of `#` ending the heading text written from `start`, which
/// would otherwise read as an optional closing sequence.
fn escape_closing_hashes(out: &mut String, start: usize) {
    let content = out[start..].trim_end();
    let body = content.trim_end_matches('#');
    if body.len() == content.len() {
        return;
    }
    if body.is_empty() || body.ends_with([' ', '\t']) {
        out.insert(start + body.len(), '\\');
    }
}

/// `- [ ] `, `- [x] `, with a `{created-closed} ` prefix when either date
/// is known.
fn todo_marker(item: &Node) -> String {
    let checked = item.attr("todo_checked").and_then(|v| v.as_bool()).unwrap_or(false);
    let created = item.attr("todo_created").and_then(|v| v.as_str());
    let closed = item.attr("todo_closed").and_then(|v| v.as_str());
    let mut marker = String::from(if checked { "- [x] " } else { "- [ ] " });
    if created.is_some() || closed.is_some() {
        marker.push('{');
        marker.push_str(created.unwrap_or(""));
        if let Some(closed) = closed {
            marker.push('-');
            marker.push_str(closed);
        }
        marker.push_str("} ");
    }
    marker
}

/// Escapes a line start that would read as block syntax: list and quote
/// markers, ATX heading hashes, ordered list numbers, setext underlines.
fn escape_line_start(line: &mut String) {
    let indent = line.len() - line.trim_start_matches(' ').len();
    let body = &line[indent..];
    let insert_at = if body.starts_with(['-', '+', '>', '=']) {
        Some(indent)
    } else if body.starts_with('#') {
        let hashes = body.chars().take_while(|ch| *ch == '#').count();
        let after = body[hashes..].chars().next();
        (hashes <= 6 && after.map_or(true, char::is_whitespace)).then_some(indent)
    } else {
        let digits = body.chars().take_while(char::is_ascii_digit).count();
        let mut rest = body[digits..].chars();
        let delimiter = rest.next();
        let after = rest.next();
        (digits > 0 && matches!(delimiter, Some('.' | ')')) && after.map_or(true, |ch| ch == ' '))
            .then_some(indent + digits)
    };
    if let Some(at) = insert_at {
        line.insert(at, '\\');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(text: &str) -> String {
        let mut line = text.to_string();
        escape_line_start(&mut line);
        line
    }

    #[test]
    fn escapes_block_syntax_at_line_start() {
        assert_eq!(escaped("- item"), "\\- item");
        assert_eq!(escaped("## title"), "\\## title");
        assert_eq!(escaped("#hashtag"), "#hashtag");
        assert_eq!(escaped("12. x"), "12\\. x");
        assert_eq!(escaped("3.5 apples"), "3.5 apples");
        assert_eq!(escaped("> quote"), "\\> quote");
    }

    #[test]
    fn closing_hashes_in_headings_are_escaped() {
        let mut out = "## a #".to_string();
        escape_closing_hashes(&mut out, 3);
        assert_eq!(out, "## a \\#");

        let mut out = "# ##".to_string();
        escape_closing_hashes(&mut out, 2);
        assert_eq!(out, "# \\##");

        let mut out = "# C#".to_string();
        escape_closing_hashes(&mut out, 2);
        assert_eq!(out, "# C#");
    }

    #[test]
    fn code_delimiters_grow_past_backtick_runs() {
        assert_eq!(code_delimiters("x"), ("`".to_string(), "`".to_string()));
        assert_eq!(code_delimiters("a`b"), ("`` ".to_string(), " ``".to_string()));
        assert_eq!(code_delimiters(" x "), ("` ".to_string(), " `".to_string()));
    }

    #[test]
    fn destinations_escape_parens_and_wrap_spaces() {
        assert_eq!(escape_destination("a(b)"), "a\\(b\\)");
        assert_eq!(escape_destination("a b"), "<a b>");
    }
}
