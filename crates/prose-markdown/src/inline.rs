use std::collections::HashMap;

use crate::stages::InlineRule;
use crate::token::{Nesting, Token};

const MAX_NESTING: usize = 32;

/// Character-level tokenizer state for the text of one inline token.
/// Plain characters accumulate in `pending` and are flushed as a `text`
/// token whenever a rule emits something else.
pub struct InlineState<'a> {
    src: Vec<char>,
    pos: usize,
    pos_max: usize,
    pending: String,
    tokens: Vec<Token>,
    rules: &'a [InlineRule],
    level: usize,
    skip_cache: HashMap<(usize, usize), usize>,
}

impl<'a> InlineState<'a> {
    pub(crate) fn new(source: &str, rules: &'a [InlineRule]) -> Self {
        let src: Vec<char> = source.chars().collect();
        let pos_max = src.len();
        InlineState {
            src,
            pos: 0,
            pos_max,
            pending: String::new(),
            tokens: Vec::new(),
            rules,
            level: 0,
            skip_cache: HashMap::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> Vec<Token> {
        let end = self.src.len();
        self.tokenize_range(0, end);
        self.tokens
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn char_at(&self, index: usize) -> Option<char> {
        if index < self.pos_max {
            self.src.get(index).copied()
        } else {
            None
        }
    }

    pub fn push(&mut self, token: Token) {
        self.push_pending();
        self.tokens.push(token);
    }

    fn push_pending(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.tokens.push(Token::leaf("text", text));
        }
    }

    /// Tokenizes `from..to` into the current token list.
    fn tokenize_range(&mut self, from: usize, to: usize) {
        let (saved_pos, saved_max) = (self.pos, self.pos_max);
        self.pos = from;
        self.pos_max = to;
        let rules = self.rules;
        while self.pos < self.pos_max {
            if !rules.iter().any(|rule| (rule.run)(self, false)) {
                let ch = self.src[self.pos];
                self.pending.push(ch);
                self.pos += 1;
            }
        }
        self.push_pending();
        self.pos = saved_pos;
        self.pos_max = saved_max;
    }

    /// Advances past one token without emitting anything.
    fn skip_token(&mut self) {
        let key = (self.pos, self.pos_max);
        if let Some(&end) = self.skip_cache.get(&key) {
            self.pos = end;
            return;
        }
        if self.level >= MAX_NESTING {
            self.pos = self.pos_max;
        } else {
            let start = self.pos;
            let rules = self.rules;
            self.level += 1;
            let matched = rules.iter().any(|rule| (rule.run)(self, true));
            self.level -= 1;
            if !matched {
                self.pos = start + 1;
            }
        }
        self.skip_cache.insert(key, self.pos);
    }

    fn run_length(&self, from: usize, ch: char) -> usize {
        (from..self.pos_max).take_while(|&idx| self.src[idx] == ch).count()
    }

    fn starts_with(&self, at: usize, marker: &[char]) -> bool {
        marker
            .iter()
            .enumerate()
            .all(|(offset, ch)| self.char_at(at + offset) == Some(*ch))
    }

    /// Start of text, after whitespace, or after punctuation.
    fn at_boundary(&self, at: usize) -> bool {
        match at.checked_sub(1).and_then(|prev| self.src.get(prev)) {
            None => true,
            Some(prev) => prev.is_whitespace() || prev.is_ascii_punctuation(),
        }
    }

    fn link_label_end(&mut self, open: usize) -> Option<usize> {
        let saved = self.pos;
        self.pos = open + 1;
        self.level += 1;
        let mut depth = 1usize;
        let mut found = None;
        while self.pos < self.pos_max {
            let ch = self.src[self.pos];
            if ch == ']' {
                depth -= 1;
                if depth == 0 {
                    found = Some(self.pos);
                    break;
                }
            }
            let prev = self.pos;
            self.skip_token();
            if ch == '[' && self.pos == prev + 1 {
                depth += 1;
            }
        }
        self.level -= 1;
        self.pos = saved;
        found
    }

    fn skip_spaces(&self, mut at: usize) -> usize {
        while self.char_at(at).is_some_and(char::is_whitespace) {
            at += 1;
        }
        at
    }

    fn escaped(&self, at: usize) -> Option<char> {
        if self.char_at(at) == Some('\\') {
            self.char_at(at + 1).filter(char::is_ascii_punctuation)
        } else {
            None
        }
    }

    /// Parses `(destination "title")` starting at `at`. Returns the
    /// unescaped destination, the title and the position after `)`.
    fn link_destination(&self, at: usize) -> Option<(String, Option<String>, usize)> {
        if self.char_at(at)? != '(' {
            return None;
        }
        let mut pos = self.skip_spaces(at + 1);
        let mut href = String::new();
        if self.char_at(pos) == Some('<') {
            pos += 1;
            loop {
                if let Some(ch) = self.escaped(pos) {
                    href.push(ch);
                    pos += 2;
                    continue;
                }
                match self.char_at(pos)? {
                    '>' => {
                        pos += 1;
                        break;
                    }
                    '\n' | '<' => return None,
                    ch => {
                        href.push(ch);
                        pos += 1;
                    }
                }
            }
        } else {
            let mut parens = 0usize;
            while let Some(ch) = self.char_at(pos) {
                if let Some(escaped) = self.escaped(pos) {
                    href.push(escaped);
                    pos += 2;
                    continue;
                }
                if ch.is_whitespace() || ch.is_control() {
                    break;
                }
                if ch == '(' {
                    parens += 1;
                } else if ch == ')' {
                    if parens == 0 {
                        break;
                    }
                    parens -= 1;
                }
                href.push(ch);
                pos += 1;
            }
        }

        let after_href = pos;
        pos = self.skip_spaces(pos);
        let mut title = None;
        if pos > after_href {
            if let Some(open) = self.char_at(pos).filter(|ch| matches!(ch, '"' | '\'' | '(')) {
                let close = if open == '(' { ')' } else { open };
                pos += 1;
                let mut text = String::new();
                loop {
                    if let Some(ch) = self.escaped(pos) {
                        text.push(ch);
                        pos += 2;
                        continue;
                    }
                    let ch = self.char_at(pos)?;
                    pos += 1;
                    if ch == close {
                        break;
                    }
                    text.push(ch);
                }
                title = Some(text);
                pos = self.skip_spaces(pos);
            }
        }
        if self.char_at(pos)? != ')' {
            return None;
        }
        Some((href, title, pos + 1))
    }

    /// Text content of `from..to` with markup removed.
    fn plain_text(&mut self, from: usize, to: usize) -> String {
        self.push_pending();
        let saved = std::mem::take(&mut self.tokens);
        self.tokenize_range(from, to);
        let inner = std::mem::replace(&mut self.tokens, saved);
        let mut text = String::new();
        for token in inner {
            match token.name {
                "text" | "code_inline" => text.push_str(&token.content),
                "softbreak" | "hardbreak" => text.push('\n'),
                "image" => {
                    if let Some(alt) = token.attrs.get("alt").and_then(|alt| alt.as_str()) {
                        text.push_str(alt);
                    }
                }
                _ => {}
            }
        }
        text
    }
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric()
}

pub(crate) fn escape(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.char_at(state.pos) != Some('\\') {
        return false;
    }
    match state.char_at(state.pos + 1) {
        Some('\n') => {
            if !silent {
                state.push(Token::leaf("hardbreak", ""));
            }
            state.pos = state.skip_spaces(state.pos + 2);
            true
        }
        Some(ch) if ch.is_ascii_punctuation() => {
            if !silent {
                state.pending.push(ch);
            }
            state.pos += 2;
            true
        }
        _ => false,
    }
}

pub(crate) fn newline(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.char_at(state.pos) != Some('\n') {
        return false;
    }
    if !silent {
        let hard = state.pending.ends_with("  ");
        let trimmed = state.pending.trim_end_matches(' ').len();
        state.pending.truncate(trimmed);
        let name = if hard { "hardbreak" } else { "softbreak" };
        state.push(Token::leaf(name, ""));
    }
    state.pos += 1;
    while state.char_at(state.pos) == Some(' ') {
        state.pos += 1;
    }
    true
}

pub(crate) fn backticks(state: &mut InlineState<'_>, silent: bool) -> bool {
    let start = state.pos;
    if state.char_at(start) != Some('`') {
        return false;
    }
    let run = state.run_length(start, '`');
    let content_start = start + run;
    let mut pos = content_start;
    while pos < state.pos_max {
        if state.src[pos] != '`' {
            pos += 1;
            continue;
        }
        let closing = state.run_length(pos, '`');
        if closing == run {
            if !silent {
                let mut content: String = state.src[content_start..pos]
                    .iter()
                    .map(|ch| if *ch == '\n' { ' ' } else { *ch })
                    .collect();
                if content.len() >= 2
                    && content.starts_with(' ')
                    && content.ends_with(' ')
                    && !content.trim().is_empty()
                {
                    content = content[1..content.len() - 1].to_string();
                }
                state.push(Token::leaf("code_inline", content));
            }
            state.pos = pos + closing;
            return true;
        }
        pos += closing;
    }
    if !silent {
        state.pending.extend(std::iter::repeat('`').take(run));
    }
    state.pos = content_start;
    true
}

pub(crate) fn image(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.char_at(state.pos) != Some('!') || state.char_at(state.pos + 1) != Some('[') {
        return false;
    }
    parse_link(state, silent, true)
}

pub(crate) fn link(state: &mut InlineState<'_>, silent: bool) -> bool {
    parse_link(state, silent, false)
}

fn parse_link(state: &mut InlineState<'_>, silent: bool, image: bool) -> bool {
    let start = state.pos;
    let label_open = if image { start + 1 } else { start };
    if state.char_at(label_open) != Some('[') || state.level >= MAX_NESTING {
        return false;
    }
    let Some(label_close) = state.link_label_end(label_open) else {
        return false;
    };
    let Some((href, title, end)) = state.link_destination(label_close + 1) else {
        return false;
    };

    if !silent {
        if image {
            let alt = state.plain_text(label_open + 1, label_close);
            let alt = (!alt.is_empty()).then_some(alt);
            state.push(
                Token::leaf("image", "")
                    .with_attr("src", href)
                    .with_attr("alt", alt)
                    .with_attr("title", title),
            );
        } else {
            state.push(
                Token::open("link")
                    .with_attr("href", href)
                    .with_attr("title", title),
            );
            state.tokenize_range(label_open + 1, label_close);
            state.push(Token::close("link"));
        }
    }
    state.pos = end;
    true
}

/// Shared body of the paired-delimiter rules. Standard markers need
/// non-space text just inside both delimiters. Extended markers must also
/// open at a word boundary and close at a word end.
fn delimited(
    state: &mut InlineState<'_>,
    silent: bool,
    marker: &[char],
    name: &'static str,
    extended: bool,
) -> bool {
    let start = state.pos;
    let len = marker.len();
    if !state.starts_with(start, marker) || state.level >= MAX_NESTING {
        return false;
    }
    let content_start = start + len;
    if state.char_at(content_start).map_or(true, char::is_whitespace) {
        return false;
    }
    if extended && !state.at_boundary(start) {
        return false;
    }

    state.level += 1;
    state.pos = content_start;
    let mut closer = None;
    while state.pos < state.pos_max {
        let at = state.pos;
        let closes = at > content_start
            && state.starts_with(at, marker)
            && !state.src[at - 1].is_whitespace()
            && (!extended || state.char_at(at + len).map_or(true, |next| !is_word(next)));
        if closes {
            closer = Some(at);
            break;
        }
        state.skip_token();
    }
    state.level -= 1;

    let Some(closer) = closer else {
        state.pos = start;
        return false;
    };
    if !silent {
        state.push(Token::open(name));
        state.tokenize_range(content_start, closer);
        state.push(Token::close(name));
    }
    state.pos = closer + len;
    true
}

pub(crate) fn strong(state: &mut InlineState<'_>, silent: bool) -> bool {
    // A run of three opens emphasis around strong.
    if state.run_length(state.pos, '*') == 3 {
        return false;
    }
    delimited(state, silent, &['*', '*'], "strong", false)
}

pub(crate) fn em(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.run_length(state.pos, '*') == 2 {
        return false;
    }
    delimited(state, silent, &['*'], "em", false)
}

pub(crate) fn strike(state: &mut InlineState<'_>, silent: bool) -> bool {
    delimited(state, silent, &['~', '~'], "strike", false)
}

pub(crate) fn mark(state: &mut InlineState<'_>, silent: bool) -> bool {
    delimited(state, silent, &['=', '='], "mark", true)
}

pub(crate) fn underline(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.run_length(state.pos, '_') != 1 {
        return false;
    }
    delimited(state, silent, &['_'], "underline", true)
}

pub(crate) fn sub(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.run_length(state.pos, '~') != 1 {
        return false;
    }
    delimited(state, silent, &['~'], "sub", true)
}

pub(crate) fn sup(state: &mut InlineState<'_>, silent: bool) -> bool {
    if state.run_length(state.pos, '^') != 1 {
        return false;
    }
    delimited(state, silent, &['^'], "sup", true)
}

/// Renders an inline token list as a compact outline, used in tests and
/// debug logging.
pub fn outline(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|token| match token.nesting {
            Nesting::Open => format!("<{}>", token.name),
            Nesting::Close => format!("</{}>", token.name),
            Nesting::Leaf if token.name == "text" => token.content.clone(),
            Nesting::Leaf if token.name == "code_inline" => format!("`{}`", token.content),
            Nesting::Leaf => format!("[{}]", token.name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Tokenizer;

    fn inline(source: &str) -> String {
        let tokens = Tokenizer::default().tokenize(source);
        let inline = tokens.iter().find(|t| t.name == "inline").expect("inline token");
        outline(&inline.children)
    }

    #[test]
    fn parses_standard_emphasis() {
        assert_eq!(inline("Hello **world**"), "Hello <strong>world</strong>");
        assert_eq!(inline("*a* and ~~b~~"), "<em>a</em> and <strike>b</strike>");
        assert_eq!(inline("***both***"), "<em><strong>both</strong></em>");
        assert_eq!(inline("*a **b***"), "<em>a <strong>b</strong></em>");
        assert_eq!(inline("** not bold**"), "** not bold**");
    }

    #[test]
    fn extended_markers_need_word_boundaries() {
        assert_eq!(inline("_u_ ==m== x~2~ ^s^"), "<underline>u</underline> <mark>m</mark> x~2~ <sup>s</sup>");
        assert_eq!(inline("H ~2~ O"), "H <sub>2</sub> O");
        assert_eq!(inline("H ~2~O"), "H ~2~O");
        assert_eq!(inline("snake_case_name"), "snake_case_name");
        assert_eq!(inline("**_both_**"), "<strong><underline>both</underline></strong>");
    }

    #[test]
    fn code_spans_and_escapes() {
        assert_eq!(inline("use `a *b*` here"), "use `a *b*` here");
        assert_eq!(inline("`` a`b ``"), "`a`b`");
        assert_eq!(inline("\\*lit\\*"), "*lit*");
        assert_eq!(inline("`open"), "`open");
    }

    #[test]
    fn breaks() {
        assert_eq!(inline("a\nb"), "a[softbreak]b");
        assert_eq!(inline("a  \nb"), "a[hardbreak]b");
        assert_eq!(inline("a\\\nb"), "a[hardbreak]b");
    }

    #[test]
    fn links_and_images() {
        let tokens = Tokenizer::default().tokenize("see [the *docs*](http://x.y/a\\)b \"T\") ![alt](i.png)");
        let children = &tokens[1].children;
        assert_eq!(outline(children), "see <link>the <em>docs</em></link> [image]");
        assert_eq!(children[1].attrs["href"].as_str(), Some("http://x.y/a)b"));
        assert_eq!(children[1].attrs["title"].as_str(), Some("T"));
        let image = children.last().expect("image");
        assert_eq!(image.attrs["src"].as_str(), Some("i.png"));
        assert_eq!(image.attrs["alt"].as_str(), Some("alt"));
        assert!(image.attrs["title"].is_null());
    }

    #[test]
    fn unclosed_brackets_stay_text() {
        assert_eq!(inline("[not a link"), "[not a link");
        assert_eq!(inline("[label] (x)"), "[label] (x)");
    }
}
