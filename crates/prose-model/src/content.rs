//! Content expressions.
//!
//! A node type's `content` string (`"paragraph block*"`, `"(text | image)*"`,
//! `"list_item+"`) is parsed into a small AST, names are resolved against the
//! registered node types and groups, and the result is compiled into an NFA.
//! [`ContentMatch`] is a cursor over that automaton: it holds the set of live
//! states after a prefix of children has been consumed.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ExprAst {
    Name(String),
    Seq(Vec<ExprAst>),
    Alt(Vec<ExprAst>),
    Star(Box<ExprAst>),
    Plus(Box<ExprAst>),
    Opt(Box<ExprAst>),
    Range(Box<ExprAst>, usize, Option<usize>),
}

pub(crate) fn parse_expr(source: &str) -> Result<ExprAst, String> {
    let tokens = tokenize(source)?;
    let mut parser = ExprParser {
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.parse_alt()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("unexpected token `{tok}`"));
    }
    Ok(expr)
}

fn tokenize(source: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch.is_alphanumeric() || ch == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(word);
        } else if "()|*+?{},".contains(ch) {
            tokens.push(ch.to_string());
            chars.next();
        } else {
            return Err(format!("unexpected character `{ch}`"));
        }
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), String> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(format!(
                "expected `{token}`, found `{}`",
                self.peek().unwrap_or("end of expression")
            ))
        }
    }

    fn parse_alt(&mut self) -> Result<ExprAst, String> {
        let mut exprs = vec![self.parse_seq()?];
        while self.eat("|") {
            exprs.push(self.parse_seq()?);
        }
        Ok(if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            ExprAst::Alt(exprs)
        })
    }

    fn parse_seq(&mut self) -> Result<ExprAst, String> {
        let mut items = Vec::new();
        while let Some(tok) = self.peek() {
            if tok == ")" || tok == "|" {
                break;
            }
            items.push(self.parse_subscript()?);
        }
        match items.len() {
            0 => Err("empty expression".to_string()),
            1 => Ok(items.remove(0)),
            _ => Ok(ExprAst::Seq(items)),
        }
    }

    fn parse_subscript(&mut self) -> Result<ExprAst, String> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat("*") {
                expr = ExprAst::Star(Box::new(expr));
            } else if self.eat("+") {
                expr = ExprAst::Plus(Box::new(expr));
            } else if self.eat("?") {
                expr = ExprAst::Opt(Box::new(expr));
            } else if self.eat("{") {
                expr = self.parse_range(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_range(&mut self, expr: ExprAst) -> Result<ExprAst, String> {
        let min = self.parse_number()?;
        let max = if self.eat(",") {
            if self.peek() == Some("}") {
                None
            } else {
                Some(self.parse_number()?)
            }
        } else {
            Some(min)
        };
        self.expect("}")?;
        if let Some(max) = max {
            if max < min {
                return Err(format!("range maximum {max} is below minimum {min}"));
            }
        }
        Ok(ExprAst::Range(Box::new(expr), min, max))
    }

    fn parse_number(&mut self) -> Result<usize, String> {
        let tok = self.peek().ok_or("expected a number")?;
        let value = tok
            .parse::<usize>()
            .map_err(|_| format!("expected a number, found `{tok}`"))?;
        self.pos += 1;
        Ok(value)
    }

    fn parse_atom(&mut self) -> Result<ExprAst, String> {
        if self.eat("(") {
            let expr = self.parse_alt()?;
            self.expect(")")?;
            return Ok(expr);
        }
        match self.peek() {
            Some(tok) if tok.chars().all(|c| c.is_alphanumeric() || c == '_') => {
                self.pos += 1;
                Ok(ExprAst::Name(tok.to_string()))
            }
            Some(tok) => Err(format!("unexpected token `{tok}`")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    term: Option<usize>,
    to: usize,
}

/// Compiled content automaton. Terms are node type ids.
#[derive(Debug)]
pub(crate) struct Nfa {
    edges: Vec<Vec<Edge>>,
    start: usize,
    accept: usize,
}

impl Nfa {
    /// Automaton for leaf nodes: accepts only the empty sequence.
    pub(crate) fn empty() -> Self {
        Nfa {
            edges: vec![Vec::new()],
            start: 0,
            accept: 0,
        }
    }

    /// Compiles `ast`, resolving names through `lookup`. Returns the automaton and
    /// every node type id it can match.
    pub(crate) fn compile(
        ast: &ExprAst,
        lookup: &dyn Fn(&str) -> Option<Vec<usize>>,
    ) -> Result<(Nfa, BTreeSet<usize>), String> {
        let mut builder = NfaBuilder { edges: Vec::new() };
        let mut referenced = BTreeSet::new();
        let (start, accept) = builder.build(ast, lookup, &mut referenced)?;
        Ok((
            Nfa {
                edges: builder.edges,
                start,
                accept,
            },
            referenced,
        ))
    }

    fn closure(&self, seeds: impl IntoIterator<Item = usize>) -> Vec<usize> {
        let mut seen = vec![false; self.edges.len()];
        let mut stack: Vec<usize> = seeds.into_iter().collect();
        let mut out = Vec::new();
        while let Some(state) = stack.pop() {
            if seen[state] {
                continue;
            }
            seen[state] = true;
            out.push(state);
            for edge in &self.edges[state] {
                if edge.term.is_none() && !seen[edge.to] {
                    stack.push(edge.to);
                }
            }
        }
        out.sort_unstable();
        out
    }
}

struct NfaBuilder {
    edges: Vec<Vec<Edge>>,
}

impl NfaBuilder {
    fn state(&mut self) -> usize {
        self.edges.push(Vec::new());
        self.edges.len() - 1
    }

    fn edge(&mut self, from: usize, term: Option<usize>, to: usize) {
        self.edges[from].push(Edge { term, to });
    }

    fn build(
        &mut self,
        ast: &ExprAst,
        lookup: &dyn Fn(&str) -> Option<Vec<usize>>,
        referenced: &mut BTreeSet<usize>,
    ) -> Result<(usize, usize), String> {
        match ast {
            ExprAst::Name(name) => {
                let ids = lookup(name)
                    .filter(|ids| !ids.is_empty())
                    .ok_or_else(|| format!("unknown node type or group `{name}`"))?;
                let start = self.state();
                let end = self.state();
                for id in ids {
                    referenced.insert(id);
                    self.edge(start, Some(id), end);
                }
                Ok((start, end))
            }
            ExprAst::Seq(items) => {
                let start = self.state();
                let mut end = start;
                for item in items {
                    let (s, e) = self.build(item, lookup, referenced)?;
                    self.edge(end, None, s);
                    end = e;
                }
                Ok((start, end))
            }
            ExprAst::Alt(items) => {
                let start = self.state();
                let end = self.state();
                for item in items {
                    let (s, e) = self.build(item, lookup, referenced)?;
                    self.edge(start, None, s);
                    self.edge(e, None, end);
                }
                Ok((start, end))
            }
            ExprAst::Star(inner) => {
                let hub = self.state();
                let (s, e) = self.build(inner, lookup, referenced)?;
                self.edge(hub, None, s);
                self.edge(e, None, hub);
                Ok((hub, hub))
            }
            ExprAst::Plus(inner) => {
                let (s, e) = self.build(inner, lookup, referenced)?;
                let end = self.state();
                self.edge(e, None, s);
                self.edge(e, None, end);
                Ok((s, end))
            }
            ExprAst::Opt(inner) => {
                let start = self.state();
                let (s, e) = self.build(inner, lookup, referenced)?;
                let end = self.state();
                self.edge(start, None, s);
                self.edge(e, None, end);
                self.edge(start, None, end);
                Ok((start, end))
            }
            ExprAst::Range(inner, min, max) => {
                let mut items: Vec<ExprAst> = (0..*min).map(|_| (**inner).clone()).collect();
                match max {
                    None => items.push(ExprAst::Star(inner.clone())),
                    Some(max) => {
                        for _ in *min..*max {
                            items.push(ExprAst::Opt(inner.clone()));
                        }
                    }
                }
                if items.is_empty() {
                    let state = self.state();
                    return Ok((state, state));
                }
                self.build(&ExprAst::Seq(items), lookup, referenced)
            }
        }
    }
}

/// Cursor into a content automaton after some prefix of children.
#[derive(Clone, Debug)]
pub struct ContentMatch {
    nfa: Arc<Nfa>,
    states: Vec<usize>,
}

impl ContentMatch {
    pub(crate) fn start(nfa: &Arc<Nfa>) -> Self {
        ContentMatch {
            states: nfa.closure([nfa.start]),
            nfa: Arc::clone(nfa),
        }
    }

    /// Advances over one child of the given node type id.
    pub fn match_type(&self, type_id: usize) -> Option<ContentMatch> {
        let targets: Vec<usize> = self
            .states
            .iter()
            .flat_map(|state| self.nfa.edges[*state].iter())
            .filter(|edge| edge.term == Some(type_id))
            .map(|edge| edge.to)
            .collect();
        if targets.is_empty() {
            return None;
        }
        Some(ContentMatch {
            states: self.nfa.closure(targets),
            nfa: Arc::clone(&self.nfa),
        })
    }

    /// Advances over a run of children.
    pub fn match_types<I>(&self, type_ids: I) -> Option<ContentMatch>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut current = self.clone();
        for id in type_ids {
            current = current.match_type(id)?;
        }
        Some(current)
    }

    /// Whether the content may end here.
    pub fn valid_end(&self) -> bool {
        self.states.contains(&self.nfa.accept)
    }

    /// Node type ids that may appear next, sorted.
    pub fn next_types(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .states
            .iter()
            .flat_map(|state| self.nfa.edges[*state].iter())
            .filter_map(|edge| edge.term)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Shortest run of generatable node types that completes the content.
    pub fn fill_to_end(&self, can_generate: impl Fn(usize) -> bool) -> Option<Vec<usize>> {
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        seen.insert(self.states.clone());
        let mut queue = VecDeque::new();
        queue.push_back((self.clone(), Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            if current.valid_end() {
                return Some(path);
            }
            for id in current.next_types() {
                if !can_generate(id) {
                    continue;
                }
                if let Some(next) = current.match_type(id) {
                    if seen.insert(next.states.clone()) {
                        let mut extended = path.clone();
                        extended.push(id);
                        queue.push_back((next, extended));
                    }
                }
            }
        }
        None
    }
}
