use prose_model::{Attrs, Fragment, Mark, Node, NodeType, Schema};
use tracing::debug;

use crate::error::MarkdownError;
use crate::stages::{default_stages, ParserStage, Tokenizer};
use crate::token::{Nesting, Token};

/// How a token becomes part of the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSpec {
    /// Open and close tokens wrapping a node's content.
    Block(&'static str),
    /// A leaf node.
    Node(&'static str),
    /// A block whose token content is its text.
    Code(&'static str),
    /// Open and close tokens toggling a mark.
    Mark(&'static str),
    /// A leaf token whose content is text carrying a mark.
    CodeMark(&'static str),
    Text,
    SoftBreak,
    Ignore,
}

/// Token name to document mapping. Attributes are taken from the token.
pub const TOKEN_SPECS: &[(&str, TokenSpec)] = &[
    ("paragraph", TokenSpec::Block("paragraph")),
    ("heading", TokenSpec::Block("heading")),
    ("blockquote", TokenSpec::Block("blockquote")),
    ("bullet_list", TokenSpec::Block("bullet_list")),
    ("ordered_list", TokenSpec::Block("ordered_list")),
    ("todo_list", TokenSpec::Block("todo_list")),
    ("list_item", TokenSpec::Block("list_item")),
    ("hr", TokenSpec::Node("horizontal_rule")),
    ("fence", TokenSpec::Code("code_block")),
    ("code_block", TokenSpec::Code("code_block")),
    ("image", TokenSpec::Node("image")),
    ("hardbreak", TokenSpec::Node("hard_break")),
    ("text", TokenSpec::Text),
    ("softbreak", TokenSpec::SoftBreak),
    ("em", TokenSpec::Mark("em")),
    ("strong", TokenSpec::Mark("strong")),
    ("link", TokenSpec::Mark("link")),
    ("strike", TokenSpec::Mark("strike")),
    ("sub", TokenSpec::Mark("sub")),
    ("sup", TokenSpec::Mark("sup")),
    ("mark", TokenSpec::Mark("mark")),
    ("underline", TokenSpec::Mark("underline")),
    ("code_inline", TokenSpec::CodeMark("code")),
    ("front_matter", TokenSpec::Ignore),
];

fn token_spec(name: &str) -> Option<TokenSpec> {
    TOKEN_SPECS
        .iter()
        .find(|(token, _)| *token == name)
        .map(|(_, spec)| *spec)
}

/// Parses markdown into documents of a schema. Parsing never fails:
/// content the schema cannot hold is repaired or dropped.
#[derive(Clone, Debug)]
pub struct MarkdownParser {
    schema: Schema,
    tokenizer: Tokenizer,
    empty_doc: Node,
}

impl MarkdownParser {
    pub fn new(schema: Schema) -> Result<Self, MarkdownError> {
        Self::with_stages(schema, &default_stages())
    }

    pub fn with_stages(schema: Schema, stages: &[ParserStage]) -> Result<Self, MarkdownError> {
        let paragraph = schema
            .node_type("paragraph")
            .ok_or_else(|| MarkdownError::MissingType("paragraph".to_string()))?
            .create(Attrs::new(), Fragment::empty(), Vec::new())?;
        let top = schema.top_node_type();
        let empty_doc = top.create_checked(Attrs::new(), Fragment::from_node(paragraph), Vec::new())?;
        Ok(MarkdownParser {
            tokenizer: Tokenizer::new(stages),
            schema,
            empty_doc,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        self.tokenizer.tokenize(source)
    }

    pub fn parse(&self, source: &str) -> Node {
        let tokens = self.tokenize(source);
        let mut builder = Builder::new(&self.schema);
        builder.process(&tokens);
        builder.finish().unwrap_or_else(|| {
            debug!("markdown produced no valid document, using an empty one");
            self.empty_doc.clone()
        })
    }
}

struct Frame {
    node_type: Option<NodeType>,
    attrs: Attrs,
    content: Vec<Node>,
}

/// Builds nodes from a token stream with a stack of open frames.
struct Builder<'a> {
    schema: &'a Schema,
    stack: Vec<Frame>,
    marks: Vec<Mark>,
}

impl<'a> Builder<'a> {
    fn new(schema: &'a Schema) -> Self {
        Builder {
            schema,
            stack: vec![Frame {
                node_type: Some(schema.top_node_type().clone()),
                attrs: Attrs::new(),
                content: Vec::new(),
            }],
            marks: Vec::new(),
        }
    }

    fn process(&mut self, tokens: &[Token]) {
        for token in tokens {
            if token.name == "inline" {
                self.process(&token.children);
                continue;
            }
            match token_spec(token.name) {
                Some(TokenSpec::Block(name)) => match token.nesting {
                    Nesting::Open => self.open_node(name, &token.attrs),
                    Nesting::Close => self.close_node(),
                    Nesting::Leaf => {
                        self.open_node(name, &token.attrs);
                        self.close_node();
                    }
                },
                Some(TokenSpec::Node(name)) => self.add_leaf(name, token),
                Some(TokenSpec::Code(name)) => {
                    self.open_node(name, &token.attrs);
                    self.add_text(&token.content);
                    self.close_node();
                }
                Some(TokenSpec::Mark(name)) => match token.nesting {
                    Nesting::Open => self.open_mark(name, &token.attrs),
                    Nesting::Close => self.close_mark(name),
                    Nesting::Leaf => {}
                },
                Some(TokenSpec::CodeMark(name)) => {
                    self.open_mark(name, &token.attrs);
                    self.add_text(&token.content);
                    self.close_mark(name);
                }
                Some(TokenSpec::Text) => self.add_text(&token.content),
                Some(TokenSpec::SoftBreak) => self.add_text("\n"),
                Some(TokenSpec::Ignore) => {}
                None => {
                    debug!(token = token.name, "no mapping for markdown token");
                    self.add_text(&token.content);
                }
            }
        }
    }

    fn top(&mut self) -> &mut Frame {
        if self.stack.is_empty() {
            self.stack.push(Frame {
                node_type: Some(self.schema.top_node_type().clone()),
                attrs: Attrs::new(),
                content: Vec::new(),
            });
        }
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let node = self.schema.text(text, self.marks.clone());
        self.top().content.push(node);
    }

    fn add_leaf(&mut self, name: &str, token: &Token) {
        let Some(node_type) = self.schema.node_type(name) else {
            debug!(node = name, "schema has no node for markdown token");
            return;
        };
        match node_type.create(token.attrs.clone(), Fragment::empty(), self.marks.clone()) {
            Ok(node) => self.top().content.push(node),
            Err(err) => {
                debug!(node = name, %err, "dropping markdown leaf");
                if let Some(alt) = token.attrs.get("alt").and_then(|alt| alt.as_str()) {
                    let alt = alt.to_string();
                    self.add_text(&alt);
                }
            }
        }
    }

    fn open_node(&mut self, name: &str, attrs: &Attrs) {
        let node_type = self.schema.node_type(name).cloned();
        if node_type.is_none() {
            debug!(node = name, "schema has no node for markdown token, splicing content");
        }
        self.stack.push(Frame {
            node_type,
            attrs: attrs.clone(),
            content: Vec::new(),
        });
    }

    fn close_node(&mut self) {
        if self.stack.len() < 2 {
            debug!("unbalanced close token");
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame.node_type {
            Some(node_type) => {
                if let Some(node) = self.finish_node(&node_type, frame.attrs, frame.content) {
                    self.top().content.push(node);
                }
            }
            None => self.top().content.extend(frame.content),
        }
    }

    fn open_mark(&mut self, name: &str, attrs: &Attrs) {
        let Some(mark_type) = self.schema.mark_type(name) else {
            debug!(mark = name, "schema has no mark for markdown token");
            return;
        };
        match mark_type.create(attrs.clone()) {
            Ok(mark) => self.marks = mark.add_to_set(&self.marks),
            Err(err) => debug!(mark = name, %err, "dropping markdown mark"),
        }
    }

    fn close_mark(&mut self, name: &str) {
        if let Some(mark_type) = self.schema.mark_type(name) {
            self.marks = mark_type.remove_from_set(&self.marks);
        }
    }

    fn finish(mut self) -> Option<Node> {
        while self.stack.len() > 1 {
            self.close_node();
        }
        let frame = self.stack.pop()?;
        let node_type = frame.node_type?;
        self.finish_node(&node_type, frame.attrs, frame.content)
    }

    /// Creates the node for a closed frame, repairing content its type does
    /// not accept. Returns `None` when no repair helps.
    fn finish_node(&self, node_type: &NodeType, attrs: Attrs, content: Vec<Node>) -> Option<Node> {
        let content: Vec<Node> = content
            .into_iter()
            .map(|child| {
                if node_type.allows_marks(child.marks()) {
                    child
                } else {
                    let allowed = child
                        .marks()
                        .iter()
                        .filter(|mark| node_type.allows_mark_type(mark.mark_type()))
                        .cloned()
                        .collect();
                    child.with_marks(allowed)
                }
            })
            .collect();

        if let Some(node) = self.try_fill(node_type, &attrs, content.clone()) {
            return Some(node);
        }
        let repairs: [(&str, fn(&Self, &NodeType, Vec<Node>) -> Vec<Node>); 4] = [
            ("prepend paragraph", Self::prepend_paragraph),
            ("wrap inline", Self::wrap_inline_runs),
            ("convert textblocks", Self::textblocks_to_paragraphs),
            ("drop invalid", Self::drop_invalid),
        ];
        for (repair, apply) in repairs {
            let repaired = apply(self, node_type, content.clone());
            if let Some(node) = self.try_fill(node_type, &attrs, repaired) {
                debug!(node = node_type.name(), repair, "repaired markdown content");
                return Some(node);
            }
        }
        debug!(node = node_type.name(), "dropping markdown node with invalid content");
        None
    }

    fn try_fill(&self, node_type: &NodeType, attrs: &Attrs, content: Vec<Node>) -> Option<Node> {
        let node = self
            .schema
            .fill(node_type, attrs.clone(), Fragment::from_nodes(content))
            .ok()?;
        node_type.valid_content(node.content()).then_some(node)
    }

    fn paragraph(&self, content: Vec<Node>) -> Option<Node> {
        self.schema
            .node_type("paragraph")?
            .create(Attrs::new(), Fragment::from_nodes(content), Vec::new())
            .ok()
    }

    fn prepend_paragraph(&self, _: &NodeType, content: Vec<Node>) -> Vec<Node> {
        let mut repaired: Vec<Node> = self.paragraph(Vec::new()).into_iter().collect();
        repaired.extend(content);
        repaired
    }

    fn wrap_inline_runs(&self, node_type: &NodeType, content: Vec<Node>) -> Vec<Node> {
        if node_type.inline_content() {
            return content;
        }
        let mut repaired = Vec::new();
        let mut run = Vec::new();
        for child in content {
            if child.is_inline() {
                run.push(child);
                continue;
            }
            if !run.is_empty() {
                repaired.extend(self.paragraph(std::mem::take(&mut run)));
            }
            repaired.push(child);
        }
        if !run.is_empty() {
            repaired.extend(self.paragraph(run));
        }
        repaired
    }

    fn textblocks_to_paragraphs(&self, _: &NodeType, content: Vec<Node>) -> Vec<Node> {
        content
            .into_iter()
            .map(|child| {
                if child.is_textblock() && child.type_name() != "paragraph" && !child.node_type().is_code() {
                    self.paragraph(child.content().to_vec()).unwrap_or(child)
                } else {
                    child
                }
            })
            .collect()
    }

    fn drop_invalid(&self, node_type: &NodeType, content: Vec<Node>) -> Vec<Node> {
        let content = self.wrap_inline_runs(node_type, content);
        let mut matched = node_type.content_match();
        let mut kept = Vec::new();
        for child in content {
            match matched.match_type(child.node_type().id()) {
                Some(next) => {
                    matched = next;
                    kept.push(child);
                }
                None => debug!(node = node_type.name(), child = child.type_name(), "dropping child"),
            }
        }
        kept
    }
}
