//! Shared test harness utilities for prose crates: document builders over
//! the markdown schema and a baseline configuration.

use std::sync::OnceLock;

use prose_config::Config;
use prose_model::{attrs, Attrs, Mark, Node, Schema};

/// Returns a baseline configuration for tests.
pub fn test_config() -> Config {
    Config::default()
}

/// The markdown schema, compiled once per test binary.
pub fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| prose_markdown::markdown_schema().expect("markdown schema compiles"))
}

/// Parses markdown with the default pipeline.
pub fn md(source: &str) -> Node {
    prose_markdown::parse(source).expect("markdown parser builds")
}

fn node(name: &str, attrs: Attrs, content: Vec<Node>) -> Node {
    schema()
        .node(name, attrs, content)
        .unwrap_or_else(|err| panic!("invalid `{name}` in test document: {err}"))
}

pub fn t(text: &str) -> Node {
    schema().text(text, Vec::new())
}

pub fn doc(content: Vec<Node>) -> Node {
    node("doc", Attrs::new(), content)
}

pub fn p(content: Vec<Node>) -> Node {
    node("paragraph", Attrs::new(), content)
}

pub fn h(level: i64, content: Vec<Node>) -> Node {
    node("heading", attrs! { "level" => level }, content)
}

pub fn blockquote(content: Vec<Node>) -> Node {
    node("blockquote", Attrs::new(), content)
}

pub fn code_block(text: &str) -> Node {
    let content = if text.is_empty() { Vec::new() } else { vec![t(text)] };
    node("code_block", Attrs::new(), content)
}

pub fn hr() -> Node {
    node("horizontal_rule", Attrs::new(), Vec::new())
}

pub fn br() -> Node {
    node("hard_break", Attrs::new(), Vec::new())
}

pub fn image(src: &str) -> Node {
    node("image", attrs! { "src" => src }, Vec::new())
}

pub fn li(content: Vec<Node>) -> Node {
    node("list_item", Attrs::new(), content)
}

/// A todo item holding one paragraph of text.
pub fn todo_item(checked: bool, text: &str) -> Node {
    node("list_item", attrs! { "todo_checked" => checked }, vec![p(vec![t(text)])])
}

pub fn ul(items: Vec<Node>) -> Node {
    node("bullet_list", attrs! { "tight" => true }, items)
}

pub fn ol(items: Vec<Node>) -> Node {
    node("ordered_list", attrs! { "tight" => true }, items)
}

pub fn todo(items: Vec<Node>) -> Node {
    node("todo_list", attrs! { "tight" => true }, items)
}

/// Adds the named mark to every inline node in `content`.
pub fn marked(name: &str, content: Vec<Node>) -> Vec<Node> {
    let mark = schema()
        .mark(name, Attrs::new())
        .unwrap_or_else(|err| panic!("invalid mark `{name}`: {err}"));
    add_mark(&mark, content)
}

pub fn strong(text: &str) -> Node {
    single(marked("strong", vec![t(text)]))
}

pub fn em(text: &str) -> Node {
    single(marked("em", vec![t(text)]))
}

pub fn link(href: &str, text: &str) -> Node {
    let mark = schema()
        .mark("link", attrs! { "href" => href })
        .unwrap_or_else(|err| panic!("invalid link: {err}"));
    single(add_mark(&mark, vec![t(text)]))
}

fn add_mark(mark: &Mark, content: Vec<Node>) -> Vec<Node> {
    content
        .into_iter()
        .map(|child| {
            let marks = mark.add_to_set(child.marks());
            child.with_marks(marks)
        })
        .collect()
}

fn single(mut nodes: Vec<Node>) -> Node {
    nodes.pop().expect("one node")
}
