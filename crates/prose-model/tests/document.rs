use pretty_assertions::assert_eq;
use prose_model::{
    attrs, AttrSpec, Attrs, Fragment, MarkSpec, ModelError, Node, NodeSpec, Schema, SchemaRegistry,
    Selection, Slice,
};

fn schema() -> Schema {
    SchemaRegistry::new()
        .register_node("doc", NodeSpec::new().content("block+"))
        .register_node("paragraph", NodeSpec::new().content("inline*").group("block"))
        .register_node("blockquote", NodeSpec::new().content("block+").group("block"))
        .register_node("horizontal_rule", NodeSpec::new().group("block"))
        .register_node("text", NodeSpec::new().group("inline"))
        .register_node(
            "image",
            NodeSpec::new()
                .inline()
                .group("inline")
                .attr("src", AttrSpec::required()),
        )
        .register_mark("em", MarkSpec::new())
        .register_mark("strong", MarkSpec::new())
        .compile()
        .expect("schema compiles")
}

fn p(schema: &Schema, children: Vec<Node>) -> Node {
    schema
        .node("paragraph", Attrs::new(), children)
        .expect("paragraph")
}

fn txt(schema: &Schema, text: &str) -> Node {
    schema.text(text, Vec::new())
}

fn hello_world(schema: &Schema) -> Node {
    schema
        .node(
            "doc",
            Attrs::new(),
            vec![
                p(schema, vec![txt(schema, "Hello")]),
                p(schema, vec![txt(schema, "World")]),
            ],
        )
        .expect("doc")
}

#[test]
fn sizes_count_tokens() {
    let schema = schema();
    let doc = hello_world(&schema);
    assert_eq!(doc.content_size(), 14);
    assert_eq!(doc.node_size(), 16);

    let image = schema
        .node("image", attrs! { "src" => "a.png" }, Vec::new())
        .expect("image");
    let para = p(&schema, vec![txt(&schema, "a"), image]);
    assert_eq!(para.node_size(), 4);
}

#[test]
fn resolves_positions_inside_text() {
    let schema = schema();
    let doc = hello_world(&schema);
    let pos = doc.resolve(3).expect("resolve");
    assert_eq!(pos.depth(), 1);
    assert_eq!(pos.parent().type_name(), "paragraph");
    assert_eq!(pos.parent_offset(), 2);
    assert_eq!(pos.text_offset(), 2);
    assert_eq!(pos.start(1), 1);
    assert_eq!(pos.end(1), 6);
    assert_eq!(pos.before(1), Some(0));
    assert_eq!(pos.after(1), Some(7));
    assert_eq!(pos.node_after().and_then(|n| n.text().map(str::to_string)), Some("llo".to_string()));
    assert_eq!(pos.node_before().and_then(|n| n.text().map(str::to_string)), Some("He".to_string()));
}

#[test]
fn rejects_positions_past_the_end() {
    let schema = schema();
    let doc = hello_world(&schema);
    let err = doc.resolve(15).expect_err("out of range");
    assert_eq!(err, ModelError::OutOfRange { pos: 15, size: 14 });
}

#[test]
fn inserts_text_and_shares_untouched_children() {
    let schema = schema();
    let doc = hello_world(&schema);
    let slice = Slice::from_fragment(Fragment::from_node(txt(&schema, "XY")));
    let next = doc.replace(3, 3, &slice).expect("replace");
    assert_eq!(next.text_between(0, next.content_size(), "\n", ""), "HeXYllo\nWorld");
    assert!(Node::ptr_eq(
        next.child(1).expect("second"),
        doc.child(1).expect("second")
    ));
    assert_eq!(doc.text_content(), "HelloWorld");
}

#[test]
fn deleting_a_boundary_joins_paragraphs() {
    let schema = schema();
    let doc = hello_world(&schema);
    let next = doc.replace(6, 8, &Slice::empty()).expect("join");
    assert_eq!(next.child_count(), 1);
    assert_eq!(next.text_content(), "HelloWorld");
    assert_eq!(next.child(0).map(Node::child_count), Some(1));
}

#[test]
fn open_slice_splits_a_paragraph() {
    let schema = schema();
    let doc = hello_world(&schema);
    let slice = Slice::new(
        Fragment::from_nodes([p(&schema, Vec::new()), p(&schema, Vec::new())]),
        1,
        1,
    );
    let next = doc.replace(3, 3, &slice).expect("split");
    let texts: Vec<String> = next.children().map(Node::text_content).collect();
    assert_eq!(texts, vec!["He", "llo", "World"]);
    next.check().expect("valid");
}

#[test]
fn slices_across_blocks_are_open() {
    let schema = schema();
    let doc = hello_world(&schema);
    let slice = doc.slice(3, 10).expect("slice");
    assert_eq!(slice.open_start, 1);
    assert_eq!(slice.open_end, 1);
    assert_eq!(slice.size(), 7);
    let texts: Vec<String> = slice.content.iter().map(Node::text_content).collect();
    assert_eq!(texts, vec!["llo", "Wo"]);
}

#[test]
fn replacing_with_own_slice_is_identity() {
    let schema = schema();
    let doc = hello_world(&schema);
    let slice = doc.slice(3, 10).expect("slice");
    let next = doc.replace(3, 10, &slice).expect("replace");
    assert_eq!(next, doc);
}

#[test]
fn node_at_descends_to_text() {
    let schema = schema();
    let doc = hello_world(&schema);
    assert_eq!(doc.node_at(0).map(|n| n.type_name().to_string()), Some("paragraph".into()));
    assert_eq!(doc.node_at(2).and_then(|n| n.text().map(str::to_string)), Some("Hello".into()));
    assert!(doc.node_at(14).is_none());
}

#[test]
fn check_reports_invalid_content() {
    let schema = schema();
    let doc_type = schema.node_type("doc").expect("doc type");
    let empty = doc_type
        .create(Attrs::new(), Fragment::empty(), Vec::new())
        .expect("unchecked create");
    assert!(matches!(empty.check(), Err(ModelError::InvalidContent { .. })));
    assert!(schema.node("doc", Attrs::new(), Vec::new()).is_err());
}

#[test]
fn adjacent_text_with_equal_marks_merges() {
    let schema = schema();
    let strong = schema.mark("strong", Attrs::new()).expect("strong");
    let para = p(
        &schema,
        vec![
            txt(&schema, "Hello "),
            schema.text("wor", vec![strong.clone()]),
            schema.text("ld", vec![strong]),
        ],
    );
    assert_eq!(para.child_count(), 2);
    assert_eq!(format!("{para:?}"), r#"paragraph("Hello ", strong("world"))"#);
}

#[test]
fn stored_marks_follow_inclusive_neighbours() {
    let schema = schema();
    let strong = schema.mark("strong", Attrs::new()).expect("strong");
    let doc = schema
        .node(
            "doc",
            Attrs::new(),
            vec![p(&schema, vec![schema.text("a", vec![strong.clone()]), txt(&schema, "b")])],
        )
        .expect("doc");
    let pos = doc.resolve(2).expect("resolve");
    assert_eq!(pos.marks(), vec![strong.clone()]);
    assert!(doc.range_has_mark(1, 2, strong.mark_type()));
    assert!(!doc.range_has_mark(2, 3, strong.mark_type()));
}

#[test]
fn selections_clamp_to_textblocks() {
    let schema = schema();
    let doc = hello_world(&schema);
    assert_eq!(Selection::at_start(&doc), Selection::Text { anchor: 1, head: 1 });
    assert_eq!(Selection::at_end(&doc), Selection::Text { anchor: 13, head: 13 });
    assert_eq!(
        Selection::node(&doc, 0).expect("node selection"),
        Selection::Node { from: 0, to: 7 }
    );
    assert!(Selection::node(&doc, 2).is_err());
    assert!(Selection::text(&doc, 0, 20).is_err());
}

#[test]
fn eq_ignoring_skips_named_attributes() {
    let schema = SchemaRegistry::new()
        .register_node("doc", NodeSpec::new().content("block+"))
        .register_node(
            "heading",
            NodeSpec::new()
                .content("inline*")
                .group("block")
                .attr("id", AttrSpec::default_value(prose_model::AttrValue::Null)),
        )
        .register_node("text", NodeSpec::new().group("inline"))
        .compile()
        .expect("schema");
    let a = schema
        .node("heading", attrs! { "id" => "one" }, vec![schema.text("T", Vec::new())])
        .expect("a");
    let b = schema
        .node("heading", attrs! { "id" => "two" }, vec![schema.text("T", Vec::new())])
        .expect("b");
    assert_ne!(a, b);
    assert!(a.eq_ignoring(&b, &["id"]));
}
