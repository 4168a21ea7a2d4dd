use prose_model::{AttrSpec, AttrValue, MarkSpec, NodeSpec, Schema, SchemaError, SchemaRegistry};

/// Registry holding every node and mark the markdown bridge understands.
/// Mark registration order is mark rank: earlier marks wrap later ones.
pub fn markdown_registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .register_node("doc", NodeSpec::new().content("block+"))
        .register_node("paragraph", NodeSpec::new().content("inline*").group("block"))
        .register_node(
            "blockquote",
            NodeSpec::new().content("block+").group("block").defining(),
        )
        .register_node("horizontal_rule", NodeSpec::new().group("block"))
        .register_node(
            "heading",
            NodeSpec::new()
                .content("inline*")
                .group("block")
                .defining()
                .attr("level", AttrSpec::default_value(1))
                .attr("id", AttrSpec::default_value(AttrValue::Null)),
        )
        .register_node(
            "code_block",
            NodeSpec::new()
                .content("text*")
                .marks("")
                .group("block")
                .code()
                .defining()
                .attr("params", AttrSpec::default_value("")),
        )
        .register_node(
            "ordered_list",
            NodeSpec::new()
                .content("list_item+")
                .group("block")
                .attr("order", AttrSpec::default_value(1))
                .attr("tight", AttrSpec::default_value(false)),
        )
        .register_node(
            "bullet_list",
            NodeSpec::new()
                .content("list_item+")
                .group("block")
                .attr("tight", AttrSpec::default_value(false)),
        )
        .register_node(
            "todo_list",
            NodeSpec::new()
                .content("list_item+")
                .group("block")
                .attr("tight", AttrSpec::default_value(false)),
        )
        .register_node(
            "list_item",
            NodeSpec::new()
                .content("paragraph block*")
                .defining()
                .attr("todo_checked", AttrSpec::default_value(AttrValue::Null))
                .attr("todo_created", AttrSpec::default_value(AttrValue::Null))
                .attr("todo_closed", AttrSpec::default_value(AttrValue::Null)),
        )
        .register_node("text", NodeSpec::new().group("inline"))
        .register_node(
            "image",
            NodeSpec::new()
                .inline()
                .group("inline")
                .attr("src", AttrSpec::required())
                .attr("alt", AttrSpec::default_value(AttrValue::Null))
                .attr("title", AttrSpec::default_value(AttrValue::Null)),
        )
        .register_node("hard_break", NodeSpec::new().inline().group("inline"))
        .register_mark("em", MarkSpec::new())
        .register_mark("strong", MarkSpec::new())
        .register_mark("underline", MarkSpec::new())
        .register_mark("strike", MarkSpec::new())
        .register_mark("mark", MarkSpec::new())
        .register_mark("sup", MarkSpec::new())
        .register_mark("sub", MarkSpec::new())
        .register_mark(
            "link",
            MarkSpec::new()
                .attr("href", AttrSpec::required())
                .attr("title", AttrSpec::default_value(AttrValue::Null))
                .non_inclusive(),
        )
        .register_mark("code", MarkSpec::new())
}

/// Compiles the markdown schema.
pub fn markdown_schema() -> Result<Schema, SchemaError> {
    markdown_registry().compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_with_expected_groups() {
        let schema = markdown_schema().expect("markdown schema");
        let code = schema.node_type("code_block").expect("code_block");
        let strong = schema.mark_type("strong").expect("strong");
        assert!(code.is_code());
        assert!(!code.allows_mark_type(strong));
        assert!(schema.node_type("list_item").expect("item").is_defining());
        assert!(!schema.mark_type("link").expect("link").is_inclusive());
        assert!(schema.node_type("hard_break").expect("br").is_leaf());
    }
}
