//! Schema registry: node and mark declarations compiled into a [`Schema`].

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::attrs::{AttrValue, Attrs};
use crate::content::{parse_expr, ContentMatch, Nfa};
use crate::error::{
    ModelError, ModelResult, SchemaError, SchemaValidationError, SchemaValidationErrors,
};
use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::node::Node;

/// Declared attribute. `default: None` makes the attribute required.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrSpec {
    pub default: Option<AttrValue>,
}

impl AttrSpec {
    pub fn required() -> Self {
        AttrSpec { default: None }
    }

    pub fn default_value(value: impl Into<AttrValue>) -> Self {
        AttrSpec {
            default: Some(value.into()),
        }
    }
}

/// Declaration of a node type, consumed by [`SchemaRegistry::register_node`].
#[derive(Clone, Debug, Default)]
pub struct NodeSpec {
    pub content: Option<String>,
    pub group: Option<String>,
    pub marks: Option<String>,
    pub inline: bool,
    pub atom: bool,
    pub code: bool,
    pub defining: bool,
    pub attrs: Vec<(String, AttrSpec)>,
}

impl NodeSpec {
    pub fn new() -> Self {
        NodeSpec::default()
    }

    pub fn content(mut self, expr: impl Into<String>) -> Self {
        self.content = Some(expr.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Allowed marks: space separated names or groups, `"_"` for all, `""` for none.
    pub fn marks(mut self, marks: impl Into<String>) -> Self {
        self.marks = Some(marks.into());
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn atom(mut self) -> Self {
        self.atom = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    pub fn defining(mut self) -> Self {
        self.defining = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        self.attrs.push((name.into(), spec));
        self
    }
}

/// Declaration of a mark type, consumed by [`SchemaRegistry::register_mark`].
#[derive(Clone, Debug)]
pub struct MarkSpec {
    pub attrs: Vec<(String, AttrSpec)>,
    /// Marks this one excludes. `None` excludes only marks of the same type.
    pub excludes: Option<String>,
    pub group: Option<String>,
    /// Whether the mark extends to text typed at its end.
    pub inclusive: bool,
}

impl Default for MarkSpec {
    fn default() -> Self {
        MarkSpec {
            attrs: Vec::new(),
            excludes: None,
            group: None,
            inclusive: true,
        }
    }
}

impl MarkSpec {
    pub fn new() -> Self {
        MarkSpec::default()
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        self.attrs.push((name.into(), spec));
        self
    }

    pub fn excludes(mut self, excludes: impl Into<String>) -> Self {
        self.excludes = Some(excludes.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn non_inclusive(mut self) -> Self {
        self.inclusive = false;
        self
    }
}

/// Collects node and mark declarations in registration order.
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    nodes: Vec<(String, NodeSpec)>,
    marks: Vec<(String, MarkSpec)>,
    top_node: String,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        SchemaRegistry::new()
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            nodes: Vec::new(),
            marks: Vec::new(),
            top_node: "doc".to_string(),
        }
    }

    pub fn register_node(mut self, name: impl Into<String>, spec: NodeSpec) -> Self {
        self.nodes.push((name.into(), spec));
        self
    }

    pub fn register_mark(mut self, name: impl Into<String>, spec: MarkSpec) -> Self {
        self.marks.push((name.into(), spec));
        self
    }

    pub fn top_node(mut self, name: impl Into<String>) -> Self {
        self.top_node = name.into();
        self
    }

    /// Validates every declaration and compiles content expressions.
    pub fn compile(self) -> Result<Schema, SchemaError> {
        let mut errors = Vec::new();

        let mut node_index = HashMap::new();
        for (id, (name, spec)) in self.nodes.iter().enumerate() {
            if node_index.insert(name.clone(), id).is_some() {
                errors.push(SchemaValidationError::new(
                    format!("node `{name}`"),
                    "registered more than once",
                ));
            }
            check_attr_names(&format!("node `{name}`"), &spec.attrs, &mut errors);
        }

        let mut mark_index = HashMap::new();
        for (id, (name, spec)) in self.marks.iter().enumerate() {
            if mark_index.insert(name.clone(), id).is_some() {
                errors.push(SchemaValidationError::new(
                    format!("mark `{name}`"),
                    "registered more than once",
                ));
            }
            check_attr_names(&format!("mark `{name}`"), &spec.attrs, &mut errors);
        }

        let top_id = node_index.get(&self.top_node).copied();
        if top_id.is_none() {
            errors.push(SchemaValidationError::new(
                "schema",
                format!("top node `{}` is not registered", self.top_node),
            ));
        }
        let text_id = node_index.get("text").copied();
        if text_id.is_none() {
            errors.push(SchemaValidationError::new(
                "schema",
                "a `text` node type is required",
            ));
        }

        let node_groups = collect_groups(self.nodes.iter().map(|(_, spec)| spec.group.as_deref()));
        let mark_groups = collect_groups(self.marks.iter().map(|(_, spec)| spec.group.as_deref()));

        let lookup = |name: &str| -> Option<Vec<usize>> {
            node_index
                .get(name)
                .map(|id| vec![*id])
                .or_else(|| node_groups.get(name).cloned())
        };

        let inline_flags: Vec<bool> = self
            .nodes
            .iter()
            .map(|(name, spec)| spec.inline || name == "text")
            .collect();
        let required_attrs: Vec<bool> = self
            .nodes
            .iter()
            .map(|(_, spec)| spec.attrs.iter().any(|(_, attr)| attr.default.is_none()))
            .collect();
        let can_generate = |id: usize| Some(id) != text_id && !required_attrs[id];

        let mut compiled = Vec::with_capacity(self.nodes.len());
        for (name, spec) in &self.nodes {
            let subject = format!("node `{name}`");
            let expr = spec
                .content
                .as_deref()
                .map(str::trim)
                .filter(|expr| !expr.is_empty());
            let Some(expr) = expr else {
                compiled.push((Arc::new(Nfa::empty()), false, true));
                continue;
            };
            match parse_expr(expr).and_then(|ast| Nfa::compile(&ast, &lookup)) {
                Ok((nfa, referenced)) => {
                    let inline_refs = referenced.iter().filter(|id| inline_flags[**id]).count();
                    if inline_refs > 0 && inline_refs < referenced.len() {
                        errors.push(SchemaValidationError::new(
                            subject.clone(),
                            format!("content expression `{expr}` mixes inline and block nodes"),
                        ));
                    }
                    let nfa = Arc::new(nfa);
                    if ContentMatch::start(&nfa)
                        .fill_to_end(|id| can_generate(id))
                        .is_none()
                    {
                        errors.push(SchemaValidationError::new(
                            subject.clone(),
                            format!(
                                "content expression `{expr}` requires nodes that cannot be generated"
                            ),
                        ));
                    }
                    compiled.push((nfa, inline_refs > 0, false));
                }
                Err(message) => {
                    errors.push(SchemaValidationError::new(
                        subject.clone(),
                        format!("invalid content expression `{expr}`: {message}"),
                    ));
                    compiled.push((Arc::new(Nfa::empty()), false, true));
                }
            }
        }

        let resolve_marks = |subject: &str,
                             list: &str,
                             errors: &mut Vec<SchemaValidationError>|
         -> Vec<usize> {
            let mut ids = Vec::new();
            for name in list.split_whitespace() {
                if let Some(id) = mark_index.get(name) {
                    ids.push(*id);
                } else if let Some(group) = mark_groups.get(name) {
                    ids.extend(group.iter().copied());
                } else {
                    errors.push(SchemaValidationError::new(
                        subject.to_string(),
                        format!("unknown mark type or group `{name}`"),
                    ));
                }
            }
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        let all_marks: Vec<usize> = (0..self.marks.len()).collect();
        let mut mark_types = Vec::with_capacity(self.marks.len());
        for (id, (name, spec)) in self.marks.iter().enumerate() {
            let subject = format!("mark `{name}`");
            let excludes = match spec.excludes.as_deref().map(str::trim) {
                None => vec![id],
                Some("_") => all_marks.clone(),
                Some(list) => resolve_marks(&subject, list, &mut errors),
            };
            mark_types.push(MarkType(Arc::new(MarkTypeData {
                id,
                name: name.clone(),
                attrs: spec.attrs.clone(),
                excludes,
                inclusive: spec.inclusive,
            })));
        }

        let mut node_types = Vec::with_capacity(self.nodes.len());
        for (id, ((name, spec), (nfa, inline_content, leaf))) in
            self.nodes.iter().zip(compiled).enumerate()
        {
            let subject = format!("node `{name}`");
            let allowed_marks = match spec.marks.as_deref().map(str::trim) {
                Some("_") => None,
                Some(list) => Some(resolve_marks(&subject, list, &mut errors)),
                None if inline_content => None,
                None => Some(Vec::new()),
            };
            node_types.push(NodeType(Arc::new(NodeTypeData {
                id,
                name: name.clone(),
                groups: spec
                    .group
                    .as_deref()
                    .map(|groups| groups.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                attrs: spec.attrs.clone(),
                inline: inline_flags[id],
                text: Some(id) == text_id,
                atom: spec.atom,
                code: spec.code,
                defining: spec.defining,
                leaf,
                inline_content,
                content: nfa,
                content_expr: spec.content.clone().unwrap_or_default(),
                allowed_marks,
            })));
        }

        let (Some(top), Some(text)) = (top_id, text_id) else {
            return Err(SchemaError::Validation(SchemaValidationErrors(errors)));
        };
        if !errors.is_empty() {
            return Err(SchemaError::Validation(SchemaValidationErrors(errors)));
        }

        Ok(Schema(Arc::new(SchemaInner {
            node_types,
            mark_types,
            node_index,
            mark_index,
            top,
            text,
        })))
    }
}

fn check_attr_names(
    subject: &str,
    attrs: &[(String, AttrSpec)],
    errors: &mut Vec<SchemaValidationError>,
) {
    for (idx, (name, _)) in attrs.iter().enumerate() {
        if attrs[..idx].iter().any(|(other, _)| other == name) {
            errors.push(SchemaValidationError::new(
                subject.to_string(),
                format!("attribute `{name}` declared more than once"),
            ));
        }
    }
}

fn collect_groups<'a>(groups: impl Iterator<Item = Option<&'a str>>) -> HashMap<String, Vec<usize>> {
    let mut map: HashMap<String, Vec<usize>> = HashMap::new();
    for (id, group) in groups.enumerate() {
        for name in group.unwrap_or_default().split_whitespace() {
            map.entry(name.to_string()).or_default().push(id);
        }
    }
    map
}

fn compute_attrs(owner: &str, specs: &[(String, AttrSpec)], given: &Attrs) -> ModelResult<Attrs> {
    let mut attrs = Attrs::new();
    for (name, spec) in specs {
        let value = match given.get(name) {
            Some(value) => value.clone(),
            None => spec.default.clone().ok_or_else(|| ModelError::MissingAttr {
                owner: owner.to_string(),
                attr: name.clone(),
            })?,
        };
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}

struct SchemaInner {
    node_types: Vec<NodeType>,
    mark_types: Vec<MarkType>,
    node_index: HashMap<String, usize>,
    mark_index: HashMap<String, usize>,
    top: usize,
    text: usize,
}

/// Compiled, immutable schema. Cheap to clone.
#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

impl Schema {
    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.0
            .node_index
            .get(name)
            .and_then(|id| self.0.node_types.get(*id))
    }

    pub fn mark_type(&self, name: &str) -> Option<&MarkType> {
        self.0
            .mark_index
            .get(name)
            .and_then(|id| self.0.mark_types.get(*id))
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.0.node_types
    }

    pub fn mark_types(&self) -> &[MarkType] {
        &self.0.mark_types
    }

    pub fn top_node_type(&self) -> &NodeType {
        &self.0.node_types[self.0.top]
    }

    pub fn text_type(&self) -> &NodeType {
        &self.0.node_types[self.0.text]
    }

    pub fn same(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Creates a text node. Empty text is dropped when placed in a fragment.
    pub fn text(&self, text: impl Into<String>, marks: Vec<Mark>) -> Node {
        Node::new_text(self.text_type().clone(), text.into(), marks)
    }

    /// Creates a node by name, checking its content.
    pub fn node(&self, name: &str, attrs: Attrs, content: Vec<Node>) -> ModelResult<Node> {
        let node_type = self
            .node_type(name)
            .ok_or_else(|| ModelError::UnknownNodeType(name.to_string()))?;
        node_type.create_checked(attrs, Fragment::from_nodes(content), Vec::new())
    }

    pub fn mark(&self, name: &str, attrs: Attrs) -> ModelResult<Mark> {
        self.mark_type(name)
            .ok_or_else(|| ModelError::UnknownMarkType(name.to_string()))?
            .create(attrs)
    }

    /// Creates a node, appending whatever generated children its content
    /// expression requires after `content`.
    pub fn fill(&self, node_type: &NodeType, attrs: Attrs, content: Fragment) -> ModelResult<Node> {
        let invalid = || ModelError::InvalidContent {
            node: node_type.name().to_string(),
            detail: "content cannot be completed".to_string(),
        };
        let matched = node_type
            .content_match()
            .match_types(content.iter().map(|child| child.node_type().id()))
            .ok_or_else(invalid)?;
        let extra = matched
            .fill_to_end(|id| self.can_generate(id))
            .ok_or_else(invalid)?;

        let mut children: Vec<Node> = content.iter().cloned().collect();
        for id in extra {
            children.push(self.fill(&self.0.node_types[id], Attrs::new(), Fragment::empty())?);
        }
        node_type.create(attrs, Fragment::from_nodes(children), Vec::new())
    }

    fn can_generate(&self, id: usize) -> bool {
        id != self.0.text && !self.0.node_types[id].has_required_attrs()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field(
                "nodes",
                &self.0.node_types.iter().map(NodeType::name).collect::<Vec<_>>(),
            )
            .field(
                "marks",
                &self.0.mark_types.iter().map(MarkType::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug)]
struct NodeTypeData {
    id: usize,
    name: String,
    groups: Vec<String>,
    attrs: Vec<(String, AttrSpec)>,
    inline: bool,
    text: bool,
    atom: bool,
    code: bool,
    defining: bool,
    leaf: bool,
    inline_content: bool,
    content: Arc<Nfa>,
    content_expr: String,
    allowed_marks: Option<Vec<usize>>,
}

/// Compiled node type descriptor.
#[derive(Clone)]
pub struct NodeType(Arc<NodeTypeData>);

impl NodeType {
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn groups(&self) -> &[String] {
        &self.0.groups
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.0.groups.iter().any(|g| g == group)
    }

    pub fn is_text(&self) -> bool {
        self.0.text
    }

    pub fn is_inline(&self) -> bool {
        self.0.inline
    }

    pub fn is_block(&self) -> bool {
        !self.0.inline
    }

    pub fn is_textblock(&self) -> bool {
        !self.0.inline && self.0.inline_content
    }

    pub fn inline_content(&self) -> bool {
        self.0.inline_content
    }

    pub fn is_leaf(&self) -> bool {
        self.0.leaf
    }

    pub fn is_atom(&self) -> bool {
        self.0.leaf || self.0.atom
    }

    pub fn is_code(&self) -> bool {
        self.0.code
    }

    pub fn is_defining(&self) -> bool {
        self.0.defining
    }

    pub fn content_expr(&self) -> &str {
        &self.0.content_expr
    }

    pub fn content_match(&self) -> ContentMatch {
        ContentMatch::start(&self.0.content)
    }

    pub fn has_required_attrs(&self) -> bool {
        self.0.attrs.iter().any(|(_, spec)| spec.default.is_none())
    }

    pub fn default_attrs(&self) -> ModelResult<Attrs> {
        self.compute_attrs(&Attrs::new())
    }

    /// Fills defaults into `given` and drops undeclared keys.
    pub fn compute_attrs(&self, given: &Attrs) -> ModelResult<Attrs> {
        compute_attrs(&self.0.name, &self.0.attrs, given)
    }

    pub fn allows_mark_type(&self, mark_type: &MarkType) -> bool {
        match &self.0.allowed_marks {
            None => true,
            Some(ids) => ids.contains(&mark_type.id()),
        }
    }

    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        marks
            .iter()
            .all(|mark| self.allows_mark_type(mark.mark_type()))
    }

    /// Whether `content` satisfies this type's content expression and mark rules.
    pub fn valid_content(&self, content: &Fragment) -> bool {
        let matched = self
            .content_match()
            .match_types(content.iter().map(|child| child.node_type().id()));
        match matched {
            Some(end) if end.valid_end() => {
                content.iter().all(|child| self.allows_marks(child.marks()))
            }
            _ => false,
        }
    }

    /// Whether content of `other` can be joined onto a node of this type.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other
            || self.0.content_expr == other.0.content_expr
            || (self.0.inline_content && other.0.inline_content)
    }

    /// Creates a node without validating its content.
    pub fn create(&self, attrs: Attrs, content: Fragment, marks: Vec<Mark>) -> ModelResult<Node> {
        if self.0.text {
            return Err(ModelError::InvalidContent {
                node: self.0.name.clone(),
                detail: "text nodes are created through Schema::text".to_string(),
            });
        }
        let attrs = self.compute_attrs(&attrs)?;
        Ok(Node::new(self.clone(), attrs, content, marks))
    }

    /// Creates a node and rejects content its expression does not accept.
    pub fn create_checked(
        &self,
        attrs: Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> ModelResult<Node> {
        if !self.valid_content(&content) {
            return Err(ModelError::InvalidContent {
                node: self.0.name.clone(),
                detail: format!("does not match `{}`", self.0.content_expr),
            });
        }
        self.create(attrs, content, marks)
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.id == other.0.id && self.0.name == other.0.name)
    }
}

impl Eq for NodeType {}

impl Hash for NodeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[derive(Debug)]
struct MarkTypeData {
    id: usize,
    name: String,
    attrs: Vec<(String, AttrSpec)>,
    excludes: Vec<usize>,
    inclusive: bool,
}

/// Compiled mark type descriptor. Its id doubles as its rank in mark sets.
#[derive(Clone)]
pub struct MarkType(Arc<MarkTypeData>);

impl MarkType {
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn rank(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_inclusive(&self) -> bool {
        self.0.inclusive
    }

    pub fn excludes(&self, other: &MarkType) -> bool {
        self.0.excludes.contains(&other.0.id)
    }

    pub fn create(&self, attrs: Attrs) -> ModelResult<Mark> {
        let attrs = compute_attrs(&self.0.name, &self.0.attrs, &attrs)?;
        Ok(Mark::new(self.clone(), attrs))
    }

    /// The first mark of this type in `set`.
    pub fn is_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|mark| mark.mark_type() == self)
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter()
            .filter(|mark| mark.mark_type() != self)
            .cloned()
            .collect()
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.id == other.0.id && self.0.name == other.0.name)
    }
}

impl Eq for MarkType {}

impl Hash for MarkType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
        self.0.name.hash(state);
    }
}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic() -> SchemaRegistry {
        SchemaRegistry::new()
            .register_node("doc", NodeSpec::new().content("block+"))
            .register_node("paragraph", NodeSpec::new().content("inline*").group("block"))
            .register_node(
                "heading",
                NodeSpec::new()
                    .content("inline*")
                    .group("block")
                    .attr("level", AttrSpec::default_value(1)),
            )
            .register_node("text", NodeSpec::new().group("inline"))
            .register_mark("strong", MarkSpec::new())
            .register_mark("code", MarkSpec::new().excludes("_"))
    }

    #[test]
    fn compiles_groups_and_flags() {
        let schema = basic().compile().expect("compile");
        let paragraph = schema.node_type("paragraph").expect("paragraph");
        assert!(paragraph.is_textblock());
        assert!(paragraph.in_group("block"));
        assert!(schema.text_type().is_inline());
        assert!(schema.node_type("doc").expect("doc").is_block());
        assert!(schema.node_type("missing").is_none());
    }

    #[test]
    fn reports_every_invalid_declaration() {
        let err = basic()
            .register_node("quote", NodeSpec::new().content("paragraph widget+").group("block"))
            .register_node("mixed", NodeSpec::new().content("paragraph text*"))
            .register_node("paragraph", NodeSpec::new())
            .compile()
            .expect_err("invalid schema");
        let messages: Vec<String> = err.errors().iter().map(ToString::to_string).collect();
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert!(messages[0].contains("registered more than once"));
        assert!(messages.iter().any(|m| m.contains("unknown node type or group `widget`")));
        assert!(messages.iter().any(|m| m.contains("mixes inline and block")));
    }

    #[test]
    fn requires_top_and_text_nodes() {
        let err = SchemaRegistry::new()
            .register_node("paragraph", NodeSpec::new())
            .compile()
            .expect_err("missing nodes");
        assert_eq!(err.errors().len(), 2);
    }

    #[test]
    fn fills_required_children() {
        let schema = basic().compile().expect("compile");
        let doc = schema
            .fill(schema.top_node_type(), Attrs::new(), Fragment::empty())
            .expect("fill");
        assert_eq!(doc.child_count(), 1);
        assert_eq!(doc.child(0).map(|c| c.node_type().name()), Some("paragraph"));
    }

    #[test]
    fn computes_attribute_defaults() {
        let schema = basic().compile().expect("compile");
        let heading = schema.node_type("heading").expect("heading");
        let attrs = heading.compute_attrs(&crate::attrs! { "extra" => 1 }).expect("attrs");
        assert_eq!(attrs, crate::attrs! { "level" => 1 });
    }

    #[test]
    fn mark_exclusion_follows_spec() {
        let schema = basic().compile().expect("compile");
        let strong = schema.mark_type("strong").expect("strong");
        let code = schema.mark_type("code").expect("code");
        assert!(strong.excludes(strong));
        assert!(!strong.excludes(code));
        assert!(code.excludes(strong));
    }
}
