use prose_model::{AttrValue, Attrs, Fragment, Mark, MarkType, Node, NodeType, Schema, Slice};

use crate::error::{StepError, StepResult};
use crate::map::{Mappable, Mapping};
use crate::step::Step;

/// Accumulates steps against a document, tracking every intermediate
/// document and the composed position mapping.
#[derive(Clone, Debug)]
pub struct Transform {
    schema: Schema,
    before: Node,
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
}

impl Transform {
    pub fn new(schema: Schema, doc: Node) -> Self {
        Transform {
            schema,
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Document the transform started from.
    pub fn before(&self) -> &Node {
        &self.before
    }

    /// Document after all steps so far.
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Document before each step.
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Applies a step. On failure the transform is left unchanged.
    pub fn step(&mut self, step: Step) -> StepResult<()> {
        let doc = step.apply(&self.doc)?;
        self.mapping.append_map(step.get_map());
        self.docs.push(std::mem::replace(&mut self.doc, doc));
        self.steps.push(step);
        Ok(())
    }

    pub fn replace(&mut self, from: usize, to: usize, slice: Slice) -> StepResult<()> {
        if from == to && slice.is_empty() {
            return Ok(());
        }
        self.step(Step::Replace { from, to, slice })
    }

    pub fn replace_with(&mut self, from: usize, to: usize, content: Fragment) -> StepResult<()> {
        self.replace(from, to, Slice::from_fragment(content))
    }

    pub fn insert(&mut self, pos: usize, content: Fragment) -> StepResult<()> {
        self.replace_with(pos, pos, content)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> StepResult<()> {
        self.replace(from, to, Slice::empty())
    }

    /// Replaces `from..to` with text carrying `marks`. Empty text deletes.
    pub fn replace_text(&mut self, from: usize, to: usize, text: &str, marks: Vec<Mark>) -> StepResult<()> {
        if text.is_empty() {
            return self.delete(from, to);
        }
        let node = self.schema.text(text, marks);
        self.replace_with(from, to, Fragment::from_node(node))
    }

    pub fn insert_text(&mut self, pos: usize, text: &str, marks: Vec<Mark>) -> StepResult<()> {
        self.replace_text(pos, pos, text, marks)
    }

    /// Adds `mark` to inline content in `from..to` that allows it, removing
    /// marks it excludes first.
    pub fn add_mark(&mut self, from: usize, to: usize, mark: &Mark) -> StepResult<()> {
        let mut removed: Vec<(usize, usize, Mark)> = Vec::new();
        let mut added: Vec<(usize, usize)> = Vec::new();
        self.doc.nodes_between(from, to, &mut |node: &Node, pos: usize, parent: &Node, _| {
            if !node.is_inline() {
                return true;
            }
            let marks = node.marks();
            if mark.is_in_set(marks) || !parent.node_type().allows_mark_type(mark.mark_type()) {
                return false;
            }
            let start = pos.max(from);
            let end = (pos + node.node_size()).min(to);
            let next = mark.add_to_set(marks);
            for old in marks.iter().filter(|old| !old.is_in_set(&next)) {
                match removed.last_mut() {
                    Some(last) if last.1 == start && &last.2 == old => last.1 = end,
                    _ => removed.push((start, end, old.clone())),
                }
            }
            match added.last_mut() {
                Some(last) if last.1 == start => last.1 = end,
                _ => added.push((start, end)),
            }
            false
        });
        for (from, to, mark) in removed {
            self.step(Step::RemoveMark { from, to, mark })?;
        }
        for (from, to) in added {
            self.step(Step::AddMark {
                from,
                to,
                mark: mark.clone(),
            })?;
        }
        Ok(())
    }

    /// Removes every mark of `mark_type` from `from..to`.
    pub fn remove_mark(&mut self, from: usize, to: usize, mark_type: &MarkType) -> StepResult<()> {
        struct Run {
            mark: Mark,
            from: usize,
            to: usize,
            step: usize,
        }
        let mut runs: Vec<Run> = Vec::new();
        let mut step = 0;
        self.doc.nodes_between(from, to, &mut |node: &Node, pos: usize, _: &Node, _| {
            if !node.is_inline() {
                return true;
            }
            step += 1;
            let end = (pos + node.node_size()).min(to);
            if let Some(found) = mark_type.is_in_set(node.marks()) {
                match runs
                    .iter_mut()
                    .find(|run| run.step + 1 == step && &run.mark == found)
                {
                    Some(run) => {
                        run.to = end;
                        run.step = step;
                    }
                    None => runs.push(Run {
                        mark: found.clone(),
                        from: pos.max(from),
                        to: end,
                        step,
                    }),
                }
            }
            false
        });
        for run in runs {
            self.step(Step::RemoveMark {
                from: run.from,
                to: run.to,
                mark: run.mark,
            })?;
        }
        Ok(())
    }

    /// Changes the type and/or attributes of the node at `pos`. Missing
    /// attributes take their defaults.
    pub fn set_node_markup(&mut self, pos: usize, node_type: Option<&NodeType>, attrs: Attrs) -> StepResult<()> {
        let node = self.node_at(pos)?;
        let node_type = node_type.unwrap_or(node.node_type()).clone();
        let attrs = node_type.compute_attrs(&attrs)?;
        self.step(Step::SetNodeMarkup {
            pos,
            node_type,
            attrs,
        })
    }

    /// Merges `attrs` over the current attributes of the node at `pos`.
    pub fn set_node_attrs(&mut self, pos: usize, attrs: Attrs) -> StepResult<()> {
        let node = self.node_at(pos)?;
        let mut merged = node.attrs().clone();
        merged.extend(attrs);
        self.set_node_markup(pos, None, merged)
    }

    pub fn set_node_attr(&mut self, pos: usize, name: &str, value: impl Into<AttrValue>) -> StepResult<()> {
        let mut attrs = Attrs::new();
        attrs.insert(name.to_string(), value.into());
        self.set_node_attrs(pos, attrs)
    }

    /// Turns every textblock in `from..to` into `node_type`, dropping content
    /// and marks the new type does not allow.
    pub fn set_block_type(&mut self, from: usize, to: usize, node_type: &NodeType, attrs: Attrs) -> StepResult<()> {
        if !node_type.is_textblock() {
            return Err(StepError::Invalid(format!(
                "`{}` is not a textblock",
                node_type.name()
            )));
        }
        let attrs = node_type.compute_attrs(&attrs)?;
        let mut targets = Vec::new();
        self.doc.nodes_between(from, to, &mut |node: &Node, pos: usize, _: &Node, _| {
            if node.is_textblock() {
                if !node.has_markup(node_type, &attrs, node.marks()) {
                    targets.push(pos);
                }
                return false;
            }
            true
        });
        let map_from = self.mapping.len();
        for pos in targets {
            let pos = self.mapping.slice(map_from).map(pos, 1);
            self.clear_incompatible(pos, node_type)?;
            self.step(Step::SetNodeMarkup {
                pos,
                node_type: node_type.clone(),
                attrs: attrs.clone(),
            })?;
        }
        Ok(())
    }

    /// Removes children and marks of the node at `pos` that `node_type`
    /// would not accept.
    pub fn clear_incompatible(&mut self, pos: usize, node_type: &NodeType) -> StepResult<()> {
        let node = self.node_at(pos)?;
        let mut matched = Some(node_type.content_match());
        let mut mark_steps = Vec::new();
        let mut deletions = Vec::new();
        let mut cur = pos + 1;
        for child in node.children() {
            let end = cur + child.node_size();
            let next = matched
                .as_ref()
                .and_then(|m| m.match_type(child.node_type().id()));
            match next {
                Some(next) => {
                    matched = Some(next);
                    for mark in child.marks() {
                        if !node_type.allows_mark_type(mark.mark_type()) {
                            mark_steps.push(Step::RemoveMark {
                                from: cur,
                                to: end,
                                mark: mark.clone(),
                            });
                        }
                    }
                }
                None => deletions.push((cur, end)),
            }
            cur = end;
        }
        for step in mark_steps {
            self.step(step)?;
        }
        for (from, to) in deletions.into_iter().rev() {
            self.delete(from, to)?;
        }
        Ok(())
    }

    /// Wraps the sibling blocks in `start..end` in `wrappers`, outermost first.
    pub fn wrap(&mut self, start: usize, end: usize, wrappers: &[(NodeType, Attrs)]) -> StepResult<()> {
        let mut content = Fragment::empty();
        for (node_type, attrs) in wrappers.iter().rev() {
            content = Fragment::from_node(node_type.create(attrs.clone(), content, Vec::new())?);
        }
        self.step(Step::ReplaceAround {
            from: start,
            to: end,
            gap_from: start,
            gap_to: end,
            slice: Slice::new(content, 0, 0),
            insert: wrappers.len(),
        })
    }

    fn node_at(&self, pos: usize) -> StepResult<Node> {
        match self.doc.node_at(pos) {
            Some(node) if !node.is_text() => Ok(node),
            _ => Err(StepError::NoNode(pos)),
        }
    }
}
