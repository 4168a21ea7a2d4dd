use std::fmt;

use crate::attrs::{AttrValue, Attrs};
use crate::schema::MarkType;

/// A mark instance: a type plus attributes. Sets of marks are kept as
/// rank-ordered vectors with no two equal entries.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Mark {
    mark_type: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub(crate) fn new(mark_type: MarkType, attrs: Attrs) -> Self {
        Mark { mark_type, attrs }
    }

    pub fn mark_type(&self) -> &MarkType {
        &self.mark_type
    }

    pub fn name(&self) -> &str {
        self.mark_type.name()
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// Adds this mark to `set`, honouring exclusion and rank order.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut copy = Vec::with_capacity(set.len() + 1);
        let mut placed = false;
        for other in set {
            if self == other {
                return set.to_vec();
            }
            if self.mark_type.excludes(&other.mark_type) {
                continue;
            }
            if other.mark_type.excludes(&self.mark_type) {
                return set.to_vec();
            }
            if !placed && other.mark_type.rank() > self.mark_type.rank() {
                copy.push(self.clone());
                placed = true;
            }
            copy.push(other.clone());
        }
        if !placed {
            copy.push(self.clone());
        }
        copy
    }

    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|mark| *mark != self).cloned().collect()
    }

    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|mark| mark == self)
    }
}

/// Normalises an arbitrary list of marks into a valid mark set.
pub fn mark_set<I>(marks: I) -> Vec<Mark>
where
    I: IntoIterator<Item = Mark>,
{
    marks
        .into_iter()
        .fold(Vec::new(), |set, mark| mark.add_to_set(&set))
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mark_type.name())?;
        if !self.attrs.is_empty() {
            f.debug_map().entries(self.attrs.iter()).finish()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttrSpec, MarkSpec, NodeSpec, Schema, SchemaRegistry};

    fn schema() -> Schema {
        SchemaRegistry::new()
            .register_node("doc", NodeSpec::new().content("text*"))
            .register_node("text", NodeSpec::new())
            .register_mark("em", MarkSpec::new())
            .register_mark("strong", MarkSpec::new())
            .register_mark("link", MarkSpec::new().attr("href", AttrSpec::required()))
            .register_mark("code", MarkSpec::new().excludes("_"))
            .compile()
            .expect("schema")
    }

    #[test]
    fn keeps_rank_order() {
        let schema = schema();
        let em = schema.mark("em", Attrs::new()).expect("em");
        let strong = schema.mark("strong", Attrs::new()).expect("strong");
        let set = strong.add_to_set(&[]);
        let set = em.add_to_set(&set);
        assert_eq!(set, vec![em.clone(), strong.clone()]);
        assert_eq!(em.add_to_set(&set), set);
    }

    #[test]
    fn same_type_replaces_previous_attrs() {
        let schema = schema();
        let a = schema.mark("link", crate::attrs! { "href" => "a" }).expect("a");
        let b = schema.mark("link", crate::attrs! { "href" => "b" }).expect("b");
        assert_ne!(a, b);
        assert_eq!(b.add_to_set(&[a]), vec![b.clone()]);
    }

    #[test]
    fn exclusive_marks_block_and_replace() {
        let schema = schema();
        let em = schema.mark("em", Attrs::new()).expect("em");
        let code = schema.mark("code", Attrs::new()).expect("code");
        assert_eq!(code.add_to_set(&[em.clone()]), vec![code.clone()]);
        assert_eq!(em.add_to_set(&[code.clone()]), vec![code]);
    }

    #[test]
    fn required_mark_attrs_are_enforced() {
        let schema = schema();
        assert!(schema.mark("link", Attrs::new()).is_err());
    }
}
