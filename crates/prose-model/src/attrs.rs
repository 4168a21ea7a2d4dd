use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attribute map attached to nodes and marks. Ordered so equality and debug
/// output are deterministic.
pub type Attrs = BTreeMap<String, AttrValue>;

/// Scalar attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl Default for AttrValue {
    fn default() -> Self {
        AttrValue::Null
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => f.write_str("null"),
            AttrValue::Bool(value) => write!(f, "{value}"),
            AttrValue::Int(value) => write!(f, "{value}"),
            AttrValue::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<u8> for AttrValue {
    fn from(value: u8) -> Self {
        AttrValue::Int(i64::from(value))
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        AttrValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttrValue::Null)
    }
}

/// Builds an [`Attrs`] map from `key => value` pairs.
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attrs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Attrs::new();
        $(map.insert(::std::string::String::from($key), $crate::AttrValue::from($value));)+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ordered_maps_from_literals() {
        let attrs = attrs! { "level" => 2, "id" => "intro", "tight" => true };
        let keys: Vec<&str> = attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "level", "tight"]);
        assert_eq!(attrs["level"].as_int(), Some(2));
        assert_eq!(attrs["id"].as_str(), Some("intro"));
    }

    #[test]
    fn options_map_to_null() {
        assert!(AttrValue::from(None::<String>).is_null());
        assert_eq!(AttrValue::from(Some("x")), AttrValue::Str("x".into()));
    }
}
