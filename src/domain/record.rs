//! Record shapes exchanged with the data layer (flat rows) and the
//! presentation layer (nested objects).

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque per-node attributes, in input key order.
pub type Payload = Map<String, Value>;

pub const ID_FIELD: &str = "id";
pub const PARENT_ID_FIELD: &str = "parent_id";
pub const CHILDREN_FIELD: &str = "children";
pub const META_FIELD: &str = "meta";
pub const ICON_FIELD: &str = "icon";
pub const TITLE_FIELD: &str = "title";

/// Identifier type of a tree node.
///
/// The `Default` value is the root sentinel (`0` for integers, `""` for strings).
pub trait NodeKey: Clone + Eq + Hash + Default + fmt::Debug + Into<Value> {
    fn is_root_sentinel(&self) -> bool {
        *self == Self::default()
    }
}

impl<T> NodeKey for T where T: Clone + Eq + Hash + Default + fmt::Debug + Into<Value> {}

/// Human-readable form of a key for error messages.
pub(crate) fn key_label<K: NodeKey>(key: &K) -> String {
    value_label(&key.clone().into())
}

pub(crate) fn value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One row of a parent-referencing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord<K> {
    pub id: K,
    pub parent_id: K,
    #[serde(flatten)]
    pub payload: Payload,
}

impl<K> FlatRecord<K> {
    pub fn new(id: K, parent_id: K) -> Self {
        Self {
            id,
            parent_id,
            payload: Payload::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }
}

/// One level of a nested structure. Parentage is implied by nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedRecord<K> {
    pub id: K,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<K>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NestedRecord<K>>,
    #[serde(flatten)]
    pub payload: Payload,
}

impl<K> NestedRecord<K> {
    pub fn new(id: K) -> Self {
        Self {
            id,
            parent_id: None,
            children: Vec::new(),
            payload: Payload::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: NestedRecord<K>) -> Self {
        self.children.push(child);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_flat_json_when_deserializing_then_extra_fields_become_payload() {
        let record: FlatRecord<i64> =
            serde_json::from_value(json!({"id": 3, "parent_id": 1, "title": "C", "sort": 2}))
                .unwrap();

        assert_eq!(record.id, 3);
        assert_eq!(record.parent_id, 1);
        let keys: Vec<&str> = record.payload.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "sort"]);
    }

    #[test]
    fn given_nested_json_without_parent_id_when_deserializing_then_parent_is_none() {
        let record: NestedRecord<String> = serde_json::from_value(json!({
            "id": "root",
            "title": "Root",
            "children": [{"id": "a", "title": "A"}]
        }))
        .unwrap();

        assert_eq!(record.parent_id, None);
        assert_eq!(record.children.len(), 1);
        assert_eq!(record.children[0].id, "a");
        assert!(!record.payload.contains_key(CHILDREN_FIELD));
    }

    #[test]
    fn given_default_keys_when_checking_sentinel_then_zero_and_empty_are_root() {
        assert!(0i64.is_root_sentinel());
        assert!(!7i64.is_root_sentinel());
        assert!(String::new().is_root_sentinel());
        assert_eq!(key_label(&"menu".to_string()), "menu");
        assert_eq!(key_label(&42u64), "42");
    }
}
