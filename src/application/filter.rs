//! Record filtering before construction and field hiding after extraction.

use serde_json::Value;
use tracing::debug;

use crate::config::FilterConfig;
use crate::domain::record::{
    FlatRecord, Payload, CHILDREN_FIELD, ID_FIELD, META_FIELD, PARENT_ID_FIELD,
};

/// Drops soft-deleted rows: a record whose status field is present and
/// differs from the active value is removed unless deleted rows are included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    status_field: String,
    active_value: i64,
    include_deleted: bool,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

impl RecordFilter {
    pub fn new(status_field: impl Into<String>, active_value: i64) -> Self {
        Self {
            status_field: status_field.into(),
            active_value,
            include_deleted: false,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            status_field: config.status_field.clone(),
            active_value: config.active_value,
            include_deleted: config.include_deleted,
        }
    }

    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }

    pub fn is_active(&self, payload: &Payload) -> bool {
        if self.include_deleted {
            return true;
        }
        match payload.get(&self.status_field) {
            None | Some(Value::Null) => true,
            Some(status) => status.as_i64() == Some(self.active_value),
        }
    }

    pub fn apply<K>(&self, records: Vec<FlatRecord<K>>) -> Vec<FlatRecord<K>> {
        let total = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|record| self.is_active(&record.payload))
            .collect();
        if kept.len() < total {
            debug!(
                "filter: dropped {} inactive record(s) by {}",
                total - kept.len(),
                self.status_field
            );
        }
        kept
    }
}

/// Removes hidden payload fields from a nested rendering, at every depth.
/// Structural keys (`id`, `parent_id`, `meta`, `children`) are never hidden.
pub fn hide_nested(value: &mut Value, hidden: &[String]) {
    if hidden.is_empty() {
        return;
    }
    let mut stack = vec![value];
    while let Some(current) = stack.pop() {
        let Value::Object(map) = current else { continue };
        map.retain(|name, _| is_structural(name) || !hidden.contains(name));
        if let Some(Value::Array(children)) = map.get_mut(CHILDREN_FIELD) {
            stack.extend(children.iter_mut());
        }
    }
}

/// Removes hidden payload fields from flat records.
pub fn hide_flat<K>(records: &mut [FlatRecord<K>], hidden: &[String]) {
    if hidden.is_empty() {
        return;
    }
    for record in records {
        record.payload.retain(|name, _| !hidden.contains(name));
    }
}

fn is_structural(name: &str) -> bool {
    matches!(
        name,
        ID_FIELD | PARENT_ID_FIELD | META_FIELD | CHILDREN_FIELD
    )
}
