//! Tree service
//!
//! Reads record collections, builds trees and renders them for output.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::filter::{hide_flat, hide_nested, RecordFilter};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::record::CHILDREN_FIELD;
use crate::domain::{FlatRecord, NestedRecord, NodeKey, Tree};
use crate::infrastructure::traits::FileSystem;

/// Path that selects standard input instead of a file.
pub const STDIN_PATH: &str = "-";

/// Shape information about a built tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSummary<K> {
    /// Number of nodes, root included
    pub nodes: usize,
    /// Levels from root to deepest leaf, root counts as 1
    pub depth: usize,
    /// Leaf ids in pre-order
    pub leaves: Vec<K>,
}

/// Service for building and rendering record trees.
pub struct TreeService {
    fs: Arc<dyn FileSystem>,
    settings: Settings,
}

impl TreeService {
    /// Create a new tree service.
    pub fn new(fs: Arc<dyn FileSystem>, settings: Settings) -> Self {
        Self { fs, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build a tree from a JSON array of flat records in `path`.
    pub fn load_flat<K>(&self, path: &Path) -> ApplicationResult<Tree<K>>
    where
        K: NodeKey + DeserializeOwned,
    {
        let text = self.read_source(path)?;
        self.parse_flat(&path.display().to_string(), &text)
    }

    /// Build a tree from a JSON array of flat records.
    ///
    /// Soft-deleted records are dropped first according to the filter settings
    /// and the built tree must fit within `max_depth`.
    #[instrument(level = "debug", skip(self, text))]
    pub fn parse_flat<K>(&self, source_name: &str, text: &str) -> ApplicationResult<Tree<K>>
    where
        K: NodeKey + DeserializeOwned,
    {
        let records: Vec<FlatRecord<K>> =
            serde_json::from_str(text).map_err(|source| ApplicationError::Parse {
                source_name: source_name.to_string(),
                source,
            })?;
        debug!("parse_flat: {} records", records.len());
        let records = RecordFilter::from_config(&self.settings.filter).apply(records);
        let tree = Tree::generate_by_list(records)?;
        self.check_depth(tree.depth())?;
        Ok(tree)
    }

    /// Build a tree from a nested JSON object in `path`.
    pub fn load_nested<K>(&self, path: &Path) -> ApplicationResult<Tree<K>>
    where
        K: NodeKey + DeserializeOwned,
    {
        let text = self.read_source(path)?;
        self.parse_nested(&path.display().to_string(), &text)
    }

    /// Build a tree from a nested JSON object, enforcing `max_depth`.
    #[instrument(level = "debug", skip(self, text))]
    pub fn parse_nested<K>(&self, source_name: &str, text: &str) -> ApplicationResult<Tree<K>>
    where
        K: NodeKey + DeserializeOwned,
    {
        let parse_err = |source| ApplicationError::Parse {
            source_name: source_name.to_string(),
            source,
        };
        let value: Value = serde_json::from_str(text).map_err(parse_err)?;

        self.check_depth(nested_depth(&value))?;

        let nested: NestedRecord<K> = serde_json::from_value(value).map_err(parse_err)?;
        Ok(Tree::generate_by_dir(nested)?)
    }

    /// Nested presentation form as JSON.
    pub fn render_nested<K: NodeKey>(&self, tree: &Tree<K>) -> ApplicationResult<String> {
        let mut value = tree.serialize();
        hide_nested(&mut value, &self.settings.hide);
        self.to_json(&value)
    }

    /// Flat pre-order records as JSON.
    pub fn render_flat<K>(&self, tree: &Tree<K>) -> ApplicationResult<String>
    where
        K: NodeKey + Serialize,
    {
        let mut records = tree.deserialize();
        hide_flat(&mut records, &self.settings.hide);
        self.to_json(&records)
    }

    pub fn summary<K: NodeKey>(&self, tree: &Tree<K>) -> TreeSummary<K> {
        TreeSummary {
            nodes: tree.len(),
            depth: tree.depth(),
            leaves: tree.leaf_ids(),
        }
    }

    fn check_depth(&self, depth: usize) -> ApplicationResult<()> {
        match self.settings.max_depth {
            Some(limit) if depth > limit => Err(ApplicationError::DepthExceeded { limit, depth }),
            _ => Ok(()),
        }
    }

    fn read_source(&self, path: &Path) -> ApplicationResult<String> {
        if path == Path::new(STDIN_PATH) {
            debug!("read_source: stdin");
            return self
                .fs
                .read_stdin()
                .with_path_context("read records", path);
        }
        self.fs
            .read_to_string(path)
            .with_path_context("read records", path)
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> ApplicationResult<String> {
        let rendered = if self.settings.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.map_err(ApplicationError::Render)
    }
}

/// Levels of nesting along `children` arrays; a lone object has depth 1.
fn nested_depth(value: &Value) -> usize {
    let mut max_depth = 0;
    let mut stack = vec![(value, 1)];
    while let Some((current, depth)) = stack.pop() {
        max_depth = max_depth.max(depth);
        if let Some(Value::Array(children)) = current.get(CHILDREN_FIELD) {
            for child in children {
                stack.push((child, depth + 1));
            }
        }
    }
    max_depth
}
