//! Conversion between flat parent-referencing records, owned node trees and
//! nested structures.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, instrument, trace};

use crate::domain::error::{TreeError, TreeResult};
use crate::domain::node::Node;
use crate::domain::record::{
    key_label, FlatRecord, NestedRecord, NodeKey, CHILDREN_FIELD, ICON_FIELD, META_FIELD,
    TITLE_FIELD,
};

/// A tree owning a single root node.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<K> {
    root: Node<K>,
}

impl<K: NodeKey> Default for Tree<K> {
    fn default() -> Self {
        Self::new(Node::origin())
    }
}

impl<K: NodeKey> Tree<K> {
    pub fn new(root: Node<K>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node<K> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Node<K> {
        &mut self.root
    }

    /// Builds a tree from flat records in two linear passes.
    ///
    /// The record with `id == parent_id == K::default()` becomes the root and
    /// every other record is attached under its parent, keeping input order
    /// among siblings. Empty input yields a bare origin root.
    #[instrument(level = "debug", skip_all)]
    pub fn generate_by_list<I>(records: I) -> TreeResult<Self>
    where
        I: IntoIterator<Item = FlatRecord<K>>,
    {
        // Pass 1: id -> slot index
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut slots: Vec<Option<Node<K>>> = Vec::new();
        for record in records {
            let FlatRecord {
                id,
                parent_id,
                payload,
            } = record;
            if index.contains_key(&id) {
                return Err(TreeError::DuplicateId(key_label(&id)));
            }
            index.insert(id.clone(), slots.len());
            slots.push(Some(Node::new(id, Some(parent_id), payload)));
        }

        if slots.is_empty() {
            debug!("generate_by_list: empty input, using origin root");
            return Ok(Self::default());
        }

        let sentinel = K::default();
        let root_idx = *index
            .get(&sentinel)
            .ok_or_else(|| TreeError::MissingRoot(key_label(&sentinel)))?;

        // Pass 2: link every non-root record to its parent slot
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];
        for (idx, node) in slots.iter().enumerate() {
            let Some(node) = node else { continue };
            let parent_id = node.parent_id().cloned().unwrap_or_default();
            if idx == root_idx {
                if parent_id != sentinel {
                    return Err(TreeError::InvalidRoot(key_label(&parent_id)));
                }
                continue;
            }
            let parent_idx = index
                .get(&parent_id)
                .ok_or_else(|| TreeError::MissingParent {
                    id: key_label(node.id()),
                    parent_id: key_label(&parent_id),
                })?;
            children[*parent_idx].push(idx);
        }

        let attached = assemble(&mut slots, &children, root_idx)?;
        let root = slots[root_idx]
            .take()
            .ok_or_else(|| TreeError::Internal("root slot empty after assembly".into()))?;

        if attached < slots.len() {
            // Whatever is left never hung off the root: a detached parent cycle.
            if let Some(orphan) = slots.iter().flatten().next() {
                return Err(TreeError::CycleDetected(key_label(orphan.id())));
            }
        }

        debug!("generate_by_list: linked {} nodes", attached);
        Ok(Self::new(root))
    }

    /// Builds a tree from a nested structure, keeping declaration order.
    #[instrument(level = "debug", skip_all)]
    pub fn generate_by_dir(nested: NestedRecord<K>) -> TreeResult<Self> {
        let mut seen = HashSet::new();
        let root = create_node(nested, &mut seen)?;
        debug!("generate_by_dir: created {} nodes", seen.len());
        Ok(Self::new(root))
    }

    /// Nested form for presentation: `icon` and `title` are regrouped under
    /// `meta` (as `null` when absent) and children are nested under
    /// `children`.
    #[instrument(level = "debug", skip(self))]
    pub fn serialize(&self) -> Value {
        serialize_node(&self.root)
    }

    /// Flat pre-order form for persistence.
    ///
    /// The root keeps its own parent_id unless that is missing or the
    /// sentinel, in which case it becomes the sentinel. Every other record
    /// gets its enclosing node's id.
    #[instrument(level = "debug", skip(self))]
    pub fn deserialize(&self) -> Vec<FlatRecord<K>> {
        let root_parent = self
            .root
            .parent_id()
            .filter(|p| !p.is_root_sentinel())
            .cloned()
            .unwrap_or_default();

        let mut records = Vec::new();
        let mut stack = vec![(&self.root, root_parent)];
        while let Some((node, parent_id)) = stack.pop() {
            records.push(FlatRecord {
                id: node.id().clone(),
                parent_id,
                payload: node.payload().clone(),
            });
            // Reverse push for left-to-right sibling order
            for child in node.children().iter().rev() {
                stack.push((child, node.id().clone()));
            }
        }
        records
    }

    /// Pre-order iterator over all nodes.
    pub fn iter(&self) -> TreeIterator<'_, K> {
        TreeIterator {
            stack: vec![&self.root],
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// A tree always has a root, so it is empty only in the sense of having
    /// no children below it.
    pub fn is_empty(&self) -> bool {
        self.root.is_leaf()
    }

    pub fn depth(&self) -> usize {
        calculate_depth(&self.root)
    }

    pub fn find(&self, id: &K) -> Option<&Node<K>> {
        self.iter().find(|node| node.id() == id)
    }

    pub fn leaf_ids(&self) -> Vec<K> {
        self.iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.id().clone())
            .collect()
    }
}

/// Post-order move of every slot reachable from `root_idx` into its parent.
/// Returns the number of nodes linked into the root's subtree.
fn assemble<K: NodeKey>(
    slots: &mut [Option<Node<K>>],
    children: &[Vec<usize>],
    root_idx: usize,
) -> TreeResult<usize> {
    let mut attached = 0;
    let mut stack = vec![(root_idx, false)];
    while let Some((idx, visited)) = stack.pop() {
        if !visited {
            stack.push((idx, true));
            for &child in children[idx].iter().rev() {
                stack.push((child, false));
            }
            continue;
        }
        let mut node = slots[idx]
            .take()
            .ok_or_else(|| TreeError::Internal(format!("slot {idx} visited twice")))?;
        for &child in &children[idx] {
            let child_node = slots[child]
                .take()
                .ok_or_else(|| TreeError::Internal(format!("child slot {child} missing")))?;
            node.add_sub_node(child_node);
        }
        trace!("assemble: {:?} with {} children", node.id(), node.children().len());
        slots[idx] = Some(node);
        attached += 1;
    }
    Ok(attached)
}

/// Converts a nested record into nodes, depth first, keeping declaration
/// order. Each frame holds a node under construction and its unvisited
/// children in reverse.
fn create_node<K: NodeKey>(nested: NestedRecord<K>, seen: &mut HashSet<K>) -> TreeResult<Node<K>> {
    let mut frames = vec![open_frame(nested, seen)?];
    while let Some((_, remaining)) = frames.last_mut() {
        if let Some(next) = remaining.pop() {
            let frame = open_frame(next, seen)?;
            frames.push(frame);
            continue;
        }
        let Some((node, _)) = frames.pop() else { break };
        match frames.last_mut() {
            Some((parent, _)) => parent.add_sub_node(node),
            None => return Ok(node),
        }
    }
    Err(TreeError::Internal("nested construction ended without a root".into()))
}

fn open_frame<K: NodeKey>(
    nested: NestedRecord<K>,
    seen: &mut HashSet<K>,
) -> TreeResult<(Node<K>, Vec<NestedRecord<K>>)> {
    let NestedRecord {
        id,
        parent_id,
        mut children,
        payload,
    } = nested;
    if !seen.insert(id.clone()) {
        return Err(TreeError::DuplicateId(key_label(&id)));
    }
    children.reverse();
    Ok((Node::new(id, parent_id, payload), children))
}

/// Post-order walk; every finished subtree leaves exactly one value on
/// `done`, so a node's children are the last `children().len()` entries.
fn serialize_node<K: NodeKey>(root: &Node<K>) -> Value {
    let mut done: Vec<Value> = Vec::new();
    let mut stack = vec![(root, false)];
    while let Some((node, expanded)) = stack.pop() {
        if !expanded {
            stack.push((node, true));
            for child in node.children().iter().rev() {
                stack.push((child, false));
            }
            continue;
        }
        let children = done.split_off(done.len() - node.children().len());
        done.push(node_value(node, children));
    }
    done.pop().unwrap_or(Value::Null)
}

fn node_value<K: NodeKey>(node: &Node<K>, children: Vec<Value>) -> Value {
    let mut result = Map::new();
    let mut meta = Map::new();
    meta.insert(ICON_FIELD.to_string(), Value::Null);
    meta.insert(TITLE_FIELD.to_string(), Value::Null);

    for (name, value) in node.fields() {
        match name.as_str() {
            ICON_FIELD | TITLE_FIELD => {
                meta.insert(name, value);
            }
            _ => {
                result.insert(name, value);
            }
        }
    }

    result.insert(META_FIELD.to_string(), Value::Object(meta));
    result.insert(CHILDREN_FIELD.to_string(), Value::Array(children));
    Value::Object(result)
}

fn calculate_depth<K: NodeKey>(root: &Node<K>) -> usize {
    let mut max_depth = 0;
    let mut stack = vec![(root, 1)];
    while let Some((node, depth)) = stack.pop() {
        max_depth = max_depth.max(depth);
        for child in node.children() {
            stack.push((child, depth + 1));
        }
    }
    max_depth
}

pub struct TreeIterator<'a, K> {
    stack: Vec<&'a Node<K>>,
}

impl<'a, K: NodeKey> Iterator for TreeIterator<'a, K> {
    type Item = &'a Node<K>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children().iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64, parent_id: i64, title: &str) -> FlatRecord<i64> {
        FlatRecord::new(id, parent_id).with_field("title", title)
    }

    #[test]
    fn given_children_listed_before_parent_when_building_then_links_all() {
        let tree = Tree::generate_by_list(vec![
            row(2, 1, "B"),
            row(0, 0, "root"),
            row(1, 0, "A"),
        ])
        .unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.depth(), 3);
        let b = tree.find(&2).expect("node 2");
        assert_eq!(b.payload()["title"], json!("B"));
    }

    #[test]
    fn given_two_node_cycle_when_building_then_reports_cycle() {
        let err = Tree::generate_by_list(vec![row(0, 0, "root"), row(1, 2, "A"), row(2, 1, "B")])
            .unwrap_err();

        assert_eq!(err, TreeError::CycleDetected("1".into()));
    }

    #[test]
    fn given_self_parented_record_when_building_then_reports_cycle() {
        let err = Tree::generate_by_list(vec![row(0, 0, "root"), row(5, 5, "loop")]).unwrap_err();

        assert_eq!(err, TreeError::CycleDetected("5".into()));
    }

    #[test]
    fn given_root_with_foreign_parent_when_building_then_rejects_root() {
        let err = Tree::generate_by_list(vec![row(0, 1, "root"), row(1, 0, "A")]).unwrap_err();

        assert_eq!(err, TreeError::InvalidRoot("1".into()));
    }

    #[test]
    fn given_tree_when_iterating_then_visits_in_pre_order() {
        let tree = Tree::generate_by_list(vec![
            row(0, 0, "root"),
            row(1, 0, "A"),
            row(2, 0, "B"),
            row(3, 1, "A1"),
        ])
        .unwrap();

        let ids: Vec<i64> = tree.iter().map(|n| *n.id()).collect();
        assert_eq!(ids, vec![0, 1, 3, 2]);
        assert_eq!(tree.leaf_ids(), vec![3, 2]);
    }

    /// Strips `children` arrays level by level so the caller's drop of the
    /// returned value stays shallow.
    fn dismantle(value: Value) -> usize {
        let mut levels = 0;
        let mut stack = vec![value];
        while let Some(mut current) = stack.pop() {
            levels += 1;
            if let Some(Value::Array(children)) = current.get_mut(CHILDREN_FIELD) {
                stack.append(children);
            }
        }
        levels
    }

    fn chain(len: i64) -> Vec<FlatRecord<i64>> {
        let mut records = vec![row(0, 0, "root")];
        for id in 1..len {
            records.push(row(id, id - 1, "n"));
        }
        records
    }

    #[test]
    fn given_long_chain_when_building_then_links_every_node() {
        let tree = Tree::generate_by_list(chain(1_000)).unwrap();

        assert_eq!(tree.deserialize().len(), 1_000);
    }

    #[test]
    fn given_deep_chain_when_inspecting_serializing_and_dropping_then_stays_iterative() {
        let tree = Tree::generate_by_list(chain(100_000)).unwrap();

        assert_eq!(tree.depth(), 100_000);
        assert_eq!(tree.len(), 100_000);
        assert_eq!(tree.leaf_ids(), vec![99_999]);
        assert_eq!(dismantle(tree.serialize()), 100_000);

        drop(tree);
    }

    #[test]
    fn given_deep_nested_record_when_building_then_stays_iterative() {
        let mut nested = NestedRecord::new(50_000i64);
        for id in (0..50_000).rev() {
            nested = NestedRecord::new(id).with_child(nested);
        }

        let tree = Tree::generate_by_dir(nested).unwrap();

        assert_eq!(tree.depth(), 50_001);
    }

    #[test]
    fn given_siblings_when_serializing_then_children_keep_order() {
        let tree = Tree::generate_by_list(vec![
            row(0, 0, "root"),
            row(1, 0, "A"),
            row(2, 1, "A1"),
            row(3, 0, "B"),
        ])
        .unwrap();

        let value = tree.serialize();

        assert_eq!(value["children"][0]["id"], json!(1));
        assert_eq!(value["children"][0]["children"][0]["id"], json!(2));
        assert_eq!(value["children"][1]["id"], json!(3));
        assert_eq!(value["children"][1]["children"], json!([]));
    }
}
