use tracing::trace;

use crate::domain::record::{NodeKey, Payload, CHILDREN_FIELD, ID_FIELD, PARENT_ID_FIELD};

/// A single tree vertex.
///
/// Children are owned exclusively by their parent, so a node can never be
/// reachable from two places and the structure can never form a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<K> {
    id: K,
    /// `None` for nodes built from nested input, which carries no parent ids
    parent_id: Option<K>,
    children: Vec<Node<K>>,
    payload: Payload,
}

impl<K: NodeKey> Node<K> {
    pub fn new(id: K, parent_id: Option<K>, payload: Payload) -> Self {
        Self {
            id,
            parent_id,
            children: Vec::new(),
            payload,
        }
    }

    /// Self-rooted origin node: id and parent_id are both the root sentinel.
    pub fn origin() -> Self {
        Self::new(K::default(), Some(K::default()), Payload::new())
    }

    pub fn id(&self) -> &K {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&K> {
        self.parent_id.as_ref()
    }

    pub fn children(&self) -> &[Node<K>] {
        &self.children
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Appends `child` as the last direct child. Duplicates are not checked.
    pub fn add_sub_node(&mut self, child: Node<K>) {
        self.children.push(child);
    }

    /// Removes every direct child with the given id. Absent ids are a no-op.
    pub fn remove_sub_node(&mut self, child_id: &K) {
        let before = self.children.len();
        self.children.retain(|child| child.id != *child_id);
        trace!(
            "remove_sub_node: {:?} removed {} child(ren) of {:?}",
            child_id,
            before - self.children.len(),
            self.id
        );
    }

    /// Field name to value view of this node: `id`, `parent_id` (when
    /// present), then the payload. Children are not included.
    pub fn fields(&self) -> Payload {
        let mut fields = Payload::new();
        fields.insert(ID_FIELD.to_string(), self.id.clone().into());
        if let Some(parent_id) = &self.parent_id {
            fields.insert(PARENT_ID_FIELD.to_string(), parent_id.clone().into());
        }
        for (name, value) in &self.payload {
            if !is_structural(name) {
                fields.insert(name.clone(), value.clone());
            }
        }
        fields
    }
}

/// Tears subtrees down through an explicit stack so that dropping a deep
/// chain does not recurse once per level.
impl<K> Drop for Node<K> {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

fn is_structural(name: &str) -> bool {
    matches!(name, ID_FIELD | PARENT_ID_FIELD | CHILDREN_FIELD)
}
