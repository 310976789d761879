use termtree::Tree as TermTree;
use tracing::instrument;

use crate::domain::node::Node;
use crate::domain::record::{key_label, value_label, NodeKey, TITLE_FIELD};
use crate::domain::tree::Tree;

/// Conversion into a printable `termtree` rendering.
pub trait TreeNodeConvert {
    fn to_tree_string(&self) -> TermTree<String>;
}

impl<K: NodeKey> TreeNodeConvert for Node<K> {
    fn to_tree_string(&self) -> TermTree<String> {
        let leaves: Vec<_> = self.children().iter().map(|c| c.to_tree_string()).collect();
        TermTree::new(node_label(self)).with_leaves(leaves)
    }
}

impl<K: NodeKey> TreeNodeConvert for Tree<K> {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> TermTree<String> {
        self.root().to_tree_string()
    }
}

/// `title (id)` when the node has a title, otherwise just the id.
fn node_label<K: NodeKey>(node: &Node<K>) -> String {
    let id = key_label(node.id());
    match node.payload().get(TITLE_FIELD) {
        Some(title) if !title.is_null() => format!("{} ({})", value_label(title), id),
        _ => id,
    }
}
