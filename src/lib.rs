//! Hierarchical record trees.
//!
//! Builds an owned tree from flat `{id, parent_id, ...}` rows or from a
//! nested `{..., children: [...]}` object, and extracts either form again.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use domain::{FlatRecord, NestedRecord, Node, NodeKey, Payload, Tree, TreeError, TreeResult};
