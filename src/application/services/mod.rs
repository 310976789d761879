//! Application services

pub mod tree;

pub use tree::{TreeService, TreeSummary, STDIN_PATH};
