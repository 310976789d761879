//! Domain layer: tree model and conversions
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod display;
pub mod error;
pub mod node;
pub mod record;
pub mod tree;

pub use display::TreeNodeConvert;
pub use error::{TreeError, TreeResult};
pub use node::Node;
pub use record::{FlatRecord, NestedRecord, NodeKey, Payload};
pub use tree::{Tree, TreeIterator};
