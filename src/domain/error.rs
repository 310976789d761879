//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Tree construction failures. Any of these aborts the whole build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("record {id} references missing parent {parent_id}")]
    MissingParent { id: String, parent_id: String },

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("no root record with id {0} in non-empty input")]
    MissingRoot(String),

    #[error("root record must reference itself, found parent_id {0}")]
    InvalidRoot(String),

    #[error("cycle detected in hierarchy: {0} is unreachable from the root")]
    CycleDetected(String),

    #[error("internal tree operation failed: {0}")]
    Internal(String),
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
