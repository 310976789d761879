//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::TreeError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("invalid records in {source_name}: {source}")]
    Parse {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("nesting depth {depth} exceeds limit of {limit}")]
    DepthExceeded { limit: usize, depth: usize },

    #[error("render output: {0}")]
    Render(#[source] serde_json::Error),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
