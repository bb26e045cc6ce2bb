use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedRecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("node execution failed: {0}")]
    Execution(String),

    #[error("dag execution failed: {0}")]
    Pipeline(String),

    #[error("gateway error: {0}")]
    Gateway(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, FeedRecError>;
