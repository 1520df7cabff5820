use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("invalid handle: {0:?}")]
    InvalidHandle(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
