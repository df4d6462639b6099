//! Error types for DOM operations
//!
//! Simple, flat error hierarchy. Malformed markup is never an error here:
//! the parser recovers. These variants cover internal faults and the depth
//! guard only.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DomError>;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("Node not found: {0}")]
    NodeNotFound(u32),

    #[error("Void element <{0}> cannot have children")]
    VoidElementChild(String),

    #[error("Duplicate attribute `{attribute}` on <{tag}>")]
    DuplicateAttribute { tag: String, attribute: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Maximum nesting depth exceeded: {current} > {max}")]
    MaxDepthExceeded { current: usize, max: usize },
}
