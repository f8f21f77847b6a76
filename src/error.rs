//! Error types for schema conversion

use thiserror::Error;

use crate::schema::NodeId;

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Conversion errors
///
/// Every variant is fatal to the call that raised it: no partial document is
/// returned.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The node's `type` tag is not one this converter knows. Usually a version
    /// mismatch with the library that produced the node graph.
    #[error("Not implemented: unsupported node kind `{kind}`")]
    UnsupportedKind { kind: String },

    #[error("dict node {id} is unsafe: pattern-keyed objects cannot be expressed soundly; set allow_unsafe=true to accept it, or use an object node instead")]
    UnsafeConstructRejected { id: NodeId },

    #[error("Malformed node: {0}")]
    MalformedNode(String),

    #[error("Duplicate node id {0}: two different nodes share one identifier")]
    DuplicateId(NodeId),

    #[error("Unresolved reference: node {0} is referenced but never defined")]
    UnresolvedReference(NodeId),

    #[error("Invalid JSON Schema document: {0}")]
    InvalidDocument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ConvertError::MalformedNode(message.into())
    }

    /// Whether this error is the `allow_unsafe` policy gate rather than a
    /// structural problem with the input.
    pub fn is_policy(&self) -> bool {
        matches!(self, ConvertError::UnsafeConstructRejected { .. })
    }
}
