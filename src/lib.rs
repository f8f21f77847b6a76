//! Schema Graph → JSON Schema
//!
//! Converts a graph-shaped schema description (nodes with a kind tag,
//! constraints, metadata and references to other nodes) into a flat draft-07
//! JSON Schema document with a `definitions` table.
//!
//! ## Pipeline
//!
//! ```text
//! SchemaNode ──flatten──▶ FlatGraph ──emit──▶ Document
//!  (may share or      (id → node, every     { ...root,
//!   revisit nodes)     slot an id)            definitions: { "<id>": ... } }
//! ```
//!
//! - **Flattening** collects every reachable node once and rewrites embedded
//!   children to identifier references, so shared and recursive sub-graphs
//!   serialize without duplication.
//! - **Emission** maps each node's kind to the closest JSON Schema construct,
//!   widens non-required nodes with `null`, and refuses `dict` nodes unless
//!   unsafe constructs are allowed.
//!
//! ```
//! use schema_flatten::{convert, SchemaNode};
//!
//! let user = SchemaNode::object([("name", SchemaNode::string().required())]).required();
//! let document = convert(&user, false).unwrap();
//! assert_eq!(document.root["type"], "object");
//! assert_eq!(document.definitions.len(), 1);
//! ```

pub mod config;
pub mod document;
pub mod emit;
pub mod error;
pub mod graph;
pub mod schema;
pub mod validate;

pub use config::{ConverterConfig, OutputFormat};
pub use document::{Converter, Document};
pub use emit::{emit_fragment, EmitOptions, Fragment};
pub use error::{ConvertError, Result};
pub use graph::{flatten, flatten_in_place, Edge, FlatGraph};
pub use schema::{Child, Description, NodeId, NodeKind, NodeMeta, SchemaNode, Slot};
pub use validate::DocumentValidator;

/// Convert a schema node graph into a JSON Schema document.
///
/// `allow_unsafe` is the only knob: when false, any `dict` node in the graph
/// fails the conversion with [`ConvertError::UnsafeConstructRejected`].
pub fn convert(root: &SchemaNode, allow_unsafe: bool) -> Result<Document> {
    Converter::new(EmitOptions::default().allow_unsafe(allow_unsafe)).convert(root)
}
