//! Document Assembly
//!
//! Flattens a root node, emits its fragment as the document root and every
//! other collected node into `definitions`, keyed by the stringified id.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::emit::{emit_fragment, EmitOptions, Fragment};
use crate::error::{ConvertError, Result};
use crate::graph::{flatten, FlatGraph};
use crate::schema::{NodeId, SchemaNode};

/// An emitted JSON Schema document: root fragment plus `definitions`
///
/// Serializes as one object, `{ ...root, "definitions": { ... } }`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Fragment,
    pub definitions: BTreeMap<String, Value>,
}

impl Document {
    pub fn to_value(&self) -> Value {
        let mut object = self.root.clone();
        object.insert(
            "definitions".to_string(),
            Value::Object(self.definitions.clone().into_iter().collect()),
        );
        Value::Object(object)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn definition(&self, id: NodeId) -> Option<&Value> {
        self.definitions.get(&id.to_string())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.root.len() + 1))?;
        for (key, value) in &self.root {
            if key != "definitions" {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry("definitions", &self.definitions)?;
        map.end()
    }
}

/// Converts schema node graphs into JSON Schema documents
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter {
    options: EmitOptions,
}

impl Converter {
    pub fn new(options: EmitOptions) -> Self {
        Self { options }
    }

    /// Flatten `root` (without touching it) and emit the document
    pub fn convert(&self, root: &SchemaNode) -> Result<Document> {
        let graph = flatten(root)?;
        self.convert_graph(&graph)
    }

    /// Emit the document for an already flattened graph
    #[instrument(skip_all, fields(root = graph.root_id(), nodes = graph.len()))]
    pub fn convert_graph(&self, graph: &FlatGraph) -> Result<Document> {
        if let Some(&missing) = graph.unresolved_refs().first() {
            return Err(ConvertError::UnresolvedReference(missing));
        }

        let root_id = graph.root_id();
        let mut root = emit_fragment(graph.root(), &self.options)?;

        // Strict validators ignore a root-level default; keep it only where it
        // can apply, i.e. on the root's own definition if something refers back
        let root_default = root.remove("default");

        let mut definitions = BTreeMap::new();
        for (id, node) in graph.iter() {
            if id == root_id {
                continue;
            }
            let fragment = emit_fragment(node, &self.options)?;
            definitions.insert(id.to_string(), Value::Object(fragment));
        }

        if graph.root_is_referenced() {
            let mut fragment = root.clone();
            if let Some(default) = root_default {
                fragment.insert("default".to_string(), default);
            }
            definitions.insert(root_id.to_string(), Value::Object(fragment));
        }

        debug!(definitions = definitions.len(), "emitted JSON Schema document");
        Ok(Document { root, definitions })
    }
}
