//! Type-Directed Emitter
//!
//! Maps one flattened [`SchemaNode`] to one JSON Schema fragment. Children are
//! always rendered as `{"$ref": "#/definitions/<id>"}`; the document assembler
//! is responsible for putting the referenced nodes into `definitions`.
//!
//! | kind      | fragment                                                      |
//! |-----------|---------------------------------------------------------------|
//! | string    | `type: string`, `pattern`                                     |
//! | number    | `type: number`, `maximum`, `minimum`, `multipleOf`            |
//! | boolean   | `type: boolean`                                               |
//! | any       | `{}`                                                          |
//! | never     | `type: boolean, const: 1`                                     |
//! | const     | `const`                                                       |
//! | object    | `type: object`, `properties`                                  |
//! | dict      | `type: object`, `patternProperties`, `additionalProperties`   |
//! | array     | `type: array`, `items`                                        |
//! | union     | `anyOf`                                                       |
//! | intersect | `allOf`                                                       |
//! | transform | `$ref` to the inner node                                      |
//!
//! Nodes that are not required are widened to `anyOf: [<base>, {type: null}]`.

use serde_json::{json, Map, Number, Value};

use crate::error::{ConvertError, Result};
use crate::schema::{Child, NodeId, NodeKind, SchemaNode};

/// A JSON Schema object
pub type Fragment = Map<String, Value>;

/// Pattern matching every property name of a dict node
pub const ANY_KEY_PATTERN: &str = "^.*$";

/// Options controlling fragment emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    /// Accept dict nodes, emitted with `patternProperties`
    pub allow_unsafe: bool,

    /// Also copy a node's description and deprecation onto the `$ref`
    /// wrappers of its properties, items and branches
    pub propagate_metadata: bool,
}

impl EmitOptions {
    pub fn allow_unsafe(mut self, allow: bool) -> Self {
        self.allow_unsafe = allow;
        self
    }

    pub fn propagate_metadata(mut self, propagate: bool) -> Self {
        self.propagate_metadata = propagate;
        self
    }
}

/// JSON pointer of a node inside the `definitions` table
pub fn definition_pointer(id: NodeId) -> String {
    format!("#/definitions/{}", id)
}

/// Emit the fragment for one node, optionality included
pub fn emit_fragment(node: &SchemaNode, options: &EmitOptions) -> Result<Fragment> {
    let mut base = base_fragment(node, options)?;
    if let Some(default) = &node.meta.default {
        base.insert("default".to_string(), default.clone());
    }

    if node.is_required() {
        return Ok(base);
    }

    // anyOf rather than oneOf: an `any` base also matches null
    let mut wrapper = Fragment::new();
    wrapper.insert(
        "anyOf".to_string(),
        Value::Array(vec![Value::Object(base), json!({ "type": "null" })]),
    );
    Ok(wrapper)
}

/// Description and deprecation marker of a node
fn overlay(node: &SchemaNode) -> Fragment {
    let mut fragment = Fragment::new();
    if let Some(description) = &node.meta.description {
        fragment.insert("description".to_string(), Value::String(description.render()));
    }
    if node.meta.is_deprecated() {
        fragment.insert("deprecated".to_string(), Value::Bool(true));
    }
    fragment
}

/// Fragment before default and optionality are applied
fn base_fragment(node: &SchemaNode, options: &EmitOptions) -> Result<Fragment> {
    let overlay = overlay(node);
    let branch_meta = options.propagate_metadata.then_some(&overlay);
    let mut fragment = overlay.clone();

    match &node.kind {
        NodeKind::String => {
            fragment.insert("type".to_string(), json!("string"));
            if let Some(pattern) = &node.meta.pattern {
                fragment.insert("pattern".to_string(), Value::String(pattern.source.clone()));
            }
        }
        NodeKind::Number => {
            fragment.insert("type".to_string(), json!("number"));
            if let Some(step) = node.meta.step {
                if step <= 0.0 {
                    return Err(ConvertError::malformed(format!(
                        "number node {} has non-positive step: {}",
                        node.uid, step
                    )));
                }
            }
            let bounds = [
                ("maximum", node.meta.max),
                ("minimum", node.meta.min),
                ("multipleOf", node.meta.step),
            ];
            for (keyword, bound) in bounds {
                if let Some(bound) = bound {
                    fragment.insert(keyword.to_string(), number(node, keyword, bound)?);
                }
            }
        }
        NodeKind::Boolean => {
            fragment.insert("type".to_string(), json!("boolean"));
        }
        NodeKind::Any => {}
        NodeKind::Never => {
            // The empty set: no boolean equals 1
            fragment.insert("type".to_string(), json!("boolean"));
            fragment.insert("const".to_string(), json!(1));
        }
        NodeKind::Const => {
            fragment.insert("const".to_string(), node.value.clone().unwrap_or(Value::Null));
        }
        NodeKind::Object => {
            let properties: Fragment = node
                .dict
                .iter()
                .flatten()
                .map(|(name, child)| (name.clone(), reference(child, branch_meta)))
                .collect();
            fragment.insert("type".to_string(), json!("object"));
            fragment.insert("properties".to_string(), Value::Object(properties));
        }
        NodeKind::Dict => {
            if !options.allow_unsafe {
                return Err(ConvertError::UnsafeConstructRejected { id: node.uid });
            }
            let inner = inner(node)?;
            let mut patterns = Fragment::new();
            patterns.insert(ANY_KEY_PATTERN.to_string(), reference(inner, branch_meta));
            fragment.insert("type".to_string(), json!("object"));
            fragment.insert("patternProperties".to_string(), Value::Object(patterns));
            fragment.insert("additionalProperties".to_string(), Value::Bool(false));
        }
        NodeKind::Array => {
            let inner = inner(node)?;
            fragment.insert("type".to_string(), json!("array"));
            fragment.insert("items".to_string(), reference(inner, branch_meta));
        }
        NodeKind::Union | NodeKind::Intersect => {
            let list = node.list.as_ref().ok_or_else(|| {
                ConvertError::malformed(format!("{} node {} has no list", node.kind, node.uid))
            })?;
            let keyword = if node.kind == NodeKind::Union { "anyOf" } else { "allOf" };
            if list.is_empty() {
                // Draft 7 forbids empty anyOf/allOf: an empty union matches
                // nothing, an empty intersection matches everything
                if node.kind == NodeKind::Union {
                    fragment.insert("type".to_string(), json!("boolean"));
                    fragment.insert("const".to_string(), json!(1));
                }
            } else {
                let branches = list.iter().map(|c| reference(c, branch_meta)).collect();
                fragment.insert(keyword.to_string(), Value::Array(branches));
            }
        }
        NodeKind::Transform => {
            let inner = inner(node)?;
            fragment.insert("$ref".to_string(), Value::String(definition_pointer(inner.id())));
        }
        NodeKind::Unknown(kind) => {
            return Err(ConvertError::UnsupportedKind { kind: kind.clone() });
        }
    }

    Ok(fragment)
}

fn inner(node: &SchemaNode) -> Result<&Child> {
    node.inner.as_ref().ok_or_else(|| {
        ConvertError::malformed(format!("{} node {} has no inner node", node.kind, node.uid))
    })
}

/// `$ref` wrapper for a child slot, optionally carrying the parent's overlay
fn reference(child: &Child, meta: Option<&Fragment>) -> Value {
    let mut fragment = meta.cloned().unwrap_or_default();
    fragment.insert("$ref".to_string(), Value::String(definition_pointer(child.id())));
    Value::Object(fragment)
}

/// Integral bounds are emitted as integers, the rest as floats
fn number(node: &SchemaNode, keyword: &str, value: f64) -> Result<Value> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Ok(Value::Number(Number::from(value as i64)));
    }
    Number::from_f64(value).map(Value::Number).ok_or_else(|| {
        ConvertError::malformed(format!(
            "number node {} has non-finite {}: {}",
            node.uid, keyword, value
        ))
    })
}
