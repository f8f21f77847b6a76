//! Document Validation
//!
//! Compiles an emitted [`Document`] with the `jsonschema` crate (draft 7) so
//! values can be checked against it. Conversion never depends on this; it is
//! the consumer side, used by the CLI `check` command and by the round-trip
//! tests.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::document::Document;
use crate::error::{ConvertError, Result};

/// A compiled, reusable validator for one document
pub struct DocumentValidator {
    schema: JSONSchema,
}

impl DocumentValidator {
    pub fn compile(document: &Document) -> Result<Self> {
        Self::compile_value(&document.to_value())
    }

    pub fn compile_value(schema: &Value) -> Result<Self> {
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| ConvertError::InvalidDocument(e.to_string()))?;
        Ok(Self { schema })
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.schema.is_valid(instance)
    }

    /// Validate, collecting one message per violation (`<instance path>: <reason>`)
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), Vec<String>> {
        self.schema.validate(instance).map_err(|errors| {
            errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        format!("/: {}", e)
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect()
        })
    }
}
