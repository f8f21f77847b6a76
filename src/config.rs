//! Configuration management for the converter
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (schema-convert.toml)
//! - Environment variables (SCHEMA_CONVERT__*)
//!
//! ## Example config file (schema-convert.toml):
//! ```toml
//! [convert]
//! allow_unsafe = false
//! propagate_metadata = false
//!
//! [export]
//! output_format = "pretty"
//! node_suffix = ".node.json"
//! schema_suffix = ".schema.json"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::emit::EmitOptions;

/// Main configuration for the converter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Conversion policy
    #[serde(default)]
    pub convert: ConvertConfig,

    /// Output settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Conversion policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Accept dict nodes (pattern-keyed objects)
    #[serde(default)]
    pub allow_unsafe: bool,

    /// Copy node metadata onto property/item/branch `$ref`s
    #[serde(default)]
    pub propagate_metadata: bool,
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format (pretty or compact)
    #[serde(default)]
    pub output_format: OutputFormat,

    /// File suffix of serialized node graphs picked up by batch conversion
    #[serde(default = "default_node_suffix")]
    pub node_suffix: String,

    /// File suffix of emitted documents
    #[serde(default = "default_schema_suffix")]
    pub schema_suffix: String,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_node_suffix() -> String {
    ".node.json".to_string()
}

fn default_schema_suffix() -> String {
    ".schema.json".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Pretty,
            node_suffix: default_node_suffix(),
            schema_suffix: default_schema_suffix(),
        }
    }
}

impl ConverterConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "schema-convert.toml",
            ".schema-convert.toml",
            "config/schema-convert.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "schema-flatten", "schema-convert") {
            let xdg_config = config_dir.config_dir().join("schema-convert.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // SCHEMA_CONVERT__CONVERT__ALLOW_UNSAFE=true
        builder = builder.add_source(
            Environment::with_prefix("SCHEMA_CONVERT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn emit_options(&self) -> EmitOptions {
        EmitOptions::default()
            .allow_unsafe(self.convert.allow_unsafe)
            .propagate_metadata(self.convert.propagate_metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert!(!config.convert.allow_unsafe);
        assert_eq!(config.export.output_format, OutputFormat::Pretty);
        assert_eq!(config.emit_options(), EmitOptions::default());
    }

    #[test]
    fn test_load_from_default_locations() {
        // No config file ships at the crate root
        let config = ConverterConfig::load().unwrap();
        assert_eq!(config.export.node_suffix, ".node.json");
        assert_eq!(config.export.schema_suffix, ".schema.json");
    }

    #[test]
    fn test_serialize_config() {
        let config = ConverterConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[convert]"));
        assert!(toml_str.contains("[export]"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");

        let mut config = ConverterConfig::default();
        config.convert.allow_unsafe = true;
        config.export.output_format = OutputFormat::Compact;
        config.save(&path).unwrap();

        let loaded = ConverterConfig::load_from(Some(path.as_path())).unwrap();
        assert!(loaded.emit_options().allow_unsafe);
        assert_eq!(loaded.export.output_format, OutputFormat::Compact);
    }
}
