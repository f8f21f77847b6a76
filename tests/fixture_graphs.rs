//! Fixture Graph Tests
//!
//! Serialized node graphs as a producing library would hand them over: shared
//! nodes embedded more than once, identifiers pointing back at ancestors, known
//! refs declared beside the root, and kinds this converter does not know.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use schema_flatten::{
    convert, flatten, flatten_in_place, ConvertError, Converter, DocumentValidator, EmitOptions,
    SchemaNode,
};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn load(name: &str) -> SchemaNode {
    let content = fs::read_to_string(fixture_path(name)).unwrap();
    SchemaNode::from_json_str(&content).unwrap()
}

#[test]
fn test_shared_nodes_flatten_once() {
    let root = load("shared_nodes.node.json");
    let graph = flatten(&root).unwrap();

    assert_eq!(graph.len(), 6);
    assert!(graph.iter().all(|(_, node)| node.is_flat()));
    assert!(graph.unresolved_refs().is_empty());
    assert!(graph.recursive_groups().is_empty());
}

#[test]
fn test_shared_nodes_document() {
    let document = convert(&load("shared_nodes.node.json"), false).unwrap();
    let keys: Vec<&str> = document.definitions.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["2", "3", "4", "5", "6"]);
    assert_eq!(document.root["description"], "Address book");

    let validator = DocumentValidator::compile(&document).unwrap();
    let address = json!({ "street": "Main St", "zip": "12345" });
    assert!(validator.is_valid(&json!({
        "home": address,
        "work": null,
        "previous": [address, address],
        "primary": address
    })));
    assert!(!validator.is_valid(&json!({ "home": { "zip": "1234" } })));
    assert!(!validator.is_valid(&json!({ "previous": [{ "street": 1 }] })));
}

#[test]
fn test_recursive_graph() {
    let root = load("recursive.node.json");
    let graph = flatten(&root).unwrap();
    assert_eq!(graph.len(), 5);
    assert_eq!(graph.recursive_groups(), vec![vec![10, 12, 13]]);

    let document = convert(&root, false).unwrap();
    assert!(document.root.get("default").is_none());
    assert_eq!(document.definition(10).unwrap()["default"], json!({ "name": "root" }));

    let validator = DocumentValidator::compile(&document).unwrap();
    assert!(validator.is_valid(&json!({
        "name": "a",
        "parent": "orphan",
        "children": [
            { "name": "b", "children": [], "parent": { "name": "a", "children": [] } }
        ]
    })));
    assert!(!validator.is_valid(&json!({
        "name": "a",
        "children": [{ "name": 7, "children": [] }]
    })));
    assert!(!validator.is_valid(&json!({ "name": "a", "parent": "stray" })));
}

#[test]
fn test_in_place_flatten_of_fixture() {
    let root = load("recursive.node.json");
    let copied = flatten(&root).unwrap();

    let mut owned = root.clone();
    let in_place = flatten_in_place(&mut owned).unwrap();
    assert_eq!(copied, in_place);
    assert!(owned.children().iter().all(|(_, child)| child.is_ref()));
}

#[test]
fn test_unknown_kind_fails_conversion() {
    let err = convert(&load("unknown_kind.node.json"), true).unwrap_err();
    match err {
        ConvertError::UnsupportedKind { kind } => assert_eq!(kind, "bitset"),
        other => panic!("Expected UnsupportedKind, got {:?}", other),
    }
}

#[test]
fn test_settings_fixture() {
    let root = load("settings.node.json");

    let err = convert(&root, false).unwrap_err();
    assert!(matches!(err, ConvertError::UnsafeConstructRejected { id: 35 }));

    let document = Converter::new(EmitOptions::default().allow_unsafe(true))
        .convert(&root)
        .unwrap();
    assert_eq!(document.root["description"], "Settings\n设置");
    assert_eq!(
        document.definition(31).unwrap(),
        &json!({ "type": "number", "minimum": 1, "maximum": 65535, "multipleOf": 1, "default": 8080 })
    );
    assert_eq!(document.definition(32).unwrap()["anyOf"][0]["deprecated"], true);

    let validator = DocumentValidator::compile(&document).unwrap();
    assert!(validator.is_valid(&json!({ "port": 443, "mode": "prod", "labels": { "team": "core" } })));
    assert!(!validator.is_valid(&json!({ "port": 0 })));
    assert!(!validator.is_valid(&json!({ "mode": "staging" })));
    assert!(!validator.is_valid(&json!({ "labels": { "team": 1 } })));
}
