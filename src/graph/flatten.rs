//! Graph Flattening
//!
//! Walks every node reachable from a root (through child slots and known refs)
//! and collects each distinct identifier exactly once. Embedded children are
//! rewritten to `Child::Ref`, so the collected nodes form a table that can be
//! serialized without duplication or unbounded recursion.
//!
//! An identifier is claimed before its children are visited. Meeting it again,
//! whether from a sibling or from inside its own subtree, just yields a
//! reference. That is the dedup guard and the cycle guard at once.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

use super::FlatGraph;
use crate::error::{ConvertError, Result};
use crate::schema::{Child, NodeId, SchemaNode};

/// Flatten the graph under `root` into fresh, rewritten copies.
///
/// The caller's graph is left untouched, so the same root can be flattened
/// from several threads at once.
pub fn flatten(root: &SchemaNode) -> Result<FlatGraph> {
    let mut collector = CopyCollector::default();
    collector.visit(root)?;
    debug!(root = root.uid, nodes = collector.nodes.len(), "flattened schema graph");
    Ok(FlatGraph::new(root.uid, collector.nodes))
}

/// Flatten the graph under `root`, rewriting its child slots in place.
///
/// On return every slot reachable from `root` holds a `Child::Ref`; the
/// embedded nodes have been moved into the returned graph. Known refs stay
/// attached to their declaring node (flattened as well) and are copied into
/// the table.
pub fn flatten_in_place(root: &mut SchemaNode) -> Result<FlatGraph> {
    let mut collector = InPlaceCollector::default();
    collector.claim(root)?;
    collector.visit(root)?;

    let mut table_root = root.clone();
    table_root.refs.clear();
    collector.nodes.insert(root.uid, table_root);
    debug!(root = root.uid, nodes = collector.nodes.len(), "flattened schema graph in place");
    Ok(FlatGraph::new(root.uid, collector.nodes))
}

/// Shallow copy of a node: same kind, value and metadata, no slots or refs
fn detached(node: &SchemaNode) -> SchemaNode {
    SchemaNode {
        uid: node.uid,
        kind: node.kind.clone(),
        inner: None,
        list: None,
        dict: None,
        value: node.value.clone(),
        refs: BTreeMap::new(),
        meta: node.meta.clone(),
    }
}

/// Shallow copy with every child slot reduced to its identifier
fn outline(node: &SchemaNode) -> SchemaNode {
    let as_ref = |child: &Child| Child::Ref(child.id());
    let mut copy = detached(node);
    copy.inner = node.inner.as_ref().map(as_ref);
    copy.list = node.list.as_ref().map(|list| list.iter().map(as_ref).collect());
    copy.dict = node
        .dict
        .as_ref()
        .map(|dict| dict.iter().map(|(name, c)| (name.clone(), as_ref(c))).collect());
    copy
}

fn check_ref_key(key: NodeId, node: &SchemaNode) -> Result<()> {
    if key != node.uid {
        return Err(ConvertError::malformed(format!(
            "known ref keyed {} holds node {}",
            key, node.uid
        )));
    }
    Ok(())
}

#[derive(Default)]
struct CopyCollector<'a> {
    /// First occurrence of every claimed identifier
    seen: HashMap<NodeId, &'a SchemaNode>,
    nodes: BTreeMap<NodeId, SchemaNode>,
}

impl<'a> CopyCollector<'a> {
    fn visit(&mut self, node: &'a SchemaNode) -> Result<NodeId> {
        if let Some(first) = self.seen.get(&node.uid) {
            if !first.same_shape(node) {
                return Err(ConvertError::DuplicateId(node.uid));
            }
            trace!(id = node.uid, "node already collected");
            return Ok(node.uid);
        }
        self.seen.insert(node.uid, node);
        trace!(id = node.uid, kind = %node.kind, "collecting node");

        let mut flat = detached(node);
        flat.inner = node.inner.as_ref().map(|c| self.slot(c)).transpose()?;
        flat.list = node
            .list
            .as_ref()
            .map(|list| list.iter().map(|c| self.slot(c)).collect::<Result<Vec<_>>>())
            .transpose()?;
        flat.dict = node
            .dict
            .as_ref()
            .map(|dict| {
                dict.iter()
                    .map(|(name, c)| Ok((name.clone(), self.slot(c)?)))
                    .collect::<Result<BTreeMap<_, _>>>()
            })
            .transpose()?;

        for (&key, known) in &node.refs {
            check_ref_key(key, known)?;
            self.visit(known)?;
        }

        self.nodes.insert(node.uid, flat);
        Ok(node.uid)
    }

    fn slot(&mut self, child: &'a Child) -> Result<Child> {
        match child {
            Child::Ref(id) => Ok(Child::Ref(*id)),
            Child::Node(node) => Ok(Child::Ref(self.visit(node)?)),
        }
    }
}

#[derive(Default)]
struct InPlaceCollector {
    /// Outline of every claimed node, taken before its slots are rewritten
    seen: HashMap<NodeId, SchemaNode>,
    nodes: BTreeMap<NodeId, SchemaNode>,
}

impl InPlaceCollector {
    /// Claim an identifier; false when it was claimed before
    fn claim(&mut self, node: &SchemaNode) -> Result<bool> {
        if let Some(first) = self.seen.get(&node.uid) {
            if !first.same_shape(node) {
                return Err(ConvertError::DuplicateId(node.uid));
            }
            return Ok(false);
        }
        self.seen.insert(node.uid, outline(node));
        Ok(true)
    }

    /// Rewrite the slots of an already claimed node
    fn visit(&mut self, node: &mut SchemaNode) -> Result<()> {
        trace!(id = node.uid, kind = %node.kind, "rewriting node slots");
        if let Some(inner) = node.inner.as_mut() {
            self.slot(inner)?;
        }
        if let Some(list) = node.list.as_mut() {
            for child in list.iter_mut() {
                self.slot(child)?;
            }
        }
        if let Some(dict) = node.dict.as_mut() {
            for child in dict.values_mut() {
                self.slot(child)?;
            }
        }
        for (&key, known) in node.refs.iter_mut() {
            check_ref_key(key, known)?;
            if self.claim(known)? {
                self.visit(known)?;
                let mut copy = known.clone();
                copy.refs.clear();
                self.nodes.insert(copy.uid, copy);
            }
        }
        Ok(())
    }

    fn slot(&mut self, child: &mut Child) -> Result<()> {
        let Child::Node(node) = &mut *child else {
            return Ok(());
        };
        let fresh = self.claim(node)?;
        if fresh {
            self.visit(node)?;
        }
        let id = node.uid;
        if let Child::Node(node) = std::mem::replace(child, Child::Ref(id)) {
            if fresh {
                let mut node = *node;
                node.refs.clear();
                self.nodes.insert(id, node);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeKind;

    fn all_flat(graph: &FlatGraph) -> bool {
        graph.iter().all(|(_, node)| node.is_flat())
    }

    #[test]
    fn test_collects_every_reachable_node() {
        let name = SchemaNode::string();
        let tags = SchemaNode::array(SchemaNode::string());
        let root = SchemaNode::object([("name", name.clone()), ("tags", tags.clone())]);

        let graph = flatten(&root).unwrap();
        assert_eq!(graph.len(), 4);
        assert!(graph.get(name.uid).is_some());
        assert!(graph.get(tags.uid).is_some());
        assert!(all_flat(&graph));
        assert_eq!(
            graph.root().dict.as_ref().unwrap()["name"],
            Child::Ref(name.uid)
        );
    }

    #[test]
    fn test_shared_node_collected_once() {
        let shared = SchemaNode::number().min(0.0);
        let root = SchemaNode::union([
            SchemaNode::array(shared.clone()),
            SchemaNode::dict(shared.clone()),
            shared.clone(),
        ]);

        let graph = flatten(&root).unwrap();
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.get(shared.uid).unwrap().meta.min, Some(0.0));
    }

    #[test]
    fn test_self_reference_terminates() {
        // tree = object { children: array(tree) }
        let root_id: NodeId = 9000;
        let root = SchemaNode::object([("children", SchemaNode::array(root_id))]).with_uid(root_id);

        let graph = flatten(&root).unwrap();
        assert_eq!(graph.len(), 2);
        assert!(graph.unresolved_refs().is_empty());
    }

    #[test]
    fn test_reembedded_ancestor_is_rewritten() {
        let leaf = SchemaNode::string();
        let inner_copy = SchemaNode::array(leaf.clone()).with_uid(9100);
        let root = SchemaNode::union([inner_copy.clone(), inner_copy]);

        let graph = flatten(&root).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(
            graph.root().list.as_ref().unwrap(),
            &vec![Child::Ref(9100), Child::Ref(9100)]
        );
    }

    #[test]
    fn test_known_refs_are_merged() {
        let declared = SchemaNode::boolean().with_uid(9200);
        let root = SchemaNode::array(9200 as NodeId).with_ref(declared);

        let graph = flatten(&root).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(9200).unwrap().kind, NodeKind::Boolean);
        assert!(graph.root().refs.is_empty());
    }

    #[test]
    fn test_conflicting_ids_rejected() {
        let a = SchemaNode::string().with_uid(9300);
        let b = SchemaNode::number().with_uid(9300);
        let root = SchemaNode::union([a, b]);

        let err = flatten(&root).unwrap_err();
        assert!(matches!(err, ConvertError::DuplicateId(9300)));
    }

    #[test]
    fn test_in_place_rejects_conflicting_ids() {
        let mut siblings = SchemaNode::union([
            SchemaNode::string().with_uid(9310),
            SchemaNode::number().with_uid(9310),
        ]);
        let err = flatten_in_place(&mut siblings).unwrap_err();
        assert!(matches!(err, ConvertError::DuplicateId(9310)));

        // A descendant reusing the id of an ancestor still being visited
        let mut nested =
            SchemaNode::object([("x", SchemaNode::number().with_uid(9320))]).with_uid(9320);
        assert!(matches!(flatten(&nested).unwrap_err(), ConvertError::DuplicateId(9320)));
        let err = flatten_in_place(&mut nested).unwrap_err();
        assert!(matches!(err, ConvertError::DuplicateId(9320)));
    }

    #[test]
    fn test_in_place_reembedded_copy_is_shared() {
        let inner_copy = SchemaNode::array(SchemaNode::string()).with_uid(9330);
        let mut root = SchemaNode::union([inner_copy.clone(), inner_copy]);

        let graph = flatten_in_place(&mut root).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(root.list.as_ref().unwrap(), &vec![Child::Ref(9330), Child::Ref(9330)]);
    }

    #[test]
    fn test_reflatten_is_noop() {
        let root = SchemaNode::object([
            ("a", SchemaNode::string()),
            ("b", SchemaNode::array(SchemaNode::number())),
        ]);
        let first = flatten(&root).unwrap();
        let second = flatten(first.root()).unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second.root(), first.root());
    }

    #[test]
    fn test_copy_does_not_mutate_input() {
        let root = SchemaNode::array(SchemaNode::string());
        let before = root.clone();
        flatten(&root).unwrap();
        assert_eq!(root, before);
    }

    #[test]
    fn test_in_place_rewrites_caller_slots() {
        let leaf = SchemaNode::string();
        let mut root = SchemaNode::object([
            ("x", leaf.clone()),
            ("y", SchemaNode::array(leaf.clone())),
        ]);

        let graph = flatten_in_place(&mut root).unwrap();
        assert!(root.children().iter().all(|(_, c)| c.is_ref()));
        assert_eq!(graph.len(), 3);
        assert!(all_flat(&graph));
        assert_eq!(graph.get(leaf.uid).unwrap().kind, NodeKind::String);
    }

    #[test]
    fn test_in_place_matches_copy() {
        let shared = SchemaNode::string().pattern("^a");
        let declared = SchemaNode::number().with_uid(9400);
        let root = SchemaNode::intersect([
            Child::from(shared.clone()),
            Child::from(SchemaNode::transform(shared.clone())),
            Child::Ref(9400),
        ])
        .with_ref(declared);

        let copied = flatten(&root).unwrap();
        let mut owned = root.clone();
        let in_place = flatten_in_place(&mut owned).unwrap();
        assert_eq!(copied, in_place);
    }
}
