//! Flattened Schema Graph
//!
//! [`FlatGraph`] is the identifier-keyed node table produced by the flattener:
//! every node reachable from the root, each exactly once, with all child slots
//! holding identifiers. The table is what the emitter turns into a
//! `definitions` section.
//!
//! Besides lookup it offers the structural views used for diagnostics:
//! edges, dangling identifiers, recursive groups (SCCs, via petgraph) and a
//! GraphViz export.

pub mod flatten;

pub use flatten::{flatten, flatten_in_place};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::schema::{NodeId, SchemaNode, Slot};

/// A parent → child link in the flattened graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub slot: Slot,
}

/// Identifier-keyed table of flattened nodes
#[derive(Debug, Clone, PartialEq)]
pub struct FlatGraph {
    root: NodeId,
    nodes: BTreeMap<NodeId, SchemaNode>,
}

impl FlatGraph {
    pub(crate) fn new(root: NodeId, nodes: BTreeMap<NodeId, SchemaNode>) -> Self {
        Self { root, nodes }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// The root node (always present in the table)
    pub fn root(&self) -> &SchemaNode {
        &self.nodes[&self.root]
    }

    pub fn get(&self, id: NodeId) -> Option<&SchemaNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in ascending identifier order, root included
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SchemaNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Every child link, in identifier then slot order
    pub fn edges(&self) -> Vec<Edge> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.children()
                    .into_iter()
                    .map(move |(slot, child)| Edge {
                        from: node.uid,
                        to: child.id(),
                        slot,
                    })
            })
            .collect()
    }

    /// Whether any node links back to the root
    pub fn root_is_referenced(&self) -> bool {
        self.edges().iter().any(|e| e.to == self.root)
    }

    /// Identifiers referenced by some slot but missing from the table
    pub fn unresolved_refs(&self) -> Vec<NodeId> {
        self.edges()
            .into_iter()
            .map(|e| e.to)
            .filter(|id| !self.nodes.contains_key(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Groups of mutually recursive nodes
    ///
    /// Each group is a strongly connected component with more than one node,
    /// or a single node that refers to itself. Groups and their members are
    /// sorted by identifier.
    pub fn recursive_groups(&self) -> Vec<Vec<NodeId>> {
        let mut graph: DiGraph<NodeId, ()> = DiGraph::with_capacity(self.nodes.len(), self.nodes.len() * 2);
        let indices: HashMap<NodeId, NodeIndex> = self
            .nodes
            .keys()
            .map(|&id| (id, graph.add_node(id)))
            .collect();

        let edges = self.edges();
        for edge in &edges {
            if let (Some(&from), Some(&to)) = (indices.get(&edge.from), indices.get(&edge.to)) {
                graph.add_edge(from, to, ());
            }
        }

        let mut groups: Vec<Vec<NodeId>> = kosaraju_scc(&graph)
            .into_iter()
            .map(|scc| {
                let mut ids: Vec<NodeId> = scc
                    .into_iter()
                    .filter_map(|idx| graph.node_weight(idx).copied())
                    .collect();
                ids.sort_unstable();
                ids
            })
            .filter(|ids| {
                ids.len() > 1 || edges.iter().any(|e| e.from == ids[0] && e.to == ids[0])
            })
            .collect();
        groups.sort();
        groups
    }

    /// Export the flattened graph to GraphViz DOT format
    pub fn to_dot(&self) -> String {
        let mut output = String::new();

        output.push_str("digraph SchemaNodes {\n");
        output.push_str("  rankdir=LR;\n");
        output.push_str("  bgcolor=\"#1e1e1e\";\n");
        output.push_str("  node [shape=box, style=\"filled,rounded\", fontname=\"Helvetica\", fontsize=10, fontcolor=\"white\", color=\"#404040\"];\n");
        output.push_str("  edge [fontname=\"Helvetica\", fontsize=8, fontcolor=\"#808080\"];\n");
        output.push('\n');

        let color_map = [
            ("object", "#00BCD4"),
            ("dict", "#F44336"),
            ("array", "#2196F3"),
            ("union", "#FF9800"),
            ("intersect", "#9C27B0"),
            ("transform", "#795548"),
            ("const", "#FF5722"),
        ];

        for (id, node) in &self.nodes {
            let kind = node.kind.as_str();
            let color = color_map
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, color)| *color)
                .unwrap_or("#607D8B");
            let peripheries = if *id == self.root { 2 } else { 1 };
            output.push_str(&format!(
                "  \"n{}\" [label=\"{} #{}\", fillcolor=\"{}\", peripheries={}];\n",
                id, kind, id, color, peripheries
            ));
        }

        output.push('\n');

        for edge in self.edges() {
            // Dangling identifiers have no node to point at
            if !self.nodes.contains_key(&edge.to) {
                continue;
            }
            let label = edge.slot.to_string().replace('"', "\\\"");
            output.push_str(&format!(
                "  \"n{}\" -> \"n{}\" [label=\"{}\"];\n",
                edge.from, edge.to, label
            ));
        }

        output.push_str("}\n");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Child;

    fn tree() -> (NodeId, SchemaNode) {
        // tree = object { label: string, children: array(tree) }
        let id: NodeId = 500;
        let node = SchemaNode::object([
            ("label", Child::from(SchemaNode::string().with_uid(501))),
            ("children", Child::from(SchemaNode::array(id).with_uid(502))),
        ])
        .with_uid(id);
        (id, node)
    }

    #[test]
    fn test_edges_carry_slots() {
        let (id, root) = tree();
        let graph = flatten(&root).unwrap();
        let edges = graph.edges();

        assert!(edges.contains(&Edge { from: id, to: 502, slot: Slot::Property("children".into()) }));
        assert!(edges.contains(&Edge { from: 502, to: id, slot: Slot::Inner }));
        assert!(graph.root_is_referenced());
    }

    #[test]
    fn test_recursive_groups() {
        let (id, root) = tree();
        let graph = flatten(&root).unwrap();
        assert_eq!(graph.recursive_groups(), vec![vec![id, 502]]);
    }

    #[test]
    fn test_self_loop_is_recursive() {
        let id: NodeId = 600;
        let root = SchemaNode::union([Child::Ref(id), Child::from(SchemaNode::string())]).with_uid(id);
        let graph = flatten(&root).unwrap();
        assert_eq!(graph.recursive_groups(), vec![vec![id]]);
    }

    #[test]
    fn test_acyclic_graph_has_no_groups() {
        let root = SchemaNode::array(SchemaNode::array(SchemaNode::number()));
        let graph = flatten(&root).unwrap();
        assert!(graph.recursive_groups().is_empty());
        assert!(!graph.root_is_referenced());
    }

    #[test]
    fn test_unresolved_refs() {
        let root = SchemaNode::union([Child::Ref(700), Child::Ref(701), Child::Ref(700)]);
        let graph = flatten(&root).unwrap();
        assert_eq!(graph.unresolved_refs(), vec![700, 701]);
    }

    #[test]
    fn test_to_dot() {
        let (id, root) = tree();
        let dot = flatten(&root).unwrap().to_dot();
        assert!(dot.starts_with("digraph SchemaNodes {"));
        assert!(dot.contains(&format!("\"n{}\" [label=\"object #{}\"", id, id)));
        assert!(dot.contains("\"n502\" -> \"n500\" [label=\"inner\"]"));
    }
}
