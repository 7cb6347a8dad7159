//! Node-link JSON representation of a [`KeyedGraph`].
//!
//! ```json
//! {
//!   "directed": true,
//!   "nodes": [{"id": "a", "label": "Alice"}, {"id": 7}],
//!   "links": [{"source": "a", "target": 7, "weight": 2.0, "type": "follows"}]
//! }
//! ```
//!
//! Links that mention unknown nodes create them. When `directed` is false each
//! link is inserted in both directions, so an undirected export loads as the
//! equivalent symmetric digraph.

use serde::{Deserialize, Serialize};

use crate::graph::KeyedGraph;
use crate::{EdgeAttrs, NodeAttrs, NodeKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "K: NodeKey")]
pub struct NodeLinkGraph<K> {
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default)]
    pub nodes: Vec<NodeLinkNode<K>>,
    #[serde(default, alias = "edges")]
    pub links: Vec<NodeLinkEdge<K>>,
}

fn default_directed() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "K: NodeKey")]
pub struct NodeLinkNode<K> {
    pub id: K,
    #[serde(flatten)]
    pub attrs: NodeAttrs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "K: NodeKey")]
pub struct NodeLinkEdge<K> {
    pub source: K,
    pub target: K,
    #[serde(flatten)]
    pub attrs: EdgeAttrs,
}

impl<K: NodeKey> From<KeyedGraph<K>> for NodeLinkGraph<K> {
    fn from(graph: KeyedGraph<K>) -> Self {
        let nodes = graph
            .nodes()
            .map(|(key, attrs)| NodeLinkNode {
                id: key.clone(),
                attrs: attrs.clone(),
            })
            .collect();
        let links = graph
            .edges()
            .map(|(source, target, attrs)| NodeLinkEdge {
                source: source.clone(),
                target: target.clone(),
                attrs: attrs.clone(),
            })
            .collect();
        NodeLinkGraph {
            directed: true,
            nodes,
            links,
        }
    }
}

impl<K: NodeKey> From<NodeLinkGraph<K>> for KeyedGraph<K> {
    fn from(doc: NodeLinkGraph<K>) -> Self {
        let mut graph = KeyedGraph::with_capacity(doc.nodes.len(), doc.links.len());
        for node in doc.nodes {
            graph.add_node(node.id, node.attrs);
        }
        for link in doc.links {
            if !doc.directed {
                graph.add_edge(link.target.clone(), link.source.clone(), link.attrs.clone());
            }
            graph.add_edge(link.source, link.target, link.attrs);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    #[test]
    fn parses_mixed_ids_and_attributes() {
        let json = r#"{
            "directed": true,
            "nodes": [{"id": "a", "label": "Alice", "followers": 3}, {"id": 7}],
            "links": [{"source": "a", "target": 7, "weight": 2.0, "type": "follows"}]
        }"#;
        let graph: KeyedGraph<NodeId> = serde_json::from_str(json).unwrap();
        assert_eq!(graph.node_count(), 2);
        let edge = graph.edge(&NodeId::from("a"), &NodeId::from(7)).unwrap();
        assert_eq!(edge.weight, Some(2.0));
        assert_eq!(edge.kind.as_deref(), Some("follows"));
        let alice = graph.node(&NodeId::from("a")).unwrap();
        assert_eq!(alice.label.as_deref(), Some("Alice"));
        assert!(alice.extra.contains_key("followers"));
    }

    #[test]
    fn undirected_documents_load_symmetric() {
        let json = r#"{"directed": false, "nodes": [], "links": [{"source": 1, "target": 2}]}"#;
        let graph: KeyedGraph<NodeId> = serde_json::from_str(json).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn written_graph_reads_back_with_annotations() {
        let mut graph: KeyedGraph<NodeId> = KeyedGraph::new();
        graph.add_edge(NodeId::from(1), NodeId::from(2), EdgeAttrs::default());
        graph.node_mut(&NodeId::from(1)).unwrap().community = Some(4);
        let text = serde_json::to_string(&graph).unwrap();
        let back: KeyedGraph<NodeId> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.node(&NodeId::from(1)).unwrap().community, Some(4));
        assert_eq!(back.edge_count(), 1);
    }
}
