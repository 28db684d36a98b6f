//! Lineage graph for the dev UI
//!
//! Converts a dbt manifest into the `{ nodes, edges }` shape the React Flow
//! canvas renders. Only models and sources become nodes; every declared
//! upstream id becomes one edge pointing at the node that declared it.

use crate::manifest::{upstream_ids, Manifest, ManifestEntity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Node/edge graph as sent to the UI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// dbt unique_id
    pub id: String,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Text drawn on the node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub dbt: DbtLineage,
}

/// dbt metadata carried on each node for the UI's detail panel.
///
/// Fields dbt left out stay out; an explicit `null` is sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbtLineage {
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqn: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
    /// Raw `depends_on` descriptor, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Value>,
}

/// Directed edge from an upstream entity to the node that depends on it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// `"<source>-<target>"`
    pub id: String,
    pub source: String,
    pub target: String,
}

impl GraphEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: format!("{}-{}", source, target),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

impl GraphNode {
    fn from_entity(entity: &ManifestEntity) -> Self {
        Self {
            id: entity.unique_id.clone(),
            data: NodeData {
                label: entity.name.clone(),
                dbt: DbtLineage {
                    unique_id: entity.unique_id.clone(),
                    resource_type: entity.resource_type.clone(),
                    created_at: entity.created_at.clone(),
                    name: entity.name.clone(),
                    database: entity.database.clone(),
                    schema: entity.schema.clone(),
                    fqn: entity.fqn.clone(),
                    tags: entity.tags.clone(),
                    depends_on: entity.depends_on.clone(),
                },
            },
        }
    }

    /// Upstream ids declared by this node (empty when `dependsOn` is absent)
    pub fn upstream_ids(&self) -> impl Iterator<Item = &str> {
        upstream_ids(self.data.dbt.depends_on.as_ref())
    }
}

impl Graph {
    /// Build the lineage graph from a manifest.
    ///
    /// Edges are not deduplicated and are not checked against the node set:
    /// an upstream that was filtered out (a seed, an exposure) or never
    /// existed still yields an edge. The UI decides what to do with those.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let nodes: Vec<GraphNode> = manifest
            .entities()
            .filter(|entity| entity.is_renderable())
            .map(GraphNode::from_entity)
            .collect();

        let edges = nodes
            .iter()
            .flat_map(|node| {
                node.upstream_ids()
                    .map(move |upstream| GraphEdge::new(upstream, &node.id))
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Edges whose source or target is not a node in this graph
    pub fn dangling_edges(&self) -> Vec<&GraphEdge> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        self.edges
            .iter()
            .filter(|e| !ids.contains(e.source.as_str()) || !ids.contains(e.target.as_str()))
            .collect()
    }
}

impl From<&Manifest> for Graph {
    fn from(manifest: &Manifest) -> Self {
        Self::from_manifest(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> Manifest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_manifest_gives_empty_graph() {
        let graph = Graph::from_manifest(&manifest(json!({"nodes": {}, "sources": {}})));
        assert_eq!(graph, Graph::default());
        assert_eq!(
            serde_json::to_value(&graph).unwrap(),
            json!({"nodes": [], "edges": []})
        );
    }

    #[test]
    fn model_with_source_upstream() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [{
                "unique_id": "model.x",
                "resource_type": "model",
                "name": "x",
                "depends_on": {"nodes": ["source.y"]}
            }],
            "sources": [{"unique_id": "source.y", "resource_type": "source", "name": "y"}]
        })));

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["model.x", "source.y"]);
        assert_eq!(graph.edges, vec![GraphEdge::new("source.y", "model.x")]);
        assert_eq!(graph.edges[0].id, "source.y-model.x");
        assert!(graph.dangling_edges().is_empty());
    }

    #[test]
    fn only_models_and_sources_are_kept() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [
                {"unique_id": "test.t", "resource_type": "test", "depends_on": {"nodes": ["model.m"]}},
                {"unique_id": "seed.s", "resource_type": "seed"},
                {"unique_id": "model.m", "resource_type": "model", "depends_on": {"nodes": ["seed.s"]}},
                {"unique_id": "operation.o", "resource_type": "operation"},
                {"unique_id": "analysis.a", "resource_type": "analysis"}
            ],
            "sources": [{"unique_id": "source.r", "resource_type": "source"}]
        })));

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["model.m", "source.r"]);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_only_manifest_gives_empty_graph() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [{"unique_id": "test.t", "resource_type": "test"}]
        })));
        assert!(graph.is_empty());
    }

    #[test]
    fn sources_render_without_models() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": {},
            "sources": [{"unique_id": "source.r", "resource_type": "source"}]
        })));
        assert_eq!(graph.nodes.len(), 1);
    }

    #[test]
    fn edge_count_matches_declared_upstreams() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [
                {"unique_id": "model.a", "resource_type": "model", "depends_on": {"nodes": ["source.s", "model.b"]}},
                {"unique_id": "model.b", "resource_type": "model", "depends_on": {"nodes": ["source.s"]}},
                {"unique_id": "model.c", "resource_type": "model"},
                {"unique_id": "model.d", "resource_type": "model", "depends_on": {"macros": []}}
            ],
            "sources": [{"unique_id": "source.s", "resource_type": "source"}]
        })));

        assert_eq!(graph.edges.len(), 3);
        for edge in &graph.edges {
            assert_eq!(edge.id, format!("{}-{}", edge.source, edge.target));
        }

        let into_a: Vec<&str> = graph
            .edges
            .iter()
            .filter(|e| e.target == "model.a")
            .map(|e| e.source.as_str())
            .collect();
        assert_eq!(into_a, ["source.s", "model.b"]);
    }

    #[test]
    fn repeated_upstream_yields_duplicate_edges() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [{
                "unique_id": "model.a",
                "resource_type": "model",
                "depends_on": {"nodes": ["source.s", "source.s"]}
            }]
        })));

        assert_eq!(
            graph.edges,
            vec![
                GraphEdge::new("source.s", "model.a"),
                GraphEdge::new("source.s", "model.a")
            ]
        );
    }

    #[test]
    fn unknown_upstream_passes_through() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [{"unique_id": "A", "resource_type": "model", "depends_on": {"nodes": ["ghost"]}}]
        })));

        assert_eq!(
            graph.edges,
            vec![GraphEdge {
                id: "ghost-A".to_string(),
                source: "ghost".to_string(),
                target: "A".to_string(),
            }]
        );
        assert_eq!(graph.dangling_edges(), vec![&graph.edges[0]]);
    }

    #[test]
    fn conversion_is_repeatable() {
        let m = manifest(json!({
            "nodes": {
                "model.a": {"unique_id": "model.a", "resource_type": "model", "depends_on": {"nodes": ["source.s"]}},
                "model.b": {"unique_id": "model.b", "resource_type": "model", "depends_on": {"nodes": ["model.a"]}}
            },
            "sources": {"source.s": {"unique_id": "source.s", "resource_type": "source"}}
        }));

        assert_eq!(Graph::from_manifest(&m), Graph::from(&m));
    }

    #[test]
    fn node_payload_uses_camel_case_lineage_keys() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [{
                "unique_id": "model.shop.orders",
                "resource_type": "model",
                "name": "orders",
                "database": "iceberg",
                "schema": "marts",
                "fqn": ["shop", "marts", "orders"],
                "tags": ["daily"],
                "created_at": 1700000000.25,
                "depends_on": {"macros": ["macro.dbt.ref"], "nodes": []}
            }]
        })));

        assert_eq!(
            serde_json::to_value(&graph.nodes[0]).unwrap(),
            json!({
                "id": "model.shop.orders",
                "data": {
                    "label": "orders",
                    "dbt": {
                        "uniqueId": "model.shop.orders",
                        "resourceType": "model",
                        "createdAt": 1700000000.25,
                        "name": "orders",
                        "database": "iceberg",
                        "schema": "marts",
                        "fqn": ["shop", "marts", "orders"],
                        "tags": ["daily"],
                        "dependsOn": {"macros": ["macro.dbt.ref"], "nodes": []}
                    }
                }
            })
        );
    }

    #[test]
    fn depends_on_and_nulls_reach_the_payload_unchanged() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [{
                "unique_id": "model.x",
                "resource_type": "model",
                "name": "x",
                "database": null,
                "depends_on": {"macros": ["macro.x"]}
            }]
        })));

        assert_eq!(
            serde_json::to_value(&graph.nodes[0].data.dbt).unwrap(),
            json!({
                "uniqueId": "model.x",
                "resourceType": "model",
                "name": "x",
                "database": null,
                "dependsOn": {"macros": ["macro.x"]}
            })
        );
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn null_upstream_list_yields_no_edges() {
        let graph = Graph::from_manifest(&manifest(json!({
            "nodes": [
                {"unique_id": "test.t", "resource_type": "test", "name": null},
                {"unique_id": "model.a", "resource_type": "model", "depends_on": {"nodes": null}},
                {"unique_id": "model.b", "resource_type": "model", "depends_on": {"nodes": ["model.a"]}}
            ]
        })));

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["model.a", "model.b"]);
        assert_eq!(graph.edges, vec![GraphEdge::new("model.a", "model.b")]);
    }
}
