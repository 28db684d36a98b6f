//! dbt artifact parsing and lineage graph construction
//!
//! This crate handles:
//! - Parsing manifest.json (dbt-generated artifacts)
//! - Converting the manifest into the node/edge graph the UI renders
//! - Invoking `dbt parse` / `dbt run` as bounded subprocesses
//! - Rebuilding the graph from a dbt project on demand

pub mod manifest;
pub mod graph;
pub mod runner;
pub mod builder;

pub use manifest::{upstream_ids, Manifest, ManifestEntity, ManifestError, ManifestMetadata};
pub use graph::{DbtLineage, Graph, GraphEdge, GraphNode, NodeData};
pub use runner::{model_names_from_paths, DbtCommand, DbtRunner, RunnerError};
pub use builder::{BuildError, GraphBuilder};
