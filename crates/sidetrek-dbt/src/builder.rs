//! Graph rebuilds from a live dbt project
//!
//! A rebuild re-parses the project, then reads whatever manifest is on disk.
//! A failed or timed-out parse is only logged: the previous manifest is still
//! good enough to draw. A missing or unreadable manifest fails the rebuild.

use crate::graph::Graph;
use crate::manifest::{Manifest, ManifestError};
use crate::runner::DbtRunner;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Rebuilds the lineage graph of one dbt project
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    runner: DbtRunner,
    manifest_path: PathBuf,
}

impl GraphBuilder {
    pub fn new(runner: DbtRunner, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            manifest_path: manifest_path.into(),
        }
    }

    /// Builder reading `<project_dir>/target/manifest.json`
    pub fn for_project(runner: DbtRunner) -> Self {
        let manifest_path = runner.project_dir().join("target").join("manifest.json");
        Self::new(runner, manifest_path)
    }

    pub fn runner(&self) -> &DbtRunner {
        &self.runner
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Parse the project and convert the resulting manifest
    pub async fn build(&self) -> Result<Graph, BuildError> {
        if let Err(e) = self.runner.parse().await {
            tracing::warn!(error = %e, "dbt parse failed, using the manifest already on disk");
        }

        let manifest = Manifest::load(&self.manifest_path).await?;
        let graph = Graph::from_manifest(&manifest);

        let dangling = graph.dangling_edges().len();
        if dangling > 0 {
            tracing::debug!(dangling, "edges reference entities outside the graph");
        }
        tracing::info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            dbt_version = manifest.dbt_version().unwrap_or("unknown"),
            "lineage graph rebuilt"
        );

        Ok(graph)
    }
}
