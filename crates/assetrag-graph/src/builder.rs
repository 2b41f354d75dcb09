//! Full-graph builds: constraints, then nodes, then relationships.
//!
//! The builder walks [`BuildStage`] strictly in order. Per-row and per-file
//! problems only lower the reported counts; a lost connection stops the
//! build where it is and is returned to the caller.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use assetrag_core::{RagResult, SchemaRegistry, Statement};

use crate::config::{SourceSpec, DEFAULT_CONCURRENCY};
use crate::loaders::{create_node_loader, create_relationship_loader, LoadReport, SourceTable};
use crate::schema::initialize_schema;
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum BuildStage {
    Uninitialized,
    ConstraintsReady,
    NodesLoaded,
    RelationshipsLoaded,
    Done,
}

/// Node count per type, edge count per edge type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: BTreeMap<String, i64>,
    pub edges: BTreeMap<String, i64>,
    pub total_edges: i64,
}

impl GraphStats {
    pub fn total_nodes(&self) -> i64 {
        self.nodes.values().sum()
    }
}

/// A source file that could not be loaded at all.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    pub type_name: String,
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub schema_statements: usize,
    pub nodes: BTreeMap<String, LoadReport>,
    pub relationships: BTreeMap<String, LoadReport>,
    pub failures: Vec<SourceFailure>,
    pub stats: GraphStats,
}

pub struct GraphBuilder {
    store: Arc<dyn GraphStore>,
    registry: Arc<SchemaRegistry>,
    concurrency: usize,
    stage: BuildStage,
}

impl GraphBuilder {
    pub fn new(store: Arc<dyn GraphStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            store,
            registry,
            concurrency: DEFAULT_CONCURRENCY,
            stage: BuildStage::Uninitialized,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Delete every node and relationship. Only used for a full rebuild.
    pub async fn clear_graph(&mut self) -> RagResult<()> {
        warn!("Clearing the whole graph");
        self.store.run(&Statement::new("MATCH (n) DETACH DELETE n")).await?;
        self.stage = BuildStage::Uninitialized;
        Ok(())
    }

    /// Declare constraints and indexes derived from the registry. Idempotent.
    pub async fn create_constraints_and_indexes(&mut self) -> RagResult<usize> {
        let count = initialize_schema(self.store.as_ref(), &self.registry).await?;
        if self.stage < BuildStage::ConstraintsReady {
            self.stage = BuildStage::ConstraintsReady;
        }
        Ok(count)
    }

    async fn ensure_constraints(&mut self) -> RagResult<()> {
        if self.stage == BuildStage::Uninitialized {
            self.create_constraints_and_indexes().await?;
        }
        Ok(())
    }

    /// Load one node source file. A missing file loads nothing.
    pub async fn load_node(&mut self, node_type: &str, path: &Path) -> RagResult<LoadReport> {
        self.ensure_constraints().await?;
        let loader = create_node_loader(&self.registry, node_type)?;
        match SourceTable::read(path)? {
            Some(table) => loader.load(self.store.as_ref(), table, self.concurrency).await,
            None => Ok(LoadReport::default()),
        }
    }

    /// Load one relationship source file. A missing file loads nothing.
    pub async fn load_relationship(&mut self, rel_type: &str, path: &Path) -> RagResult<LoadReport> {
        self.ensure_constraints().await?;
        let loader = create_relationship_loader(&self.registry, rel_type)?;
        match SourceTable::read(path)? {
            Some(table) => loader.load(self.store.as_ref(), table, self.concurrency).await,
            None => Ok(LoadReport::default()),
        }
    }

    /// Run every stage in order and report per-type counts.
    pub async fn build_full_graph(
        &mut self,
        node_sources: &[SourceSpec],
        rel_sources: &[SourceSpec],
    ) -> RagResult<BuildReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("build", %run_id);
        self.run_build(run_id, node_sources, rel_sources)
            .instrument(span)
            .await
    }

    async fn run_build(
        &mut self,
        run_id: Uuid,
        node_sources: &[SourceSpec],
        rel_sources: &[SourceSpec],
    ) -> RagResult<BuildReport> {
        let started_at = Utc::now();
        info!(
            nodes = node_sources.len(),
            relationships = rel_sources.len(),
            "Starting full graph build"
        );

        let schema_statements = self.create_constraints_and_indexes().await?;
        let mut failures = Vec::new();

        let mut nodes: BTreeMap<String, LoadReport> = BTreeMap::new();
        for source in node_sources {
            match self.load_node(&source.type_name, &source.path).await {
                Ok(report) => nodes.entry(source.type_name.clone()).or_default().merge(&report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(node_type = %source.type_name, path = %source.path.display(), error = %e, "Node source skipped");
                    failures.push(SourceFailure {
                        type_name: source.type_name.clone(),
                        path: source.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        self.stage = BuildStage::NodesLoaded;
        info!(types = nodes.len(), "Nodes stage complete");

        let mut relationships: BTreeMap<String, LoadReport> = BTreeMap::new();
        for source in rel_sources {
            match self.load_relationship(&source.type_name, &source.path).await {
                Ok(report) => relationships
                    .entry(source.type_name.clone())
                    .or_default()
                    .merge(&report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(relationship = %source.type_name, path = %source.path.display(), error = %e, "Relationship source skipped");
                    failures.push(SourceFailure {
                        type_name: source.type_name.clone(),
                        path: source.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        self.stage = BuildStage::RelationshipsLoaded;
        info!(types = relationships.len(), "Relationships stage complete");

        let stats = self.get_graph_stats().await?;
        self.stage = BuildStage::Done;

        info!(
            nodes = stats.total_nodes(),
            edges = stats.total_edges,
            failures = failures.len(),
            "Full graph build complete"
        );

        Ok(BuildReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            schema_statements,
            nodes,
            relationships,
            failures,
            stats,
        })
    }

    /// Read-only counts per registered node type and per edge type.
    pub async fn get_graph_stats(&self) -> RagResult<GraphStats> {
        let mut stats = GraphStats::default();

        let labels = self
            .registry
            .nodes()
            .map(|n| (n.name.clone(), n.label.clone()))
            .chain(self.registry.intermediates().map(|i| (i.name.clone(), i.label.clone())));
        for (name, label) in labels {
            let statement = Statement::new(format!("MATCH (n:{}) RETURN count(n) AS count", label))
                .returning(["count"]);
            let count = self
                .store
                .fetch(&statement)
                .await?
                .first()
                .and_then(|r| r.get_i64("count"))
                .unwrap_or(0);
            stats.nodes.insert(name, count);
        }

        let edges = Statement::new("MATCH ()-[r]->() RETURN type(r) AS edge, count(r) AS count")
            .returning(["edge", "count"]);
        for record in self.store.fetch(&edges).await? {
            if let (Some(edge), Some(count)) = (record.get_str("edge"), record.get_i64("count")) {
                stats.total_edges += count;
                stats.edges.insert(edge.to_string(), count);
            }
        }

        Ok(stats)
    }
}
