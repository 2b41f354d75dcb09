//! `assetrag.toml` settings.
//!
//! ```toml
//! schema = "config/schema.toml"
//!
//! [graph]
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! password = "password"
//!
//! [ingest]
//! concurrency = 8
//! data_dir = "data"
//!
//! [[sources.nodes]]
//! type = "Asset"
//! path = "assets.csv"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use assetrag_core::{RagResult, SchemaRegistry};

use crate::client::GraphConfig;

/// Row upserts in flight per node or relationship type.
pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub concurrency: usize,
    /// Base directory for relative source paths.
    pub data_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            data_dir: PathBuf::from("."),
        }
    }
}

/// One source file bound to a node or relationship type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    pub path: PathBuf,
}

impl SourceSpec {
    pub fn new(type_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            type_name: type_name.into(),
            path: path.into(),
        }
    }
}

/// Source files in load order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub nodes: Vec<SourceSpec>,
    pub relationships: Vec<SourceSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub graph: GraphConfig,
    pub ingest: IngestConfig,
    /// Custom schema catalog; the built-in one is used when absent.
    pub schema: Option<PathBuf>,
    pub sources: SourcesConfig,
}

impl Settings {
    pub fn from_toml_str(content: &str) -> RagResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from `path`, falling back to defaults when the file
    /// does not exist. Environment overrides are applied either way.
    pub fn load(path: &Path) -> RagResult<Self> {
        let mut settings = if path.exists() {
            Self::from_toml_str(&std::fs::read_to_string(path)?)?
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
            Self::default()
        };
        settings.apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Apply `NEO4J_URI`, `NEO4J_USER` and `NEO4J_PASSWORD`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = lookup("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(user) = lookup("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Some(password) = lookup("NEO4J_PASSWORD") {
            self.graph.password = password;
        }
    }

    pub fn registry(&self) -> RagResult<SchemaRegistry> {
        match &self.schema {
            Some(path) => SchemaRegistry::from_path(path),
            None => SchemaRegistry::builtin(),
        }
    }

    /// Resolve a source path against `ingest.data_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.ingest.data_dir.join(path)
        }
    }

    pub fn node_sources(&self) -> Vec<SourceSpec> {
        self.resolved(&self.sources.nodes)
    }

    pub fn relationship_sources(&self) -> Vec<SourceSpec> {
        self.resolved(&self.sources.relationships)
    }

    fn resolved(&self, specs: &[SourceSpec]) -> Vec<SourceSpec> {
        specs
            .iter()
            .map(|s| SourceSpec::new(s.type_name.clone(), self.resolve(&s.path)))
            .collect()
    }
}
