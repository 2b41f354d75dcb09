//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use assetrag_graph::{GraphClient, Settings};

pub mod graph;
pub mod query;

/// AssetRAG - asset knowledge graph ingestion and retrieval
#[derive(Parser)]
#[command(name = "assetrag")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = "assetrag.toml", env = "ASSETRAG_CONFIG")]
    pub config: PathBuf,

    /// Also write logs to this file (no ANSI colors)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Knowledge Graph commands
    #[command(subcommand)]
    Graph(graph::GraphCommands),

    /// Compile a classified intent into Cypher without running it
    Compile(query::CompileArgs),

    /// Compile, execute and format a classified intent
    Ask(query::AskArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let settings = Settings::load(&self.config)
            .with_context(|| format!("Failed to load settings from {}", self.config.display()))?;

        match self.command {
            Commands::Graph(cmd) => graph::execute(cmd, &settings).await,
            Commands::Compile(args) => query::compile(args),
            Commands::Ask(args) => query::ask(args, &settings).await,
        }
    }
}

/// Connect to Neo4j, giving up after `connect_timeout_secs`.
pub(crate) async fn connect(settings: &Settings) -> Result<Arc<GraphClient>> {
    let secs = settings.graph.connect_timeout_secs;
    let client = tokio::time::timeout(
        Duration::from_secs(secs),
        GraphClient::connect(&settings.graph),
    )
    .await
    .map_err(|_| {
        anyhow::anyhow!(
            "Timed out after {}s connecting to Neo4j at {}",
            secs,
            settings.graph.uri
        )
    })?
    .with_context(|| format!("Failed to connect to Neo4j at {}", settings.graph.uri))?;
    info!(uri = %settings.graph.uri, database = %settings.graph.database, "Connected to Neo4j");
    Ok(Arc::new(client))
}
