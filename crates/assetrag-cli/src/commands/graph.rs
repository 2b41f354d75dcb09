//! Knowledge Graph CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use assetrag_graph::schema::{constraint_statements, index_statements};
use assetrag_graph::{GraphBuilder, Settings};

use crate::output;

#[derive(Subcommand)]
pub enum GraphCommands {
    /// Create constraints and indexes
    Init,

    /// Load every configured source, in order
    Build {
        /// Delete the whole graph first
        #[arg(long)]
        clear: bool,
        /// Required together with --clear
        #[arg(long)]
        confirm: bool,
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load one node source file
    LoadNode {
        /// Node type (Asset, Field, BusinessDomain, ...)
        node_type: String,
        /// CSV file, relative to ingest.data_dir
        path: PathBuf,
    },

    /// Load one relationship source file
    LoadRel {
        /// Relationship type (BELONGS_TO, AssetUsage, UNIVERSAL, ...)
        rel_type: String,
        /// CSV file, relative to ingest.data_dir
        path: PathBuf,
    },

    /// Delete every node and relationship
    Clear {
        #[arg(long)]
        confirm: bool,
    },

    /// Show node and relationship counts
    Stats,

    /// Print the registry and the DDL derived from it
    Schema,
}

pub async fn execute(cmd: GraphCommands, settings: &Settings) -> Result<()> {
    let registry = Arc::new(settings.registry().context("Failed to load schema catalog")?);

    if let GraphCommands::Schema = cmd {
        output::print_schema(&registry, &constraint_statements(&registry), &index_statements(&registry));
        return Ok(());
    }
    if let GraphCommands::Clear { confirm: false } | GraphCommands::Build { clear: true, confirm: false, .. } = cmd {
        bail!("Refusing to clear the graph without --confirm");
    }

    let client = super::connect(settings).await?;
    let mut builder = GraphBuilder::new(client, registry).with_concurrency(settings.ingest.concurrency);

    match cmd {
        GraphCommands::Init => {
            let count = builder.create_constraints_and_indexes().await?;
            println!("{} {} statements", "Schema initialized:".green().bold(), count);
        }
        GraphCommands::Build { clear, json, .. } => {
            if clear {
                builder.clear_graph().await?;
            }
            if !json {
                println!("{}", "Building Knowledge Graph...".bold());
            }
            let report = builder
                .build_full_graph(&settings.node_sources(), &settings.relationship_sources())
                .await
                .context("Graph build aborted")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_build_report(&report);
            }
        }
        GraphCommands::LoadNode { node_type, path } => {
            let path = settings.resolve(&path);
            let report = builder
                .load_node(&node_type, &path)
                .await
                .with_context(|| format!("Failed to load {} from {}", node_type, path.display()))?;
            output::print_load_report(&node_type, &report);
        }
        GraphCommands::LoadRel { rel_type, path } => {
            let path = settings.resolve(&path);
            let report = builder
                .load_relationship(&rel_type, &path)
                .await
                .with_context(|| format!("Failed to load {} from {}", rel_type, path.display()))?;
            output::print_load_report(&rel_type, &report);
        }
        GraphCommands::Clear { .. } => {
            builder.clear_graph().await?;
            println!("{}", "Graph cleared.".yellow());
        }
        GraphCommands::Stats => {
            let stats = builder.get_graph_stats().await?;
            output::print_stats(&stats);
        }
        GraphCommands::Schema => {}
    }

    Ok(())
}
