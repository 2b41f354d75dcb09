//! # AssetRAG Graph
//!
//! Neo4j side of AssetRAG: loads tabular sources into the asset knowledge
//! graph under the schema registry, and executes compiled intent queries to
//! produce retrieval context.

pub mod builder;
pub mod client;
pub mod config;
pub mod loaders;
pub mod retrieval;
pub mod schema;
pub mod store;

pub use builder::{BuildReport, BuildStage, GraphBuilder, GraphStats};
pub use client::{GraphClient, GraphConfig};
pub use config::{Settings, SourceSpec};
pub use loaders::LoadReport;
pub use retrieval::{GenerationInput, Retriever};
pub use schema::initialize_schema;
pub use store::GraphStore;
