//! Neo4j schema initialization (constraints and indexes).

use tracing::info;

use assetrag_core::schema::IndexKind;
use assetrag_core::{RagResult, SchemaRegistry, Statement};

use crate::store::GraphStore;

/// Uniqueness constraints: one per node type id field and one per
/// intermediate node key.
pub fn constraint_statements(registry: &SchemaRegistry) -> Vec<String> {
    let nodes = registry.nodes().map(|n| (n.label.as_str(), n.id_field.as_str()));
    let intermediates = registry
        .intermediates()
        .map(|i| (i.label.as_str(), i.key_field.as_str()));

    nodes
        .chain(intermediates)
        .map(|(label, field)| {
            format!(
                "CREATE CONSTRAINT {}_{}_unique IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                label.to_lowercase(),
                field,
                label,
                field
            )
        })
        .collect()
}

/// Secondary indexes declared in the registry.
pub fn index_statements(registry: &SchemaRegistry) -> Vec<String> {
    registry
        .indexes()
        .iter()
        .filter_map(|index| {
            let label = &registry.node(&index.node_type).ok()?.label;
            let suffix = match index.kind {
                IndexKind::Index => "index",
                IndexKind::Composite => "composite",
            };
            let properties: Vec<String> = index.fields.iter().map(|f| format!("n.{}", f)).collect();
            Some(format!(
                "CREATE INDEX {}_{}_{} IF NOT EXISTS FOR (n:{}) ON ({})",
                label.to_lowercase(),
                index.fields.join("_"),
                suffix,
                label,
                properties.join(", ")
            ))
        })
        .collect()
}

/// Create every constraint, then every index.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses. Statements run
/// one after another so nothing is loaded against a half-built schema.
pub async fn initialize_schema(store: &dyn GraphStore, registry: &SchemaRegistry) -> RagResult<usize> {
    info!("Initializing Neo4j schema...");

    let statements: Vec<String> = constraint_statements(registry)
        .into_iter()
        .chain(index_statements(registry))
        .collect();
    for text in &statements {
        store.run(&Statement::new(text.as_str())).await?;
    }

    info!(statements = statements.len(), "Neo4j schema initialized");
    Ok(statements.len())
}
