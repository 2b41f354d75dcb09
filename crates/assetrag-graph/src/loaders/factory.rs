//! Loader selection by type name.

use tracing::debug;

use assetrag_core::{RagError, RagResult, SchemaRegistry};

use super::node::{NodeLoader, NodeLoaderKind};
use super::relationship::{IntermediateLoader, RelationshipLoader, SimpleLoader, UniversalLoader};
use super::Endpoint;

/// Relationship type name that selects the universal loader.
pub const UNIVERSAL_RELATIONSHIP: &str = "UNIVERSAL";

/// Build the loader for a registered node type.
///
/// `Asset` and `Field` get their specialized hooks; every other type uses the
/// generic loader. Unregistered types fail with `SchemaNotFound`.
pub fn create_node_loader(registry: &SchemaRegistry, node_type: &str) -> RagResult<NodeLoader> {
    let schema = registry.node(node_type)?.clone();
    let kind = match node_type {
        "Asset" => NodeLoaderKind::Asset,
        "Field" => match Endpoint::resolve(registry, "Asset") {
            Ok(owner) => NodeLoaderKind::Field { owner },
            Err(_) => NodeLoaderKind::Generic,
        },
        _ => NodeLoaderKind::Generic,
    };
    debug!(node_type, kind = ?kind, "Node loader selected");
    Ok(NodeLoader::new(schema, kind))
}

/// Build the loader for a relationship type.
///
/// Intermediate-node relations and the universal table are recognized by
/// name; anything else must be a registered simple relationship, otherwise a
/// `Configuration` error is returned.
pub fn create_relationship_loader(
    registry: &SchemaRegistry,
    rel_type: &str,
) -> RagResult<RelationshipLoader> {
    if rel_type.eq_ignore_ascii_case(UNIVERSAL_RELATIONSHIP) {
        let endpoints = registry
            .nodes()
            .map(|node| (node.name.clone(), Endpoint::from_schema(node)))
            .collect();
        return Ok(RelationshipLoader::Universal(UniversalLoader { endpoints }));
    }

    if let Ok(schema) = registry.intermediate(rel_type) {
        return Ok(RelationshipLoader::Intermediate(IntermediateLoader {
            source: Endpoint::resolve(registry, &schema.source)?,
            target: Endpoint::resolve(registry, &schema.target)?,
            schema: schema.clone(),
        }));
    }

    let rel = registry.relationship(rel_type).map_err(|_| {
        RagError::configuration(format!("no loader for relationship type '{}'", rel_type))
    })?;
    let source = Endpoint::resolve(registry, &rel.source)?;
    let target = Endpoint::resolve(registry, &rel.target)?;
    Ok(RelationshipLoader::Simple(SimpleLoader {
        name: rel.name.clone(),
        edge: rel.edge.clone(),
        source_column: rel.source_column.clone().unwrap_or_else(|| source.id_field.clone()),
        target_column: rel.target_column.clone().unwrap_or_else(|| target.id_field.clone()),
        source,
        target,
        properties: rel.properties.clone(),
    }))
}
