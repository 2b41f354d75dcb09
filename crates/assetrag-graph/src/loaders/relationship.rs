//! Relationship loading in three variants sharing one `load` contract.

use std::collections::BTreeMap;

use tracing::{info, warn};

use assetrag_core::schema::{IntermediateSchema, PropertySpec};
use assetrag_core::statement::is_safe_identifier;
use assetrag_core::{RagError, RagResult, Statement};

use super::{edge_statement, execute_rows, property_map, set_properties};
use super::{Endpoint, LoadReport, RowStatement, SourceRow, SourceTable};
use crate::store::GraphStore;

/// Columns of the universal relationship table.
pub const UNIVERSAL_COLUMNS: [&str; 5] = [
    "source_type",
    "source_id",
    "target_type",
    "target_id",
    "relationship_type",
];

/// A typed edge between two registered node types.
#[derive(Debug, Clone)]
pub struct SimpleLoader {
    pub name: String,
    pub edge: String,
    pub source: Endpoint,
    pub target: Endpoint,
    pub source_column: String,
    pub target_column: String,
    pub properties: Vec<PropertySpec>,
}

/// A many-to-many relation materialized as its own node.
#[derive(Debug, Clone)]
pub struct IntermediateLoader {
    pub schema: IntermediateSchema,
    pub source: Endpoint,
    pub target: Endpoint,
}

/// Edges whose endpoint types and name come from each row.
#[derive(Debug, Clone)]
pub struct UniversalLoader {
    pub endpoints: BTreeMap<String, Endpoint>,
}

#[derive(Debug, Clone)]
pub enum RelationshipLoader {
    Simple(SimpleLoader),
    Intermediate(IntermediateLoader),
    Universal(UniversalLoader),
}

impl RelationshipLoader {
    pub fn name(&self) -> &str {
        match self {
            Self::Simple(l) => &l.name,
            Self::Intermediate(l) => &l.schema.name,
            Self::Universal(_) => super::UNIVERSAL_RELATIONSHIP,
        }
    }

    fn required_columns(&self) -> Vec<&str> {
        match self {
            Self::Simple(l) => vec![l.source_column.as_str(), l.target_column.as_str()],
            Self::Intermediate(l) => vec![l.source.id_field.as_str(), l.target.id_field.as_str()],
            Self::Universal(_) => UNIVERSAL_COLUMNS.to_vec(),
        }
    }

    /// Merge one edge (or intermediate node) per valid row.
    ///
    /// Rows whose endpoints do not exist are counted as misses; nothing is
    /// created for them.
    pub async fn load(
        &self,
        store: &dyn GraphStore,
        table: SourceTable,
        concurrency: usize,
    ) -> RagResult<LoadReport> {
        table.require_columns(self.required_columns())?;

        let mut report = LoadReport {
            invalid: table.undecodable(),
            ..LoadReport::default()
        };
        let mut links = Vec::with_capacity(table.len());
        for row in table.rows() {
            let planned = match self {
                Self::Simple(l) => l.plan(row),
                Self::Intermediate(l) => l.plan(row),
                Self::Universal(l) => l.plan(row),
            };
            match planned {
                Ok(link) => links.push(link),
                Err(e) => {
                    warn!(relationship = self.name(), row = row.index(), error = %e, "Skipping invalid row");
                    report.invalid += 1;
                }
            }
        }
        report.merge(&execute_rows(store, links, concurrency).await?);

        info!(
            relationship = self.name(),
            source = table.name(),
            loaded = report.loaded,
            invalid = report.invalid,
            misses = report.misses,
            "Relationships loaded"
        );
        Ok(report)
    }
}

fn cell<'a>(row: &'a SourceRow, column: &str) -> RagResult<&'a str> {
    row.get(column)
        .ok_or_else(|| RagError::validation(format!("'{}' is empty", column)))
}

impl SimpleLoader {
    fn plan(&self, row: &SourceRow) -> RagResult<RowStatement> {
        let source_raw = cell(row, &self.source_column)?;
        let target_raw = cell(row, &self.target_column)?;
        let props = property_map(&self.properties, row)?;
        let statement = edge_statement(
            &self.edge,
            &self.source,
            self.source.id_value(source_raw)?,
            &self.target,
            self.target.id_value(target_raw)?,
            &props,
        );
        Ok(RowStatement::link(row.index(), statement, &self.edge, source_raw, target_raw))
    }
}

impl IntermediateLoader {
    /// `{prefix}_{source}_{target}_{row}`; the row index keeps repeated
    /// pairs distinct and stable across runs.
    pub fn key(&self, source_id: &str, target_id: &str, row: usize) -> String {
        format!("{}_{}_{}_{}", self.schema.key_prefix, source_id, target_id, row)
    }

    fn plan(&self, row: &SourceRow) -> RagResult<RowStatement> {
        let source_raw = cell(row, &self.source.id_field)?;
        let target_raw = cell(row, &self.target.id_field)?;
        let props = property_map(&self.schema.properties, row)?;
        let key = self.key(source_raw, target_raw, row.index());

        let s = &self.schema;
        let statement = Statement::new(format!(
            "MATCH (s:{} {{{}: $source_id}}), (t:{} {{{}: $target_id}})\nMERGE (u:{} {{{}: $key}})",
            self.source.label, self.source.id_field, self.target.label, self.target.id_field, s.label, s.key_field
        ))
        .param("source_id", self.source.id_value(source_raw)?)
        .param("target_id", self.target.id_value(target_raw)?)
        .param("key", key.as_str());

        let mut statement = set_properties(statement, "u", &props);
        statement.text.push_str(&format!(
            "\nMERGE (s)-[:{}]->(u)\nMERGE (t)-[:{}]->(u)\nRETURN count(u) AS linked",
            s.source_edge, s.target_edge
        ));
        Ok(
            RowStatement::link(row.index(), statement.returning(["linked"]), &s.name, source_raw, target_raw)
                .with_key(key),
        )
    }
}

impl UniversalLoader {
    fn endpoint(&self, node_type: &str) -> RagResult<&Endpoint> {
        self.endpoints
            .get(node_type)
            .ok_or_else(|| RagError::validation(format!("unregistered node type '{}'", node_type)))
    }

    fn plan(&self, row: &SourceRow) -> RagResult<RowStatement> {
        let source = self.endpoint(cell(row, "source_type")?)?;
        let target = self.endpoint(cell(row, "target_type")?)?;
        let source_raw = cell(row, "source_id")?;
        let target_raw = cell(row, "target_id")?;
        let edge = cell(row, "relationship_type")?;
        if !is_safe_identifier(edge) {
            return Err(RagError::validation(format!("invalid relationship type '{}'", edge)));
        }

        let statement = edge_statement(
            edge,
            source,
            source.id_value(source_raw)?,
            target,
            target.id_value(target_raw)?,
            &[],
        );
        Ok(RowStatement::link(row.index(), statement, edge, source_raw, target_raw))
    }
}
