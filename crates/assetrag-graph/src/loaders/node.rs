//! Node loading: one shared upsert, per-type preprocess/postprocess hooks.

use tracing::{info, warn};

use assetrag_core::schema::NodeSchema;
use assetrag_core::{ParamValue, RagError, RagResult, Statement};

use super::{edge_statement, execute_rows, property_map, set_properties};
use super::{Endpoint, LoadReport, RowStatement, SourceRow, SourceTable};
use crate::store::GraphStore;

/// Edge created by the Field post-processing hook.
pub const HAS_FIELD: &str = "HAS_FIELD";

/// Per-type behavior wrapped around the shared upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeLoaderKind {
    /// Fills an empty `value_score` with `0` before upserting.
    Asset,
    /// Links each field to the asset named in its `asset_id` column.
    Field { owner: Endpoint },
    Generic,
}

impl NodeLoaderKind {
    fn preprocess(&self, table: &mut SourceTable) {
        if let Self::Asset = self {
            for row in table.rows_mut() {
                if row.get("value_score").is_none() {
                    row.set("value_score", "0");
                }
            }
        }
    }

    fn postprocess(&self, schema: &NodeSchema, table: &SourceTable) -> Vec<RowStatement> {
        let Self::Field { owner } = self else {
            return Vec::new();
        };
        let field = Endpoint::from_schema(schema);

        table
            .rows()
            .iter()
            .filter_map(|row| {
                let asset_raw = row.get(&owner.id_field)?;
                let field_raw = row.get(&field.id_field)?;
                let asset_id = owner.id_value(asset_raw).ok()?;
                let field_id = field.id_value(field_raw).ok()?;
                let statement = edge_statement(HAS_FIELD, owner, asset_id, &field, field_id, &[]);
                Some(RowStatement::link(row.index(), statement, HAS_FIELD, asset_raw, field_raw))
            })
            .collect()
    }
}

/// Loader for one node type.
#[derive(Debug, Clone)]
pub struct NodeLoader {
    schema: NodeSchema,
    kind: NodeLoaderKind,
}

impl NodeLoader {
    pub fn new(schema: NodeSchema, kind: NodeLoaderKind) -> Self {
        Self { schema, kind }
    }

    pub fn node_type(&self) -> &str {
        &self.schema.name
    }

    pub fn kind(&self) -> &NodeLoaderKind {
        &self.kind
    }

    /// Upsert every valid row, then run the type's post-processing.
    ///
    /// Fails only when required columns are absent from the file or the
    /// store connection is lost.
    pub async fn load(
        &self,
        store: &dyn GraphStore,
        mut table: SourceTable,
        concurrency: usize,
    ) -> RagResult<LoadReport> {
        table.require_columns(self.schema.required_properties().map(|p| p.name.as_str()))?;
        self.kind.preprocess(&mut table);

        let mut report = LoadReport {
            invalid: table.undecodable(),
            ..LoadReport::default()
        };
        let mut upserts = Vec::with_capacity(table.len());
        for row in table.rows() {
            match self.upsert_statement(row) {
                Ok((id, statement)) => upserts.push(RowStatement::upsert(row.index(), statement, id)),
                Err(e) => {
                    warn!(node_type = %self.schema.name, row = row.index(), error = %e, "Skipping invalid row");
                    report.invalid += 1;
                }
            }
        }
        report.merge(&execute_rows(store, upserts, concurrency).await?);

        let links = self.kind.postprocess(&self.schema, &table);
        if !links.is_empty() {
            let linked = execute_rows(store, links, concurrency).await?;
            report.linked += linked.loaded;
            report.misses += linked.misses;
            report.failed += linked.failed;
        }

        info!(
            node_type = %self.schema.name,
            source = table.name(),
            loaded = report.loaded,
            invalid = report.invalid,
            linked = report.linked,
            misses = report.misses,
            "Nodes loaded"
        );
        Ok(report)
    }

    /// `MERGE` on the id field, `SET` every other present property.
    fn upsert_statement(&self, row: &SourceRow) -> RagResult<(String, Statement)> {
        let mut props = property_map(&self.schema.properties, row)?;
        let position = props
            .iter()
            .position(|(name, _)| name == &self.schema.id_field)
            .ok_or_else(|| RagError::validation(format!("{} is missing", self.schema.id_field)))?;
        let (_, id) = props.remove(position);
        let key = match &id {
            ParamValue::String(s) => s.clone(),
            other => other.to_string(),
        };

        let statement = Statement::new(format!(
            "MERGE (n:{} {{{}: $id}})",
            self.schema.label, self.schema.id_field
        ))
        .param("id", id);
        Ok((key, set_properties(statement, "n", &props)))
    }
}
