//! Node and relationship loaders.
//!
//! Every loader turns a [`SourceTable`] into one parameterized statement per
//! row and runs them through [`execute_rows`], which absorbs per-row failures
//! into a [`LoadReport`] and only propagates fatal (connection) errors.

pub mod factory;
pub mod node;
pub mod relationship;
pub mod source;

pub use factory::{create_node_loader, create_relationship_loader, UNIVERSAL_RELATIONSHIP};
pub use node::{NodeLoader, NodeLoaderKind};
pub use relationship::RelationshipLoader;
pub use source::{SourceRow, SourceTable};

use std::collections::HashMap;

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use assetrag_core::schema::{NodeSchema, PropertyKind, PropertySpec};
use assetrag_core::{ParamValue, RagError, RagResult, SchemaRegistry, Statement};

use crate::store::GraphStore;

/// Per-file ingestion outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Nodes upserted, or edges merged for relationship loads.
    pub loaded: usize,
    /// Rows skipped for missing or malformed values.
    pub invalid: usize,
    /// Rows whose endpoint node did not exist.
    pub misses: usize,
    /// Rows whose statement was rejected by the store.
    pub failed: usize,
    /// Edges created by a node type's post-processing.
    pub linked: usize,
}

impl LoadReport {
    pub fn merge(&mut self, other: &LoadReport) {
        self.loaded += other.loaded;
        self.invalid += other.invalid;
        self.misses += other.misses;
        self.failed += other.failed;
        self.linked += other.linked;
    }
}

/// How a node type is matched when it is a relationship endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub node_type: String,
    pub label: String,
    pub id_field: String,
    pub id_kind: PropertyKind,
}

impl Endpoint {
    pub fn resolve(registry: &SchemaRegistry, node_type: &str) -> RagResult<Self> {
        registry.node(node_type).map(Self::from_schema)
    }

    pub fn from_schema(node: &NodeSchema) -> Self {
        let id_kind = node
            .properties
            .iter()
            .find(|p| p.name == node.id_field)
            .map(|p| p.kind)
            .unwrap_or_default();
        Self {
            node_type: node.name.clone(),
            label: node.label.clone(),
            id_field: node.id_field.clone(),
            id_kind,
        }
    }

    /// Coerce a raw id cell to the kind the node was stored with.
    pub fn id_value(&self, raw: &str) -> RagResult<ParamValue> {
        self.id_kind.coerce(raw)
    }
}

/// Walk the declared properties of a row, applying defaults and kinds.
///
/// A missing required property fails the row; a missing optional property
/// without a default is left out.
pub(crate) fn property_map(
    specs: &[PropertySpec],
    row: &SourceRow,
) -> RagResult<Vec<(String, ParamValue)>> {
    let mut props = Vec::with_capacity(specs.len());
    for spec in specs {
        match row.get(&spec.name).or(spec.default.as_deref()) {
            Some(raw) => {
                let value = spec
                    .kind
                    .coerce(raw)
                    .map_err(|e| RagError::validation(format!("{}: {}", spec.name, e)))?;
                props.push((spec.name.clone(), value));
            }
            None if spec.required => {
                return Err(RagError::validation(format!(
                    "required property '{}' is missing",
                    spec.name
                )))
            }
            None => {}
        }
    }
    Ok(props)
}

/// `SET alias.p = $p_p, ...` for the given properties, bound on `statement`.
pub(crate) fn set_properties(
    mut statement: Statement,
    alias: &str,
    props: &[(String, ParamValue)],
) -> Statement {
    if props.is_empty() {
        return statement;
    }
    let assignments: Vec<String> = props
        .iter()
        .map(|(name, _)| format!("{}.{} = $p_{}", alias, name, name))
        .collect();
    statement.text.push_str(&format!("\nSET {}", assignments.join(", ")));
    for (name, value) in props {
        statement.params.insert(format!("p_{}", name), value.clone());
    }
    statement
}

/// `MATCH` both endpoints, `MERGE` the edge, report whether it exists.
pub(crate) fn edge_statement(
    edge: &str,
    source: &Endpoint,
    source_id: ParamValue,
    target: &Endpoint,
    target_id: ParamValue,
    props: &[(String, ParamValue)],
) -> Statement {
    let text = format!(
        "MATCH (s:{} {{{}: $source_id}}), (t:{} {{{}: $target_id}})\nMERGE (s)-[r:{}]->(t)",
        source.label, source.id_field, target.label, target.id_field, edge
    );
    let mut statement = Statement::new(text)
        .param("source_id", source_id)
        .param("target_id", target_id);
    statement = set_properties(statement, "r", props);
    statement.text.push_str("\nRETURN count(r) AS linked");
    statement.returning(["linked"])
}

/// Endpoints an edge row expects to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkEnds {
    pub relationship: String,
    pub source_id: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expect {
    /// Node upsert; success means one node loaded.
    Upsert,
    /// Edge merge returning `linked`; zero means an endpoint is missing.
    Link(LinkEnds),
}

/// A row's statement plus what its success looks like.
#[derive(Debug, Clone)]
pub(crate) struct RowStatement {
    pub row: usize,
    pub expect: Expect,
    pub statement: Statement,
    /// Graph element the row writes. Within one batch a later row with the
    /// same key replaces an earlier one.
    pub key: String,
}

impl RowStatement {
    pub fn upsert(row: usize, statement: Statement, id: impl Into<String>) -> Self {
        Self {
            row,
            expect: Expect::Upsert,
            statement,
            key: id.into(),
        }
    }

    pub fn link(row: usize, statement: Statement, relationship: &str, source_id: &str, target_id: &str) -> Self {
        Self {
            row,
            expect: Expect::Link(LinkEnds {
                relationship: relationship.to_string(),
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            }),
            statement,
            key: format!("{} {} -> {}", relationship, source_id, target_id),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// The error reported when an edge row finds no endpoints.
    pub fn miss(&self) -> Option<RagError> {
        match &self.expect {
            Expect::Link(ends) => Some(RagError::ReferentialMiss {
                relationship: ends.relationship.clone(),
                source_id: ends.source_id.clone(),
                target_id: ends.target_id.clone(),
            }),
            Expect::Upsert => None,
        }
    }
}

/// One statement per key: the last row in source order, run at the
/// position of the first.
fn collapse_duplicates(rows: Vec<RowStatement>) -> Vec<RowStatement> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut unique: Vec<RowStatement> = Vec::with_capacity(rows.len());
    for row in rows {
        match positions.get(&row.key) {
            Some(&position) => {
                debug!(row = row.row, replaces = unique[position].row, target = %row.key, "Duplicate row supersedes earlier one");
                unique[position] = row;
            }
            None => {
                positions.insert(row.key.clone(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Loaded,
    Missed,
    Failed,
}

/// Run row statements concurrently. Rows sharing a key are collapsed first
/// so no two in-flight statements write the same element. Per-row failures
/// are counted; the first fatal error stops the batch and is returned.
pub(crate) async fn execute_rows(
    store: &dyn GraphStore,
    rows: Vec<RowStatement>,
    concurrency: usize,
) -> RagResult<LoadReport> {
    let outcomes: Vec<RowOutcome> = stream::iter(collapse_duplicates(rows))
        .map(|row| execute_row(store, row))
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    let mut report = LoadReport::default();
    for outcome in outcomes {
        match outcome {
            RowOutcome::Loaded => report.loaded += 1,
            RowOutcome::Missed => report.misses += 1,
            RowOutcome::Failed => report.failed += 1,
        }
    }
    Ok(report)
}

async fn execute_row(store: &dyn GraphStore, row: RowStatement) -> RagResult<RowOutcome> {
    let result = match row.expect {
        Expect::Upsert => store.run(&row.statement).await.map(|_| RowOutcome::Loaded),
        Expect::Link(_) => store.fetch(&row.statement).await.map(|records| {
            let linked = records
                .first()
                .and_then(|r| r.get_i64("linked"))
                .unwrap_or(0);
            if linked > 0 {
                RowOutcome::Loaded
            } else {
                RowOutcome::Missed
            }
        }),
    };

    match result {
        Ok(RowOutcome::Missed) => {
            if let Some(miss) = row.miss() {
                warn!(row = row.row, error = %miss, "Row skipped");
            }
            Ok(RowOutcome::Missed)
        }
        Ok(outcome) => {
            debug!(row = row.row, target = %row.key, "Row written");
            Ok(outcome)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(row = row.row, target = %row.key, error = %e, "Row statement failed");
            Ok(RowOutcome::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn spec(name: &str, kind: PropertyKind, required: bool, default: Option<&str>) -> PropertySpec {
        PropertySpec {
            name: name.to_string(),
            kind,
            required,
            default: default.map(str::to_string),
        }
    }

    #[test]
    fn test_property_map_defaults_and_kinds() {
        let specs = vec![
            spec("asset_id", PropertyKind::String, true, None),
            spec("star_level", PropertyKind::Int, false, Some("0")),
            spec("owner", PropertyKind::String, false, None),
        ];
        let row = SourceRow::new(0).with("asset_id", "A1");
        let props = property_map(&specs, &row).unwrap();
        assert_eq!(
            props,
            vec![
                ("asset_id".to_string(), ParamValue::from("A1")),
                ("star_level".to_string(), ParamValue::Int(0)),
            ]
        );
    }

    #[test]
    fn test_property_map_rejects_missing_required_and_bad_kind() {
        let specs = vec![
            spec("asset_id", PropertyKind::String, true, None),
            spec("star_level", PropertyKind::Int, false, None),
        ];
        assert!(property_map(&specs, &SourceRow::new(0)).is_err());
        let row = SourceRow::new(0).with("asset_id", "A1").with("star_level", "high");
        assert!(matches!(property_map(&specs, &row), Err(RagError::Validation(_))));
    }

    #[test]
    fn test_edge_statement_binds_ids() {
        let registry = SchemaRegistry::builtin().unwrap();
        let asset = Endpoint::resolve(&registry, "Asset").unwrap();
        let domain = Endpoint::resolve(&registry, "BusinessDomain").unwrap();
        let stmt = edge_statement("BELONGS_TO", &asset, "A1".into(), &domain, "D1".into(), &[]);
        assert_eq!(
            stmt.text,
            "MATCH (s:Asset {asset_id: $source_id}), (t:BusinessDomain {domain_id: $target_id})\n\
             MERGE (s)-[r:BELONGS_TO]->(t)\nRETURN count(r) AS linked"
        );
        assert_eq!(stmt.columns, vec!["linked".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_rows_counts_misses() {
        let registry = SchemaRegistry::builtin().unwrap();
        let user = Endpoint::resolve(&registry, "User").unwrap();
        let asset = Endpoint::resolve(&registry, "Asset").unwrap();
        let rows = vec![
            RowStatement::link(0, edge_statement("FAVORITED", &user, "U1".into(), &asset, "A1".into(), &[]), "FAVORITED", "U1", "A1"),
            RowStatement::link(1, edge_statement("FAVORITED", &user, "U2".into(), &asset, "A1".into(), &[]), "FAVORITED", "U2", "A1"),
        ];
        let store = MemoryStore::new().with_missing(&["U2"]);
        let report = execute_rows(&store, rows, 4).await.unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(report.misses, 1);
    }

    #[test]
    fn test_edge_miss_names_both_endpoints() {
        let row = RowStatement::link(3, Statement::new("RETURN 0 AS linked"), "FAVORITED", "U2", "A1");
        let miss = row.miss().unwrap();
        assert!(matches!(
            &miss,
            RagError::ReferentialMiss { relationship, source_id, target_id }
                if relationship == "FAVORITED" && source_id == "U2" && target_id == "A1"
        ));
        assert!(!miss.is_fatal());
        assert!(RowStatement::upsert(0, Statement::new("MERGE (n:Org {org_id: $id})"), "O1")
            .miss()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_keys_run_once_with_last_row() {
        let rows = vec![
            RowStatement::upsert(0, Statement::new("MERGE (n:Org {org_id: $id})").param("name", "旧"), "O1"),
            RowStatement::upsert(1, Statement::new("MERGE (n:Org {org_id: $id})").param("name", "甲"), "O2"),
            RowStatement::upsert(2, Statement::new("MERGE (n:Org {org_id: $id})").param("name", "新"), "O1"),
        ];
        let store = MemoryStore::new();
        let report = execute_rows(&store, rows, 4).await.unwrap();
        assert_eq!(report.loaded, 2);

        let statements = store.statements();
        assert_eq!(statements.len(), 2);
        let names: Vec<_> = statements.iter().filter_map(|s| s.get_param("name").cloned()).collect();
        assert!(names.contains(&ParamValue::from("新")));
        assert!(!names.contains(&ParamValue::from("旧")));
    }

    #[tokio::test]
    async fn test_connection_loss_is_fatal() {
        let rows = vec![RowStatement::upsert(0, Statement::new("MERGE (n:Org {org_id: $id})"), "O1")];
        let err = execute_rows(&MemoryStore::unreachable(), rows, 1).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
