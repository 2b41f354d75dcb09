//! The seam between ingestion/retrieval and the graph driver.

use async_trait::async_trait;

use assetrag_core::{RagResult, Record, Statement};

/// A graph store that executes parameterized statements.
///
/// Each call is one short-lived session: the implementation acquires a
/// connection, runs the statement and releases it.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a statement whose result is not needed.
    async fn run(&self, statement: &Statement) -> RagResult<()>;

    /// Execute a statement and collect the declared columns of every row.
    async fn fetch(&self, statement: &Statement) -> RagResult<Vec<Record>>;
}

#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;
    use assetrag_core::{ParamValue, RagError};

    /// Records every statement; reports `linked = 0` for statements that
    /// reference one of the configured missing ids.
    #[derive(Default)]
    pub struct MemoryStore {
        statements: Mutex<Vec<Statement>>,
        missing: HashSet<String>,
        rows: Vec<Record>,
        unreachable: bool,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_missing(mut self, ids: &[&str]) -> Self {
            self.missing = ids.iter().map(|s| s.to_string()).collect();
            self
        }

        pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
            self.rows = rows;
            self
        }

        pub fn unreachable() -> Self {
            Self {
                unreachable: true,
                ..Self::default()
            }
        }

        pub fn statements(&self) -> Vec<Statement> {
            self.statements.lock().unwrap().clone()
        }

        pub fn texts(&self) -> Vec<String> {
            self.statements().into_iter().map(|s| s.text).collect()
        }

        fn record(&self, statement: &Statement) -> RagResult<()> {
            if self.unreachable {
                return Err(RagError::Connection("connection refused".into()));
            }
            self.statements.lock().unwrap().push(statement.clone());
            Ok(())
        }

        fn references_missing(&self, statement: &Statement) -> bool {
            ["source_id", "target_id"].iter().any(|key| {
                matches!(statement.get_param(key), Some(ParamValue::String(id)) if self.missing.contains(id))
            })
        }
    }

    #[async_trait]
    impl GraphStore for MemoryStore {
        async fn run(&self, statement: &Statement) -> RagResult<()> {
            self.record(statement)
        }

        async fn fetch(&self, statement: &Statement) -> RagResult<Vec<Record>> {
            self.record(statement)?;
            if statement.columns == ["linked"] {
                let linked = if self.references_missing(statement) { 0 } else { 1 };
                return Ok(vec![Record::new().with("linked", linked)]);
            }
            Ok(self.rows.clone())
        }
    }
}
