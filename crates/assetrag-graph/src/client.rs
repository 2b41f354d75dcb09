//! Neo4j connection client.

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Graph, Query, Row};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use assetrag_core::{ParamValue, RagError, RagResult, Record, Statement};

use crate::store::GraphStore;

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
    pub fetch_size: usize,
    pub connect_timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            max_connections: 16,
            fetch_size: 200,
            connect_timeout_secs: 10,
        }
    }
}

/// Client for the asset knowledge graph.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Create a new GraphClient from config.
    ///
    /// `Graph::connect` only builds the pool; the `RETURN 1` ping forces a
    /// real handshake so a caller's timeout fails fast on a dead server.
    pub async fn connect(config: &GraphConfig) -> RagResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| RagError::configuration(format!("invalid Neo4j config: {}", e)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| RagError::Connection(e.to_string()))?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| RagError::Connection(format!("Neo4j is not responding: {}", e)))?;

        Ok(Self { graph })
    }
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn run(&self, statement: &Statement) -> RagResult<()> {
        debug!(statement = %statement.text, "run");
        self.graph.run(to_query(statement)).await.map_err(classify)
    }

    async fn fetch(&self, statement: &Statement) -> RagResult<Vec<Record>> {
        debug!(statement = %statement.text, "fetch");
        let mut result = self.graph.execute(to_query(statement)).await.map_err(classify)?;

        let mut records = Vec::new();
        while let Some(row) = result.next().await.map_err(classify)? {
            records.push(to_record(&row, &statement.columns));
        }
        Ok(records)
    }
}

fn to_query(statement: &Statement) -> Query {
    let mut query = Query::new(statement.text.clone());
    for (name, value) in &statement.params {
        query = match value {
            ParamValue::String(s) => query.param(name, s.as_str()),
            ParamValue::Int(i) => query.param(name, *i),
            ParamValue::Float(f) => query.param(name, *f),
            ParamValue::Bool(b) => query.param(name, *b),
            ParamValue::List(items) => query.param(name, items.clone()),
        };
    }
    query
}

/// Lost connections abort the stage; anything else is a statement failure.
fn classify(e: neo4rs::Error) -> RagError {
    match e {
        neo4rs::Error::IOError { .. }
        | neo4rs::Error::ConnectionError
        | neo4rs::Error::AuthenticationError(_) => RagError::Connection(e.to_string()),
        other => RagError::Statement(other.to_string()),
    }
}

fn to_record(row: &Row, columns: &[String]) -> Record {
    let mut record = Record::new();
    for column in columns {
        record.insert(column, cell(row, column));
    }
    record
}

/// Any Bolt value, nested lists and maps included. Temporal values arrive
/// as strings; an absent column is null.
fn cell(row: &Row, column: &str) -> Value {
    row.get::<Value>(column).unwrap_or(Value::Null)
}
