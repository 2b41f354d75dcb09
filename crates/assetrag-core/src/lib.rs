//! AssetRAG Core Library
//!
//! Store-independent logic for the asset knowledge graph: the schema
//! registry that drives ingestion, the intent/slot model produced by the
//! upstream classifier, the intent-to-Cypher compiler and the context
//! formatter that feeds answer generation.

pub mod compiler;
pub mod context;
pub mod error;
pub mod intent;
pub mod schema;
pub mod statement;

pub use compiler::{compile, QueryShape, QueryTemplate};
pub use context::{format_context, NO_DATA_CONTEXT};
pub use error::{RagError, RagResult};
pub use intent::{IntentCode, IntentResult, Slot, SlotCode};
pub use schema::SchemaRegistry;
pub use statement::{ParamValue, Record, Statement};
