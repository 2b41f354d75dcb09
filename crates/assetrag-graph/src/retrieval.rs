//! Query-time pipeline: compile, execute, format.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use assetrag_core::{
    compile, format_context, IntentCode, IntentResult, QueryTemplate, Record, NO_DATA_CONTEXT,
};

use crate::store::GraphStore;

/// What the answer generator receives.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationInput {
    pub query_text: String,
    pub context_text: String,
    pub intent: IntentCode,
    pub template: Option<QueryTemplate>,
    pub rows: Vec<Record>,
    pub is_platform_help: bool,
}

pub struct Retriever {
    store: Arc<dyn GraphStore>,
}

impl Retriever {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Build the generator input for a classified query.
    ///
    /// Never fails: platform help yields an empty context, and any compile
    /// or execution failure yields [`NO_DATA_CONTEXT`].
    pub async fn retrieve(&self, query_text: &str, intent: &IntentResult) -> GenerationInput {
        let mut input = GenerationInput {
            query_text: query_text.to_string(),
            context_text: NO_DATA_CONTEXT.to_string(),
            intent: intent.intent,
            template: None,
            rows: Vec::new(),
            is_platform_help: false,
        };

        let template = match compile(intent.intent, &intent.slots) {
            Ok(Some(template)) => template,
            Ok(None) => {
                input.context_text.clear();
                input.is_platform_help = true;
                return input;
            }
            Err(e) => {
                warn!(intent = intent.intent.code(), error = %e, "Compile rejected, answering without graph context");
                return input;
            }
        };

        match self.store.fetch(&template.statement).await {
            Ok(rows) => {
                info!(
                    intent = intent.intent.code(),
                    shape = ?template.shape,
                    rows = rows.len(),
                    "Retrieved graph context"
                );
                input.context_text = format_context(&rows, intent.intent);
                input.rows = rows;
            }
            Err(e) => {
                warn!(intent = intent.intent.code(), error = %e, "Graph query failed, answering without graph context");
            }
        }
        input.template = Some(template);
        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use assetrag_core::{QueryShape, Slot, SlotCode};

    fn search(domain: &str) -> IntentResult {
        IntentResult::new(
            IntentCode::AssetBasicSearch,
            vec![Slot::new(SlotCode::BusinessDomain, domain)],
        )
    }

    #[tokio::test]
    async fn test_rows_are_formatted() {
        let rows = vec![Record::new().with("name", "HR系统").with("domain", "M域")];
        let store = Arc::new(MemoryStore::new().with_rows(rows));
        let retriever = Retriever::new(store.clone());

        let input = retriever.retrieve("M域有哪些资产", &search("M域")).await;
        assert_eq!(input.context_text, "【1】资产\n名称: HR系统\n业务域: M域");
        assert_eq!(input.template.unwrap().shape, QueryShape::DomainFilter);
        assert!(!input.is_platform_help);
        assert_eq!(store.statements().len(), 1);
    }

    #[tokio::test]
    async fn test_platform_help_skips_the_graph() {
        let store = Arc::new(MemoryStore::new());
        let retriever = Retriever::new(store.clone());
        let input = retriever.retrieve("怎么申请权限", &IntentResult::platform_help()).await;
        assert!(input.is_platform_help);
        assert!(input.context_text.is_empty());
        assert!(input.template.is_none());
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_slot_yields_no_data() {
        let store = Arc::new(MemoryStore::new());
        let retriever = Retriever::new(store.clone());
        let input = retriever.retrieve("q", &search("M\"域")).await;
        assert_eq!(input.context_text, NO_DATA_CONTEXT);
        assert!(store.statements().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_yields_no_data() {
        let retriever = Retriever::new(Arc::new(MemoryStore::unreachable()));
        let input = retriever.retrieve("q", &search("M域")).await;
        assert_eq!(input.context_text, NO_DATA_CONTEXT);
        assert!(input.template.is_some());
    }

    #[tokio::test]
    async fn test_empty_result_yields_no_data() {
        let retriever = Retriever::new(Arc::new(MemoryStore::new()));
        let input = retriever.retrieve("q", &search("M域")).await;
        assert_eq!(input.context_text, NO_DATA_CONTEXT);
        assert!(input.rows.is_empty());
    }
}
