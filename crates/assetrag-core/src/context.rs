//! Render query rows as retrieval context for the answer generator.

use serde_json::Value;

use crate::intent::IntentCode;
use crate::statement::Record;

/// Context handed to the generator when the graph has nothing to say.
pub const NO_DATA_CONTEXT: &str = "知识库中暂无相关信息。";

const LABELS: &[(&str, &str)] = &[
    ("asset_id", "资产编号"),
    ("name", "名称"),
    ("asset_name", "资产名称"),
    ("asset_description", "资产描述"),
    ("description", "描述"),
    ("type", "类型"),
    ("owner", "负责人"),
    ("status", "状态"),
    ("domain", "业务域"),
    ("business_domain", "业务域"),
    ("update_time", "更新时间"),
    ("business_purpose", "业务用途"),
    ("technical_spec", "技术规格"),
    ("star_level", "星级"),
    ("value_score", "价值评分"),
    ("fields", "包含字段"),
    ("field_id", "字段编号"),
    ("field_name", "字段名称"),
    ("field_type", "字段类型"),
    ("data_type", "数据类型"),
    ("business_definition", "业务定义"),
    ("technical_definition", "技术定义"),
    ("concept_id", "概念编号"),
    ("definition", "定义"),
    ("zone_name", "业务专区"),
    ("scenario_name", "场景名称"),
    ("scenario_description", "场景描述"),
    ("assets", "关联资产"),
    ("role", "角色"),
];

/// Record heading for intents rendered with labeled lines.
fn heading(intent: IntentCode) -> Option<&'static str> {
    match intent {
        IntentCode::AssetBasicSearch => Some("资产"),
        IntentCode::AssetMetadataQuery => Some("元数据"),
        IntentCode::AssetQualityValueQuery => Some("质量与价值"),
        IntentCode::ScenarioRecommendation => Some("场景"),
        IntentCode::AssetComparison => Some("对比项"),
        IntentCode::AssetLineageQuery | IntentCode::AssetUsageQuery | IntentCode::PlatformHelp => None,
    }
}

fn label(key: &str) -> &str {
    LABELS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, l)| *l)
        .unwrap_or(key)
}

/// Format result rows for `intent`.
///
/// Empty input, or rows with nothing but empty values, yield
/// [`NO_DATA_CONTEXT`].
pub fn format_context(rows: &[Record], intent: IntentCode) -> String {
    let blocks: Vec<String> = rows
        .iter()
        .map(present_fields)
        .filter(|fields| !fields.is_empty())
        .enumerate()
        .map(|(i, fields)| match heading(intent) {
            Some(title) => labeled(i + 1, title, &fields),
            None => generic(i + 1, &fields),
        })
        .collect();

    if blocks.is_empty() {
        return NO_DATA_CONTEXT.to_string();
    }
    blocks.join("\n\n")
}

fn labeled(n: usize, title: &str, fields: &[(&str, String)]) -> String {
    let mut lines = vec![format!("【{}】{}", n, title)];
    lines.extend(fields.iter().map(|(k, v)| format!("{}: {}", label(k), v)));
    lines.join("\n")
}

fn generic(n: usize, fields: &[(&str, String)]) -> String {
    let mut lines = vec![format!("关系 {}:", n)];
    lines.extend(fields.iter().map(|(k, v)| format!("  {}: {}", k, v)));
    lines.join("\n")
}

fn present_fields(record: &Record) -> Vec<(&str, String)> {
    record
        .iter()
        .filter_map(|(k, v)| render(v).map(|text| (k, text)))
        .collect()
}

/// Display text for a value, `None` when the value is falsy.
fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::Bool(true) => Some("是".to_string()),
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => {
            let x = n.as_f64()?;
            if x == 0.0 {
                None
            } else if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if x.fract() == 0.0 {
                Some(format!("{:.0}", x))
            } else {
                Some(x.to_string())
            }
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render).collect();
            (!parts.is_empty()).then(|| parts.join("、"))
        }
        Value::Object(map) => (!map.is_empty()).then(|| value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_rows_yield_sentinel_for_every_intent() {
        for intent in IntentCode::ALL {
            assert_eq!(format_context(&[], intent), NO_DATA_CONTEXT);
        }
    }

    #[test]
    fn test_labeled_records_are_numbered() {
        let rows = vec![
            Record::new().with("name", "HR系统").with("type", "系统"),
            Record::new().with("name", "CRM系统").with("owner", "张三"),
        ];
        let text = format_context(&rows, IntentCode::AssetBasicSearch);
        assert_eq!(
            text,
            "【1】资产\n名称: HR系统\n类型: 系统\n\n【2】资产\n名称: CRM系统\n负责人: 张三"
        );
    }

    #[test]
    fn test_falsy_values_are_omitted() {
        let row = Record::new()
            .with("name", "HR系统")
            .with("description", "")
            .with("owner", Value::Null)
            .with("star_level", 0)
            .with("fields", json!([]));
        let text = format_context(&[row], IntentCode::AssetQualityValueQuery);
        assert_eq!(text, "【1】质量与价值\n名称: HR系统");
    }

    #[test]
    fn test_lists_and_numbers() {
        let row = Record::new()
            .with("name", "HR系统")
            .with("value_score", 85.0)
            .with("star_level", 4)
            .with("fields", json!(["user_id", "dept_id"]));
        let text = format_context(&[row], IntentCode::AssetMetadataQuery);
        assert!(text.contains("价值评分: 85\n"));
        assert!(text.contains("星级: 4"));
        assert!(text.contains("包含字段: user_id、dept_id"));
    }

    #[test]
    fn test_relationship_intents_render_generically() {
        let row = Record::new()
            .with("asset_name", "HR系统")
            .with("relation", "BELONGS_TO")
            .with("neighbour", "M域");
        let text = format_context(&[row], IntentCode::AssetLineageQuery);
        assert_eq!(
            text,
            "关系 1:\n  asset_name: HR系统\n  relation: BELONGS_TO\n  neighbour: M域"
        );
    }

    #[test]
    fn test_all_empty_rows_yield_sentinel() {
        let rows = vec![Record::new().with("name", ""), Record::new().with("owner", Value::Null)];
        assert_eq!(format_context(&rows, IntentCode::AssetUsageQuery), NO_DATA_CONTEXT);
    }

    #[test]
    fn test_unknown_columns_keep_their_key() {
        let row = Record::new().with("name", "HR系统").with("interactions", 3);
        let text = format_context(&[row], IntentCode::AssetComparison);
        assert!(text.contains("interactions: 3"));
    }
}
