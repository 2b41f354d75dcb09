//! Intent and slot model produced by the upstream classifier.
//!
//! The taxonomy is closed: eight intents (codes 31-38) and ten slot types.
//! Anything that does not validate is normalized to
//! [`IntentCode::PlatformHelp`] with no slots so the compiler always has a
//! defined branch to take.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::RagError;

/// Query purpose as classified upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IntentCode {
    AssetBasicSearch,
    AssetMetadataQuery,
    AssetQualityValueQuery,
    AssetLineageQuery,
    AssetUsageQuery,
    ScenarioRecommendation,
    AssetComparison,
    PlatformHelp,
}

impl IntentCode {
    pub const ALL: [IntentCode; 8] = [
        Self::AssetBasicSearch,
        Self::AssetMetadataQuery,
        Self::AssetQualityValueQuery,
        Self::AssetLineageQuery,
        Self::AssetUsageQuery,
        Self::ScenarioRecommendation,
        Self::AssetComparison,
        Self::PlatformHelp,
    ];

    /// Numeric code used by the classifier.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AssetBasicSearch => "31",
            Self::AssetMetadataQuery => "32",
            Self::AssetQualityValueQuery => "33",
            Self::AssetLineageQuery => "34",
            Self::AssetUsageQuery => "35",
            Self::ScenarioRecommendation => "36",
            Self::AssetComparison => "37",
            Self::PlatformHelp => "38",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssetBasicSearch => "ASSET_BASIC_SEARCH",
            Self::AssetMetadataQuery => "ASSET_METADATA_QUERY",
            Self::AssetQualityValueQuery => "ASSET_QUALITY_VALUE_QUERY",
            Self::AssetLineageQuery => "ASSET_LINEAGE_QUERY",
            Self::AssetUsageQuery => "ASSET_USAGE_QUERY",
            Self::ScenarioRecommendation => "SCENARIO_RECOMMENDATION",
            Self::AssetComparison => "ASSET_COMPARISON",
            Self::PlatformHelp => "PLATFORM_HELP",
        }
    }

    /// Human-readable name shown to operators.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AssetBasicSearch => "资产基础检索",
            Self::AssetMetadataQuery => "资产元数据查询",
            Self::AssetQualityValueQuery => "资产质量与价值查询",
            Self::AssetLineageQuery => "资产血缘关系查询",
            Self::AssetUsageQuery => "资产使用与工单查询",
            Self::ScenarioRecommendation => "场景与标签推荐",
            Self::AssetComparison => "资产复合对比与筛选",
            Self::PlatformHelp => "平台规则与帮助",
        }
    }
}

impl fmt::Display for IntentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.as_str())
    }
}

impl FromStr for IntentCode {
    type Err = RagError;

    /// Accepts the numeric code or the upper-case name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|i| i.code() == s || i.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RagError::validation(format!("unknown intent code '{}'", s)))
    }
}

impl TryFrom<String> for IntentCode {
    type Error = RagError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IntentCode> for String {
    fn from(i: IntentCode) -> Self {
        i.code().to_string()
    }
}

/// Slot types the classifier can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SlotCode {
    AssetName,
    ScenarioName,
    FieldName,
    CoreDataItem,
    BusinessDomain,
    AssetType,
    BusinessZone,
    FilterCondition,
    UserStatus,
    OrgName,
}

impl SlotCode {
    pub const ALL: [SlotCode; 10] = [
        Self::AssetName,
        Self::ScenarioName,
        Self::FieldName,
        Self::CoreDataItem,
        Self::BusinessDomain,
        Self::AssetType,
        Self::BusinessZone,
        Self::FilterCondition,
        Self::UserStatus,
        Self::OrgName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssetName => "AssetName",
            Self::ScenarioName => "ScenarioName",
            Self::FieldName => "FieldName",
            Self::CoreDataItem => "CoreDataItem",
            Self::BusinessDomain => "BusinessDomain",
            Self::AssetType => "AssetType",
            Self::BusinessZone => "BusinessZone",
            Self::FilterCondition => "FilterCondition",
            Self::UserStatus => "UserStatus",
            Self::OrgName => "OrgName",
        }
    }

    /// Slot number (1-10) in the classifier's labeling guide.
    pub fn number(&self) -> u8 {
        match self {
            Self::AssetName => 1,
            Self::ScenarioName => 2,
            Self::FieldName => 3,
            Self::CoreDataItem => 4,
            Self::BusinessDomain => 5,
            Self::AssetType => 6,
            Self::BusinessZone => 7,
            Self::FilterCondition => 8,
            Self::UserStatus => 9,
            Self::OrgName => 10,
        }
    }
}

impl fmt::Display for SlotCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotCode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| RagError::validation(format!("unknown slot type '{}'", s)))
    }
}

impl TryFrom<String> for SlotCode {
    type Error = RagError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SlotCode> for String {
    fn from(s: SlotCode) -> Self {
        s.as_str().to_string()
    }
}

/// A typed value extracted from the user query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "type")]
    pub slot_type: SlotCode,
    pub value: String,
}

impl Slot {
    pub fn new(slot_type: SlotCode, value: impl Into<String>) -> Self {
        Self {
            slot_type,
            value: value.into(),
        }
    }
}

/// Classifier output consumed by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: IntentCode,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl IntentResult {
    pub fn new(intent: IntentCode, slots: Vec<Slot>) -> Self {
        Self { intent, slots }
    }

    pub fn platform_help() -> Self {
        Self::new(IntentCode::PlatformHelp, Vec::new())
    }

    /// Validate a raw classifier payload.
    ///
    /// Valid only if the intent is known, `slots` is a list (or the
    /// `{"SlotType": ["value", ...]}` map form) and every slot has a known
    /// type and a string value. Anything else becomes platform help.
    pub fn from_json(payload: &Value) -> Self {
        match Self::parse(payload) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Invalid intent payload, falling back to platform help");
                Self::platform_help()
            }
        }
    }

    /// Same as [`IntentResult::from_json`] but starting from text.
    pub fn from_json_str(payload: &str) -> Self {
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => Self::from_json(&value),
            Err(e) => {
                warn!(error = %e, "Intent payload is not JSON, falling back to platform help");
                Self::platform_help()
            }
        }
    }

    fn parse(payload: &Value) -> Result<Self, RagError> {
        let intent = payload
            .get("intent")
            .and_then(intent_text)
            .ok_or_else(|| RagError::validation("missing intent"))?
            .parse::<IntentCode>()?;

        let slots = match payload.get("slots") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(parse_slot).collect::<Result<_, _>>()?,
            Some(Value::Object(map)) => {
                let mut slots = Vec::new();
                for (key, values) in map {
                    let slot_type: SlotCode = key.parse()?;
                    let values = match values {
                        Value::Array(vs) => vs.iter().collect::<Vec<_>>(),
                        other => vec![other],
                    };
                    for v in values {
                        let value = v.as_str().ok_or_else(|| {
                            RagError::validation(format!("slot {} value is not a string", key))
                        })?;
                        slots.push(Slot::new(slot_type, value));
                    }
                }
                slots
            }
            Some(_) => return Err(RagError::validation("slots is not a list")),
        };

        Ok(Self { intent, slots })
    }
}

fn intent_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_slot(item: &Value) -> Result<Slot, RagError> {
    let slot_type = item
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::validation("slot without type"))?
        .parse::<SlotCode>()?;
    let value = item
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::validation(format!("slot {} without string value", slot_type)))?;
    Ok(Slot::new(slot_type, value))
}
