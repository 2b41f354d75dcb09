//! Intent-to-Cypher compiler.
//!
//! [`compile`] is a pure function from a validated `(intent, slots)` pair to
//! a parameterized [`Statement`]. Each intent has one rule; a rule picks one
//! of a few query shapes depending on which slots are present and adds a
//! conjunctive filter for the optional ones. Slot values only ever travel as
//! parameters.

pub mod filter;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{RagError, RagResult};
use crate::intent::{IntentCode, Slot, SlotCode};
use crate::statement::{ParamValue, Statement};

use filter::FilterCondition;

/// Result cap for search-style shapes.
pub const SEARCH_LIMIT: i64 = 50;
/// Result cap for ranking-style shapes.
pub const RANKING_LIMIT: i64 = 20;

/// Structurally distinct query a rule can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryShape {
    // 31
    DomainFilter,
    FieldFilter,
    PlainFilter,
    // 32
    AssetField,
    AssetDetail,
    FieldLookup,
    ConceptDefinition,
    AssetCatalog,
    // 33
    AssetScore,
    DomainRanking,
    GlobalRanking,
    // 34
    DirectNeighbours,
    DomainNeighbours,
    EdgeSample,
    // 35
    AssetAudience,
    AssetScenarios,
    OrgActivity,
    PopularAssets,
    // 36
    ZoneScenarios,
    ScenarioAssets,
    DomainScenarios,
    ScenarioCatalog,
    // 37
    NamedComparison,
    PeerComparison,
    Screening,
}

/// A compiled query ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryTemplate {
    pub intent: IntentCode,
    pub shape: QueryShape,
    pub statement: Statement,
}

/// Compile an intent and its slots.
///
/// Returns `Ok(None)` for platform help, which needs no graph query. Fails
/// only with [`RagError::UnsafeSlotValue`].
pub fn compile(intent: IntentCode, slots: &[Slot]) -> RagResult<Option<QueryTemplate>> {
    check_slot_values(slots)?;
    let bag = SlotBag::new(slots);

    let (shape, statement) = match intent {
        IntentCode::AssetBasicSearch => basic_search(&bag),
        IntentCode::AssetMetadataQuery => metadata_query(&bag),
        IntentCode::AssetQualityValueQuery => quality_value_query(&bag),
        IntentCode::AssetLineageQuery => lineage_query(&bag),
        IntentCode::AssetUsageQuery => usage_query(&bag),
        IntentCode::ScenarioRecommendation => scenario_recommendation(&bag),
        IntentCode::AssetComparison => comparison(&bag),
        IntentCode::PlatformHelp => return Ok(None),
    };

    debug!(intent = intent.code(), shape = ?shape, params = statement.params.len(), "Compiled intent");
    Ok(Some(QueryTemplate {
        intent,
        shape,
        statement,
    }))
}

/// Reject values that could terminate a string literal or smuggle a
/// statement break, even though values are bound as parameters.
fn check_slot_values(slots: &[Slot]) -> RagResult<()> {
    for slot in slots {
        let unsafe_char = slot
            .value
            .chars()
            .any(|c| matches!(c, '"' | '\'' | '\\' | '`') || c.is_control());
        if unsafe_char {
            return Err(RagError::UnsafeSlotValue {
                slot: slot.slot_type.to_string(),
                value: slot.value.clone(),
            });
        }
    }
    Ok(())
}

/// Slots grouped by type, in arrival order, blanks dropped.
struct SlotBag<'a> {
    groups: BTreeMap<SlotCode, Vec<&'a str>>,
}

impl<'a> SlotBag<'a> {
    fn new(slots: &'a [Slot]) -> Self {
        let mut groups: BTreeMap<SlotCode, Vec<&'a str>> = BTreeMap::new();
        for slot in slots {
            let value = slot.value.trim();
            if value.is_empty() {
                continue;
            }
            let values = groups.entry(slot.slot_type).or_default();
            if !values.contains(&value) {
                values.push(value);
            }
        }
        Self { groups }
    }

    /// First occurrence; repeats are ignored by single-value rules.
    fn first(&self, code: SlotCode) -> Option<&'a str> {
        self.groups.get(&code).and_then(|v| v.first().copied())
    }

    fn all(&self, code: SlotCode) -> &[&'a str] {
        self.groups.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    fn filter_condition(&self) -> Option<FilterCondition> {
        let text = self.first(SlotCode::FilterCondition)?;
        let parsed = FilterCondition::parse(text);
        if parsed.is_none() {
            warn!(condition = text, "Ignoring unsupported filter condition");
        }
        parsed
    }
}

/// Incremental Cypher assembly: match clauses, one conjunctive WHERE, the
/// clauses that follow it, then RETURN / ORDER BY / LIMIT.
struct CypherBuilder {
    matches: Vec<String>,
    conditions: Vec<String>,
    tail: Vec<String>,
    params: BTreeMap<String, ParamValue>,
}

impl CypherBuilder {
    fn matching(pattern: &str) -> Self {
        Self {
            matches: vec![pattern.to_string()],
            conditions: Vec::new(),
            tail: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    fn filter(mut self, condition: &str, param: &str, value: impl Into<ParamValue>) -> Self {
        self.conditions.push(condition.to_string());
        self.params.insert(param.to_string(), value.into());
        self
    }

    fn filter_opt(self, condition: &str, param: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.filter(condition, param, v),
            None => self,
        }
    }

    fn filter_condition(self, alias: &str, condition: Option<FilterCondition>) -> Self {
        match condition {
            Some(c) => {
                let predicate = c.predicate(alias, "filter_threshold");
                self.filter(&predicate, "filter_threshold", c.threshold)
            }
            None => self,
        }
    }

    fn then(mut self, clause: &str) -> Self {
        self.tail.push(clause.to_string());
        self
    }

    fn returning(self, fields: &[(&str, &str)], order_by: &str, limit: i64) -> Statement {
        let mut lines = self.matches;
        if !self.conditions.is_empty() {
            lines.push(format!("WHERE {}", self.conditions.join(" AND ")));
        }
        lines.extend(self.tail);

        let projections: Vec<String> = fields
            .iter()
            .map(|(expr, alias)| format!("{} AS {}", expr, alias))
            .collect();
        lines.push(format!("RETURN {}", projections.join(", ")));
        if !order_by.is_empty() {
            lines.push(format!("ORDER BY {}", order_by));
        }
        lines.push(format!("LIMIT {}", limit));

        let mut statement = Statement::new(lines.join("\n"))
            .returning(fields.iter().map(|(_, alias)| *alias));
        statement.params = self.params;
        statement
    }
}

fn asset_filters(builder: CypherBuilder, bag: &SlotBag<'_>, by_name: bool) -> CypherBuilder {
    let builder = if by_name {
        builder.filter_opt("a.name = $asset_name", "asset_name", bag.first(SlotCode::AssetName))
    } else {
        builder
    };
    builder
        .filter_opt("a.type = $asset_type", "asset_type", bag.first(SlotCode::AssetType))
        .filter_condition("a", bag.filter_condition())
}

// 31: domain filter > field filter > plain filter.
fn basic_search(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    const ASSET: [(&str, &str); 6] = [
        ("a.asset_id", "asset_id"),
        ("a.name", "name"),
        ("a.description", "description"),
        ("a.type", "type"),
        ("a.owner", "owner"),
        ("a.status", "status"),
    ];

    if let Some(domain) = bag.first(SlotCode::BusinessDomain) {
        let builder = CypherBuilder::matching("MATCH (a:Asset)-[:BELONGS_TO]->(d:BusinessDomain)")
            .filter("d.name = $domain_name", "domain_name", domain);
        let mut fields = ASSET.to_vec();
        fields.push(("d.name", "domain"));
        let stmt = asset_filters(builder, bag, true).returning(&fields, "a.name", SEARCH_LIMIT);
        (QueryShape::DomainFilter, stmt)
    } else if let Some(field) = bag.first(SlotCode::FieldName) {
        let builder = CypherBuilder::matching("MATCH (a:Asset)-[:HAS_FIELD]->(f:Field)")
            .filter("f.name = $field_name", "field_name", field);
        let fields = [
            ("a.asset_id", "asset_id"),
            ("a.name", "name"),
            ("a.description", "description"),
            ("a.type", "type"),
            ("f.name", "field_name"),
            ("f.data_type", "field_type"),
        ];
        let stmt = asset_filters(builder, bag, true).returning(&fields, "a.name", SEARCH_LIMIT);
        (QueryShape::FieldFilter, stmt)
    } else {
        let builder = CypherBuilder::matching("MATCH (a:Asset)");
        let stmt = asset_filters(builder, bag, true).returning(&ASSET, "a.name", SEARCH_LIMIT);
        (QueryShape::PlainFilter, stmt)
    }
}

// 32: asset+field > asset > field > concept > catalog.
fn metadata_query(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    const FIELD: [(&str, &str); 6] = [
        ("a.name", "asset_name"),
        ("f.field_id", "field_id"),
        ("f.name", "field_name"),
        ("f.data_type", "data_type"),
        ("f.business_definition", "business_definition"),
        ("f.technical_definition", "technical_definition"),
    ];
    let asset = bag.first(SlotCode::AssetName);
    let field = bag.first(SlotCode::FieldName);

    match (asset, field) {
        (Some(asset), Some(field)) => {
            let stmt = CypherBuilder::matching("MATCH (a:Asset)-[:HAS_FIELD]->(f:Field)")
                .filter("a.name = $asset_name", "asset_name", asset)
                .filter("f.name = $field_name", "field_name", field)
                .returning(&FIELD, "field_name", SEARCH_LIMIT);
            (QueryShape::AssetField, stmt)
        }
        (Some(asset), None) => {
            let stmt = CypherBuilder::matching("MATCH (a:Asset)")
                .filter("a.name = $asset_name", "asset_name", asset)
                .then("OPTIONAL MATCH (a)-[:BELONGS_TO]->(d:BusinessDomain)")
                .then("OPTIONAL MATCH (a)-[:HAS_FIELD]->(f:Field)")
                .returning(
                    &[
                        ("a.asset_id", "asset_id"),
                        ("a.name", "name"),
                        ("a.description", "description"),
                        ("a.type", "type"),
                        ("a.owner", "owner"),
                        ("a.update_time", "update_time"),
                        ("a.business_purpose", "business_purpose"),
                        ("a.technical_spec", "technical_spec"),
                        ("d.name", "domain"),
                        ("collect(DISTINCT f.name)", "fields"),
                    ],
                    "name",
                    SEARCH_LIMIT,
                );
            (QueryShape::AssetDetail, stmt)
        }
        (None, Some(field)) => {
            let stmt = CypherBuilder::matching("MATCH (a:Asset)-[:HAS_FIELD]->(f:Field)")
                .filter("f.name = $field_name", "field_name", field)
                .returning(&FIELD, "asset_name", SEARCH_LIMIT);
            (QueryShape::FieldLookup, stmt)
        }
        (None, None) => match bag.first(SlotCode::CoreDataItem) {
            Some(concept) => {
                let stmt = CypherBuilder::matching("MATCH (c:Concept)")
                    .filter("c.name = $concept_name", "concept_name", concept)
                    .returning(
                        &[
                            ("c.concept_id", "concept_id"),
                            ("c.name", "name"),
                            ("c.type", "type"),
                            ("c.definition", "definition"),
                        ],
                        "name",
                        SEARCH_LIMIT,
                    );
                (QueryShape::ConceptDefinition, stmt)
            }
            None => {
                let stmt = CypherBuilder::matching("MATCH (a:Asset)").returning(
                    &[
                        ("a.asset_id", "asset_id"),
                        ("a.name", "name"),
                        ("a.description", "description"),
                        ("a.type", "type"),
                        ("a.owner", "owner"),
                        ("a.update_time", "update_time"),
                    ],
                    "name",
                    SEARCH_LIMIT,
                );
                (QueryShape::AssetCatalog, stmt)
            }
        },
    }
}

const SCORE: [(&str, &str); 6] = [
    ("a.name", "name"),
    ("a.star_level", "star_level"),
    ("a.value_score", "value_score"),
    ("a.update_time", "update_time"),
    ("a.owner", "owner"),
    ("d.name", "domain"),
];

// 33: single asset > domain ranking > global ranking.
fn quality_value_query(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    if let Some(asset) = bag.first(SlotCode::AssetName) {
        let stmt = CypherBuilder::matching("MATCH (a:Asset)")
            .filter("a.name = $asset_name", "asset_name", asset)
            .then("OPTIONAL MATCH (a)-[:BELONGS_TO]->(d:BusinessDomain)")
            .returning(&SCORE, "name", RANKING_LIMIT);
        return (QueryShape::AssetScore, stmt);
    }

    if let Some(domain) = bag.first(SlotCode::BusinessDomain) {
        let builder = CypherBuilder::matching("MATCH (a:Asset)-[:BELONGS_TO]->(d:BusinessDomain)")
            .filter("d.name = $domain_name", "domain_name", domain);
        let stmt = asset_filters(builder, bag, false).returning(
            &SCORE,
            "value_score DESC, name",
            RANKING_LIMIT,
        );
        return (QueryShape::DomainRanking, stmt);
    }

    let stmt = asset_filters(CypherBuilder::matching("MATCH (a:Asset)"), bag, false)
        .then("OPTIONAL MATCH (a)-[:BELONGS_TO]->(d:BusinessDomain)")
        .returning(&SCORE, "value_score DESC, name", RANKING_LIMIT);
    (QueryShape::GlobalRanking, stmt)
}

const NEIGHBOUR: [(&str, &str); 5] = [
    ("a.name", "asset_name"),
    ("type(r)", "relation"),
    ("CASE WHEN startNode(r) = a THEN 'out' ELSE 'in' END", "direction"),
    ("labels(n)[0]", "neighbour_type"),
    ("coalesce(n.name, n.title, n.usage_id)", "neighbour"),
];

// 34: one hop around an asset. Multi-hop lineage is not modelled.
fn lineage_query(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    if let Some(asset) = bag.first(SlotCode::AssetName) {
        let stmt = CypherBuilder::matching("MATCH (a:Asset)-[r]-(n)")
            .filter("a.name = $asset_name", "asset_name", asset)
            .returning(&NEIGHBOUR, "relation, neighbour", SEARCH_LIMIT);
        return (QueryShape::DirectNeighbours, stmt);
    }

    if let Some(domain) = bag.first(SlotCode::BusinessDomain) {
        let stmt = CypherBuilder::matching("MATCH (a:Asset)-[:BELONGS_TO]->(d:BusinessDomain)")
            .filter("d.name = $domain_name", "domain_name", domain)
            .then("MATCH (a)-[r]-(n)")
            .then("WHERE n <> d")
            .returning(&NEIGHBOUR, "asset_name, relation, neighbour", SEARCH_LIMIT);
        return (QueryShape::DomainNeighbours, stmt);
    }

    let stmt = CypherBuilder::matching("MATCH (a:Asset)-[r]-(n)")
        .filter_opt("a.type = $asset_type", "asset_type", bag.first(SlotCode::AssetType))
        .returning(&NEIGHBOUR, "asset_name, relation, neighbour", SEARCH_LIMIT);
    (QueryShape::EdgeSample, stmt)
}

/// Edge types selected by a `UserStatus` slot.
fn status_edges(status: Option<&str>) -> &'static str {
    let Some(status) = status else {
        return "FAVORITED|SUBSCRIBED";
    };
    let lower = status.to_lowercase();
    if status.contains("收藏") || lower.contains("favo") {
        "FAVORITED"
    } else if status.contains("订阅") || lower.contains("subscri") {
        "SUBSCRIBED"
    } else {
        "FAVORITED|SUBSCRIBED"
    }
}

// 35: audience of an asset > scenarios using it > org activity > popularity.
fn usage_query(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    let status = bag.first(SlotCode::UserStatus);
    let edges = status_edges(status);

    if let Some(asset) = bag.first(SlotCode::AssetName) {
        if status.is_some() {
            let stmt = CypherBuilder::matching(&format!("MATCH (u:User)-[r:{}]->(a:Asset)", edges))
                .filter("a.name = $asset_name", "asset_name", asset)
                .then("OPTIONAL MATCH (u)-[:BELONGS_TO]->(o:Org)")
                .returning(
                    &[
                        ("a.name", "asset_name"),
                        ("u.name", "user_name"),
                        ("u.role", "role"),
                        ("o.name", "org_name"),
                        ("type(r)", "status"),
                    ],
                    "user_name",
                    SEARCH_LIMIT,
                );
            return (QueryShape::AssetAudience, stmt);
        }

        let stmt = CypherBuilder::matching(
            "MATCH (a:Asset)-[:IS_USED_IN]->(u:AssetUsage)<-[:INCLUDES_USAGE]-(s:Scenario)",
        )
        .filter("a.name = $asset_name", "asset_name", asset)
        .returning(
            &[
                ("a.name", "asset_name"),
                ("s.name", "scenario_name"),
                ("s.description", "scenario_description"),
                ("u.role", "role"),
                ("u.status", "status"),
            ],
            "scenario_name",
            SEARCH_LIMIT,
        );
        return (QueryShape::AssetScenarios, stmt);
    }

    if let Some(org) = bag.first(SlotCode::OrgName) {
        let stmt = CypherBuilder::matching(&format!(
            "MATCH (o:Org)<-[:BELONGS_TO]-(u:User)-[r:{}]->(a:Asset)",
            edges
        ))
        .filter("o.name = $org_name", "org_name", org)
        .returning(
            &[
                ("o.name", "org_name"),
                ("u.name", "user_name"),
                ("type(r)", "status"),
                ("a.name", "asset_name"),
            ],
            "user_name, asset_name",
            SEARCH_LIMIT,
        );
        return (QueryShape::OrgActivity, stmt);
    }

    let stmt = CypherBuilder::matching(&format!("MATCH (u:User)-[r:{}]->(a:Asset)", edges))
        .filter_opt("a.type = $asset_type", "asset_type", bag.first(SlotCode::AssetType))
        .returning(
            &[("a.name", "asset_name"), ("count(r)", "interactions")],
            "interactions DESC, asset_name",
            RANKING_LIMIT,
        );
    (QueryShape::PopularAssets, stmt)
}

// 36: zone > scenario > domain > catalog.
fn scenario_recommendation(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    if let Some(zone) = bag.first(SlotCode::BusinessZone) {
        let stmt = CypherBuilder::matching("MATCH (z:BusinessZone)-[:CONTAINS_SCENARIO]->(s:Scenario)")
            .filter("z.name = $zone_name", "zone_name", zone)
            .then("OPTIONAL MATCH (s)-[:INCLUDES_USAGE]->(:AssetUsage)<-[:IS_USED_IN]-(a:Asset)")
            .returning(
                &[
                    ("z.name", "zone_name"),
                    ("s.name", "scenario_name"),
                    ("s.description", "description"),
                    ("s.status", "status"),
                    ("collect(DISTINCT a.name)", "assets"),
                ],
                "scenario_name",
                SEARCH_LIMIT,
            );
        return (QueryShape::ZoneScenarios, stmt);
    }

    if let Some(scenario) = bag.first(SlotCode::ScenarioName) {
        let stmt = CypherBuilder::matching(
            "MATCH (s:Scenario)-[:INCLUDES_USAGE]->(u:AssetUsage)<-[:IS_USED_IN]-(a:Asset)",
        )
        .filter("s.name = $scenario_name", "scenario_name", scenario)
        .returning(
            &[
                ("s.name", "scenario_name"),
                ("a.name", "asset_name"),
                ("a.description", "asset_description"),
                ("u.role", "role"),
                ("u.status", "status"),
            ],
            "role, asset_name",
            SEARCH_LIMIT,
        );
        return (QueryShape::ScenarioAssets, stmt);
    }

    if let Some(domain) = bag.first(SlotCode::BusinessDomain) {
        let stmt = CypherBuilder::matching("MATCH (s:Scenario)")
            .filter("s.business_domain = $domain_name", "domain_name", domain)
            .returning(
                &[
                    ("s.name", "scenario_name"),
                    ("s.description", "description"),
                    ("s.business_domain", "business_domain"),
                    ("s.status", "status"),
                ],
                "scenario_name",
                SEARCH_LIMIT,
            );
        return (QueryShape::DomainScenarios, stmt);
    }

    let stmt = CypherBuilder::matching("MATCH (s:Scenario)")
        .then("OPTIONAL MATCH (z:BusinessZone)-[:CONTAINS_SCENARIO]->(s)")
        .returning(
            &[
                ("s.name", "scenario_name"),
                ("s.description", "description"),
                ("s.business_domain", "business_domain"),
                ("s.status", "status"),
                ("z.name", "zone_name"),
            ],
            "scenario_name",
            SEARCH_LIMIT,
        );
    (QueryShape::ScenarioCatalog, stmt)
}

const COMPARED: [(&str, &str); 7] = [
    ("a.name", "name"),
    ("a.type", "type"),
    ("a.owner", "owner"),
    ("a.star_level", "star_level"),
    ("a.value_score", "value_score"),
    ("a.update_time", "update_time"),
    ("d.name", "domain"),
];

// 37: named assets (multi-value) > peers of one asset > screening.
fn comparison(bag: &SlotBag<'_>) -> (QueryShape, Statement) {
    let names = bag.all(SlotCode::AssetName);

    if names.len() >= 2 {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let stmt = CypherBuilder::matching("MATCH (a:Asset)")
            .filter("a.name IN $asset_names", "asset_names", names)
            .then("OPTIONAL MATCH (a)-[:BELONGS_TO]->(d:BusinessDomain)")
            .returning(&COMPARED, "value_score DESC, name", RANKING_LIMIT);
        return (QueryShape::NamedComparison, stmt);
    }

    if let Some(asset) = names.first() {
        let stmt = CypherBuilder::matching("MATCH (t:Asset)")
            .filter("t.name = $asset_name", "asset_name", *asset)
            .then("MATCH (a:Asset)")
            .then("WHERE a.type = t.type")
            .then("OPTIONAL MATCH (a)-[:BELONGS_TO]->(d:BusinessDomain)")
            .returning(&COMPARED, "value_score DESC, name", RANKING_LIMIT);
        return (QueryShape::PeerComparison, stmt);
    }

    let stmt = match bag.first(SlotCode::BusinessDomain) {
        Some(domain) => {
            let builder = CypherBuilder::matching("MATCH (a:Asset)-[:BELONGS_TO]->(d:BusinessDomain)")
                .filter("d.name = $domain_name", "domain_name", domain);
            asset_filters(builder, bag, false)
        }
        None => asset_filters(CypherBuilder::matching("MATCH (a:Asset)"), bag, false)
            .then("OPTIONAL MATCH (a)-[:BELONGS_TO]->(d:BusinessDomain)"),
    }
    .returning(&COMPARED, "value_score DESC, name", RANKING_LIMIT);
    (QueryShape::Screening, stmt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(t: SlotCode, v: &str) -> Slot {
        Slot::new(t, v)
    }

    fn compiled(intent: IntentCode, slots: &[Slot]) -> QueryTemplate {
        compile(intent, slots).unwrap().unwrap()
    }

    #[test]
    fn test_domain_takes_precedence_over_field() {
        let t = compiled(
            IntentCode::AssetBasicSearch,
            &[
                slot(SlotCode::BusinessDomain, "M域"),
                slot(SlotCode::FieldName, "user_id"),
            ],
        );
        assert_eq!(t.shape, QueryShape::DomainFilter);
        assert!(t.statement.text.contains("[:BELONGS_TO]->(d:BusinessDomain)"));
        assert!(!t.statement.text.contains("HAS_FIELD"));
        assert_eq!(t.statement.get_param("domain_name"), Some(&ParamValue::from("M域")));
        assert!(t.statement.get_param("field_name").is_none());
    }

    #[test]
    fn test_field_takes_precedence_over_plain() {
        let t = compiled(
            IntentCode::AssetBasicSearch,
            &[slot(SlotCode::FieldName, "user_id"), slot(SlotCode::AssetType, "系统")],
        );
        assert_eq!(t.shape, QueryShape::FieldFilter);
        assert!(t.statement.text.contains("WHERE f.name = $field_name AND a.type = $asset_type"));
    }

    #[test]
    fn test_values_are_never_in_text() {
        let t = compiled(
            IntentCode::AssetBasicSearch,
            &[
                slot(SlotCode::BusinessDomain, "M域"),
                slot(SlotCode::AssetType, "系统"),
                slot(SlotCode::AssetName, "HR系统"),
            ],
        );
        assert!(!t.statement.text.contains("M域"));
        assert!(!t.statement.text.contains("HR系统"));
        assert_eq!(t.statement.params.len(), 3);
    }

    #[test]
    fn test_empty_slots_is_unconditional_and_capped() {
        let t = compiled(IntentCode::AssetBasicSearch, &[]);
        assert_eq!(t.shape, QueryShape::PlainFilter);
        assert!(!t.statement.text.contains("WHERE"));
        assert!(t.statement.text.ends_with("LIMIT 50"));

        let ranking = compiled(IntentCode::AssetQualityValueQuery, &[]);
        assert_eq!(ranking.shape, QueryShape::GlobalRanking);
        assert!(ranking.statement.text.ends_with("LIMIT 20"));
    }

    #[test]
    fn test_first_occurrence_wins_for_single_value_slots() {
        let t = compiled(
            IntentCode::AssetBasicSearch,
            &[
                slot(SlotCode::BusinessDomain, "M域"),
                slot(SlotCode::BusinessDomain, "B域"),
            ],
        );
        assert_eq!(t.statement.get_param("domain_name"), Some(&ParamValue::from("M域")));
    }

    #[test]
    fn test_platform_help_is_empty_template() {
        assert!(compile(IntentCode::PlatformHelp, &[]).unwrap().is_none());
        assert!(compile(IntentCode::PlatformHelp, &[slot(SlotCode::AssetName, "HR系统")])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_unsafe_values_are_rejected() {
        for bad in ["HR\"系统", "a\\b", "x' OR 1=1", "line\nbreak", "`tick`"] {
            let err = compile(IntentCode::AssetBasicSearch, &[slot(SlotCode::AssetName, bad)])
                .unwrap_err();
            assert!(matches!(err, RagError::UnsafeSlotValue { ref slot, .. } if slot == "AssetName"));
        }
    }

    #[test]
    fn test_unsafe_value_rejected_even_for_help() {
        let err = compile(IntentCode::PlatformHelp, &[slot(SlotCode::OrgName, "a\"b")]).unwrap_err();
        assert!(matches!(err, RagError::UnsafeSlotValue { .. }));
    }

    #[test]
    fn test_compiler_is_total_over_slot_subsets() {
        let pool = [
            slot(SlotCode::AssetName, "HR系统"),
            slot(SlotCode::ScenarioName, "新员工入职"),
            slot(SlotCode::FieldName, "user_id"),
            slot(SlotCode::CoreDataItem, "客户"),
            slot(SlotCode::BusinessDomain, "M域"),
            slot(SlotCode::AssetType, "系统"),
            slot(SlotCode::BusinessZone, "人力专区"),
            slot(SlotCode::FilterCondition, "五星"),
            slot(SlotCode::UserStatus, "收藏"),
            slot(SlotCode::OrgName, "数据部"),
        ];
        for intent in IntentCode::ALL {
            for mask in 0u32..(1 << pool.len()) {
                let slots: Vec<Slot> = pool
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, s)| s.clone())
                    .collect();
                let result = compile(intent, &slots).unwrap();
                match result {
                    None => assert_eq!(intent, IntentCode::PlatformHelp),
                    Some(t) => {
                        assert_eq!(t.intent, intent);
                        assert!(t.statement.text.starts_with("MATCH"));
                        assert!(t.statement.text.contains("\nRETURN "));
                        assert!(!t.statement.columns.is_empty());
                        for name in t.statement.params.keys() {
                            assert!(t.statement.text.contains(&format!("${}", name)));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_filter_condition_is_bound() {
        let t = compiled(
            IntentCode::AssetQualityValueQuery,
            &[slot(SlotCode::FilterCondition, "价值评估>80分")],
        );
        assert!(t.statement.text.contains("a.value_score > $filter_threshold"));
        assert_eq!(t.statement.get_param("filter_threshold"), Some(&ParamValue::Float(80.0)));
    }

    #[test]
    fn test_unsupported_filter_condition_is_ignored() {
        let t = compiled(
            IntentCode::AssetBasicSearch,
            &[slot(SlotCode::FilterCondition, "最近更新的")],
        );
        assert_eq!(t.shape, QueryShape::PlainFilter);
        assert!(t.statement.params.is_empty());
    }

    #[test]
    fn test_metadata_shapes() {
        let both = compiled(
            IntentCode::AssetMetadataQuery,
            &[slot(SlotCode::FieldName, "user_id"), slot(SlotCode::AssetName, "HR系统")],
        );
        assert_eq!(both.shape, QueryShape::AssetField);

        let asset = compiled(IntentCode::AssetMetadataQuery, &[slot(SlotCode::AssetName, "HR系统")]);
        assert_eq!(asset.shape, QueryShape::AssetDetail);
        assert!(asset.statement.columns.contains(&"fields".to_string()));

        let concept = compiled(IntentCode::AssetMetadataQuery, &[slot(SlotCode::CoreDataItem, "客户")]);
        assert_eq!(concept.shape, QueryShape::ConceptDefinition);

        let none = compiled(IntentCode::AssetMetadataQuery, &[]);
        assert_eq!(none.shape, QueryShape::AssetCatalog);
    }

    #[test]
    fn test_quality_shapes() {
        let score = compiled(
            IntentCode::AssetQualityValueQuery,
            &[slot(SlotCode::AssetName, "HR系统"), slot(SlotCode::BusinessDomain, "M域")],
        );
        assert_eq!(score.shape, QueryShape::AssetScore);

        let domain = compiled(
            IntentCode::AssetQualityValueQuery,
            &[slot(SlotCode::BusinessDomain, "M域"), slot(SlotCode::FilterCondition, "五星")],
        );
        assert_eq!(domain.shape, QueryShape::DomainRanking);
        assert!(domain.statement.text.contains("a.star_level = $filter_threshold"));
        assert!(domain.statement.text.contains("ORDER BY value_score DESC, name"));
    }

    #[test]
    fn test_lineage_is_single_hop() {
        let t = compiled(IntentCode::AssetLineageQuery, &[slot(SlotCode::AssetName, "HR系统")]);
        assert_eq!(t.shape, QueryShape::DirectNeighbours);
        assert!(!t.statement.text.contains("*"));

        let domain = compiled(IntentCode::AssetLineageQuery, &[slot(SlotCode::BusinessDomain, "M域")]);
        assert_eq!(domain.shape, QueryShape::DomainNeighbours);
        assert_eq!(compiled(IntentCode::AssetLineageQuery, &[]).shape, QueryShape::EdgeSample);
    }

    #[test]
    fn test_usage_status_selects_edge_type() {
        let fav = compiled(
            IntentCode::AssetUsageQuery,
            &[slot(SlotCode::AssetName, "HR系统"), slot(SlotCode::UserStatus, "收藏")],
        );
        assert_eq!(fav.shape, QueryShape::AssetAudience);
        assert!(fav.statement.text.contains("[r:FAVORITED]"));

        let sub = compiled(
            IntentCode::AssetUsageQuery,
            &[slot(SlotCode::OrgName, "数据部"), slot(SlotCode::UserStatus, "已订阅")],
        );
        assert_eq!(sub.shape, QueryShape::OrgActivity);
        assert!(sub.statement.text.contains("[r:SUBSCRIBED]"));

        let popular = compiled(IntentCode::AssetUsageQuery, &[slot(SlotCode::UserStatus, "关注")]);
        assert_eq!(popular.shape, QueryShape::PopularAssets);
        assert!(popular.statement.text.contains("[r:FAVORITED|SUBSCRIBED]"));
        assert!(popular.statement.text.ends_with("LIMIT 20"));

        let scenarios = compiled(IntentCode::AssetUsageQuery, &[slot(SlotCode::AssetName, "HR系统")]);
        assert_eq!(scenarios.shape, QueryShape::AssetScenarios);
    }

    #[test]
    fn test_scenario_shapes() {
        let zone = compiled(
            IntentCode::ScenarioRecommendation,
            &[slot(SlotCode::ScenarioName, "新员工入职"), slot(SlotCode::BusinessZone, "人力专区")],
        );
        assert_eq!(zone.shape, QueryShape::ZoneScenarios);

        let scenario = compiled(
            IntentCode::ScenarioRecommendation,
            &[slot(SlotCode::ScenarioName, "新员工入职"), slot(SlotCode::BusinessDomain, "M域")],
        );
        assert_eq!(scenario.shape, QueryShape::ScenarioAssets);

        let domain = compiled(IntentCode::ScenarioRecommendation, &[slot(SlotCode::BusinessDomain, "M域")]);
        assert_eq!(domain.shape, QueryShape::DomainScenarios);
        assert_eq!(
            compiled(IntentCode::ScenarioRecommendation, &[]).shape,
            QueryShape::ScenarioCatalog
        );
    }

    #[test]
    fn test_comparison_uses_every_asset_name() {
        let t = compiled(
            IntentCode::AssetComparison,
            &[
                slot(SlotCode::AssetName, "HR系统"),
                slot(SlotCode::AssetName, "CRM系统"),
                slot(SlotCode::AssetName, "HR系统"),
            ],
        );
        assert_eq!(t.shape, QueryShape::NamedComparison);
        assert_eq!(
            t.statement.get_param("asset_names"),
            Some(&ParamValue::List(vec!["HR系统".into(), "CRM系统".into()]))
        );
    }

    #[test]
    fn test_comparison_fallbacks() {
        let single = compiled(IntentCode::AssetComparison, &[slot(SlotCode::AssetName, "HR系统")]);
        assert_eq!(single.shape, QueryShape::PeerComparison);

        let screening = compiled(
            IntentCode::AssetComparison,
            &[slot(SlotCode::AssetType, "系统"), slot(SlotCode::FilterCondition, "星级>=4")],
        );
        assert_eq!(screening.shape, QueryShape::Screening);
        assert!(screening
            .statement
            .text
            .contains("WHERE a.type = $asset_type AND a.star_level >= $filter_threshold"));
    }

    #[test]
    fn test_blank_slot_values_are_ignored() {
        let t = compiled(IntentCode::AssetBasicSearch, &[slot(SlotCode::BusinessDomain, "  ")]);
        assert_eq!(t.shape, QueryShape::PlainFilter);
    }
}
