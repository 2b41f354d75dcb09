//! Schema registry: the validated description of node and relationship
//! types that every loader, the graph builder and the stats query read.
//!
//! The registry is built once (from the built-in catalog or a TOML file),
//! validated, and then only read. Lookups for unregistered names fail with
//! [`RagError::SchemaNotFound`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, RagResult};
use crate::statement::{is_safe_identifier, ParamValue};

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// Declared kind of a property; drives coercion of tabular text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    #[default]
    String,
    Int,
    Float,
    Bool,
}

impl PropertyKind {
    /// Coerce a raw cell into a typed parameter value.
    pub fn coerce(&self, raw: &str) -> RagResult<ParamValue> {
        let raw = raw.trim();
        match self {
            Self::String => Ok(ParamValue::String(raw.to_string())),
            Self::Int => {
                if let Ok(i) = raw.parse::<i64>() {
                    return Ok(ParamValue::Int(i));
                }
                // Integral floats show up when a numeric column had gaps upstream.
                match raw.parse::<f64>() {
                    Ok(f) if f.is_finite()
                        && f.fract() == 0.0
                        && f >= i64::MIN as f64
                        && f < i64::MAX as f64 =>
                    {
                        Ok(ParamValue::Int(f as i64))
                    }
                    _ => Err(RagError::validation(format!("'{}' is not an integer", raw))),
                }
            }
            Self::Float => match raw.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(ParamValue::Float(f)),
                _ => Err(RagError::validation(format!("'{}' is not a number", raw))),
            },
            Self::Bool => match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" | "是" => Ok(ParamValue::Bool(true)),
                "false" | "0" | "no" | "n" | "否" => Ok(ParamValue::Bool(false)),
                _ => Err(RagError::validation(format!("'{}' is not a boolean", raw))),
            },
        }
    }
}

/// A declared property of a node or relationship type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(default)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSchema {
    #[serde(skip)]
    pub name: String,
    pub label: String,
    pub id_field: String,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
}

impl NodeSchema {
    pub fn required_properties(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties.iter().filter(|p| p.required)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipSchema {
    #[serde(skip)]
    pub name: String,
    /// Edge type written to the graph.
    #[serde(rename = "type")]
    pub edge: String,
    pub source: String,
    pub target: String,
    /// Column holding the source id; defaults to the source id field.
    #[serde(default)]
    pub source_column: Option<String>,
    #[serde(default)]
    pub target_column: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
}

/// A many-to-many relation stored as its own node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateSchema {
    #[serde(skip)]
    pub name: String,
    pub label: String,
    pub key_field: String,
    pub key_prefix: String,
    pub source: String,
    pub target: String,
    /// Edge from the source node into the intermediate node.
    pub source_edge: String,
    /// Edge from the target node into the intermediate node.
    pub target_edge: String,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Index,
    Composite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub node_type: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub kind: IndexKind,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    node_types: BTreeMap<String, NodeSchema>,
    #[serde(default)]
    relationship_types: BTreeMap<String, RelationshipSchema>,
    #[serde(default)]
    intermediate: BTreeMap<String, IntermediateSchema>,
    #[serde(default)]
    indexes: Vec<IndexSpec>,
}

/// Immutable, validated schema catalog.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    nodes: BTreeMap<String, NodeSchema>,
    relationships: BTreeMap<String, RelationshipSchema>,
    intermediates: BTreeMap<String, IntermediateSchema>,
    indexes: Vec<IndexSpec>,
}

impl SchemaRegistry {
    /// The catalog of asset, field, domain, zone, scenario, concept, user,
    /// org and hotspot types.
    pub fn builtin() -> RagResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    pub fn from_toml_str(content: &str) -> RagResult<Self> {
        let file: SchemaFile = toml::from_str(content)?;
        Self::from_file(file)
    }

    pub fn from_path(path: &Path) -> RagResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    fn from_file(file: SchemaFile) -> RagResult<Self> {
        let mut nodes = file.node_types;
        for (name, node) in nodes.iter_mut() {
            node.name = name.clone();
        }
        let mut relationships = file.relationship_types;
        for (name, rel) in relationships.iter_mut() {
            rel.name = name.clone();
        }
        let mut intermediates = file.intermediate;
        for (name, inter) in intermediates.iter_mut() {
            inter.name = name.clone();
        }

        let registry = Self {
            nodes,
            relationships,
            intermediates,
            indexes: file.indexes,
        };
        registry.validate()?;
        Ok(registry)
    }

    fn validate(&self) -> RagResult<()> {
        let mut labels = BTreeSet::new();
        for node in self.nodes.values() {
            check_identifier("node type", &node.name)?;
            check_identifier("label", &node.label)?;
            if !labels.insert(node.label.as_str()) {
                return Err(RagError::configuration(format!(
                    "label '{}' is declared by more than one node type",
                    node.label
                )));
            }
            check_properties(&node.name, &node.properties)?;
            match node.properties.iter().find(|p| p.name == node.id_field) {
                Some(p) if p.required => {}
                Some(_) => {
                    return Err(RagError::configuration(format!(
                        "id field '{}' of {} must be required",
                        node.id_field, node.name
                    )))
                }
                None => {
                    return Err(RagError::configuration(format!(
                        "id field '{}' of {} is not a declared property",
                        node.id_field, node.name
                    )))
                }
            }
        }

        for rel in self.relationships.values() {
            check_identifier("relationship type", &rel.edge)?;
            self.check_endpoint(&rel.name, &rel.source)?;
            self.check_endpoint(&rel.name, &rel.target)?;
            check_properties(&rel.name, &rel.properties)?;
        }

        for inter in self.intermediates.values() {
            check_identifier("label", &inter.label)?;
            check_identifier("property", &inter.key_field)?;
            check_identifier("relationship type", &inter.source_edge)?;
            check_identifier("relationship type", &inter.target_edge)?;
            self.check_endpoint(&inter.name, &inter.source)?;
            self.check_endpoint(&inter.name, &inter.target)?;
            check_properties(&inter.name, &inter.properties)?;
        }

        for index in &self.indexes {
            let node = self.node(&index.node_type).map_err(|_| {
                RagError::configuration(format!("index on unknown node type '{}'", index.node_type))
            })?;
            let expected_ok = match index.kind {
                IndexKind::Index => index.fields.len() == 1,
                IndexKind::Composite => index.fields.len() >= 2,
            };
            if !expected_ok {
                return Err(RagError::configuration(format!(
                    "{:?} index on {} has {} fields",
                    index.kind,
                    index.node_type,
                    index.fields.len()
                )));
            }
            for field in &index.fields {
                if !node.properties.iter().any(|p| &p.name == field) {
                    return Err(RagError::configuration(format!(
                        "index field '{}' is not a property of {}",
                        field, index.node_type
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_endpoint(&self, owner: &str, node_type: &str) -> RagResult<()> {
        if self.nodes.contains_key(node_type) {
            Ok(())
        } else {
            Err(RagError::configuration(format!(
                "{} references unregistered node type '{}'",
                owner, node_type
            )))
        }
    }

    pub fn node(&self, name: &str) -> RagResult<&NodeSchema> {
        self.nodes
            .get(name)
            .ok_or_else(|| RagError::SchemaNotFound(name.to_string()))
    }

    pub fn relationship(&self, name: &str) -> RagResult<&RelationshipSchema> {
        self.relationships
            .get(name)
            .ok_or_else(|| RagError::SchemaNotFound(name.to_string()))
    }

    pub fn intermediate(&self, name: &str) -> RagResult<&IntermediateSchema> {
        self.intermediates
            .get(name)
            .ok_or_else(|| RagError::SchemaNotFound(name.to_string()))
    }

    /// Id field of a registered node type.
    pub fn id_field(&self, node_type: &str) -> RagResult<&str> {
        self.node(node_type).map(|n| n.id_field.as_str())
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSchema> {
        self.nodes.values()
    }

    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipSchema> {
        self.relationships.values()
    }

    pub fn intermediates(&self) -> impl Iterator<Item = &IntermediateSchema> {
        self.intermediates.values()
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }
}

fn check_identifier(what: &str, name: &str) -> RagResult<()> {
    if is_safe_identifier(name) {
        Ok(())
    } else {
        Err(RagError::configuration(format!("invalid {} name '{}'", what, name)))
    }
}

fn check_properties(owner: &str, properties: &[PropertySpec]) -> RagResult<()> {
    let mut seen = BTreeSet::new();
    for prop in properties {
        check_identifier("property", &prop.name)?;
        if !seen.insert(prop.name.as_str()) {
            return Err(RagError::configuration(format!(
                "property '{}' declared twice on {}",
                prop.name, owner
            )));
        }
        if let Some(default) = &prop.default {
            prop.kind.coerce(default).map_err(|_| {
                RagError::configuration(format!(
                    "default '{}' of {}.{} does not match kind {:?}",
                    default, owner, prop.name, prop.kind
                ))
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let registry = SchemaRegistry::builtin().expect("builtin catalog");
        assert_eq!(registry.nodes().count(), 9);
        assert_eq!(registry.id_field("Asset").unwrap(), "asset_id");
        assert_eq!(registry.id_field("BusinessDomain").unwrap(), "domain_id");

        let belongs = registry.relationship("BELONGS_TO").unwrap();
        assert_eq!(belongs.source, "Asset");
        assert_eq!(belongs.target, "BusinessDomain");

        let user_org = registry.relationship("USER_BELONGS_TO").unwrap();
        assert_eq!(user_org.edge, "BELONGS_TO");

        let usage = registry.intermediate("AssetUsage").unwrap();
        assert_eq!(usage.key_field, "usage_id");
        assert_eq!(usage.source_edge, "IS_USED_IN");
    }

    #[test]
    fn test_unknown_type_is_schema_not_found() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(matches!(registry.node("Widget"), Err(RagError::SchemaNotFound(n)) if n == "Widget"));
        assert!(matches!(registry.relationship("OWNS"), Err(RagError::SchemaNotFound(_))));
    }

    #[test]
    fn test_id_field_must_be_required_property() {
        let toml = r#"
            [node_types.Widget]
            label = "Widget"
            id_field = "widget_id"
            properties = [{ name = "widget_id" }]
        "#;
        let err = SchemaRegistry::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn test_rejects_unsafe_label() {
        let toml = r#"
            [node_types.Widget]
            label = "Widget) DETACH DELETE (n"
            id_field = "widget_id"
            properties = [{ name = "widget_id", required = true }]
        "#;
        assert!(SchemaRegistry::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_rejects_dangling_relationship_endpoint() {
        let toml = r#"
            [node_types.Widget]
            label = "Widget"
            id_field = "widget_id"
            properties = [{ name = "widget_id", required = true }]

            [relationship_types.PART_OF]
            type = "PART_OF"
            source = "Widget"
            target = "Gadget"
        "#;
        let err = SchemaRegistry::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("Gadget"));
    }

    #[test]
    fn test_rejects_bad_default() {
        let toml = r#"
            [node_types.Widget]
            label = "Widget"
            id_field = "widget_id"
            properties = [
                { name = "widget_id", required = true },
                { name = "weight", kind = "int", default = "heavy" },
            ]
        "#;
        assert!(SchemaRegistry::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_index_field_must_exist() {
        let toml = r#"
            [node_types.Widget]
            label = "Widget"
            id_field = "widget_id"
            properties = [{ name = "widget_id", required = true }]

            [[indexes]]
            node_type = "Widget"
            fields = ["colour"]
        "#;
        assert!(SchemaRegistry::from_toml_str(toml).is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        std::fs::write(
            &path,
            r#"
            [node_types.Widget]
            label = "Widget"
            id_field = "widget_id"
            properties = [{ name = "widget_id", required = true }]
            "#,
        )
        .unwrap();
        let registry = SchemaRegistry::from_path(&path).unwrap();
        assert_eq!(registry.node("Widget").unwrap().name, "Widget");
    }

    #[test]
    fn test_non_finite_and_out_of_range_numbers_are_rejected() {
        assert!(PropertyKind::Float.coerce("NaN").is_err());
        assert!(PropertyKind::Float.coerce("inf").is_err());
        assert!(PropertyKind::Float.coerce("-infinity").is_err());
        assert!(PropertyKind::Int.coerce("1e30").is_err());
        assert!(PropertyKind::Int.coerce("-1e19").is_err());
        assert!(PropertyKind::Int.coerce("inf").is_err());
        assert_eq!(PropertyKind::Int.coerce("1e3").unwrap(), ParamValue::Int(1000));
    }

    #[test]
    fn test_kind_coercion() {
        assert_eq!(PropertyKind::Int.coerce("5").unwrap(), ParamValue::Int(5));
        assert_eq!(PropertyKind::Int.coerce("5.0").unwrap(), ParamValue::Int(5));
        assert!(PropertyKind::Int.coerce("5.5").is_err());
        assert_eq!(PropertyKind::Float.coerce(" 82.5 ").unwrap(), ParamValue::Float(82.5));
        assert_eq!(PropertyKind::Bool.coerce("是").unwrap(), ParamValue::Bool(true));
        assert_eq!(PropertyKind::Bool.coerce("FALSE").unwrap(), ParamValue::Bool(false));
        assert!(PropertyKind::Bool.coerce("maybe").is_err());
        assert_eq!(
            PropertyKind::String.coerce("HR系统").unwrap(),
            ParamValue::String("HR系统".into())
        );
    }
}
