//! Parameterized Cypher statements and the rows they return.
//!
//! A [`Statement`] never carries user data inside its text: values travel in
//! the parameter map and are bound by the driver. Only identifiers that were
//! validated against the schema (labels, relationship types, property names)
//! are interpolated.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// A value bound to a `$name` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::List(items) => write!(f, "{:?}", items),
        }
    }
}

/// Cypher text plus bound parameters and the columns it returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub params: BTreeMap<String, ParamValue>,
    pub columns: Vec<String>,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
            columns: Vec::new(),
        }
    }

    /// Bind a parameter.
    pub fn param(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Declare the columns a caller should read from each returned row.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn get_param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }
}

/// One result row, keeping the column order of the statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a column value.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Whether `name` may be interpolated into Cypher as a label, relationship
/// type or property key.
pub fn is_safe_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(is_safe_identifier("Asset"));
        assert!(is_safe_identifier("HAS_FIELD"));
        assert!(is_safe_identifier("_private"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("1Asset"));
        assert!(!is_safe_identifier("Asset`) DETACH DELETE n //"));
        assert!(!is_safe_identifier("资产"));
    }

    #[test]
    fn test_record_keeps_column_order() {
        let record = Record::new()
            .with("name", "HR系统")
            .with("type", "系统")
            .with("star_level", 5);
        let keys: Vec<&str> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "type", "star_level"]);
        assert_eq!(record.get_str("name"), Some("HR系统"));
        assert_eq!(record.get_i64("star_level"), Some(5));
    }

    #[test]
    fn test_record_insert_replaces() {
        let mut record = Record::new().with("linked", 0);
        record.insert("linked", 1);
        assert_eq!(record.len(), 1);
        assert_eq!(record.get_i64("linked"), Some(1));
    }

    #[test]
    fn test_statement_builder() {
        let stmt = Statement::new("MATCH (a:Asset) WHERE a.name = $asset_name RETURN a.name AS name")
            .param("asset_name", "HR系统")
            .returning(["name"]);
        assert_eq!(stmt.get_param("asset_name"), Some(&ParamValue::from("HR系统")));
        assert_eq!(stmt.columns, vec!["name".to_string()]);
    }
}
