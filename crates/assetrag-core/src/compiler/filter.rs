//! `FilterCondition` slot grammar.
//!
//! Two forms are understood:
//!
//! - star form: `五星`, `4星级` → `star_level = N`
//! - comparator form: `<subject><op><number>[分]`, e.g. `价值评估>80分`,
//!   `star_level>=4`
//!
//! Anything else is not a condition the compiler can express.

use std::sync::LazyLock;

use regex::Regex;

use crate::statement::ParamValue;

static STAR_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([1-5一二三四五])\s*星级?$").expect("valid star regex"));

static COMPARATOR_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(价值评估|价值评分|价值|value_score|星级|star_level)\s*(>=|<=|≥|≤|>|<|=|＞|＜|＝)\s*(\d+(?:\.\d+)?)\s*分?$")
        .expect("valid comparator regex")
});

/// Asset property a condition can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterProperty {
    StarLevel,
    ValueScore,
}

impl FilterProperty {
    pub fn property(&self) -> &'static str {
        match self {
            Self::StarLevel => "star_level",
            Self::ValueScore => "value_score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparator {
    pub fn as_cypher(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "＝" => Some(Self::Eq),
            ">" | "＞" => Some(Self::Gt),
            ">=" | "≥" => Some(Self::Gte),
            "<" | "＜" => Some(Self::Lt),
            "<=" | "≤" => Some(Self::Lte),
            _ => None,
        }
    }
}

/// A parsed `FilterCondition` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub property: FilterProperty,
    pub comparator: Comparator,
    pub threshold: ParamValue,
}

impl FilterCondition {
    /// Parse a condition; `None` when the text matches neither form.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some(caps) = STAR_FORM.captures(text) {
            let level = star_digit(&caps[1])?;
            return Some(Self {
                property: FilterProperty::StarLevel,
                comparator: Comparator::Eq,
                threshold: ParamValue::Int(level),
            });
        }

        let caps = COMPARATOR_FORM.captures(text)?;
        let property = match &caps[1] {
            "星级" | "star_level" => FilterProperty::StarLevel,
            _ => FilterProperty::ValueScore,
        };
        let comparator = Comparator::parse(&caps[2])?;
        let threshold = match property {
            // Star levels are whole numbers; a fractional bound is not expressible.
            FilterProperty::StarLevel => {
                let level = caps[3].parse::<f64>().ok()?;
                if level.fract() != 0.0 || level >= i64::MAX as f64 {
                    return None;
                }
                ParamValue::Int(level as i64)
            }
            FilterProperty::ValueScore => ParamValue::Float(caps[3].parse().ok()?),
        };
        Some(Self {
            property,
            comparator,
            threshold,
        })
    }

    /// WHERE-clause predicate against `alias`, bound to `$param`.
    pub fn predicate(&self, alias: &str, param: &str) -> String {
        format!(
            "{}.{} {} ${}",
            alias,
            self.property.property(),
            self.comparator.as_cypher(),
            param
        )
    }
}

fn star_digit(s: &str) -> Option<i64> {
    match s {
        "1" | "一" => Some(1),
        "2" | "二" => Some(2),
        "3" | "三" => Some(3),
        "4" | "四" => Some(4),
        "5" | "五" => Some(5),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_forms() {
        let five = FilterCondition::parse("五星").unwrap();
        assert_eq!(five.property, FilterProperty::StarLevel);
        assert_eq!(five.comparator, Comparator::Eq);
        assert_eq!(five.threshold, ParamValue::Int(5));

        let four = FilterCondition::parse("4星级").unwrap();
        assert_eq!(four.threshold, ParamValue::Int(4));
    }

    #[test]
    fn test_value_score_comparator() {
        let cond = FilterCondition::parse("价值评估>80分").unwrap();
        assert_eq!(cond.property, FilterProperty::ValueScore);
        assert_eq!(cond.comparator, Comparator::Gt);
        assert_eq!(cond.threshold, ParamValue::Float(80.0));
        assert_eq!(cond.predicate("a", "filter_threshold"), "a.value_score > $filter_threshold");
    }

    #[test]
    fn test_full_width_operator() {
        let cond = FilterCondition::parse("星级≥4").unwrap();
        assert_eq!(cond.property, FilterProperty::StarLevel);
        assert_eq!(cond.comparator, Comparator::Gte);
        assert_eq!(cond.threshold, ParamValue::Int(4));
    }

    #[test]
    fn test_fractional_star_threshold_is_rejected() {
        assert!(FilterCondition::parse("星级>=3.5").is_none());
        assert!(FilterCondition::parse("星级<4.5").is_none());
        assert_eq!(
            FilterCondition::parse("star_level>3.0").unwrap().threshold,
            ParamValue::Int(3)
        );
        let cond = FilterCondition::parse("价值评估>=82.5").unwrap();
        assert_eq!(cond.threshold, ParamValue::Float(82.5));
    }

    #[test]
    fn test_unparseable_conditions() {
        assert!(FilterCondition::parse("最近更新").is_none());
        assert!(FilterCondition::parse("六星").is_none());
        assert!(FilterCondition::parse("owner=张三").is_none());
        assert!(FilterCondition::parse("").is_none());
    }
}
