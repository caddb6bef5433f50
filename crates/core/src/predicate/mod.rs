//! Backend-neutral predicate tree.
//!
//! Filter kinds build `Predicate` values; the translator combines them. A
//! resource can evaluate the tree in memory (`Predicate::matches`) or render it
//! to SQL (`sql::SqlRenderer`).

pub mod sql;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::Record;

/// Comparison operators for scalar predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// How a text predicate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatch {
    Contains,
    StartsWith,
    EndsWith,
    Equals,
}

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Every child must hold.
    All(Vec<Predicate>),
    /// At least one child must hold.
    Any(Vec<Predicate>),
    /// Scalar comparison against a field.
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Substring, prefix, suffix or whole-string match.
    Text {
        field: String,
        mode: TextMatch,
        value: String,
        case_sensitive: bool,
    },
    /// The array-typed field contains `value` as an element.
    HasElement { field: String, value: Value },
    /// Some related record reached through `relationship` satisfies `predicate`.
    Exists {
        relationship: String,
        predicate: Box<Predicate>,
    },
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn has_element(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::HasElement {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn exists(relationship: impl Into<String>, predicate: Predicate) -> Self {
        Predicate::Exists {
            relationship: relationship.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Conjunction of `parts`. Returns `None` when there is nothing to constrain.
    pub fn and(parts: Vec<Predicate>) -> Option<Predicate> {
        Self::combine(parts, Predicate::All)
    }

    /// Disjunction of `parts`. Returns `None` when there is nothing to constrain.
    pub fn or(parts: Vec<Predicate>) -> Option<Predicate> {
        Self::combine(parts, Predicate::Any)
    }

    fn combine(
        mut parts: Vec<Predicate>,
        wrap: fn(Vec<Predicate>) -> Predicate,
    ) -> Option<Predicate> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(wrap(parts)),
        }
    }

    /// Whether this predicate references `relationship` in an existence check.
    pub fn uses_relationship(&self, relationship: &str) -> bool {
        match self {
            Predicate::All(parts) | Predicate::Any(parts) => {
                parts.iter().any(|p| p.uses_relationship(relationship))
            }
            Predicate::Exists {
                relationship: rel, ..
            } => rel == relationship,
            _ => false,
        }
    }

    /// Evaluate against an in-memory record.
    ///
    /// Relationships are read as nested values: an object (to-one) or an array
    /// of objects (to-many). Missing or null fields never match.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(record)),
            Predicate::Compare { field, op, value } => {
                let Some(actual) = lookup(record, field) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => values_equal(actual, value),
                    CompareOp::Gt => compare_values(actual, value) == Some(Ordering::Greater),
                    CompareOp::Gte => matches!(
                        compare_values(actual, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    CompareOp::Lt => compare_values(actual, value) == Some(Ordering::Less),
                    CompareOp::Lte => matches!(
                        compare_values(actual, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                }
            }
            Predicate::Text {
                field,
                mode,
                value,
                case_sensitive,
            } => {
                let Some(actual) = lookup(record, field).and_then(scalar_text) else {
                    return false;
                };
                let (haystack, needle) = if *case_sensitive {
                    (actual, value.clone())
                } else {
                    (actual.to_lowercase(), value.to_lowercase())
                };
                match mode {
                    TextMatch::Contains => haystack.contains(&needle),
                    TextMatch::StartsWith => haystack.starts_with(&needle),
                    TextMatch::EndsWith => haystack.ends_with(&needle),
                    TextMatch::Equals => haystack == needle,
                }
            }
            Predicate::HasElement { field, value } => match lookup(record, field) {
                Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, value)),
                _ => false,
            },
            Predicate::Exists {
                relationship,
                predicate,
            } => match record.get(relationship) {
                Some(Value::Object(related)) => predicate.matches(related),
                Some(Value::Array(items)) => items.iter().any(|item| match item {
                    Value::Object(related) => predicate.matches(related),
                    _ => false,
                }),
                _ => false,
            },
        }
    }
}

/// Look up a possibly dotted field inside a record. Null counts as missing.
fn lookup<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Equality with light coercion: numbers compare numerically and a string
/// equals a number or boolean with the same textual form.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(s), Value::Number(_) | Value::Bool(_))
        | (Value::Number(_) | Value::Bool(_), Value::String(s)) => {
            let other = if a.is_string() { b } else { a };
            scalar_text(other).as_deref() == Some(s.as_str())
        }
        _ => a == b,
    }
}

/// Ordering between two scalars of compatible types.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(s), Value::Number(n)) => s.parse::<f64>().ok()?.partial_cmp(&n.as_f64()?),
        (Value::Number(n), Value::String(s)) => n.as_f64()?.partial_cmp(&s.parse::<f64>().ok()?),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn and_or_collapse_trivial_lists() {
        assert_eq!(Predicate::and(vec![]), None);
        let single = Predicate::eq("status", "active");
        assert_eq!(Predicate::and(vec![single.clone()]), Some(single.clone()));
        assert_eq!(Predicate::or(vec![single.clone()]), Some(single));
    }

    #[test]
    fn text_match_respects_case_sensitivity() {
        let rec = record(json!({"title": "Abbey Road"}));
        let insensitive = Predicate::Text {
            field: "title".to_string(),
            mode: TextMatch::Contains,
            value: "abbey".to_string(),
            case_sensitive: false,
        };
        let sensitive = Predicate::Text {
            field: "title".to_string(),
            mode: TextMatch::Contains,
            value: "abbey".to_string(),
            case_sensitive: true,
        };
        assert!(insensitive.matches(&rec));
        assert!(!sensitive.matches(&rec));
    }

    #[test]
    fn has_element_tests_membership_not_structure() {
        let rec = record(json!({"tags": ["rock", "pop"]}));
        assert!(Predicate::has_element("tags", "rock").matches(&rec));
        assert!(!Predicate::has_element("tags", "jazz").matches(&rec));
        // Structural equality against the whole array never matches a scalar.
        assert!(!Predicate::eq("tags", "rock").matches(&rec));
    }

    #[test]
    fn exists_reads_to_one_and_to_many_relationships() {
        let inner = Predicate::Text {
            field: "name".to_string(),
            mode: TextMatch::Contains,
            value: "beatles".to_string(),
            case_sensitive: false,
        };
        let pred = Predicate::exists("artist", inner);

        let to_one = record(json!({"artist": {"name": "The Beatles"}}));
        let to_many = record(json!({"artist": [{"name": "Wings"}, {"name": "The Beatles"}]}));
        let missing = record(json!({"artist": null}));

        assert!(pred.matches(&to_one));
        assert!(pred.matches(&to_many));
        assert!(!pred.matches(&missing));
    }

    #[test]
    fn numeric_comparisons_coerce_strings() {
        let rec = record(json!({"year": 1969}));
        assert!(Predicate::compare("year", CompareOp::Gte, json!(1969.0)).matches(&rec));
        assert!(Predicate::compare("year", CompareOp::Lt, json!(1970)).matches(&rec));
        assert!(Predicate::eq("year", "1969").matches(&rec));
        assert!(!Predicate::compare("year", CompareOp::Gt, json!(1969)).matches(&rec));
    }

    #[test]
    fn null_fields_never_match() {
        let rec = record(json!({"year": null}));
        assert!(!Predicate::compare("year", CompareOp::Lte, json!(2000)).matches(&rec));
        assert!(!Predicate::eq("missing", "x").matches(&rec));
    }

    #[test]
    fn uses_relationship_walks_the_tree() {
        let pred = Predicate::and(vec![
            Predicate::eq("status", "active"),
            Predicate::exists("artist", Predicate::eq("country", "UK")),
        ])
        .unwrap();
        assert!(pred.uses_relationship("artist"));
        assert!(!pred.uses_relationship("label"));
    }
}
