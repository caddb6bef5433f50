use serde_json::Value;

use crate::column::Column;
use crate::predicate::Predicate;

use super::registry::FilterHandler;
use super::types::{FieldTarget, FilterOperator, FilterOptions, FilterValue, RawFilter};

/// Parse the textual boolean forms accepted in URLs and form posts.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Tri-state boolean: true, false, or no filter. `false` is a real filter.
pub struct BooleanFilter;

impl FilterHandler for BooleanFilter {
    fn process(&self, raw: &RawFilter, _column: &Column) -> Option<FilterValue> {
        parse_bool(&raw.as_text()).map(|value| FilterValue::Boolean {
            value,
            operator: FilterOperator::Equals,
        })
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(
            value,
            FilterValue::Boolean {
                operator: FilterOperator::Equals,
                ..
            }
        )
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        match value {
            FilterValue::Boolean { value, .. } => Some(super::equality(target, Value::Bool(*value))),
            _ => None,
        }
    }

    fn is_empty(&self, _value: &FilterValue) -> bool {
        false
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions::default()
    }
}

/// Single checkbox. Checked filters on the column's configured target value;
/// unchecked means no filter.
pub struct CheckboxFilter;

impl FilterHandler for CheckboxFilter {
    fn process(&self, raw: &RawFilter, column: &Column) -> Option<FilterValue> {
        let Some(target) = column.filter_options.value.clone() else {
            tracing::warn!(field = %column.field, "checkbox filter has no target value");
            return None;
        };
        let raw = raw.as_text();
        let raw = raw.trim();
        let checked = parse_bool(raw).unwrap_or_else(|| match &target {
            Value::String(s) => s == raw,
            other => other.to_string() == raw,
        });
        checked.then_some(FilterValue::Checkbox {
            value: target,
            operator: FilterOperator::Equals,
        })
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(
            value,
            FilterValue::Checkbox { value, operator: FilterOperator::Equals } if !value.is_null()
        )
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        match value {
            FilterValue::Checkbox { value, .. } if !value.is_null() => {
                Some(super::equality(target, value.clone()))
            }
            _ => None,
        }
    }

    fn is_empty(&self, value: &FilterValue) -> bool {
        match value {
            FilterValue::Checkbox { value, .. } => value.is_null(),
            _ => false,
        }
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions::default()
    }
}
