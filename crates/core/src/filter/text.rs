use crate::column::Column;
use crate::predicate::Predicate;

use super::registry::FilterHandler;
use super::types::{FieldTarget, FilterOperator, FilterOptions, FilterValue, RawFilter};

/// Free-text match: contains, starts with, ends with or equals.
pub struct TextFilter;

impl FilterHandler for TextFilter {
    fn process(&self, raw: &RawFilter, column: &Column) -> Option<FilterValue> {
        let value = raw.as_text().trim().to_string();
        if value.is_empty() {
            return None;
        }
        let operator = column
            .filter_options
            .operator
            .filter(|op| op.text_match().is_some())
            .unwrap_or(FilterOperator::Contains);
        Some(FilterValue::Text {
            value,
            operator,
            case_sensitive: column.filter_options.case_sensitive.unwrap_or(false),
        })
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(value, FilterValue::Text { operator, .. } if operator.text_match().is_some())
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        let FilterValue::Text {
            value,
            operator,
            case_sensitive,
        } = value
        else {
            return None;
        };
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Predicate::Text {
            field: target.field.clone(),
            mode: operator.text_match()?,
            value: value.to_string(),
            case_sensitive: *case_sensitive,
        })
    }

    fn is_empty(&self, value: &FilterValue) -> bool {
        match value {
            FilterValue::Text { value, .. } => value.trim().is_empty(),
            _ => false,
        }
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions {
            operator: Some(FilterOperator::Contains),
            case_sensitive: Some(false),
            ..Default::default()
        }
    }
}
