use serde_json::Value;

use crate::column::Column;
use crate::predicate::Predicate;

use super::registry::FilterHandler;
use super::types::{
    BuiltinKind, FieldTarget, FilterOperator, FilterOptions, FilterValue, RawFilter, SelectOption,
};

/// Default cap on autocomplete candidates.
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Single-choice exact match: select, radio group and autocomplete.
///
/// When the column carries a static option list, input outside of it is
/// rejected.
pub struct ChoiceFilter {
    pub kind: BuiltinKind,
}

impl ChoiceFilter {
    fn wrap(&self, value: String) -> FilterValue {
        let operator = FilterOperator::Equals;
        match self.kind {
            BuiltinKind::RadioGroup => FilterValue::RadioGroup { value, operator },
            BuiltinKind::Autocomplete => FilterValue::Autocomplete { value, operator },
            _ => FilterValue::Select { value, operator },
        }
    }

    fn unwrap_value<'a>(&self, value: &'a FilterValue) -> Option<&'a str> {
        match (self.kind, value) {
            (BuiltinKind::RadioGroup, FilterValue::RadioGroup { value, operator })
            | (BuiltinKind::Autocomplete, FilterValue::Autocomplete { value, operator })
            | (BuiltinKind::Select, FilterValue::Select { value, operator })
                if *operator == FilterOperator::Equals =>
            {
                Some(value.as_str())
            }
            _ => None,
        }
    }
}

impl FilterHandler for ChoiceFilter {
    fn process(&self, raw: &RawFilter, column: &Column) -> Option<FilterValue> {
        let value = raw.as_text().trim().to_string();
        if value.is_empty() {
            return None;
        }
        let options = &column.filter_options;
        if !options.options.is_empty() && !options.has_option(&value) {
            tracing::debug!(
                field = %column.field,
                value = %value,
                "value is not one of the column's options"
            );
            return None;
        }
        Some(self.wrap(value))
    }

    fn validate(&self, value: &FilterValue) -> bool {
        self.unwrap_value(value).is_some()
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        let value = self.unwrap_value(value)?.trim();
        if value.is_empty() {
            return None;
        }
        Some(super::equality(target, Value::String(value.to_string())))
    }

    fn is_empty(&self, value: &FilterValue) -> bool {
        self.unwrap_value(value)
            .is_some_and(|value| value.trim().is_empty())
    }

    fn default_options(&self) -> FilterOptions {
        match self.kind {
            BuiltinKind::Autocomplete => FilterOptions {
                max_results: Some(DEFAULT_MAX_RESULTS),
                ..Default::default()
            },
            _ => FilterOptions::default(),
        }
    }
}

/// Autocomplete candidates: options whose label or value contains `term`
/// (case-insensitive), capped at `max_results`. A blank term matches nothing.
pub fn search_options(options: &[SelectOption], term: &str, max_results: usize) -> Vec<SelectOption> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return Vec::new();
    }
    options
        .iter()
        .filter(|o| {
            o.label.to_lowercase().contains(&term) || o.value.to_lowercase().contains(&term)
        })
        .take(max_results)
        .cloned()
        .collect()
}
