use serde_json::Value;

use crate::column::Column;
use crate::predicate::Predicate;

use super::registry::FilterHandler;
use super::types::{
    BuiltinKind, FieldTarget, FilterOperator, FilterOptions, FilterValue, MatchMode, RawFilter,
};

/// Set membership over several values: multi-select and multi-checkboxes.
///
/// Values combine with OR (`MatchMode::Any`) or AND (`MatchMode::All`). The
/// URL form is comma-joined, so values containing a comma are dropped.
pub struct MultiValueFilter {
    pub kind: BuiltinKind,
}

impl MultiValueFilter {
    fn parts<'a>(&self, value: &'a FilterValue) -> Option<(&'a [String], MatchMode)> {
        match (self.kind, value) {
            (
                BuiltinKind::MultiSelect,
                FilterValue::MultiSelect {
                    values,
                    operator,
                    match_mode,
                },
            )
            | (
                BuiltinKind::MultiCheckboxes,
                FilterValue::MultiCheckboxes {
                    values,
                    operator,
                    match_mode,
                },
            ) if *operator == FilterOperator::In => Some((values.as_slice(), *match_mode)),
            _ => None,
        }
    }
}

impl FilterHandler for MultiValueFilter {
    fn process(&self, raw: &RawFilter, column: &Column) -> Option<FilterValue> {
        let options = &column.filter_options;
        let mut values: Vec<String> = Vec::new();
        for value in raw.values() {
            let value = value.trim();
            if value.is_empty() || values.iter().any(|v| v == value) {
                continue;
            }
            if value.contains(',') {
                tracing::debug!(field = %column.field, value, "dropping value containing a comma");
                continue;
            }
            if !options.options.is_empty() && !options.has_option(value) {
                tracing::debug!(field = %column.field, value, "dropping value outside the column's options");
                continue;
            }
            values.push(value.to_string());
        }
        if values.is_empty() {
            return None;
        }

        let operator = FilterOperator::In;
        let match_mode = options.match_mode.unwrap_or_default();
        Some(match self.kind {
            BuiltinKind::MultiCheckboxes => FilterValue::MultiCheckboxes {
                values,
                operator,
                match_mode,
            },
            _ => FilterValue::MultiSelect {
                values,
                operator,
                match_mode,
            },
        })
    }

    fn validate(&self, value: &FilterValue) -> bool {
        self.parts(value).is_some_and(|(values, _)| {
            values
                .iter()
                .all(|v| !v.trim().is_empty() && !v.contains(','))
        })
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        let (values, match_mode) = self.parts(value)?;
        let parts: Vec<Predicate> = values
            .iter()
            .filter(|v| !v.trim().is_empty())
            .map(|v| super::equality(target, Value::String(v.clone())))
            .collect();
        match match_mode {
            MatchMode::Any => Predicate::or(parts),
            MatchMode::All => Predicate::and(parts),
        }
    }

    fn is_empty(&self, value: &FilterValue) -> bool {
        self.parts(value)
            .is_some_and(|(values, _)| values.iter().all(|v| v.trim().is_empty()))
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions {
            match_mode: Some(MatchMode::Any),
            ..Default::default()
        }
    }
}
