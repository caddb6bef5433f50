//! Filter kind identifiers, operators, values and options.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::predicate::TextMatch;

/// Built-in filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinKind {
    Text,
    Select,
    MultiSelect,
    MultiCheckboxes,
    Boolean,
    Checkbox,
    RadioGroup,
    DateRange,
    NumberRange,
    Autocomplete,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 10] = [
        BuiltinKind::Text,
        BuiltinKind::Select,
        BuiltinKind::MultiSelect,
        BuiltinKind::MultiCheckboxes,
        BuiltinKind::Boolean,
        BuiltinKind::Checkbox,
        BuiltinKind::RadioGroup,
        BuiltinKind::DateRange,
        BuiltinKind::NumberRange,
        BuiltinKind::Autocomplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinKind::Text => "text",
            BuiltinKind::Select => "select",
            BuiltinKind::MultiSelect => "multi_select",
            BuiltinKind::MultiCheckboxes => "multi_checkboxes",
            BuiltinKind::Boolean => "boolean",
            BuiltinKind::Checkbox => "checkbox",
            BuiltinKind::RadioGroup => "radio_group",
            BuiltinKind::DateRange => "date_range",
            BuiltinKind::NumberRange => "number_range",
            BuiltinKind::Autocomplete => "autocomplete",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter kind: built in, or registered at startup under a custom name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Builtin(BuiltinKind),
    Custom(String),
}

impl FilterKind {
    /// Built-in names map to their built-in kind; anything else is custom.
    pub fn from_name(name: &str) -> Self {
        match BuiltinKind::from_name(name) {
            Some(kind) => FilterKind::Builtin(kind),
            None => FilterKind::Custom(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FilterKind::Builtin(kind) => kind.as_str(),
            FilterKind::Custom(name) => name,
        }
    }

    pub fn builtin(&self) -> Option<BuiltinKind> {
        match self {
            FilterKind::Builtin(kind) => Some(*kind),
            FilterKind::Custom(_) => None,
        }
    }
}

impl From<BuiltinKind> for FilterKind {
    fn from(kind: BuiltinKind) -> Self {
        FilterKind::Builtin(kind)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for FilterKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for FilterKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(FilterKind::from_name(&name))
    }
}

/// Comparison operators carried by filter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Substring match.
    #[default]
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
    /// Exact match.
    Equals,
    /// Set membership.
    In,
    /// Inclusive range, either bound optional.
    Between,
}

impl FilterOperator {
    /// The text match mode for text operators.
    pub fn text_match(&self) -> Option<TextMatch> {
        match self {
            FilterOperator::Contains => Some(TextMatch::Contains),
            FilterOperator::StartsWith => Some(TextMatch::StartsWith),
            FilterOperator::EndsWith => Some(TextMatch::EndsWith),
            FilterOperator::Equals => Some(TextMatch::Equals),
            FilterOperator::In | FilterOperator::Between => None,
        }
    }
}

/// How the values of a multi-valued filter combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// At least one value matches (OR).
    #[default]
    Any,
    /// Every value matches (AND).
    All,
}

/// Validated filter input for one field. The variant matches the column's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterValue {
    Text {
        value: String,
        operator: FilterOperator,
        case_sensitive: bool,
    },
    Select {
        value: String,
        operator: FilterOperator,
    },
    MultiSelect {
        values: Vec<String>,
        operator: FilterOperator,
        match_mode: MatchMode,
    },
    MultiCheckboxes {
        values: Vec<String>,
        operator: FilterOperator,
        match_mode: MatchMode,
    },
    Boolean {
        value: bool,
        operator: FilterOperator,
    },
    /// Checked checkbox; `value` is the column's configured target value.
    Checkbox {
        value: Value,
        operator: FilterOperator,
    },
    RadioGroup {
        value: String,
        operator: FilterOperator,
    },
    DateRange {
        from: String,
        to: String,
        operator: FilterOperator,
    },
    NumberRange {
        min: String,
        max: String,
        operator: FilterOperator,
    },
    Autocomplete {
        value: String,
        operator: FilterOperator,
    },
    /// Value of a kind registered at startup.
    Custom { kind: String, value: Value },
}

impl FilterValue {
    /// Name of the filter kind this value belongs to.
    pub fn kind_name(&self) -> &str {
        match self {
            FilterValue::Text { .. } => "text",
            FilterValue::Select { .. } => "select",
            FilterValue::MultiSelect { .. } => "multi_select",
            FilterValue::MultiCheckboxes { .. } => "multi_checkboxes",
            FilterValue::Boolean { .. } => "boolean",
            FilterValue::Checkbox { .. } => "checkbox",
            FilterValue::RadioGroup { .. } => "radio_group",
            FilterValue::DateRange { .. } => "date_range",
            FilterValue::NumberRange { .. } => "number_range",
            FilterValue::Autocomplete { .. } => "autocomplete",
            FilterValue::Custom { kind, .. } => kind,
        }
    }
}

/// One entry of a select-like option list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Per-column filter configuration. Unset fields fall back to the kind's
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Options for select, radio group, multi-value and autocomplete kinds.
    pub options: Vec<SelectOption>,
    /// Text operator.
    pub operator: Option<FilterOperator>,
    pub case_sensitive: Option<bool>,
    pub match_mode: Option<MatchMode>,
    /// Checkbox target value.
    pub value: Option<Value>,
    /// Autocomplete candidate cap.
    pub max_results: Option<usize>,
    /// Options understood only by custom kinds.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl FilterOptions {
    /// Overlay `self` (explicit configuration) on top of `defaults`.
    pub fn merged_over(self, defaults: FilterOptions) -> FilterOptions {
        let mut extra = defaults.extra;
        extra.extend(self.extra);
        FilterOptions {
            options: if self.options.is_empty() {
                defaults.options
            } else {
                self.options
            },
            operator: self.operator.or(defaults.operator),
            case_sensitive: self.case_sensitive.or(defaults.case_sensitive),
            match_mode: self.match_mode.or(defaults.match_mode),
            value: self.value.or(defaults.value),
            max_results: self.max_results.or(defaults.max_results),
            extra,
        }
    }

    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o.value == value)
    }
}

/// Unprocessed filter input, from a URL parameter or a form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFilter {
    Text(String),
    List(Vec<String>),
}

impl RawFilter {
    /// Single-string form; lists are comma-joined.
    pub fn as_text(&self) -> String {
        match self {
            RawFilter::Text(s) => s.clone(),
            RawFilter::List(items) => items.join(","),
        }
    }

    /// List form; text is split on commas.
    pub fn values(&self) -> Vec<String> {
        match self {
            RawFilter::Text(s) => s.split(',').map(str::to_string).collect(),
            RawFilter::List(items) => items.clone(),
        }
    }
}

impl From<&str> for RawFilter {
    fn from(s: &str) -> Self {
        RawFilter::Text(s.to_string())
    }
}

impl From<String> for RawFilter {
    fn from(s: String) -> Self {
        RawFilter::Text(s)
    }
}

impl From<Vec<String>> for RawFilter {
    fn from(items: Vec<String>) -> Self {
        RawFilter::List(items)
    }
}

/// The field a filter predicate is built against, inside the record the
/// predicate is evaluated on (the related record for relationship columns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTarget {
    pub field: String,
    /// The attribute is array-typed.
    pub array: bool,
}

impl FieldTarget {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            array: false,
        }
    }

    pub fn array(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            array: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_roundtrip() {
        for kind in BuiltinKind::ALL {
            assert_eq!(FilterKind::from_name(kind.as_str()), FilterKind::Builtin(kind));
        }
        assert_eq!(
            FilterKind::from_name("star_rating"),
            FilterKind::Custom("star_rating".to_string())
        );
    }

    #[test]
    fn filter_kind_serializes_as_name() {
        let json = serde_json::to_string(&FilterKind::Builtin(BuiltinKind::DateRange)).unwrap();
        assert_eq!(json, "\"date_range\"");
        let parsed: FilterKind = serde_json::from_str("\"star_rating\"").unwrap();
        assert_eq!(parsed, FilterKind::Custom("star_rating".to_string()));
    }

    #[test]
    fn filter_value_is_tagged_by_type() {
        let value = FilterValue::Select {
            value: "active".to_string(),
            operator: FilterOperator::Equals,
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "select", "value": "active", "operator": "equals"})
        );
    }

    #[test]
    fn explicit_options_override_defaults() {
        let defaults = FilterOptions {
            operator: Some(FilterOperator::Contains),
            case_sensitive: Some(false),
            max_results: Some(50),
            ..Default::default()
        };
        let explicit = FilterOptions {
            operator: Some(FilterOperator::StartsWith),
            ..Default::default()
        };
        let merged = explicit.merged_over(defaults);
        assert_eq!(merged.operator, Some(FilterOperator::StartsWith));
        assert_eq!(merged.case_sensitive, Some(false));
        assert_eq!(merged.max_results, Some(50));
    }

    #[test]
    fn raw_filter_forms() {
        let raw = RawFilter::from("a,b");
        assert_eq!(raw.values(), vec!["a", "b"]);
        let list = RawFilter::from(vec!["x".to_string(), "y".to_string()]);
        assert_eq!(list.as_text(), "x,y");
    }
}
