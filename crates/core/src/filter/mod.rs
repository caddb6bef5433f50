//! Filter kinds.
//!
//! Every kind implements [`FilterHandler`]: it turns raw input into a
//! [`FilterValue`], validates and empties it, and builds a [`Predicate`] for a
//! field. The built-in kinds live in this module; custom kinds are added to a
//! [`FilterRegistry`] at startup.

mod boolean;
mod choice;
mod multi;
mod range;
pub mod registry;
mod text;
mod types;

use serde_json::Value;

use crate::predicate::Predicate;

pub use boolean::{BooleanFilter, CheckboxFilter, parse_bool};
pub use choice::{ChoiceFilter, DEFAULT_MAX_RESULTS, search_options};
pub use multi::MultiValueFilter;
pub use range::RangeFilter;
pub use registry::{FilterDefinition, FilterHandler, FilterRegistry, is_valid_kind_name};
pub use text::TextFilter;
pub use types::{
    BuiltinKind, FieldTarget, FilterKind, FilterOperator, FilterOptions, FilterValue, MatchMode,
    RawFilter, SelectOption,
};

impl BuiltinKind {
    /// The handler implementing this kind.
    pub fn handler(&self) -> &'static dyn FilterHandler {
        match self {
            BuiltinKind::Text => &TextFilter,
            BuiltinKind::Select => &ChoiceFilter {
                kind: BuiltinKind::Select,
            },
            BuiltinKind::RadioGroup => &ChoiceFilter {
                kind: BuiltinKind::RadioGroup,
            },
            BuiltinKind::Autocomplete => &ChoiceFilter {
                kind: BuiltinKind::Autocomplete,
            },
            BuiltinKind::MultiSelect => &MultiValueFilter {
                kind: BuiltinKind::MultiSelect,
            },
            BuiltinKind::MultiCheckboxes => &MultiValueFilter {
                kind: BuiltinKind::MultiCheckboxes,
            },
            BuiltinKind::Boolean => &BooleanFilter,
            BuiltinKind::Checkbox => &CheckboxFilter,
            BuiltinKind::DateRange => &RangeFilter {
                kind: BuiltinKind::DateRange,
            },
            BuiltinKind::NumberRange => &RangeFilter {
                kind: BuiltinKind::NumberRange,
            },
        }
    }
}

/// Equality against a scalar field, or element membership against an
/// array-typed one.
pub(crate) fn equality(target: &FieldTarget, value: Value) -> Predicate {
    if target.array {
        Predicate::has_element(target.field.clone(), value)
    } else {
        Predicate::eq(target.field.clone(), value)
    }
}
