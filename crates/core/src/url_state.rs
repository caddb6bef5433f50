//! URL state codec: grid state ⇄ flat string parameter map.
//!
//! Decoding needs the column model because the same raw string means
//! different things for different filter kinds. Without columns no filter is
//! decoded at all.

use std::collections::BTreeMap;

use serde_json::Value;
use url::form_urlencoded;

use crate::column::ColumnModel;
use crate::config::GridConfig;
use crate::error::DecodeError;
use crate::filter::{FilterRegistry, FilterValue, RawFilter};
use crate::pagination::{Cursor, PaginationMode};
use crate::sort::SortSpec;
use crate::state::GridState;

pub const PAGE: &str = "page";
pub const PAGE_SIZE: &str = "page_size";
pub const SORT: &str = "sort";
pub const SEARCH: &str = "search";
pub const AFTER: &str = "after";
pub const BEFORE: &str = "before";

/// Keys that are never filter fields.
pub const RESERVED_KEYS: [&str; 6] = [PAGE, PAGE_SIZE, SORT, SEARCH, AFTER, BEFORE];

pub fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// State recovered from URL parameters, with defaults filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedState {
    pub filters: BTreeMap<String, FilterValue>,
    pub page: u32,
    pub page_size: u32,
    pub search: String,
    pub sort: SortSpec,
    pub cursor: Option<Cursor>,
    /// Parameters that were dropped.
    pub warnings: Vec<DecodeError>,
}

pub struct UrlCodec<'a> {
    columns: &'a ColumnModel,
    registry: &'a FilterRegistry,
    default_page_size: u32,
    max_page_size: u32,
    mode: PaginationMode,
}

impl<'a> UrlCodec<'a> {
    pub fn new(columns: &'a ColumnModel, registry: &'a FilterRegistry, config: &GridConfig) -> Self {
        Self {
            columns,
            registry,
            default_page_size: config.default_page_size.max(1),
            max_page_size: config.max_page_size.max(1),
            mode: PaginationMode::Offset,
        }
    }

    /// Keyset grids navigate by cursor only, so `page` is neither written nor
    /// read.
    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the page size treated as default, for views with their own.
    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.clamp(1, self.max_page_size);
        self
    }

    /// Canonical parameters for `state`. Defaults are omitted.
    pub fn encode(&self, state: &GridState) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();

        for (field, value) in &state.filters {
            if is_reserved(field) {
                tracing::warn!(field = %field, "filter field collides with a reserved parameter");
                continue;
            }
            if let Some(raw) = self.encode_filter(field, value) {
                params.insert(field.clone(), raw);
            }
        }

        if self.mode == PaginationMode::Offset && state.current_page > 1 {
            params.insert(PAGE.to_string(), state.current_page.to_string());
        }
        if state.page_size != self.default_page_size {
            params.insert(PAGE_SIZE.to_string(), state.page_size.to_string());
        }
        let search = state.search_term.trim();
        if !search.is_empty() {
            params.insert(SEARCH.to_string(), search.to_string());
        }
        let sort = self.columns.usable_sort(&state.sort);
        if !sort.is_empty() {
            params.insert(SORT.to_string(), sort.encode());
        }
        match &state.cursor {
            Some(Cursor::After(c)) => {
                params.insert(AFTER.to_string(), c.clone());
            }
            Some(Cursor::Before(c)) => {
                params.insert(BEFORE.to_string(), c.clone());
            }
            None => {}
        }

        params
    }

    /// Raw string for one filter, or `None` when it would not survive
    /// decoding: no column, unknown kind, an empty or invalid value, or raw
    /// input the column's handler would reject or read differently.
    fn encode_filter(&self, field: &str, value: &FilterValue) -> Option<String> {
        let column = self.columns.get(field)?;
        let handler = self.registry.lookup(&column.filter_kind)?;
        if !column.filterable || handler.is_empty(value) || !handler.validate(value) {
            return None;
        }
        let raw = encode_value(value);
        let reread = handler
            .process(&RawFilter::Text(raw.clone()), column)
            .filter(|v| !handler.is_empty(v) && handler.validate(v))?;
        if encode_value(&reread) != raw {
            tracing::debug!(field, raw = %raw, "filter value does not survive decoding");
            return None;
        }
        Some(raw)
    }

    pub fn decode(&self, params: &BTreeMap<String, String>) -> DecodedState {
        let mut warnings = Vec::new();

        let page = match self.mode {
            PaginationMode::Offset => self
                .positive_int(params, PAGE, &mut warnings)
                .unwrap_or(1),
            PaginationMode::Keyset => 1,
        };
        let page_size = self
            .positive_int(params, PAGE_SIZE, &mut warnings)
            .map(|size| size.min(self.max_page_size))
            .unwrap_or(self.default_page_size);
        let search = params
            .get(SEARCH)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let sort = match params.get(SORT) {
            Some(raw) => self.decode_sort(raw, &mut warnings),
            None => SortSpec::new(),
        };
        let cursor = non_blank(params.get(AFTER))
            .map(Cursor::After)
            .or_else(|| non_blank(params.get(BEFORE)).map(Cursor::Before));

        let mut filters = BTreeMap::new();
        for (key, raw) in params {
            if is_reserved(key) {
                continue;
            }
            if let Some(value) = self.decode_filter(key, raw, &mut warnings) {
                filters.insert(key.clone(), value);
            }
        }

        for warning in &warnings {
            tracing::debug!(warning = %warning, "dropped URL parameter");
        }

        DecodedState {
            filters,
            page,
            page_size,
            search,
            sort,
            cursor,
            warnings,
        }
    }

    fn positive_int(
        &self,
        params: &BTreeMap<String, String>,
        key: &str,
        warnings: &mut Vec<DecodeError>,
    ) -> Option<u32> {
        let raw = params.get(key)?;
        match raw.trim().parse::<u32>() {
            Ok(n) if n >= 1 => Some(n),
            _ => {
                warnings.push(DecodeError::InvalidInteger {
                    key: key.to_string(),
                    raw: raw.clone(),
                });
                None
            }
        }
    }

    fn decode_sort(&self, raw: &str, warnings: &mut Vec<DecodeError>) -> SortSpec {
        let (parsed, errors) = SortSpec::parse(raw);
        warnings.extend(errors);
        parsed
            .entries()
            .iter()
            .filter(|entry| match self.columns.check_sort(entry) {
                Ok(()) => true,
                Err(err) => {
                    warnings.push(err);
                    false
                }
            })
            .cloned()
            .collect()
    }

    fn decode_filter(
        &self,
        field: &str,
        raw: &str,
        warnings: &mut Vec<DecodeError>,
    ) -> Option<FilterValue> {
        // Parameters without a column belong to someone else.
        let column = self.columns.get(field)?;
        if !column.filterable {
            return None;
        }
        let Some(handler) = self.registry.lookup(&column.filter_kind) else {
            warnings.push(DecodeError::UnknownKind {
                field: field.to_string(),
                kind: column.filter_kind.name().to_string(),
            });
            return None;
        };

        let value = handler
            .process(&RawFilter::Text(raw.to_string()), column)
            .filter(|v| !handler.is_empty(v) && handler.validate(v));
        if value.is_none() && !raw.trim().is_empty() {
            warnings.push(DecodeError::InvalidFilter {
                field: field.to_string(),
                raw: raw.to_string(),
            });
        }
        value
    }
}

/// Canonical raw string of a filter value.
pub fn encode_value(value: &FilterValue) -> String {
    match value {
        FilterValue::Text { value, .. }
        | FilterValue::Select { value, .. }
        | FilterValue::RadioGroup { value, .. }
        | FilterValue::Autocomplete { value, .. } => value.trim().to_string(),
        FilterValue::MultiSelect { values, .. } | FilterValue::MultiCheckboxes { values, .. } => {
            let mut seen: Vec<&str> = Vec::with_capacity(values.len());
            for v in values.iter().map(|v| v.trim()) {
                if !v.is_empty() && !seen.contains(&v) {
                    seen.push(v);
                }
            }
            seen.join(",")
        }
        FilterValue::Boolean { value, .. } => value.to_string(),
        FilterValue::Checkbox { .. } => "true".to_string(),
        FilterValue::DateRange { from, to, .. } => format!("{},{}", from.trim(), to.trim()),
        FilterValue::NumberRange { min, max, .. } => format!("{},{}", min.trim(), max.trim()),
        FilterValue::Custom { value, .. } => match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

/// `application/x-www-form-urlencoded` form of a parameter map.
pub fn to_query_string(params: &BTreeMap<String, String>) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish()
}

/// Parse a query string. A leading `?` is ignored and repeated keys are
/// joined with commas.
pub fn from_query_string(query: &str) -> BTreeMap<String, String> {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut params: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert_with(|| value.to_string());
    }
    params
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
