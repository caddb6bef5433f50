//! Query translation: grid state + column model → predicate, sort and page
//! request.
//!
//! Translation never fails as a whole. A filter that cannot be translated
//! (unknown column, unregistered kind, invalid value) is skipped, logged and
//! reported in [`TranslatedQuery::skipped`].

use std::fmt;

use serde::Serialize;

use crate::column::{Column, ColumnModel};
use crate::filter::{FieldTarget, FilterRegistry, FilterValue};
use crate::pagination::{Cursor, PageRequest, PaginationMode};
use crate::predicate::{Predicate, TextMatch};
use crate::sort::SortSpec;
use crate::state::GridState;

/// Why a filter was left out of the predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// No column is configured for the field.
    UnknownColumn,
    /// The column does not allow filtering.
    NotFilterable,
    /// The column's filter kind is not registered.
    UnknownKind { kind: String },
    /// The value failed the kind's validation.
    InvalidValue,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownColumn => f.write_str("no column for field"),
            SkipReason::NotFilterable => f.write_str("column is not filterable"),
            SkipReason::UnknownKind { kind } => write!(f, "filter kind '{kind}' is not registered"),
            SkipReason::InvalidValue => f.write_str("value failed validation"),
        }
    }
}

/// A filter left out of the translated predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFilter {
    pub field: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Backend-neutral query for one load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedQuery {
    /// `None` when nothing is constrained.
    pub predicate: Option<Predicate>,
    pub sort: SortSpec,
    pub page: PageRequest,
    pub skipped: Vec<SkippedFilter>,
}

pub struct QueryTranslator<'a> {
    columns: &'a ColumnModel,
    registry: &'a FilterRegistry,
    mode: PaginationMode,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(columns: &'a ColumnModel, registry: &'a FilterRegistry) -> Self {
        Self {
            columns,
            registry,
            mode: PaginationMode::Offset,
        }
    }

    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn translate(&self, state: &GridState) -> TranslatedQuery {
        let mut parts = Vec::new();
        let mut skipped = Vec::new();

        for (field, value) in &state.filters {
            match self.filter_predicate(field, value) {
                Ok(Some(predicate)) => parts.push(predicate),
                Ok(None) => {}
                Err(reason) => {
                    tracing::warn!(field = %field, reason = %reason, "skipping filter");
                    skipped.push(SkippedFilter {
                        field: field.clone(),
                        reason,
                    });
                }
            }
        }

        if let Some(search) = self.search_predicate(&state.search_term) {
            parts.push(search);
        }

        TranslatedQuery {
            predicate: Predicate::and(parts),
            sort: self.sort(&state.sort),
            page: self.page(state),
            skipped,
        }
    }

    /// Predicate for one active filter. `Ok(None)` means the value is empty.
    pub fn filter_predicate(
        &self,
        field: &str,
        value: &FilterValue,
    ) -> Result<Option<Predicate>, SkipReason> {
        let column = self.columns.get(field).ok_or(SkipReason::UnknownColumn)?;
        if !column.filterable {
            return Err(SkipReason::NotFilterable);
        }
        let handler =
            self.registry
                .lookup(&column.filter_kind)
                .ok_or_else(|| SkipReason::UnknownKind {
                    kind: column.filter_kind.name().to_string(),
                })?;

        if handler.is_empty(value) {
            return Ok(None);
        }
        if !handler.validate(value) {
            return Err(SkipReason::InvalidValue);
        }

        let (relationship, target) = resolve_target(column);
        Ok(handler
            .build_predicate(&target, value)
            .map(|predicate| scope(relationship, predicate)))
    }

    /// Case-insensitive substring match over every searchable column.
    fn search_predicate(&self, term: &str) -> Option<Predicate> {
        let term = term.trim();
        if term.is_empty() {
            return None;
        }
        let parts = self
            .columns
            .searchable()
            .filter(|column| !column.array)
            .map(|column| {
                let (relationship, target) = resolve_target(column);
                let predicate = Predicate::Text {
                    field: target.field,
                    mode: TextMatch::Contains,
                    value: term.to_string(),
                    case_sensitive: false,
                };
                scope(relationship, predicate)
            })
            .collect();
        Predicate::or(parts)
    }

    /// Sort entries on unknown or unsortable columns are dropped.
    fn sort(&self, sort: &SortSpec) -> SortSpec {
        sort.entries()
            .iter()
            .filter(|entry| match self.columns.get(&entry.field) {
                Some(column) if column.sortable => true,
                _ => {
                    tracing::warn!(field = %entry.field, "dropping sort on unsortable field");
                    false
                }
            })
            .cloned()
            .collect()
    }

    fn page(&self, state: &GridState) -> PageRequest {
        match self.mode {
            PaginationMode::Offset => PageRequest::Offset {
                page: state.current_page.max(1),
                page_size: state.page_size,
            },
            PaginationMode::Keyset => {
                let (after, before) = match &state.cursor {
                    Some(Cursor::After(c)) => (Some(c.clone()), None),
                    Some(Cursor::Before(c)) => (None, Some(c.clone())),
                    None => (None, None),
                };
                PageRequest::Keyset {
                    after,
                    before,
                    limit: state.page_size,
                }
            }
        }
    }
}

/// Relationship and in-relationship target for a column. A malformed path
/// falls back to a plain field on the base resource.
fn resolve_target(column: &Column) -> (Option<String>, FieldTarget) {
    match &column.path {
        Some(path) => (
            path.relationship.clone(),
            FieldTarget {
                field: path.field.clone(),
                array: column.array,
            },
        ),
        None => {
            tracing::warn!(
                field = %column.field,
                "malformed relationship path, filtering on the plain field"
            );
            (
                None,
                FieldTarget {
                    field: column.field.clone(),
                    array: column.array,
                },
            )
        }
    }
}

fn scope(relationship: Option<String>, predicate: Predicate) -> Predicate {
    match relationship {
        Some(relationship) => Predicate::exists(relationship, predicate),
        None => predicate,
    }
}
