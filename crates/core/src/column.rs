//! Column model: per-field filter, sort and display configuration.
//!
//! Columns are built once per view from explicit configuration, the filter
//! registry and (optionally) the resource schema, and are immutable after.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ColumnError, DecodeError};
use crate::filter::{BuiltinKind, FilterKind, FilterOptions, FilterRegistry, SelectOption};
use crate::inference;
use crate::schema::{FieldPath, ResourceSchema};
use crate::sort::{SortCycle, SortDirection, SortEntry, SortSpec};

/// Column as written in a view configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub field: String,
    pub label: Option<String>,
    /// Filter kind name. Inferred from the schema when omitted.
    pub filter: Option<String>,
    pub filterable: bool,
    pub sortable: bool,
    /// Defaults to true for text columns.
    pub searchable: Option<bool>,
    pub filter_options: FilterOptions,
    pub display_class: Option<String>,
    /// Sorted states of the column's sort cycle; unsorted is implied.
    pub sort_cycle: Option<Vec<SortDirection>>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            field: String::new(),
            label: None,
            filter: None,
            filterable: true,
            sortable: true,
            searchable: None,
            filter_options: FilterOptions::default(),
            display_class: None,
            sort_cycle: None,
        }
    }
}

impl ColumnConfig {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn filter(mut self, kind: impl Into<String>) -> Self {
        self.filter = Some(kind.into());
        self
    }

    pub fn options(mut self, options: Vec<SelectOption>) -> Self {
        self.filter_options.options = options;
        self
    }
}

/// A resolved column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub field: String,
    /// Relationship path; `None` when the field reference is malformed.
    pub path: Option<FieldPath>,
    pub label: String,
    pub filter_kind: FilterKind,
    pub filter_options: FilterOptions,
    pub filterable: bool,
    pub sortable: bool,
    pub searchable: bool,
    /// The target attribute is array-typed.
    pub array: bool,
    pub display_class: Option<String>,
    pub sort_cycle: SortCycle,
}

impl Column {
    /// A filterable, sortable column with the kind's default options.
    pub fn new(field: impl Into<String>, kind: impl Into<FilterKind>) -> Self {
        let field = field.into();
        let filter_kind = kind.into();
        let filter_options = filter_kind
            .builtin()
            .map(|k| k.handler().default_options())
            .unwrap_or_default();
        Self {
            path: FieldPath::parse(&field),
            label: humanize(&field),
            searchable: filter_kind == FilterKind::Builtin(BuiltinKind::Text),
            field,
            filter_kind,
            filter_options,
            filterable: true,
            sortable: true,
            array: false,
            display_class: None,
            sort_cycle: SortCycle::default(),
        }
    }

    /// Relationship the column reaches through, if any.
    pub fn relationship(&self) -> Option<&str> {
        self.path.as_ref()?.relationship.as_deref()
    }
}

/// The ordered set of columns of one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnModel {
    columns: Vec<Column>,
}

impl ColumnModel {
    /// Wrap already-resolved columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Resolve column configuration against the registry and schema.
    ///
    /// Configuration mistakes (duplicate or empty fields, a checkbox without a
    /// target value, a bad sort cycle) fail. A custom kind that is not
    /// registered only logs a warning; filters on that column are skipped at
    /// translation time.
    pub fn build(
        configs: &[ColumnConfig],
        schema: Option<&ResourceSchema>,
        registry: &FilterRegistry,
    ) -> Result<Self, ColumnError> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(configs.len());

        for config in configs {
            let field = config.field.trim();
            if field.is_empty() {
                return Err(ColumnError::EmptyField);
            }
            if !seen.insert(field.to_string()) {
                return Err(ColumnError::DuplicateField(field.to_string()));
            }
            columns.push(resolve_column(field, config, schema, registry)?);
        }

        Ok(Self { columns })
    }

    pub fn get(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn searchable(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.searchable)
    }

    /// A sort entry is usable when its column is sortable and the direction
    /// is one of the column's cycle states.
    pub fn check_sort(&self, entry: &SortEntry) -> Result<(), DecodeError> {
        let Some(column) = self.get(&entry.field).filter(|c| c.sortable) else {
            return Err(DecodeError::UnsortableField(entry.field.clone()));
        };
        if !column.sort_cycle.contains(entry.direction) {
            return Err(DecodeError::DirectionNotInCycle {
                field: entry.field.clone(),
                direction: entry.direction.to_string(),
            });
        }
        Ok(())
    }

    /// The entries of `sort` that pass [`ColumnModel::check_sort`].
    pub fn usable_sort(&self, sort: &SortSpec) -> SortSpec {
        sort.entries()
            .iter()
            .filter(|entry| self.check_sort(entry).is_ok())
            .cloned()
            .collect()
    }
}

fn resolve_column(
    field: &str,
    config: &ColumnConfig,
    schema: Option<&ResourceSchema>,
    registry: &FilterRegistry,
) -> Result<Column, ColumnError> {
    let attribute = schema.and_then(|s| s.resolve(field));

    let filter_kind = match config.filter.as_deref() {
        Some(name) => FilterKind::from_name(name),
        None => attribute
            .map(inference::infer)
            .unwrap_or(BuiltinKind::Text)
            .into(),
    };

    let defaults = match registry.lookup(&filter_kind) {
        Some(handler) => handler.default_options(),
        None => {
            tracing::warn!(
                field,
                kind = %filter_kind,
                "column uses an unregistered filter kind"
            );
            FilterOptions::default()
        }
    };

    let mut explicit = config.filter_options.clone();
    if explicit.options.is_empty()
        && let Some(one_of) = attribute.and_then(|a| a.one_of.as_ref())
    {
        explicit.options = one_of
            .iter()
            .map(|v| SelectOption::new(humanize(v), v.clone()))
            .collect();
    }
    let filter_options = explicit.merged_over(defaults);

    if filter_kind == FilterKind::Builtin(BuiltinKind::Checkbox)
        && filter_options.value.as_ref().is_none_or(|v| v.is_null())
    {
        return Err(ColumnError::CheckboxWithoutValue {
            field: field.to_string(),
        });
    }

    let sort_cycle = match &config.sort_cycle {
        Some(directions) => {
            SortCycle::new(directions).map_err(|reason| ColumnError::InvalidSortCycle {
                field: field.to_string(),
                reason,
            })?
        }
        None => SortCycle::default(),
    };

    let array = attribute.is_some_and(|a| a.ty.is_array());
    let searchable = config
        .searchable
        .unwrap_or(filter_kind == FilterKind::Builtin(BuiltinKind::Text));

    Ok(Column {
        field: field.to_string(),
        path: FieldPath::parse(field),
        label: config.label.clone().unwrap_or_else(|| humanize(field)),
        filter_kind,
        filter_options,
        filterable: config.filterable,
        sortable: config.sortable,
        searchable,
        array,
        display_class: config.display_class.clone(),
        sort_cycle,
    })
}

/// `"artist.release_date"` → `"Artist release date"`.
pub fn humanize(field: &str) -> String {
    let words = field.replace(['.', '_', '-'], " ");
    let words = words.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
