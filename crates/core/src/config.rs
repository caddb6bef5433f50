//! Grid configuration loaded from environment variables, and view
//! configuration documents loaded from TOML, YAML or JSON files.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::column::{ColumnConfig, ColumnModel};
use crate::error::ColumnError;
use crate::filter::{BuiltinKind, FilterRegistry};
use crate::pagination::PaginationMode;
use crate::predicate::sql::{RelationshipJoin, SqlRenderer};
use crate::schema::ResourceSchema;
use crate::sort::SortSpec;

/// Process-wide grid settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Page size used when none is requested (default: 25).
    pub default_page_size: u32,

    /// Page sizes offered to the user (default: 10, 25, 50, 100).
    pub page_size_options: Vec<u32>,

    /// Largest page size accepted from a URL or event (default: 500).
    pub max_page_size: u32,

    /// Default candidate cap for autocomplete filters (default: 50).
    pub autocomplete_max_results: usize,

    /// Whether load failure messages are shown to end users (default: false).
    pub show_errors: bool,

    /// Tracing filter used when `RUST_LOG` is unset (default: "info").
    pub log_filter: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_page_size: 25,
            page_size_options: vec![10, 25, 50, 100],
            max_page_size: 500,
            autocomplete_max_results: 50,
            show_errors: false,
            log_filter: "info".to_string(),
        }
    }
}

impl GridConfig {
    /// Load configuration from `TABULA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_page_size = match lookup("TABULA_DEFAULT_PAGE_SIZE") {
            Some(v) => v
                .trim()
                .parse()
                .context("TABULA_DEFAULT_PAGE_SIZE must be a valid u32")?,
            None => defaults.default_page_size,
        };

        let max_page_size = match lookup("TABULA_MAX_PAGE_SIZE") {
            Some(v) => v
                .trim()
                .parse()
                .context("TABULA_MAX_PAGE_SIZE must be a valid u32")?,
            None => defaults.max_page_size,
        };

        let page_size_options = match lookup("TABULA_PAGE_SIZE_OPTIONS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .context("TABULA_PAGE_SIZE_OPTIONS must be a comma-separated list of u32")?,
            None => defaults.page_size_options,
        };

        let autocomplete_max_results = match lookup("TABULA_AUTOCOMPLETE_MAX_RESULTS") {
            Some(v) => v
                .trim()
                .parse()
                .context("TABULA_AUTOCOMPLETE_MAX_RESULTS must be a valid usize")?,
            None => defaults.autocomplete_max_results,
        };

        let show_errors = match lookup("TABULA_SHOW_ERRORS") {
            Some(v) => v
                .trim()
                .to_lowercase()
                .parse()
                .context("TABULA_SHOW_ERRORS must be true or false")?,
            None => defaults.show_errors,
        };

        let log_filter = lookup("TABULA_LOG_FILTER").unwrap_or(defaults.log_filter);

        let config = Self {
            default_page_size,
            page_size_options,
            max_page_size,
            autocomplete_max_results,
            show_errors,
            log_filter,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        ensure!(self.max_page_size >= 1, "max page size must be at least 1");
        ensure!(
            (1..=self.max_page_size).contains(&self.default_page_size),
            "default page size {} is outside 1..={}",
            self.default_page_size,
            self.max_page_size
        );
        Ok(())
    }

    /// Clamp a requested page size into `[1, max_page_size]`.
    pub fn clamp_page_size(&self, size: u32) -> u32 {
        size.clamp(1, self.max_page_size.max(1))
    }
}

/// Serialization format of a view configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewFormat {
    Toml,
    Yaml,
    Json,
}

impl ViewFormat {
    /// Pick the format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "toml" => Some(ViewFormat::Toml),
            "yaml" | "yml" => Some(ViewFormat::Yaml),
            "json" => Some(ViewFormat::Json),
            _ => None,
        }
    }
}

/// One grid view: its columns, initial sort, paging and data source mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Base table of the resource, used for SQL rendering.
    pub resource: Option<String>,
    pub columns: Vec<ColumnConfig>,
    /// Encoded sort (`field:direction,...`) applied until the user sorts.
    pub initial_sort: Option<String>,
    pub page_size: Option<u32>,
    pub pagination: PaginationMode,
    pub schema: Option<ResourceSchema>,
    pub relationships: BTreeMap<String, RelationshipJoin>,
    /// Column holding keyset cursor values in SQL. Defaults to `id`.
    pub cursor_column: Option<String>,
    /// Extra load instructions passed through to the resource.
    pub load: Vec<String>,
}

impl ViewConfig {
    /// Load a view file; the format follows the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(format) = ViewFormat::from_path(path) else {
            bail!(
                "unsupported view file extension: {} (expected toml, yaml, yml or json)",
                path.display()
            );
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read view file {}", path.display()))?;
        Self::parse(&contents, format)
            .with_context(|| format!("failed to parse view file {}", path.display()))
    }

    pub fn parse(contents: &str, format: ViewFormat) -> Result<Self> {
        let view = match format {
            ViewFormat::Toml => toml::from_str(contents).context("invalid TOML")?,
            ViewFormat::Yaml => serde_yml::from_str(contents).context("invalid YAML")?,
            ViewFormat::Json => serde_json::from_str(contents).context("invalid JSON")?,
        };
        Ok(view)
    }

    /// Build the column model. Autocomplete columns without an explicit cap
    /// take the configured default.
    pub fn build_columns(
        &self,
        registry: &FilterRegistry,
        config: &GridConfig,
    ) -> Result<ColumnModel, ColumnError> {
        let autocomplete = BuiltinKind::Autocomplete.as_str();
        let configs: Vec<ColumnConfig> = self
            .columns
            .iter()
            .cloned()
            .map(|mut column| {
                if column.filter.as_deref() == Some(autocomplete)
                    && column.filter_options.max_results.is_none()
                {
                    column.filter_options.max_results = Some(config.autocomplete_max_results);
                }
                column
            })
            .collect();
        ColumnModel::build(&configs, self.schema.as_ref(), registry)
    }

    /// Parsed initial sort. Bad tokens, unsortable fields and directions
    /// outside a column's sort cycle are dropped.
    pub fn initial_sort(&self, columns: &ColumnModel) -> SortSpec {
        let Some(raw) = self.initial_sort.as_deref() else {
            return SortSpec::new();
        };
        let (sort, errors) = SortSpec::parse(raw);
        for error in errors {
            tracing::warn!(error = %error, "dropping initial sort token");
        }
        sort.entries()
            .iter()
            .filter(|entry| match columns.check_sort(entry) {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(error = %error, "dropping initial sort entry");
                    false
                }
            })
            .cloned()
            .collect()
    }

    /// Page size for new grid instances.
    pub fn page_size(&self, config: &GridConfig) -> u32 {
        config.clamp_page_size(self.page_size.unwrap_or(config.default_page_size))
    }

    /// SQL renderer for the view's resource, when it names a table.
    pub fn sql_renderer(&self) -> Option<SqlRenderer> {
        let table = self.resource.as_deref()?;
        let renderer = SqlRenderer::new(table).with_relationships(self.relationships.clone());
        Some(match self.cursor_column.as_deref() {
            Some(column) => renderer.with_cursor_column(column),
            None => renderer,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::filter::FilterKind;
    use crate::sort::SortDirection;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = GridConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GridConfig::default());
        assert_eq!(config.page_size_options, vec![10, 25, 50, 100]);
        assert!(!config.show_errors);
    }

    #[test]
    fn reads_overrides() {
        let config = GridConfig::from_lookup(lookup(&[
            ("TABULA_DEFAULT_PAGE_SIZE", "50"),
            ("TABULA_PAGE_SIZE_OPTIONS", "20, 50,200"),
            ("TABULA_SHOW_ERRORS", "TRUE"),
            ("TABULA_LOG_FILTER", "tabula_core=debug"),
        ]))
        .unwrap();
        assert_eq!(config.default_page_size, 50);
        assert_eq!(config.page_size_options, vec![20, 50, 200]);
        assert!(config.show_errors);
        assert_eq!(config.log_filter, "tabula_core=debug");
    }

    #[test]
    fn rejects_bad_values() {
        let err = GridConfig::from_lookup(lookup(&[("TABULA_MAX_PAGE_SIZE", "lots")])).unwrap_err();
        assert!(err.to_string().contains("TABULA_MAX_PAGE_SIZE"));

        let err = GridConfig::from_lookup(lookup(&[
            ("TABULA_DEFAULT_PAGE_SIZE", "100"),
            ("TABULA_MAX_PAGE_SIZE", "50"),
        ]));
        assert!(err.is_err());
    }

    #[test]
    fn clamps_page_size() {
        let config = GridConfig::default();
        assert_eq!(config.clamp_page_size(0), 1);
        assert_eq!(config.clamp_page_size(40), 40);
        assert_eq!(config.clamp_page_size(10_000), 500);
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ViewFormat::from_path(Path::new("v.toml")), Some(ViewFormat::Toml));
        assert_eq!(ViewFormat::from_path(Path::new("v.YML")), Some(ViewFormat::Yaml));
        assert_eq!(ViewFormat::from_path(Path::new("v.json")), Some(ViewFormat::Json));
        assert_eq!(ViewFormat::from_path(Path::new("v.ini")), None);
        assert!(ViewConfig::load(Path::new("view.ini")).is_err());
    }

    const TOML_VIEW: &str = r#"
resource = "albums"
initial_sort = "title:asc,genre:asc_nils_first"
page_size = 10
cursor_column = "slug"

[[columns]]
field = "title"

[[columns]]
field = "genre"
filter = "autocomplete"

[relationships.artist]
table = "artists"
local_field = "artist_id"
foreign_field = "id"
"#;

    #[test]
    fn parses_toml_view() {
        let view = ViewConfig::parse(TOML_VIEW, ViewFormat::Toml).unwrap();
        assert_eq!(view.resource.as_deref(), Some("albums"));
        assert_eq!(view.columns.len(), 2);
        assert_eq!(view.pagination, PaginationMode::Offset);
        let config = GridConfig::default();
        let columns = view.build_columns(&FilterRegistry::new(), &config).unwrap();
        // `asc_nils_first` is not in genre's default cycle.
        let sort = view.initial_sort(&columns);
        assert_eq!(sort.direction("title"), Some(SortDirection::Asc));
        assert_eq!(sort.len(), 1);
        assert_eq!(view.page_size(&config), 10);
        assert_eq!(view.cursor_column.as_deref(), Some("slug"));
        assert!(view.sql_renderer().is_some());
    }

    #[test]
    fn autocomplete_cap_comes_from_config() {
        let view = ViewConfig::parse(TOML_VIEW, ViewFormat::Toml).unwrap();
        let config = GridConfig {
            autocomplete_max_results: 7,
            ..GridConfig::default()
        };
        let columns = view
            .build_columns(&FilterRegistry::new(), &config)
            .unwrap();
        let genre = columns.get("genre").unwrap();
        assert_eq!(
            genre.filter_kind,
            FilterKind::Builtin(BuiltinKind::Autocomplete)
        );
        assert_eq!(genre.filter_options.max_results, Some(7));
    }

    #[test]
    fn parses_yaml_and_json_views() {
        let yaml = "columns:\n  - field: year\n    filter: number_range\npagination: keyset\n";
        let view = ViewConfig::parse(yaml, ViewFormat::Yaml).unwrap();
        assert_eq!(view.pagination, PaginationMode::Keyset);
        assert_eq!(view.columns[0].filter.as_deref(), Some("number_range"));

        let json = r#"{"columns": [{"field": "explicit", "filter": "boolean"}]}"#;
        let view = ViewConfig::parse(json, ViewFormat::Json).unwrap();
        assert_eq!(view.columns[0].field, "explicit");
        assert!(view.sql_renderer().is_none());
    }

    #[test]
    fn malformed_view_is_an_error() {
        assert!(ViewConfig::parse("columns = 3", ViewFormat::Toml).is_err());
    }
}
