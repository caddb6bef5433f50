#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Translation of album grid state, custom filter kinds and SQL rendering.

use serde_json::{Value, json};

use tabula_core::column::{ColumnConfig, ColumnModel};
use tabula_core::config::{GridConfig, ViewConfig, ViewFormat};
use tabula_core::error::DecodeError;
use tabula_core::filter::{FilterDefinition, FilterOptions, FilterRegistry, FilterValue};
use tabula_core::predicate::{CompareOp, Predicate};
use tabula_core::sort::SortSpec;
use tabula_core::state::GridState;
use tabula_core::translate::{QueryTranslator, SkipReason, SkippedFilter};
use tabula_core::url_state::UrlCodec;
use tabula_test_utils::{albums, params};

fn price_band() -> FilterDefinition {
    FilterDefinition::new()
        .process(|raw, _column| {
            let band = raw.as_text().trim().to_lowercase();
            matches!(band.as_str(), "cheap" | "premium").then(|| FilterValue::Custom {
                kind: "price_band".to_string(),
                value: Value::String(band),
            })
        })
        .validate(|value| {
            matches!(
                value,
                FilterValue::Custom { value: Value::String(band), .. }
                    if band == "cheap" || band == "premium"
            )
        })
        .build_predicate(|target, value| {
            let FilterValue::Custom {
                value: Value::String(band),
                ..
            } = value
            else {
                return None;
            };
            let op = if band == "cheap" {
                CompareOp::Lt
            } else {
                CompareOp::Gte
            };
            Some(Predicate::compare(target.field.clone(), op, json!(14)))
        })
        .is_empty(|value| matches!(value, FilterValue::Custom { value: Value::Null, .. }))
        .default_options(FilterOptions::default())
}

fn configs_with_price_band() -> Vec<ColumnConfig> {
    albums::column_configs()
        .into_iter()
        .map(|config| {
            if config.field == "price" {
                config.filter("price_band")
            } else {
                config
            }
        })
        .collect()
}

fn matching_ids(predicate: Option<&Predicate>) -> Vec<String> {
    albums::records()
        .iter()
        .filter(|r| predicate.is_none_or(|p| p.matches(r)))
        .filter_map(|r| r.get("id").and_then(Value::as_str).map(str::to_string))
        .collect()
}

#[test]
fn test_custom_kind_decodes_and_translates() {
    let registry = FilterRegistry::setup([("price_band", price_band())]).unwrap();
    let columns =
        ColumnModel::build(&configs_with_price_band(), Some(&albums::schema()), &registry).unwrap();
    let config = GridConfig::default();
    let codec = UrlCodec::new(&columns, &registry, &config);

    let url = params(&[("price", "cheap"), ("status", "active")]);
    let decoded = codec.decode(&url);
    assert!(decoded.warnings.is_empty());

    let mut state = GridState::new(config.default_page_size);
    state.apply_decoded(decoded);
    let query = QueryTranslator::new(&columns, &registry).translate(&state);
    assert!(query.skipped.is_empty());
    assert_eq!(matching_ids(query.predicate.as_ref()), vec!["a07"]);

    assert_eq!(codec.encode(&state), url);
}

#[test]
fn test_unregistered_custom_kind_is_skipped() {
    let registry = FilterRegistry::new();
    let columns =
        ColumnModel::build(&configs_with_price_band(), Some(&albums::schema()), &registry).unwrap();

    let mut state = GridState::new(25);
    state.set_filter(
        "price",
        FilterValue::Custom {
            kind: "price_band".to_string(),
            value: json!("cheap"),
        },
    );
    let query = QueryTranslator::new(&columns, &registry).translate(&state);
    assert_eq!(query.predicate, None);
    assert_eq!(
        query.skipped,
        vec![SkippedFilter {
            field: "price".to_string(),
            reason: SkipReason::UnknownKind {
                kind: "price_band".to_string()
            },
        }]
    );

    let decoded = UrlCodec::new(&columns, &registry, &GridConfig::default())
        .decode(&params(&[("price", "cheap")]));
    assert!(decoded.filters.is_empty());
    assert_eq!(
        decoded.warnings,
        vec![DecodeError::UnknownKind {
            field: "price".to_string(),
            kind: "price_band".to_string(),
        }]
    );
}

#[test]
fn test_filters_on_unknown_columns_are_skipped_not_fatal() {
    let registry = FilterRegistry::new();
    let columns = albums::columns(&registry);
    let mut state = GridState::new(25);
    state.set_filter(
        "label",
        FilterValue::Select {
            value: "emi".to_string(),
            operator: tabula_core::filter::FilterOperator::Equals,
        },
    );
    state.set_filter(
        "explicit",
        FilterValue::Boolean {
            value: true,
            operator: tabula_core::filter::FilterOperator::Equals,
        },
    );

    let query = QueryTranslator::new(&columns, &registry).translate(&state);
    assert_eq!(query.skipped.len(), 1);
    assert_eq!(query.skipped[0].reason, SkipReason::UnknownColumn);
    assert_eq!(matching_ids(query.predicate.as_ref()), vec!["a04", "a07"]);
}

#[test]
fn test_search_and_filters_combine() {
    let registry = FilterRegistry::new();
    let columns = albums::columns(&registry);
    let codec = UrlCodec::new(&columns, &registry, &GridConfig::default());

    let mut state = GridState::new(25);
    state.apply_decoded(codec.decode(&params(&[("search", "the"), ("artist.country", "UK")])));
    let query = QueryTranslator::new(&columns, &registry).translate(&state);
    // "The Beatles" by artist name; "The Chronic" is from the US.
    assert_eq!(matching_ids(query.predicate.as_ref()), vec!["a01", "a06"]);
}

const VIEW: &str = r#"{
    "resource": "albums",
    "initial_sort": "title:asc",
    "columns": [
        {"field": "title"},
        {"field": "year", "filter": "number_range"},
        {"field": "artist.name", "filter": "text"}
    ],
    "relationships": {
        "artist": {"table": "artists", "local_field": "artist_id", "foreign_field": "id"}
    }
}"#;

#[test]
fn test_view_renders_sql() {
    let view = ViewConfig::parse(VIEW, ViewFormat::Json).unwrap();
    let registry = FilterRegistry::new();
    let config = GridConfig::default();
    let columns = view.build_columns(&registry, &config).unwrap();
    let codec = UrlCodec::new(&columns, &registry, &config);

    let mut state = GridState::new(view.page_size(&config)).with_initial_sort(view.initial_sort(&columns));
    state.apply_decoded(codec.decode(&params(&[
        ("artist.name", "Beatles"),
        ("year", "1960,1969"),
        ("page", "3"),
    ])));
    // No sort in the URL keeps the initial sort.
    assert_eq!(state.sort, SortSpec::parse("title:asc").0);

    let query = QueryTranslator::new(&columns, &registry).translate(&state);
    let renderer = view.sql_renderer().unwrap();
    let sql = renderer.select_sql(&query);

    assert!(sql.contains("EXISTS"), "{sql}");
    assert!(sql.contains(r#"FROM "artists" AS "artist""#), "{sql}");
    assert!(sql.contains(r#""albums"."year" >= 1960"#), "{sql}");
    assert!(sql.contains(r#""albums"."year" <= 1969"#), "{sql}");
    assert!(sql.contains(r#"ORDER BY "albums"."title" ASC"#), "{sql}");
    assert!(sql.contains("LIMIT 25 OFFSET 50"), "{sql}");

    let count = renderer.count_sql(&query);
    assert!(count.starts_with("SELECT COUNT(*)"), "{count}");
}
