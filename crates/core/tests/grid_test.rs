#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Load coordinator tests against the in-memory album resource.

use std::sync::Arc;
use std::time::Duration;

use tabula_core::config::GridConfig;
use tabula_core::coordinator::{GridController, GridEvent, LoadPhase};
use tabula_core::filter::{FilterRegistry, FilterValue};
use tabula_core::pagination::{Cursor, PaginationMode};
use tabula_core::sort::SortDirection;
use tabula_test_utils::{InMemoryResource, albums, ids, params};

fn grid_with(resource: Arc<InMemoryResource>, config: GridConfig) -> GridController {
    let registry = Arc::new(FilterRegistry::new());
    let columns = Arc::new(albums::columns(&registry));
    GridController::new(columns, registry, resource, config)
}

fn grid(resource: Arc<InMemoryResource>) -> GridController {
    grid_with(resource, GridConfig::default())
}

fn set_filter(field: &str, raw: &str) -> GridEvent {
    GridEvent::SetFilter {
        field: field.to_string(),
        raw: raw.into(),
    }
}

#[tokio::test]
async fn test_initial_refresh_loads_everything() {
    let resource = Arc::new(InMemoryResource::albums());
    let mut grid = grid(resource.clone());
    assert_eq!(grid.phase(), LoadPhase::Idle);

    assert!(grid.handle_event(GridEvent::Refresh));
    assert_eq!(grid.phase(), LoadPhase::Loading);
    assert!(grid.state().loading);

    grid.run_until_idle().await;
    let state = grid.snapshot();
    assert_eq!(grid.phase(), LoadPhase::Loaded);
    assert!(!state.loading);
    assert_eq!(state.data.len(), 8);
    assert_eq!(state.page_info.total_count, 8);
    assert!(!state.page_info.show_pagination());
    assert_eq!(resource.calls(), 1);
}

#[tokio::test]
async fn test_filters_combine_across_kinds() {
    let resource = Arc::new(InMemoryResource::albums());
    let mut grid = grid(resource.clone());

    grid.handle_event(set_filter("status", "active"));
    grid.handle_event(set_filter("tags", "classic"));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a01", "a07"]);

    grid.handle_event(set_filter("artist.country", "UK"));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a01"]);

    grid.handle_event(set_filter("year", "1990,"));
    grid.handle_event(GridEvent::ClearFilter {
        field: "artist.country".to_string(),
    });
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a07"]);

    let request = resource.last_request().unwrap();
    assert!(request.predicate.is_some());
}

#[tokio::test]
async fn test_boolean_false_is_a_filter() {
    let mut grid = grid(Arc::new(InMemoryResource::albums()));
    grid.handle_event(set_filter("explicit", "false"));
    grid.run_until_idle().await;
    assert_eq!(grid.state().data.len(), 6);
    assert!(matches!(
        grid.state().filters.get("explicit"),
        Some(FilterValue::Boolean { value: false, .. })
    ));
}

#[tokio::test]
async fn test_search_reaches_related_fields() {
    let mut grid = grid(Arc::new(InMemoryResource::albums()));
    grid.handle_event(GridEvent::Search("radiohead".to_string()));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a03", "a08"]);
}

#[tokio::test]
async fn test_latest_load_wins_when_earlier_load_is_slower() {
    let resource = Arc::new(
        InMemoryResource::albums().with_delays([Duration::from_millis(150), Duration::ZERO]),
    );
    let mut grid = grid(resource.clone());

    grid.handle_event(set_filter("title", "abbey"));
    grid.handle_event(set_filter("title", "kind"));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a02"]);

    // The first load lands afterwards and is discarded.
    let stale = grid.next_completion().await.unwrap();
    assert!(!grid.apply_completion(stale));
    assert_eq!(ids(&grid.state().data), vec!["a02"]);
    assert_eq!(grid.phase(), LoadPhase::Loaded);
    assert_eq!(resource.calls(), 2);
}

#[tokio::test]
async fn test_stale_completion_arriving_first_is_ignored() {
    let resource = Arc::new(
        InMemoryResource::albums().with_delays([Duration::ZERO, Duration::from_millis(100)]),
    );
    let mut grid = grid(resource);

    grid.handle_event(set_filter("title", "abbey"));
    grid.handle_event(set_filter("title", "kind"));

    let first = grid.next_completion().await.unwrap();
    assert!(!grid.apply_completion(first));
    assert_eq!(grid.phase(), LoadPhase::Loading);
    assert!(grid.state().data.is_empty());

    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a02"]);
}

#[tokio::test]
async fn test_failure_clears_data_and_records_context() {
    let resource = Arc::new(InMemoryResource::albums());
    let mut grid = grid(resource.clone());
    grid.handle_event(GridEvent::Refresh);
    grid.run_until_idle().await;
    assert_eq!(grid.state().data.len(), 8);

    resource.fail_next("connection refused");
    grid.handle_event(set_filter("status", "active"));
    grid.run_until_idle().await;

    let state = grid.snapshot();
    assert_eq!(grid.phase(), LoadPhase::Failed);
    assert!(state.data.is_empty());
    assert_eq!(state.page_info.total_count, 0);
    assert!(!state.page_info.has_next);

    let failure = state.last_error.unwrap();
    assert!(failure.message.contains("connection refused"));
    assert!(failure.filters.contains_key("status"));
    assert_eq!(failure.page, 1);

    // Backend details stay hidden unless configured.
    assert_eq!(grid.error_message(), Some("Unable to load data"));

    // A later success clears the failure.
    grid.handle_event(GridEvent::Refresh);
    grid.run_until_idle().await;
    assert_eq!(grid.phase(), LoadPhase::Loaded);
    assert!(grid.state().last_error.is_none());
    assert_eq!(grid.error_message(), None);
}

#[tokio::test]
async fn test_show_errors_exposes_backend_message() {
    let resource = Arc::new(InMemoryResource::albums());
    let config = GridConfig {
        show_errors: true,
        ..GridConfig::default()
    };
    let mut grid = grid_with(resource.clone(), config);
    resource.fail_next("timeout");
    grid.handle_event(GridEvent::Refresh);
    grid.run_until_idle().await;
    assert!(grid.error_message().unwrap().contains("timeout"));
}

#[tokio::test]
async fn test_panicking_resource_is_a_failed_load() {
    let resource = Arc::new(InMemoryResource::albums());
    let mut grid = grid(resource.clone());
    resource.panic_next();
    grid.handle_event(GridEvent::Refresh);
    grid.run_until_idle().await;
    assert_eq!(grid.phase(), LoadPhase::Failed);
    assert!(grid.state().last_error.is_some());
}

#[tokio::test]
async fn test_offset_paging_and_sort_toggle() {
    let mut grid = grid(Arc::new(InMemoryResource::albums())).with_page_size(3);

    assert!(grid.handle_event(GridEvent::ToggleSort {
        field: "year".to_string()
    }));
    assert_eq!(grid.state().sort.direction("year"), Some(SortDirection::Asc));
    grid.run_until_idle().await;
    // Nulls last ascending.
    assert_eq!(ids(&grid.state().data), vec!["a02", "a06", "a01"]);
    assert_eq!(grid.state().page_info.total_pages, 3);

    assert!(grid.handle_event(GridEvent::NextPage));
    grid.run_until_idle().await;
    assert_eq!(grid.state().current_page, 2);
    assert_eq!(ids(&grid.state().data), vec!["a04", "a07", "a03"]);

    assert!(grid.handle_event(GridEvent::PrevPage));
    grid.run_until_idle().await;
    assert_eq!(grid.state().current_page, 1);
    assert!(!grid.handle_event(GridEvent::PrevPage));

    // Unsortable column.
    assert!(!grid.handle_event(GridEvent::ToggleSort {
        field: "price".to_string()
    }));
}

#[tokio::test]
async fn test_keyset_navigation() {
    let mut grid = grid(Arc::new(InMemoryResource::albums()))
        .with_mode(PaginationMode::Keyset)
        .with_page_size(3);

    grid.handle_event(GridEvent::Refresh);
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a01", "a02", "a03"]);
    assert!(grid.state().page_info.has_next);
    assert!(!grid.state().page_info.has_prev);

    assert!(grid.handle_event(GridEvent::NextPage));
    assert_eq!(grid.state().cursor, Some(Cursor::After("a03".to_string())));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a04", "a05", "a06"]);
    assert!(grid.state().page_info.has_prev);

    assert!(grid.handle_event(GridEvent::PrevPage));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a01", "a02", "a03"]);
    // The view page size is the default and stays out of the URL.
    assert_eq!(grid.query_string(), "before=a04");
}

#[tokio::test]
async fn test_keyset_grid_rejects_page_jumps() {
    let resource = Arc::new(InMemoryResource::albums());
    let mut grid = grid(resource.clone())
        .with_mode(PaginationMode::Keyset)
        .with_page_size(3);
    grid.handle_event(GridEvent::Refresh);
    grid.run_until_idle().await;

    assert!(!grid.handle_event(GridEvent::SetPage(5)));
    assert_eq!(grid.state().current_page, 1);
    assert_eq!(grid.query_string(), "");
    assert_eq!(resource.calls(), 1);

    assert!(grid.handle_event(GridEvent::NextPage));
    grid.run_until_idle().await;
    assert_eq!(grid.query_string(), "after=a03");

    // Going back to the first page drops the cursor.
    assert!(grid.handle_event(GridEvent::SetPage(1)));
    assert_eq!(grid.state().cursor, None);
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a01", "a02", "a03"]);
    assert_eq!(grid.query_string(), "");

    // A page number in the URL is not a position in keyset mode.
    assert!(grid.handle_event(GridEvent::ApplyUrl(params(&[("page", "4")]))));
    assert_eq!(grid.state().current_page, 1);
    assert_eq!(grid.query_string(), "");
}

#[tokio::test]
async fn test_url_state_round_trips_through_the_grid() {
    let mut grid = grid(Arc::new(InMemoryResource::albums()));
    let url = params(&[
        ("page", "2"),
        ("page_size", "2"),
        ("sort", "year:desc"),
        ("status", "active"),
    ]);

    assert!(grid.handle_event(GridEvent::ApplyUrl(url.clone())));
    grid.run_until_idle().await;
    assert_eq!(ids(&grid.state().data), vec!["a01", "a06"]);
    assert_eq!(grid.encode_url(), url);
}
