//! Per-instance grid state: active filters, sort, page, search and the
//! results of the last load.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::filter::FilterValue;
use crate::pagination::{Cursor, PageInfo};
use crate::resource::Record;
use crate::sort::{SortCycle, SortDirection, SortSpec, resolve_sort};
use crate::url_state::DecodedState;

/// Diagnostic context recorded when a load fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub message: String,
    pub filters: BTreeMap<String, FilterValue>,
    /// Encoded sort (`field:direction,...`).
    pub sort: String,
    pub page: u32,
    pub page_size: u32,
    pub search: String,
    pub cursor: Option<Cursor>,
}

impl LoadFailure {
    pub fn new(state: &GridState, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filters: state.filters.clone(),
            sort: state.sort.encode(),
            page: state.current_page,
            page_size: state.page_size,
            search: state.search_term.clone(),
            cursor: state.cursor.clone(),
        }
    }
}

/// State of one grid instance. Mutations that change the result set reset
/// the position to the first page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridState {
    pub filters: BTreeMap<String, FilterValue>,
    pub sort: SortSpec,
    pub current_page: u32,
    pub page_size: u32,
    pub search_term: String,
    /// Keyset position; `None` is the first page.
    pub cursor: Option<Cursor>,
    pub loading: bool,
    pub last_error: Option<LoadFailure>,
    pub data: Vec<Record>,
    pub page_info: PageInfo,
    /// The user changed the sort at least once this session.
    pub user_has_sorted: bool,
    /// Sort the view started with.
    pub initial_sort: SortSpec,
}

impl GridState {
    pub fn new(page_size: u32) -> Self {
        Self {
            filters: BTreeMap::new(),
            sort: SortSpec::new(),
            current_page: 1,
            page_size,
            search_term: String::new(),
            cursor: None,
            loading: false,
            last_error: None,
            data: Vec::new(),
            page_info: PageInfo::neutral(page_size),
            user_has_sorted: false,
            initial_sort: SortSpec::new(),
        }
    }

    pub fn with_initial_sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort.clone();
        self.initial_sort = sort;
        self
    }

    fn reset_position(&mut self) {
        self.current_page = 1;
        self.cursor = None;
    }

    pub fn set_filter(&mut self, field: impl Into<String>, value: FilterValue) {
        self.filters.insert(field.into(), value);
        self.reset_position();
    }

    /// Remove one filter. Returns whether it was active.
    pub fn clear_filter(&mut self, field: &str) -> bool {
        let removed = self.filters.remove(field).is_some();
        if removed {
            self.reset_position();
        }
        removed
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.reset_position();
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.reset_position();
    }

    /// Advance `field` through `cycle`; other sort entries are untouched.
    pub fn toggle_sort(&mut self, field: &str, cycle: &SortCycle) -> Option<SortDirection> {
        self.user_has_sorted = true;
        self.reset_position();
        self.sort.toggle(field, cycle)
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.user_has_sorted = true;
        self.sort = sort;
        self.reset_position();
    }

    pub fn set_page(&mut self, page: u32) {
        self.current_page = page.max(1);
        self.cursor = None;
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.page_size = page_size.max(1);
        self.reset_position();
    }

    pub fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.cursor = cursor;
    }

    /// Hydrate from decoded URL state. Sort follows the decoding precedence
    /// in [`resolve_sort`].
    pub fn apply_decoded(&mut self, decoded: DecodedState) {
        self.filters = decoded.filters;
        self.search_term = decoded.search;
        self.current_page = decoded.page.max(1);
        self.page_size = decoded.page_size.max(1);
        self.cursor = decoded.cursor;
        self.sort = resolve_sort(decoded.sort, self.user_has_sorted, &self.initial_sort);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::filter::FilterOperator;

    fn text(value: &str) -> FilterValue {
        FilterValue::Text {
            value: value.to_string(),
            operator: FilterOperator::Contains,
            case_sensitive: false,
        }
    }

    fn on_page_three() -> GridState {
        let mut state = GridState::new(25);
        state.set_page(3);
        state
    }

    #[test]
    fn mutations_reset_page() {
        let mut state = on_page_three();
        state.set_filter("title", text("abbey"));
        assert_eq!(state.current_page, 1);

        let mut state = on_page_three();
        state.set_search("beatles");
        assert_eq!(state.current_page, 1);

        let mut state = on_page_three();
        state.toggle_sort("title", &SortCycle::default());
        assert_eq!(state.current_page, 1);
        assert!(state.user_has_sorted);

        let mut state = on_page_three();
        state.set_page_size(50);
        assert_eq!(state.current_page, 1);
        assert_eq!(state.page_size, 50);
    }

    #[test]
    fn clearing_an_absent_filter_keeps_page() {
        let mut state = on_page_three();
        assert!(!state.clear_filter("title"));
        assert_eq!(state.current_page, 3);
    }

    #[test]
    fn page_is_at_least_one() {
        let mut state = GridState::new(25);
        state.set_page(0);
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn mutations_drop_keyset_cursor() {
        let mut state = GridState::new(25);
        state.set_cursor(Some(Cursor::After("abc".to_string())));
        state.set_search("x");
        assert_eq!(state.cursor, None);
    }

    #[test]
    fn decoded_sort_precedence() {
        let (initial, _) = SortSpec::parse("title:asc");
        let decoded = |sort: &str| DecodedState {
            sort: SortSpec::parse(sort).0,
            page_size: 25,
            ..Default::default()
        };

        let mut fresh = GridState::new(25).with_initial_sort(initial.clone());
        fresh.apply_decoded(decoded(""));
        assert_eq!(fresh.sort, initial);

        let mut sorted = GridState::new(25).with_initial_sort(initial.clone());
        sorted.toggle_sort("year", &SortCycle::default());
        sorted.apply_decoded(decoded(""));
        assert!(sorted.sort.is_empty());

        let mut explicit = GridState::new(25).with_initial_sort(initial);
        explicit.apply_decoded(decoded("year:desc"));
        assert_eq!(explicit.sort.encode(), "year:desc");
    }
}
