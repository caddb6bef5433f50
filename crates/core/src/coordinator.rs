//! Load coordinator: drives one grid instance through user intents and
//! asynchronous query completions.
//!
//! Events are handled one at a time by the owner of the [`GridController`].
//! Each issued load carries a generation number; only the completion of the
//! most recently issued load is applied, anything older is discarded on
//! arrival. Query errors and panics never escape: they are recorded on the
//! state as a [`LoadFailure`].

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::column::ColumnModel;
use crate::config::{GridConfig, ViewConfig};
use crate::error::{GridError, QueryError};
use crate::filter::{FilterRegistry, RawFilter, SelectOption, search_options};
use crate::pagination::{Cursor, PageInfo, PaginationMode, normalize};
use crate::resource::{QueryRequest, ResourcePage, ResourceQuery};
use crate::sort::SortSpec;
use crate::state::{GridState, LoadFailure};
use crate::translate::QueryTranslator;
use crate::url_state::{UrlCodec, to_query_string};

/// Message shown in place of backend errors when `show_errors` is off.
const GENERIC_ERROR: &str = "Unable to load data";

/// Where the grid is in its load cycle.
///
/// `Loaded` and `Failed` are resting phases: a finished load stays there
/// until the next load is issued and never returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Nothing loaded yet.
    Idle,
    Loading,
    /// The latest load succeeded; its records are on the state.
    Loaded,
    /// The latest load failed; see `GridState::last_error`.
    Failed,
}

/// A user intent.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    SetFilter { field: String, raw: RawFilter },
    ClearFilter { field: String },
    ClearFilters,
    Search(String),
    ToggleSort { field: String },
    SetPage(u32),
    SetPageSize(u32),
    NextPage,
    PrevPage,
    Refresh,
    /// Replace state from URL parameters (navigation, back button).
    ApplyUrl(BTreeMap<String, String>),
}

/// Outcome of one issued load.
#[derive(Debug)]
pub struct LoadCompletion {
    pub generation: u64,
    pub outcome: Result<ResourcePage, QueryError>,
}

pub struct GridController {
    id: Uuid,
    state: GridState,
    phase: LoadPhase,
    columns: Arc<ColumnModel>,
    registry: Arc<FilterRegistry>,
    resource: Arc<dyn ResourceQuery>,
    config: GridConfig,
    mode: PaginationMode,
    /// Page size a fresh grid starts with; omitted from URLs.
    default_page_size: u32,
    actor: Option<Value>,
    load: Vec<String>,
    generation: u64,
    tx: mpsc::UnboundedSender<LoadCompletion>,
    rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl GridController {
    pub fn new(
        columns: Arc<ColumnModel>,
        registry: Arc<FilterRegistry>,
        resource: Arc<dyn ResourceQuery>,
        config: GridConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let default_page_size = config.clamp_page_size(config.default_page_size);
        Self {
            id: Uuid::now_v7(),
            state: GridState::new(default_page_size),
            phase: LoadPhase::Idle,
            columns,
            registry,
            resource,
            config,
            mode: PaginationMode::Offset,
            default_page_size,
            actor: None,
            load: Vec::new(),
            generation: 0,
            tx,
            rx,
        }
    }

    /// Controller for a view file: columns, initial sort, page size, paging
    /// mode and load instructions all come from the view.
    pub fn from_view(
        view: &ViewConfig,
        registry: Arc<FilterRegistry>,
        resource: Arc<dyn ResourceQuery>,
        config: GridConfig,
    ) -> Result<Self, GridError> {
        let columns = view.build_columns(&registry, &config)?;
        let page_size = view.page_size(&config);
        let initial_sort = view.initial_sort(&columns);
        Ok(Self::new(Arc::new(columns), registry, resource, config)
            .with_mode(view.pagination)
            .with_page_size(page_size)
            .with_initial_sort(initial_sort)
            .with_load(view.load.clone()))
    }

    pub fn with_mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Entries on unsortable columns or outside the column's sort cycle are
    /// dropped.
    pub fn with_initial_sort(mut self, sort: SortSpec) -> Self {
        let sort = self.columns.usable_sort(&sort);
        self.state = self.state.with_initial_sort(sort);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = self.config.clamp_page_size(page_size);
        self.state.set_page_size(self.default_page_size);
        self
    }

    /// Authorization context handed to every query.
    pub fn with_actor(mut self, actor: Value) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_load(mut self, load: Vec<String>) -> Self {
        self.load = load;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    /// Read-only copy for the rendering layer.
    pub fn snapshot(&self) -> GridState {
        self.state.clone()
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn columns(&self) -> &ColumnModel {
        &self.columns
    }

    pub fn page_size_options(&self) -> &[u32] {
        &self.config.page_size_options
    }

    /// Failure text for end users. Backend details only when `show_errors`
    /// is enabled.
    pub fn error_message(&self) -> Option<&str> {
        let failure = self.state.last_error.as_ref()?;
        Some(if self.config.show_errors {
            failure.message.as_str()
        } else {
            GENERIC_ERROR
        })
    }

    /// Apply a user intent. Returns whether a load was issued.
    pub fn handle_event(&mut self, event: GridEvent) -> bool {
        match event {
            GridEvent::SetFilter { field, raw } => self.set_filter(&field, &raw),
            GridEvent::ClearFilter { field } => {
                if !self.state.clear_filter(&field) {
                    return false;
                }
                self.refresh()
            }
            GridEvent::ClearFilters => {
                if self.state.filters.is_empty() {
                    return false;
                }
                self.state.clear_filters();
                self.refresh()
            }
            GridEvent::Search(term) => {
                let term = term.trim();
                if term == self.state.search_term {
                    return false;
                }
                self.state.set_search(term);
                self.refresh()
            }
            GridEvent::ToggleSort { field } => {
                let Some(column) = self.columns.get(&field).filter(|c| c.sortable) else {
                    tracing::warn!(grid = %self.id, field = %field, "ignoring sort on unsortable field");
                    return false;
                };
                let cycle = column.sort_cycle.clone();
                self.state.toggle_sort(&field, &cycle);
                self.refresh()
            }
            GridEvent::SetPage(page) => {
                let page = page.max(1);
                if self.mode == PaginationMode::Keyset && page != 1 {
                    // Keyset paging is sequential; only a return to the first
                    // page is possible.
                    tracing::debug!(grid = %self.id, page, "ignoring page jump in keyset mode");
                    return false;
                }
                if page == self.state.current_page && self.state.cursor.is_none() {
                    return false;
                }
                self.state.set_page(page);
                self.refresh()
            }
            GridEvent::SetPageSize(size) => {
                let size = self.config.clamp_page_size(size);
                if size == self.state.page_size {
                    return false;
                }
                self.state.set_page_size(size);
                self.refresh()
            }
            GridEvent::NextPage => match self.mode {
                PaginationMode::Offset => {
                    if !self.state.page_info.has_next {
                        return false;
                    }
                    self.state.set_page(self.state.current_page + 1);
                    self.refresh()
                }
                PaginationMode::Keyset => self.move_cursor(self.state.page_info.next_cursor()),
            },
            GridEvent::PrevPage => match self.mode {
                PaginationMode::Offset => {
                    if self.state.current_page <= 1 {
                        return false;
                    }
                    self.state.set_page(self.state.current_page - 1);
                    self.refresh()
                }
                PaginationMode::Keyset => self.move_cursor(self.state.page_info.prev_cursor()),
            },
            GridEvent::Refresh => self.refresh(),
            GridEvent::ApplyUrl(params) => {
                let decoded = self.codec().decode(&params);
                self.state.apply_decoded(decoded);
                self.refresh()
            }
        }
    }

    fn set_filter(&mut self, field: &str, raw: &RawFilter) -> bool {
        let Some(column) = self.columns.get(field).filter(|c| c.filterable) else {
            tracing::warn!(grid = %self.id, field, "ignoring filter on unknown or unfilterable field");
            return false;
        };
        let Some(handler) = self.registry.lookup(&column.filter_kind) else {
            tracing::warn!(
                grid = %self.id,
                field,
                kind = %column.filter_kind,
                "ignoring filter of unregistered kind"
            );
            return false;
        };

        match handler.process(raw, column) {
            Some(value) if !handler.is_empty(&value) && handler.validate(&value) => {
                if self.state.filters.get(field) == Some(&value) {
                    return false;
                }
                self.state.set_filter(field, value);
                self.refresh()
            }
            // Empty or unusable input clears the filter.
            _ => {
                if !self.state.clear_filter(field) {
                    return false;
                }
                self.refresh()
            }
        }
    }

    fn move_cursor(&mut self, cursor: Option<Cursor>) -> bool {
        if cursor.is_none() {
            return false;
        }
        self.state.set_cursor(cursor);
        self.refresh()
    }

    /// Issue a load for the current state. Any outstanding load is
    /// superseded. Must be called within a Tokio runtime.
    pub fn refresh(&mut self) -> bool {
        if self.phase == LoadPhase::Loading {
            tracing::debug!(
                grid = %self.id,
                superseded = self.generation,
                "superseding outstanding load"
            );
        }
        self.generation += 1;
        let generation = self.generation;
        self.phase = LoadPhase::Loading;
        self.state.loading = true;

        let query = QueryTranslator::new(&self.columns, &self.registry)
            .with_mode(self.mode)
            .translate(&self.state);
        let request = QueryRequest::new(query)
            .with_actor(self.actor.clone())
            .with_load(self.load.clone());

        tracing::debug!(grid = %self.id, generation, "issuing load");

        let resource = Arc::clone(&self.resource);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The inner task isolates panics in the resource.
            let outcome = match tokio::spawn(async move { resource.query(request).await }).await {
                Ok(outcome) => outcome,
                Err(err) => Err(QueryError::TaskFailed(err.to_string())),
            };
            // A closed channel means the controller is gone.
            let _ = tx.send(LoadCompletion {
                generation,
                outcome,
            });
        });

        true
    }

    /// Apply a completion. Returns false for a stale completion, which is
    /// discarded.
    pub fn apply_completion(&mut self, completion: LoadCompletion) -> bool {
        if completion.generation != self.generation {
            tracing::debug!(
                grid = %self.id,
                generation = completion.generation,
                latest = self.generation,
                "discarding stale load completion"
            );
            return false;
        }

        self.state.loading = false;
        match completion.outcome {
            Ok(page) => {
                self.state.page_info = normalize(&page.page);
                self.state.data = page.records;
                self.state.last_error = None;
                self.phase = LoadPhase::Loaded;
                tracing::debug!(
                    grid = %self.id,
                    generation = completion.generation,
                    records = self.state.data.len(),
                    total = self.state.page_info.total_count,
                    "load complete"
                );
            }
            Err(err) => {
                let failure = LoadFailure::new(&self.state, err.to_string());
                tracing::error!(
                    grid = %self.id,
                    generation = completion.generation,
                    error = %err,
                    filters = ?failure.filters,
                    sort = %failure.sort,
                    page = failure.page,
                    page_size = failure.page_size,
                    search = %failure.search,
                    "grid load failed"
                );
                self.state.data.clear();
                self.state.page_info = PageInfo::neutral(self.state.page_size);
                self.state.last_error = Some(failure);
                self.phase = LoadPhase::Failed;
            }
        }
        true
    }

    /// Wait for the next completion without applying it.
    pub async fn next_completion(&mut self) -> Option<LoadCompletion> {
        self.rx.recv().await
    }

    /// Apply completions until the latest issued load has landed.
    pub async fn run_until_idle(&mut self) {
        while self.phase == LoadPhase::Loading {
            let Some(completion) = self.rx.recv().await else {
                break;
            };
            self.apply_completion(completion);
        }
    }

    fn codec(&self) -> UrlCodec<'_> {
        UrlCodec::new(&self.columns, &self.registry, &self.config)
            .with_default_page_size(self.default_page_size)
            .with_mode(self.mode)
    }

    /// Canonical URL parameters for the current state.
    pub fn encode_url(&self) -> BTreeMap<String, String> {
        self.codec().encode(&self.state)
    }

    pub fn query_string(&self) -> String {
        to_query_string(&self.encode_url())
    }

    /// Autocomplete candidates for `field` matching `term`.
    pub fn suggest(&self, field: &str, term: &str) -> Vec<SelectOption> {
        let Some(column) = self.columns.get(field) else {
            return Vec::new();
        };
        let max = column
            .filter_options
            .max_results
            .unwrap_or(self.config.autocomplete_max_results);
        search_options(&column.filter_options.options, term, max)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::filter::{BuiltinKind, FilterValue};
    use crate::pagination::{OffsetPage, Page};
    use async_trait::async_trait;

    struct Empty;

    #[async_trait]
    impl ResourceQuery for Empty {
        async fn query(&self, request: QueryRequest) -> Result<ResourcePage, QueryError> {
            Ok(ResourcePage {
                records: Vec::new(),
                page: Page::Offset(OffsetPage {
                    page: 1,
                    page_size: request.page.limit(),
                    total_count: 0,
                }),
            })
        }
    }

    fn controller() -> GridController {
        let mut genre = Column::new("genre", BuiltinKind::Autocomplete);
        genre.filter_options.options = vec![
            SelectOption::new("Rock", "rock"),
            SelectOption::new("Progressive rock", "prog"),
            SelectOption::new("Jazz", "jazz"),
        ];
        let columns = ColumnModel::new(vec![Column::new("title", BuiltinKind::Text), genre]);
        GridController::new(
            Arc::new(columns),
            Arc::new(FilterRegistry::new()),
            Arc::new(Empty),
            GridConfig::default(),
        )
    }

    #[tokio::test]
    async fn blank_filter_input_clears_the_filter() {
        let mut grid = controller();
        assert!(grid.handle_event(GridEvent::SetFilter {
            field: "title".to_string(),
            raw: "abbey".into(),
        }));
        assert!(matches!(
            grid.state().filters.get("title"),
            Some(FilterValue::Text { .. })
        ));

        assert!(grid.handle_event(GridEvent::SetFilter {
            field: "title".to_string(),
            raw: "   ".into(),
        }));
        assert!(grid.state().filters.is_empty());
        grid.run_until_idle().await;
        assert_eq!(grid.phase(), LoadPhase::Loaded);
    }

    #[tokio::test]
    async fn unchanged_intents_issue_no_load() {
        let mut grid = controller();
        assert!(!grid.handle_event(GridEvent::Search("  ".to_string())));
        assert!(!grid.handle_event(GridEvent::SetPage(1)));
        assert!(!grid.handle_event(GridEvent::SetPageSize(25)));
        assert!(!grid.handle_event(GridEvent::ClearFilters));
        assert!(!grid.handle_event(GridEvent::ToggleSort {
            field: "missing".to_string()
        }));
        assert_eq!(grid.phase(), LoadPhase::Idle);
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let mut grid = controller();
        assert_eq!(grid.page_size_options(), &[10, 25, 50, 100]);
        assert!(grid.handle_event(GridEvent::SetPageSize(100_000)));
        assert_eq!(grid.state().page_size, 500);
        grid.run_until_idle().await;
    }

    #[test]
    fn initial_sort_outside_the_cycle_is_dropped() {
        let grid = controller().with_initial_sort(
            SortSpec::parse("title:asc_nils_first,genre:desc,missing:asc").0,
        );
        assert_eq!(grid.state().sort, SortSpec::parse("genre:desc").0);
    }

    #[test]
    fn suggestions_are_capped() {
        let mut grid = controller();
        assert_eq!(grid.suggest("genre", "ROCK").len(), 2);
        assert!(grid.suggest("genre", "").is_empty());
        grid.config.autocomplete_max_results = 1;
        // The column default still applies.
        assert_eq!(grid.suggest("genre", "rock").len(), 2);
        assert!(grid.suggest("unknown", "rock").is_empty());
    }
}
