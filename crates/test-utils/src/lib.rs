//! Tabula test utilities.
//!
//! Helpers for integration testing: an album catalogue fixture (schema,
//! columns, records) and an in-memory resource with latency and failure
//! injection.

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tabula_core::column::{ColumnConfig, ColumnModel};
use tabula_core::error::QueryError;
use tabula_core::filter::{FilterRegistry, SelectOption};
use tabula_core::pagination::{KeysetPage, OffsetPage, Page, PageRequest};
use tabula_core::resource::{QueryRequest, Record, ResourcePage, ResourceQuery};
use tabula_core::schema::{AttributeMeta, AttributeType, ResourceSchema};
use tabula_core::sort::{NullsOrder, SortDirection, SortSpec};

/// Album catalogue fixtures.
pub mod albums {
    use super::*;

    /// Schema of the album resource, with a to-one `artist` relationship.
    pub fn schema() -> ResourceSchema {
        let artist = ResourceSchema::new()
            .attribute(AttributeMeta::new("name", AttributeType::String))
            .attribute(AttributeMeta::new("country", AttributeType::String));

        ResourceSchema::new()
            .attribute(AttributeMeta::new("id", AttributeType::String))
            .attribute(AttributeMeta::new("title", AttributeType::String))
            .attribute(
                AttributeMeta::new("status", AttributeType::String)
                    .with_one_of(["active", "archived", "draft"]),
            )
            .attribute(AttributeMeta::new("genre", AttributeType::String))
            .attribute(AttributeMeta::new(
                "tags",
                AttributeType::Array(Box::new(AttributeType::String)),
            ))
            .attribute(AttributeMeta::new("year", AttributeType::Integer))
            .attribute(AttributeMeta::new("explicit", AttributeType::Boolean))
            .attribute(AttributeMeta::new("released", AttributeType::Date))
            .attribute(AttributeMeta::new("price", AttributeType::Float))
            .relationship("artist", artist)
    }

    /// Column configuration. Most kinds are inferred from the schema.
    pub fn column_configs() -> Vec<ColumnConfig> {
        vec![
            ColumnConfig::new("title"),
            ColumnConfig::new("status"),
            ColumnConfig::new("genre").filter("autocomplete").options(vec![
                SelectOption::new("Rock", "rock"),
                SelectOption::new("Jazz", "jazz"),
                SelectOption::new("Hip hop", "hip-hop"),
                SelectOption::new("Electronic", "electronic"),
            ]),
            ColumnConfig::new("tags").options(
                [
                    "rock",
                    "classic",
                    "jazz",
                    "modal",
                    "alternative",
                    "hip-hop",
                    "hard-bop",
                    "psychedelic",
                    "electronic",
                ]
                .into_iter()
                .map(|t| SelectOption::new(t, t))
                .collect(),
            ),
            ColumnConfig::new("year"),
            ColumnConfig::new("explicit"),
            ColumnConfig::new("released"),
            ColumnConfig {
                sortable: false,
                ..ColumnConfig::new("price")
            },
            ColumnConfig::new("artist.name"),
            ColumnConfig::new("artist.country")
                .filter("radio_group")
                .options(vec![
                    SelectOption::new("United Kingdom", "UK"),
                    SelectOption::new("United States", "US"),
                ]),
        ]
    }

    /// Column model over the album schema.
    pub fn columns(registry: &FilterRegistry) -> ColumnModel {
        match ColumnModel::build(&column_configs(), Some(&schema()), registry) {
            Ok(columns) => columns,
            Err(err) => panic!("album columns are invalid: {err}"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn album(
        id: &str,
        title: &str,
        status: &str,
        genre: &str,
        tags: &[&str],
        year: Option<i64>,
        explicit: bool,
        released: &str,
        price: f64,
        artist: (&str, &str),
    ) -> Record {
        let value = json!({
            "id": id,
            "title": title,
            "status": status,
            "genre": genre,
            "tags": tags,
            "year": year,
            "explicit": explicit,
            "released": released,
            "price": price,
            "artist": { "name": artist.0, "country": artist.1 },
        });
        match value {
            Value::Object(record) => record,
            _ => Record::new(),
        }
    }

    /// Eight albums, ordered by id.
    pub fn records() -> Vec<Record> {
        vec![
            album("a01", "Abbey Road", "active", "rock", &["rock", "classic"], Some(1969), false, "1969-09-26", 19.99, ("The Beatles", "UK")),
            album("a02", "Kind of Blue", "active", "jazz", &["jazz", "modal"], Some(1959), false, "1959-08-17", 14.5, ("Miles Davis", "US")),
            album("a03", "OK Computer", "active", "rock", &["rock", "alternative"], Some(1997), false, "1997-05-21", 17.0, ("Radiohead", "UK")),
            album("a04", "The Chronic", "archived", "hip-hop", &["hip-hop"], Some(1992), true, "1992-12-15", 12.0, ("Dr. Dre", "US")),
            album("a05", "Blue Train", "draft", "jazz", &["jazz", "hard-bop"], None, false, "1958-01-01", 11.0, ("John Coltrane", "US")),
            album("a06", "Revolver", "active", "rock", &["rock", "psychedelic"], Some(1966), false, "1966-08-05", 16.5, ("The Beatles", "UK")),
            album("a07", "Illmatic", "active", "hip-hop", &["hip-hop", "classic"], Some(1994), true, "1994-04-19", 13.0, ("Nas", "US")),
            album("a08", "Kid A", "archived", "electronic", &["electronic", "alternative"], Some(2000), false, "2000-10-02", 15.0, ("Radiohead", "UK")),
        ]
    }
}

/// Build a parameter map from pairs.
pub fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Ids of `records`, in order.
pub fn ids(records: &[Record]) -> Vec<String> {
    records.iter().filter_map(record_id).collect()
}

fn record_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An in-memory resource evaluating predicates with `Predicate::matches`.
///
/// Keyset cursors are record ids. Delays, failures and panics are queued and
/// consumed one per query, in order.
pub struct InMemoryResource {
    records: Vec<Record>,
    delays: Mutex<VecDeque<Duration>>,
    failures: Mutex<VecDeque<String>>,
    panic_next: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<QueryRequest>>,
}

impl InMemoryResource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            delays: Mutex::new(VecDeque::new()),
            failures: Mutex::new(VecDeque::new()),
            panic_next: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn albums() -> Self {
        Self::new(albums::records())
    }

    /// Delay the next queries; one entry per query.
    pub fn with_delays(self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.delays.lock().extend(delays);
        self
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, AtomicOrdering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    pub fn last_request(&self) -> Option<QueryRequest> {
        self.requests.lock().last().cloned()
    }

    fn select(&self, request: &QueryRequest) -> Vec<Record> {
        let mut matching: Vec<Record> = self
            .records
            .iter()
            .filter(|r| request.predicate.as_ref().is_none_or(|p| p.matches(r)))
            .cloned()
            .collect();
        sort_records(&mut matching, &request.sort);
        matching
    }
}

#[async_trait]
impl ResourceQuery for InMemoryResource {
    async fn query(&self, request: QueryRequest) -> Result<ResourcePage, QueryError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.requests.lock().push(request.clone());

        let delay = self.delays.lock().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().pop_front();
        if let Some(message) = failure {
            return Err(QueryError::Backend(message));
        }
        if self.panic_next.swap(false, AtomicOrdering::SeqCst) {
            panic!("in-memory resource panicked on request");
        }

        let matching = self.select(&request);
        let total_count = matching.len() as u64;

        let (records, page) = match request.page {
            PageRequest::Offset { page, page_size } => {
                let records = matching
                    .into_iter()
                    .skip(request.page.offset() as usize)
                    .take(page_size as usize)
                    .collect();
                let page = Page::Offset(OffsetPage {
                    page,
                    page_size,
                    total_count,
                });
                (records, page)
            }
            PageRequest::Keyset {
                after,
                before,
                limit,
            } => {
                let limit = limit as usize;
                let position =
                    |cursor: &str| matching.iter().position(|r| record_id(r).as_deref() == Some(cursor));
                let (records, more): (Vec<Record>, bool) = match (&after, &before) {
                    (Some(cursor), _) => {
                        // Unknown cursors yield an empty page.
                        let start = position(cursor).map_or(matching.len(), |i| i + 1);
                        let rest = &matching[start..];
                        (rest.iter().take(limit).cloned().collect(), rest.len() > limit)
                    }
                    (None, Some(cursor)) => {
                        let end = position(cursor).unwrap_or(0);
                        let start = end.saturating_sub(limit);
                        (matching[start..end].to_vec(), start > 0)
                    }
                    (None, None) => (
                        matching.iter().take(limit).cloned().collect(),
                        matching.len() > limit,
                    ),
                };
                let page = Page::Keyset(KeysetPage {
                    start_cursor: records.first().and_then(record_id),
                    end_cursor: records.last().and_then(record_id),
                    after,
                    before,
                    limit: limit as u32,
                    total_count,
                    more,
                });
                (records, page)
            }
        };

        Ok(ResourcePage { records, page })
    }
}

fn sort_records(records: &mut [Record], sort: &SortSpec) {
    records.sort_by(|a, b| {
        sort.entries()
            .iter()
            .map(|entry| compare_field(lookup(a, &entry.field), lookup(b, &entry.field), entry.direction))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Nulls sort last ascending and first descending unless the direction says
/// otherwise.
fn compare_field(a: Option<&Value>, b: Option<&Value>, direction: SortDirection) -> Ordering {
    let nulls_first = match direction.nulls() {
        Some(NullsOrder::First) => true,
        Some(NullsOrder::Last) => false,
        None => direction.is_descending(),
    };
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) if nulls_first => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) if nulls_first => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => {
            let ord = compare_scalars(a, b);
            if direction.is_descending() {
                ord.reverse()
            } else {
                ord
            }
        }
    }
}

fn compare_scalars(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Dotted field lookup; null counts as missing.
fn lookup<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    let mut segments = field.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}
