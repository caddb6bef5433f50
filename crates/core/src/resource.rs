//! Boundary to the backing data resource.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::QueryError;
use crate::pagination::{Page, PageRequest};
use crate::predicate::Predicate;
use crate::sort::SortSpec;
use crate::translate::TranslatedQuery;

/// One row of data.
pub type Record = serde_json::Map<String, Value>;

/// Everything a resource needs to run one list query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub predicate: Option<Predicate>,
    pub sort: SortSpec,
    pub page: PageRequest,
    /// Opaque authorization context, passed through untouched.
    pub actor: Option<Value>,
    /// Extra load instructions (relationships, calculations) for the resource.
    pub load: Vec<String>,
}

impl QueryRequest {
    pub fn new(query: TranslatedQuery) -> Self {
        Self {
            predicate: query.predicate,
            sort: query.sort,
            page: query.page,
            actor: None,
            load: Vec::new(),
        }
    }

    pub fn with_actor(mut self, actor: Option<Value>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_load(mut self, load: Vec<String>) -> Self {
        self.load = load;
        self
    }
}

/// Records of one page plus the pagination metadata to normalize.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePage {
    pub records: Vec<Record>,
    pub page: Page,
}

/// A queryable data resource. Stateless per call.
#[async_trait]
pub trait ResourceQuery: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<ResourcePage, QueryError>;
}
