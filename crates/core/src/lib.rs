//! Tabula data-grid engine.
//!
//! Turns per-column filter input, sort and pagination into a backend-neutral
//! predicate tree, keeps grid state in sync with URL parameters, and
//! coordinates asynchronous loads against a queryable resource.
//! The `tabula` binary exposes translation and URL normalization on the
//! command line.

pub mod column;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod inference;
pub mod pagination;
pub mod predicate;
pub mod resource;
pub mod schema;
pub mod sort;
pub mod state;
pub mod translate;
pub mod url_state;

pub use column::{Column, ColumnConfig, ColumnModel};
pub use config::{GridConfig, ViewConfig};
pub use coordinator::{GridController, GridEvent, LoadCompletion, LoadPhase};
pub use error::{ColumnError, DecodeError, GridError, QueryError, RegistryError};
pub use filter::{FilterDefinition, FilterHandler, FilterKind, FilterRegistry, FilterValue};
pub use predicate::Predicate;
pub use resource::{QueryRequest, Record, ResourcePage, ResourceQuery};
pub use state::GridState;
pub use translate::{QueryTranslator, TranslatedQuery};
pub use url_state::UrlCodec;
