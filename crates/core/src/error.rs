//! Error types.
//!
//! Configuration-time errors (`RegistryError`, `ColumnError`) fail fast.
//! Runtime errors (`DecodeError`, `QueryError`) are recovered locally and
//! recorded as diagnostics; they never escape the grid boundary.

use std::fmt;

use thiserror::Error;

/// A capability every filter implementation must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Process,
    Validate,
    BuildPredicate,
    IsEmpty,
    DefaultOptions,
}

impl Capability {
    /// All capabilities, in declaration order.
    pub const ALL: [Capability; 5] = [
        Capability::Process,
        Capability::Validate,
        Capability::BuildPredicate,
        Capability::IsEmpty,
        Capability::DefaultOptions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Process => "process",
            Capability::Validate => "validate",
            Capability::BuildPredicate => "build_predicate",
            Capability::IsEmpty => "is_empty",
            Capability::DefaultOptions => "default_options",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn join_capabilities(missing: &[Capability]) -> String {
    missing
        .iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while registering custom filter kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("filter kind '{0}' is built in and cannot be overridden")]
    DuplicateBuiltin(String),

    #[error("filter kind '{0}' is already registered")]
    DuplicateCustom(String),

    #[error(
        "filter kind name '{0}' is invalid (must be alphanumeric/underscore/hyphen, start with letter or underscore)"
    )]
    InvalidName(String),

    #[error("filter kind '{kind}' is missing capabilities: {}", join_capabilities(.missing))]
    MissingCapabilities {
        kind: String,
        missing: Vec<Capability>,
    },
}

/// Errors raised while building a column model from view configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("column '{0}' is defined more than once")]
    DuplicateField(String),

    #[error("column field name must not be empty")]
    EmptyField,

    #[error("column '{field}': checkbox filter requires a configured target value")]
    CheckboxWithoutValue { field: String },

    #[error("column '{field}': invalid sort cycle: {reason}")]
    InvalidSortCycle { field: String, reason: String },
}

/// A single URL parameter that could not be decoded.
///
/// Decode errors drop only the offending parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("parameter '{key}' is not a valid positive integer: '{raw}'")]
    InvalidInteger { key: String, raw: String },

    #[error("invalid sort token '{0}'")]
    InvalidSortToken(String),

    #[error("cannot sort on '{0}'")]
    UnsortableField(String),

    #[error("'{direction}' is not in the sort cycle of '{field}'")]
    DirectionNotInCycle { field: String, direction: String },

    #[error("filter '{field}' could not be decoded from '{raw}'")]
    InvalidFilter { field: String, raw: String },

    #[error("filter '{field}' uses unregistered kind '{kind}'")]
    UnknownKind { field: String, kind: String },
}

/// Failure while executing a query against the backing resource.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("query task failed: {0}")]
    TaskFailed(String),
}

impl From<anyhow::Error> for QueryError {
    fn from(err: anyhow::Error) -> Self {
        QueryError::Backend(format!("{err:#}"))
    }
}

/// Umbrella error for grid setup.
#[derive(Debug, Error)]
pub enum GridError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Column(#[from] ColumnError),
}
