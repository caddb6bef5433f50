//! Filter kind registry.
//!
//! Built-in kinds are always available. Applications add custom kinds during
//! setup, either as a typed [`FilterHandler`] or as a [`FilterDefinition`]
//! assembled from closures, then freeze the registry behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::column::Column;
use crate::error::{Capability, RegistryError};
use crate::predicate::Predicate;

use super::types::{BuiltinKind, FieldTarget, FilterKind, FilterOptions, FilterValue, RawFilter};

// ---------------------------------------------------------------------------
// Handler trait
// ---------------------------------------------------------------------------

/// Behavior of one filter kind.
pub trait FilterHandler: Send + Sync {
    /// Turn raw input into a filter value. `None` means "no filter".
    fn process(&self, raw: &RawFilter, column: &Column) -> Option<FilterValue>;

    /// Whether a value is well-formed for this kind.
    fn validate(&self, value: &FilterValue) -> bool;

    /// Build the constraint for `target`. `None` adds no constraint.
    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate>;

    /// Whether a value constrains nothing and should be ignored.
    fn is_empty(&self, value: &FilterValue) -> bool;

    /// Options applied to columns of this kind unless configured explicitly.
    fn default_options(&self) -> FilterOptions;
}

// ---------------------------------------------------------------------------
// Declarative definitions
// ---------------------------------------------------------------------------

type ProcessFn = Box<dyn Fn(&RawFilter, &Column) -> Option<FilterValue> + Send + Sync>;
type ValidateFn = Box<dyn Fn(&FilterValue) -> bool + Send + Sync>;
type BuildFn = Box<dyn Fn(&FieldTarget, &FilterValue) -> Option<Predicate> + Send + Sync>;
type IsEmptyFn = Box<dyn Fn(&FilterValue) -> bool + Send + Sync>;

/// A custom filter kind assembled from individual capabilities.
///
/// Every capability must be supplied; [`FilterRegistry::register`] reports
/// the ones that are missing.
#[derive(Default)]
pub struct FilterDefinition {
    process: Option<ProcessFn>,
    validate: Option<ValidateFn>,
    build_predicate: Option<BuildFn>,
    is_empty: Option<IsEmptyFn>,
    default_options: Option<FilterOptions>,
}

impl FilterDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(
        mut self,
        f: impl Fn(&RawFilter, &Column) -> Option<FilterValue> + Send + Sync + 'static,
    ) -> Self {
        self.process = Some(Box::new(f));
        self
    }

    pub fn validate(mut self, f: impl Fn(&FilterValue) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Some(Box::new(f));
        self
    }

    pub fn build_predicate(
        mut self,
        f: impl Fn(&FieldTarget, &FilterValue) -> Option<Predicate> + Send + Sync + 'static,
    ) -> Self {
        self.build_predicate = Some(Box::new(f));
        self
    }

    pub fn is_empty(mut self, f: impl Fn(&FilterValue) -> bool + Send + Sync + 'static) -> Self {
        self.is_empty = Some(Box::new(f));
        self
    }

    pub fn default_options(mut self, options: FilterOptions) -> Self {
        self.default_options = Some(options);
        self
    }

    /// Capabilities not supplied yet, in declaration order.
    pub fn missing(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| match capability {
                Capability::Process => self.process.is_none(),
                Capability::Validate => self.validate.is_none(),
                Capability::BuildPredicate => self.build_predicate.is_none(),
                Capability::IsEmpty => self.is_empty.is_none(),
                Capability::DefaultOptions => self.default_options.is_none(),
            })
            .collect()
    }

    fn into_handler(self) -> Option<DeclaredFilter> {
        Some(DeclaredFilter {
            process: self.process?,
            validate: self.validate?,
            build_predicate: self.build_predicate?,
            is_empty: self.is_empty?,
            default_options: self.default_options?,
        })
    }
}

struct DeclaredFilter {
    process: ProcessFn,
    validate: ValidateFn,
    build_predicate: BuildFn,
    is_empty: IsEmptyFn,
    default_options: FilterOptions,
}

impl FilterHandler for DeclaredFilter {
    fn process(&self, raw: &RawFilter, column: &Column) -> Option<FilterValue> {
        (self.process)(raw, column)
    }

    fn validate(&self, value: &FilterValue) -> bool {
        (self.validate)(value)
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        (self.build_predicate)(target, value)
    }

    fn is_empty(&self, value: &FilterValue) -> bool {
        (self.is_empty)(value)
    }

    fn default_options(&self) -> FilterOptions {
        self.default_options.clone()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Validate a kind name: must be non-empty, alphanumeric/underscore/hyphen,
/// start with a letter or underscore, max 64 chars.
pub fn is_valid_kind_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
}

/// Lookup table from filter kind to behavior.
#[derive(Default)]
pub struct FilterRegistry {
    /// Custom kinds by name. Built-ins are resolved without the table.
    custom: HashMap<String, Box<dyn FilterHandler>>,
}

impl FilterRegistry {
    /// A registry with only the built-in kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and freeze a registry from declarative definitions, collecting
    /// every registration error rather than stopping at the first.
    pub fn setup<I, S>(definitions: I) -> Result<Arc<Self>, Vec<RegistryError>>
    where
        I: IntoIterator<Item = (S, FilterDefinition)>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        let errors: Vec<RegistryError> = definitions
            .into_iter()
            .filter_map(|(kind, definition)| registry.register(kind.as_ref(), definition).err())
            .collect();
        if !errors.is_empty() {
            for err in &errors {
                tracing::error!(error = %err, "filter registration failed");
            }
            return Err(errors);
        }
        Ok(registry.freeze())
    }

    /// Register a custom kind from a declarative definition.
    pub fn register(&mut self, kind: &str, definition: FilterDefinition) -> Result<(), RegistryError> {
        self.check_name(kind)?;
        let missing = definition.missing();
        let handler = definition
            .into_handler()
            .ok_or_else(|| RegistryError::MissingCapabilities {
                kind: kind.to_string(),
                missing,
            })?;
        self.insert(kind, Box::new(handler));
        Ok(())
    }

    /// Register a custom kind implemented as a [`FilterHandler`].
    pub fn register_handler(
        &mut self,
        kind: &str,
        handler: Box<dyn FilterHandler>,
    ) -> Result<(), RegistryError> {
        self.check_name(kind)?;
        self.insert(kind, handler);
        Ok(())
    }

    fn check_name(&self, kind: &str) -> Result<(), RegistryError> {
        if BuiltinKind::from_name(kind).is_some() {
            return Err(RegistryError::DuplicateBuiltin(kind.to_string()));
        }
        if !is_valid_kind_name(kind) {
            return Err(RegistryError::InvalidName(kind.to_string()));
        }
        if self.custom.contains_key(kind) {
            return Err(RegistryError::DuplicateCustom(kind.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, kind: &str, handler: Box<dyn FilterHandler>) {
        tracing::debug!(kind, "registered custom filter kind");
        self.custom.insert(kind.to_string(), handler);
    }

    /// Freeze the registry for shared, lock-free reads.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Look up the behavior for a kind.
    pub fn lookup(&self, kind: &FilterKind) -> Option<&dyn FilterHandler> {
        match kind {
            FilterKind::Builtin(builtin) => Some(builtin.handler()),
            FilterKind::Custom(name) => self.custom.get(name).map(|h| h.as_ref()),
        }
    }

    /// Check if a kind is available.
    pub fn contains(&self, kind: &FilterKind) -> bool {
        self.lookup(kind).is_some()
    }

    /// All registered custom kind names, sorted.
    pub fn custom_kinds(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
