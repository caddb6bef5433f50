//! Resource schema metadata and relationship path resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute storage type as reported by the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    CiString,
    Uuid,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Array(Box<AttributeType>),
    Other(String),
}

impl AttributeType {
    pub fn is_array(&self) -> bool {
        matches!(self, AttributeType::Array(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttributeType::Integer | AttributeType::Float | AttributeType::Decimal
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, AttributeType::Date | AttributeType::DateTime)
    }
}

/// Metadata for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttributeType,
    /// Enumerated constraint (`one_of`), if any.
    #[serde(default)]
    pub one_of: Option<Vec<String>>,
}

impl AttributeMeta {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            one_of: None,
        }
    }

    pub fn with_one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// Schema of a resource: its attributes and the resources it relates to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    #[serde(default)]
    pub attributes: Vec<AttributeMeta>,
    #[serde(default)]
    pub relationships: BTreeMap<String, ResourceSchema>,
}

impl ResourceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, meta: AttributeMeta) -> Self {
        self.attributes.push(meta);
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, destination: ResourceSchema) -> Self {
        self.relationships.insert(name.into(), destination);
        self
    }

    pub fn get_attribute(&self, name: &str) -> Option<&AttributeMeta> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Resolve a dotted path to the attribute it ends on, following
    /// relationships for every segment but the last.
    pub fn resolve(&self, path: &str) -> Option<&AttributeMeta> {
        let segments: Vec<&str> = path.split('.').collect();
        self.resolve_segments(&segments)
    }

    fn resolve_segments(&self, segments: &[&str]) -> Option<&AttributeMeta> {
        match segments {
            [] => None,
            [name] => self.get_attribute(name),
            [relationship, rest @ ..] => self.relationships.get(*relationship)?.resolve_segments(rest),
        }
    }
}

/// A column's field reference split into relationship and target field.
///
/// Only one hop is supported: in `"artist.label.name"` the relationship is
/// `artist` and the target field is `label.name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPath {
    pub relationship: Option<String>,
    pub field: String,
}

impl FieldPath {
    /// Split a dotted path. Returns `None` for malformed paths (empty
    /// segments such as `"artist."`, `".name"` or `"a..b"`).
    pub fn parse(path: &str) -> Option<FieldPath> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return None;
        }
        Some(match path.split_once('.') {
            Some((relationship, field)) => FieldPath {
                relationship: Some(relationship.to_string()),
                field: field.to_string(),
            },
            None => FieldPath {
                relationship: None,
                field: path.to_string(),
            },
        })
    }

    /// Plain scalar reference to `path`, used when the path is malformed.
    pub fn scalar(path: &str) -> FieldPath {
        FieldPath {
            relationship: None,
            field: path.to_string(),
        }
    }
}
