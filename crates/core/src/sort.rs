//! Sort directions, per-column sort cycles and the ordered sort list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Sort direction, including explicit NULL placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
    AscNilsFirst,
    AscNilsLast,
    DescNilsFirst,
    DescNilsLast,
}

/// NULL ordering preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

impl SortDirection {
    pub const ALL: [SortDirection; 6] = [
        SortDirection::Asc,
        SortDirection::Desc,
        SortDirection::AscNilsFirst,
        SortDirection::AscNilsLast,
        SortDirection::DescNilsFirst,
        SortDirection::DescNilsLast,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
            SortDirection::AscNilsFirst => "asc_nils_first",
            SortDirection::AscNilsLast => "asc_nils_last",
            SortDirection::DescNilsFirst => "desc_nils_first",
            SortDirection::DescNilsLast => "desc_nils_last",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(
            self,
            SortDirection::Desc | SortDirection::DescNilsFirst | SortDirection::DescNilsLast
        )
    }

    /// Explicit NULL placement, if any.
    pub fn nulls(&self) -> Option<NullsOrder> {
        match self {
            SortDirection::Asc | SortDirection::Desc => None,
            SortDirection::AscNilsFirst | SortDirection::DescNilsFirst => Some(NullsOrder::First),
            SortDirection::AscNilsLast | SortDirection::DescNilsLast => Some(NullsOrder::Last),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortDirection::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| DecodeError::InvalidSortToken(s.to_string()))
    }
}

/// The sequence of states a column moves through when its header is toggled.
///
/// The unsorted state (`None`) is always part of the cycle, first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortCycle(Vec<Option<SortDirection>>);

impl Default for SortCycle {
    /// none → asc → desc → none
    fn default() -> Self {
        Self(vec![None, Some(SortDirection::Asc), Some(SortDirection::Desc)])
    }
}

impl SortCycle {
    /// Build a cycle from the sorted states; the unsorted state is prepended.
    pub fn new(directions: &[SortDirection]) -> Result<Self, String> {
        if directions.is_empty() {
            return Err("a sort cycle needs at least one direction".to_string());
        }
        for (i, direction) in directions.iter().enumerate() {
            if directions[..i].contains(direction) {
                return Err(format!("direction '{direction}' appears more than once"));
            }
        }
        let mut states = Vec::with_capacity(directions.len() + 1);
        states.push(None);
        states.extend(directions.iter().copied().map(Some));
        Ok(Self(states))
    }

    /// Number of states, including unsorted.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The state after `current`. A direction that is not part of the cycle
    /// is treated like the unsorted state.
    pub fn next(&self, current: Option<SortDirection>) -> Option<SortDirection> {
        let position = self.0.iter().position(|s| *s == current).unwrap_or(0);
        self.0[(position + 1) % self.0.len()]
    }

    pub fn contains(&self, direction: SortDirection) -> bool {
        self.0.contains(&Some(direction))
    }
}

/// One active sort entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered multi-column sort. A field appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortSpec(Vec<SortEntry>);

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SortEntry] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Current direction for `field`, if sorted.
    pub fn direction(&self, field: &str) -> Option<SortDirection> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.direction)
    }

    /// Set or replace the direction for `field`. A new field is appended; an
    /// existing one keeps its position.
    pub fn set(&mut self, field: &str, direction: SortDirection) {
        match self.0.iter_mut().find(|e| e.field == field) {
            Some(entry) => entry.direction = direction,
            None => self.0.push(SortEntry {
                field: field.to_string(),
                direction,
            }),
        }
    }

    pub fn remove(&mut self, field: &str) {
        self.0.retain(|e| e.field != field);
    }

    /// Advance `field` through `cycle`. Other entries keep their order.
    pub fn toggle(&mut self, field: &str, cycle: &SortCycle) -> Option<SortDirection> {
        let next = cycle.next(self.direction(field));
        match next {
            Some(direction) => self.set(field, direction),
            None => self.remove(field),
        }
        next
    }

    /// Comma-joined `field:direction` tokens.
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|e| format!("{}:{}", e.field, e.direction))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Parse `field:direction` tokens. Bad tokens are reported and skipped;
    /// a repeated field keeps its first occurrence.
    pub fn parse(raw: &str) -> (SortSpec, Vec<DecodeError>) {
        let mut spec = SortSpec::new();
        let mut errors = Vec::new();

        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let Some((field, direction)) = token.rsplit_once(':') else {
                errors.push(DecodeError::InvalidSortToken(token.to_string()));
                continue;
            };
            let field = field.trim();
            if field.is_empty() {
                errors.push(DecodeError::InvalidSortToken(token.to_string()));
                continue;
            }
            match direction.trim().parse::<SortDirection>() {
                Ok(direction) if spec.direction(field).is_none() => spec.set(field, direction),
                Ok(_) => {}
                Err(_) => errors.push(DecodeError::InvalidSortToken(token.to_string())),
            }
        }

        (spec, errors)
    }
}

impl FromIterator<SortEntry> for SortSpec {
    fn from_iter<I: IntoIterator<Item = SortEntry>>(iter: I) -> Self {
        let mut spec = SortSpec::new();
        for entry in iter {
            if spec.direction(&entry.field).is_none() {
                spec.0.push(entry);
            }
        }
        spec
    }
}

/// Decide which sort applies after decoding URL state.
///
/// A non-empty decoded sort always wins. An empty one clears the sort only if
/// the user already interacted with sorting; otherwise the initial sort stays.
pub fn resolve_sort(decoded: SortSpec, user_has_sorted: bool, initial: &SortSpec) -> SortSpec {
    if !decoded.is_empty() {
        decoded
    } else if user_has_sorted {
        SortSpec::new()
    } else {
        initial.clone()
    }
}
