use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};

use crate::column::Column;
use crate::predicate::{CompareOp, Predicate};

use super::registry::FilterHandler;
use super::types::{BuiltinKind, FieldTarget, FilterOperator, FilterOptions, FilterValue, RawFilter};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Inclusive range with optional bounds: date range and number range.
///
/// The URL form is `lower,upper`, either side may be blank.
pub struct RangeFilter {
    pub kind: BuiltinKind,
}

impl RangeFilter {
    fn bounds<'a>(&self, value: &'a FilterValue) -> Option<(&'a str, &'a str)> {
        match (self.kind, value) {
            (
                BuiltinKind::DateRange,
                FilterValue::DateRange {
                    from: lower,
                    to: upper,
                    operator,
                },
            )
            | (
                BuiltinKind::NumberRange,
                FilterValue::NumberRange {
                    min: lower,
                    max: upper,
                    operator,
                },
            ) if *operator == FilterOperator::Between => Some((lower.as_str(), upper.as_str())),
            _ => None,
        }
    }

    fn bound_is_valid(&self, bound: &str) -> bool {
        let bound = bound.trim();
        if bound.is_empty() {
            return true;
        }
        match self.kind {
            BuiltinKind::NumberRange => bound.parse::<f64>().is_ok_and(f64::is_finite),
            _ => parse_date(bound).is_some(),
        }
    }
}

impl FilterHandler for RangeFilter {
    fn process(&self, raw: &RawFilter, _column: &Column) -> Option<FilterValue> {
        let raw = raw.as_text();
        let (lower, upper) = raw.split_once(',').unwrap_or((raw.as_str(), ""));
        let (lower, upper) = (lower.trim().to_string(), upper.trim().to_string());
        if lower.is_empty() && upper.is_empty() {
            return None;
        }
        let operator = FilterOperator::Between;
        let value = match self.kind {
            BuiltinKind::NumberRange => FilterValue::NumberRange {
                min: lower,
                max: upper,
                operator,
            },
            _ => FilterValue::DateRange {
                from: lower,
                to: upper,
                operator,
            },
        };
        self.validate(&value).then_some(value)
    }

    fn validate(&self, value: &FilterValue) -> bool {
        self.bounds(value)
            .is_some_and(|(lower, upper)| self.bound_is_valid(lower) && self.bound_is_valid(upper))
    }

    fn build_predicate(&self, target: &FieldTarget, value: &FilterValue) -> Option<Predicate> {
        let (lower, upper) = self.bounds(value)?;
        let (lower, upper) = (lower.trim(), upper.trim());
        let field = target.field.clone();
        let mut parts = Vec::new();

        match self.kind {
            BuiltinKind::NumberRange => {
                if !lower.is_empty() {
                    parts.push(Predicate::compare(field.clone(), CompareOp::Gte, number(lower)));
                }
                if !upper.is_empty() {
                    parts.push(Predicate::compare(field, CompareOp::Lte, number(upper)));
                }
            }
            _ => {
                if !lower.is_empty() {
                    parts.push(Predicate::compare(field.clone(), CompareOp::Gte, lower));
                }
                if !upper.is_empty() {
                    parts.push(upper_date_bound(field, upper));
                }
            }
        }
        Predicate::and(parts)
    }

    fn is_empty(&self, value: &FilterValue) -> bool {
        self.bounds(value)
            .is_some_and(|(lower, upper)| lower.trim().is_empty() && upper.trim().is_empty())
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions::default()
    }
}

fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// A date-only upper bound covers the whole day: `< next day`.
fn upper_date_bound(field: String, upper: &str) -> Predicate {
    match NaiveDate::parse_from_str(upper, DATE_FORMAT)
        .ok()
        .and_then(|date| date.checked_add_days(Days::new(1)))
    {
        Some(next) => Predicate::compare(field, CompareOp::Lt, next.format(DATE_FORMAT).to_string()),
        None => Predicate::compare(field, CompareOp::Lte, upper),
    }
}

fn number(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const NUMBERS: RangeFilter = RangeFilter {
        kind: BuiltinKind::NumberRange,
    };
    const DATES: RangeFilter = RangeFilter {
        kind: BuiltinKind::DateRange,
    };

    fn column(kind: BuiltinKind) -> Column {
        Column::new("field", kind)
    }

    #[test]
    fn lower_bound_only() {
        let value = NUMBERS
            .process(&"10".into(), &column(BuiltinKind::NumberRange))
            .unwrap();
        assert_eq!(
            value,
            FilterValue::NumberRange {
                min: "10".to_string(),
                max: String::new(),
                operator: FilterOperator::Between,
            }
        );
        assert_eq!(
            NUMBERS.build_predicate(&FieldTarget::new("year"), &value),
            Some(Predicate::compare("year", CompareOp::Gte, json!(10)))
        );
    }

    #[test]
    fn both_bounds_are_inclusive() {
        let value = NUMBERS
            .process(&"1.5,20".into(), &column(BuiltinKind::NumberRange))
            .unwrap();
        assert_eq!(
            NUMBERS.build_predicate(&FieldTarget::new("price"), &value),
            Some(Predicate::All(vec![
                Predicate::compare("price", CompareOp::Gte, json!(1.5)),
                Predicate::compare("price", CompareOp::Lte, json!(20)),
            ]))
        );
    }

    #[test]
    fn blank_range_is_no_filter() {
        assert!(NUMBERS.process(&",".into(), &column(BuiltinKind::NumberRange)).is_none());
        assert!(NUMBERS.process(&"".into(), &column(BuiltinKind::NumberRange)).is_none());
    }

    #[test]
    fn non_numeric_bound_is_rejected() {
        assert!(NUMBERS.process(&"ten,".into(), &column(BuiltinKind::NumberRange)).is_none());
        let bad = FilterValue::NumberRange {
            min: "NaN".to_string(),
            max: String::new(),
            operator: FilterOperator::Between,
        };
        assert!(!NUMBERS.validate(&bad));
    }

    #[test]
    fn date_only_upper_bound_covers_the_day() {
        let value = DATES
            .process(&"2024-01-01,2024-01-31".into(), &column(BuiltinKind::DateRange))
            .unwrap();
        assert_eq!(
            DATES.build_predicate(&FieldTarget::new("released"), &value),
            Some(Predicate::All(vec![
                Predicate::compare("released", CompareOp::Gte, "2024-01-01"),
                Predicate::compare("released", CompareOp::Lt, "2024-02-01"),
            ]))
        );
    }

    #[test]
    fn datetime_bounds_are_accepted() {
        let value = DATES
            .process(&",2024-01-31T12:00:00Z".into(), &column(BuiltinKind::DateRange))
            .unwrap();
        assert_eq!(
            DATES.build_predicate(&FieldTarget::new("released"), &value),
            Some(Predicate::compare(
                "released",
                CompareOp::Lte,
                "2024-01-31T12:00:00Z"
            ))
        );
    }

    #[test]
    fn invalid_date_is_rejected() {
        assert!(DATES
            .process(&"2024-13-45".into(), &column(BuiltinKind::DateRange))
            .is_none());
    }
}
