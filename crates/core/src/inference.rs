//! Default filter kind from attribute metadata.

use crate::filter::BuiltinKind;
use crate::schema::{AttributeMeta, AttributeType};

/// Infer the filter kind for a column that does not name one explicitly.
///
/// Arrays always map to `multi_select` regardless of element type; an
/// enumerated constraint on a scalar maps to `select`.
pub fn infer(attribute: &AttributeMeta) -> BuiltinKind {
    match &attribute.ty {
        AttributeType::Array(_) => BuiltinKind::MultiSelect,
        _ if attribute.one_of.as_ref().is_some_and(|v| !v.is_empty()) => BuiltinKind::Select,
        AttributeType::Boolean => BuiltinKind::Boolean,
        ty if ty.is_numeric() => BuiltinKind::NumberRange,
        ty if ty.is_temporal() => BuiltinKind::DateRange,
        // String-like and unrecognized types.
        _ => BuiltinKind::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(ty: AttributeType) -> BuiltinKind {
        infer(&AttributeMeta::new("field", ty))
    }

    #[test]
    fn scalar_types() {
        assert_eq!(kind(AttributeType::String), BuiltinKind::Text);
        assert_eq!(kind(AttributeType::CiString), BuiltinKind::Text);
        assert_eq!(kind(AttributeType::Uuid), BuiltinKind::Text);
        assert_eq!(kind(AttributeType::Boolean), BuiltinKind::Boolean);
        assert_eq!(kind(AttributeType::Integer), BuiltinKind::NumberRange);
        assert_eq!(kind(AttributeType::Decimal), BuiltinKind::NumberRange);
        assert_eq!(kind(AttributeType::Date), BuiltinKind::DateRange);
        assert_eq!(kind(AttributeType::DateTime), BuiltinKind::DateRange);
    }

    #[test]
    fn arrays_are_multi_select_regardless_of_element() {
        for element in [
            AttributeType::String,
            AttributeType::Integer,
            AttributeType::Other("map".to_string()),
        ] {
            assert_eq!(
                kind(AttributeType::Array(Box::new(element))),
                BuiltinKind::MultiSelect
            );
        }
    }

    #[test]
    fn enumerated_scalar_is_select() {
        let attr = AttributeMeta::new("status", AttributeType::String)
            .with_one_of(["active", "archived"]);
        assert_eq!(infer(&attr), BuiltinKind::Select);
    }

    #[test]
    fn unrecognized_falls_back_to_text() {
        assert_eq!(kind(AttributeType::Time), BuiltinKind::Text);
        assert_eq!(kind(AttributeType::Other("money".to_string())), BuiltinKind::Text);
    }
}
