use serde_json::{Map, Value};

/// Narrow an untyped value to a JSON object. Null, arrays and scalars yield `None`.
pub fn as_record(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Returns the trimmed string when `value` is a string with non-blank content.
pub fn parse_required_string_value(value: &Value) -> Option<String> {
    let Value::String(raw) = value else {
        return None;
    };
    let normalized = raw.trim();
    if normalized.is_empty() {
        return None;
    }
    Some(normalized.to_string())
}

pub fn parse_required_string_field(record: &Map<String, Value>, field: &str) -> Option<String> {
    record.get(field).and_then(parse_required_string_value)
}

/// Outcome of reading a field that may be left out of a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionalString {
    Absent,
    Present(String),
    Invalid,
}

impl OptionalString {
    pub fn into_option(self) -> Option<String> {
        match self {
            OptionalString::Present(value) => Some(value),
            OptionalString::Absent | OptionalString::Invalid => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, OptionalString::Invalid)
    }
}

pub fn parse_optional_string_value(value: Option<&Value>, require_non_empty: bool) -> OptionalString {
    let Some(value) = value else {
        return OptionalString::Absent;
    };
    let Value::String(raw) = value else {
        return OptionalString::Invalid;
    };
    let normalized = raw.trim();
    if normalized.is_empty() {
        return if require_non_empty {
            OptionalString::Invalid
        } else {
            OptionalString::Absent
        };
    }
    OptionalString::Present(normalized.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn as_record_rejects_non_objects() {
        assert!(as_record(&Value::Null).is_none());
        assert!(as_record(&json!([1, 2])).is_none());
        assert!(as_record(&json!("x")).is_none());
        assert!(as_record(&json!(7)).is_none());
        assert!(as_record(&json!(true)).is_none());
    }

    #[test]
    fn as_record_returns_object_fields() {
        let value = json!({"a": 1});
        let record = as_record(&value).expect("record");
        assert_eq!(record.get("a"), Some(&json!(1)));
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn parse_required_string_value_trims_and_rejects_blank() {
        assert_eq!(parse_required_string_value(&json!("  ")), None);
        assert_eq!(parse_required_string_value(&json!(" hi ")).as_deref(), Some("hi"));
        assert_eq!(parse_required_string_value(&json!(42)), None);
        assert_eq!(parse_required_string_value(&Value::Null), None);
    }

    #[test]
    fn parse_required_string_field_reads_named_field() {
        let value = json!({"itemId": "  item-1 ", "other": 3});
        let record = as_record(&value).expect("record");
        assert_eq!(
            parse_required_string_field(record, "itemId").as_deref(),
            Some("item-1")
        );
        assert_eq!(parse_required_string_field(record, "other"), None);
        assert_eq!(parse_required_string_field(record, "missing"), None);
    }

    #[test]
    fn parse_optional_string_value_distinguishes_absent_and_invalid() {
        assert_eq!(parse_optional_string_value(None, true), OptionalString::Absent);
        assert_eq!(
            parse_optional_string_value(Some(&json!(5)), false),
            OptionalString::Invalid
        );
        assert_eq!(
            parse_optional_string_value(Some(&json!("   ")), false),
            OptionalString::Absent
        );
        assert_eq!(
            parse_optional_string_value(Some(&json!("   ")), true),
            OptionalString::Invalid
        );
        assert_eq!(
            parse_optional_string_value(Some(&json!(" key ")), true),
            OptionalString::Present("key".to_string())
        );
    }
}
