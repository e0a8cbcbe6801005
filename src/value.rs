//! Cell decoding from rows and the coercing equality used by diff updates.

use crate::entity::ColumnType;
use crate::error::MapError;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

/// Read one cell by column name, decoded per the declared column type.
/// A stored NULL decodes to `Value::Null` regardless of type.
pub(crate) fn decode_cell(row: &SqliteRow, name: &str, ty: ColumnType) -> Result<Value, MapError> {
    let v = match ty {
        ColumnType::Integer => row
            .try_get::<Option<i64>, _>(name)?
            .map(|n| Value::Number(n.into())),
        ColumnType::Real => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        ColumnType::Text | ColumnType::Uuid | ColumnType::Timestamp => {
            row.try_get::<Option<String>, _>(name)?.map(Value::String)
        }
        ColumnType::Json => row.try_get::<Option<Value>, _>(name)?,
    };
    Ok(v.unwrap_or(Value::Null))
}

/// Equality for a diff update: null vs non-null always differs; same-type
/// values compare by value (strings honor `case_sensitive`); differing
/// representations are coerced to the declared column type before comparing.
pub(crate) fn values_equal(
    stored: &Value,
    incoming: &Value,
    ty: ColumnType,
    case_sensitive: bool,
) -> bool {
    match (stored.is_null(), incoming.is_null()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }
    match ty {
        ColumnType::Integer => match (as_i64(stored), as_i64(incoming)) {
            (Some(a), Some(b)) => a == b,
            _ => stored == incoming,
        },
        ColumnType::Real => match (as_f64(stored), as_f64(incoming)) {
            (Some(a), Some(b)) => a == b,
            _ => stored == incoming,
        },
        ColumnType::Boolean => match (as_bool(stored), as_bool(incoming)) {
            (Some(a), Some(b)) => a == b,
            _ => stored == incoming,
        },
        ColumnType::Text => match (stored.as_str(), incoming.as_str()) {
            (Some(a), Some(b)) => str_eq(a, b, case_sensitive),
            _ => stored == incoming,
        },
        ColumnType::Uuid => match (as_uuid(stored), as_uuid(incoming)) {
            (Some(a), Some(b)) => a == b,
            _ => stored == incoming,
        },
        ColumnType::Timestamp => match (as_timestamp(stored), as_timestamp(incoming)) {
            (Some(a), Some(b)) => a == b,
            _ => stored == incoming,
        },
        ColumnType::Json => stored == incoming,
    }
}

fn str_eq(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str()?.trim().parse().ok())
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str()?.trim().parse().ok())
}

fn as_bool(v: &Value) -> Option<bool> {
    v.as_bool()
        .or_else(|| v.as_i64().map(|n| n != 0))
        .or_else(|| match v.as_str()?.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        })
}

fn as_uuid(v: &Value) -> Option<uuid::Uuid> {
    uuid::Uuid::parse_str(v.as_str()?).ok()
}

fn as_timestamp(v: &Value) -> Option<NaiveDateTime> {
    let s = v.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_vs_non_null_differs() {
        assert!(!values_equal(&Value::Null, &json!("x"), ColumnType::Text, true));
        assert!(!values_equal(&json!(1), &Value::Null, ColumnType::Integer, true));
        assert!(values_equal(&Value::Null, &Value::Null, ColumnType::Text, true));
    }

    #[test]
    fn text_case_sensitivity() {
        assert!(!values_equal(&json!("Red"), &json!("red"), ColumnType::Text, true));
        assert!(values_equal(&json!("Red"), &json!("red"), ColumnType::Text, false));
    }

    #[test]
    fn integer_coerces_string_representation() {
        assert!(values_equal(&json!("5"), &json!(5), ColumnType::Integer, true));
        assert!(!values_equal(&json!("5"), &json!(6), ColumnType::Integer, true));
    }

    #[test]
    fn boolean_coerces_stored_int() {
        assert!(values_equal(&json!(1), &json!(true), ColumnType::Boolean, true));
        assert!(!values_equal(&json!(0), &json!(true), ColumnType::Boolean, true));
    }

    #[test]
    fn uuid_ignores_hex_case() {
        let a = json!("6F9619FF-8B86-D011-B42D-00C04FC964FF");
        let b = json!("6f9619ff-8b86-d011-b42d-00c04fc964ff");
        assert!(values_equal(&a, &b, ColumnType::Uuid, true));
    }

    #[test]
    fn timestamp_compares_across_formats() {
        let a = json!("2024-01-02T03:04:05Z");
        let b = json!("2024-01-02 03:04:05");
        assert!(values_equal(&a, &b, ColumnType::Timestamp, true));
        assert!(!values_equal(&a, &json!("2024-01-02 03:04:06"), ColumnType::Timestamp, true));
    }
}
