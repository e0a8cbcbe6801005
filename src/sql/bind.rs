//! Convert serde_json::Value to values that sqlx can bind against SQLite.

use crate::entity::ColumnType;
use crate::error::MapError;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::sqlite::Sqlite;
use sqlx::Database;

/// A value that can be bound to a SQLite statement. Converts from serde_json::Value.
#[derive(Clone, Debug)]
pub enum BindValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    Json(Value),
}

impl BindValue {
    /// Best-effort conversion for caller-supplied query parameters.
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::Integer(i)
                } else {
                    BindValue::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => BindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }

    /// Conversion for a known column: validates the value against the declared
    /// type so a shape mismatch surfaces as a conversion error, not a bad write.
    pub fn for_column(v: &Value, ty: ColumnType, column: &str) -> Result<Self, MapError> {
        let mismatch = || MapError::Conversion {
            column: column.to_string(),
            ty: ty.name(),
            value: v.to_string(),
        };
        if v.is_null() {
            return Ok(BindValue::Null);
        }
        Ok(match ty {
            ColumnType::Integer => BindValue::Integer(
                v.as_i64()
                    .or_else(|| v.as_str()?.trim().parse().ok())
                    .ok_or_else(mismatch)?,
            ),
            ColumnType::Real => BindValue::Real(
                v.as_f64()
                    .or_else(|| v.as_str()?.trim().parse().ok())
                    .ok_or_else(mismatch)?,
            ),
            ColumnType::Boolean => BindValue::Bool(v.as_bool().ok_or_else(mismatch)?),
            ColumnType::Text => BindValue::Text(v.as_str().ok_or_else(mismatch)?.to_string()),
            ColumnType::Uuid => {
                let s = v.as_str().ok_or_else(mismatch)?;
                uuid::Uuid::parse_str(s).map_err(|_| mismatch())?;
                BindValue::Text(s.to_string())
            }
            ColumnType::Timestamp => {
                let s = v.as_str().ok_or_else(mismatch)?;
                if chrono::DateTime::parse_from_rfc3339(s).is_err()
                    && chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_err()
                    && chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_err()
                {
                    return Err(mismatch());
                }
                BindValue::Text(s.to_string())
            }
            ColumnType::Json => BindValue::Json(v.clone()),
        })
    }
}

impl<'q> Encode<'q, Sqlite> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<i64> as Encode<Sqlite>>::encode_by_ref(&None, buf)?,
            BindValue::Integer(n) => <i64 as Encode<Sqlite>>::encode_by_ref(n, buf)?,
            BindValue::Real(n) => <f64 as Encode<Sqlite>>::encode_by_ref(n, buf)?,
            BindValue::Bool(b) => <bool as Encode<Sqlite>>::encode_by_ref(b, buf)?,
            BindValue::Text(s) => <String as Encode<Sqlite>>::encode_by_ref(s, buf)?,
            BindValue::Json(v) => <Value as Encode<Sqlite>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Sqlite> for BindValue {
    fn type_info() -> <Sqlite as Database>::TypeInfo {
        <str as sqlx::Type<Sqlite>>::type_info()
    }

    fn compatible(_ty: &<Sqlite as Database>::TypeInfo) -> bool {
        true
    }
}
