//! Row decoding for the relational engines.
//!
//! Decoding uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Engine-specific decoders handle the actual value extraction
//!
//! Values that match no category fall back to their text form. Statements
//! issued without bind parameters come back in the text protocol on both
//! engines, so that fallback covers intervals, geometry, enums and the like.

use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Binary,
    Json,
    Unknown,
}

/// Classify a driver type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric first, "numeric" would otherwise not match anything else
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    if lower.starts_with("timestamp")
        || lower.starts_with("datetime")
        || lower == "date"
        || lower == "time"
    {
        return TypeCategory::Temporal;
    }

    if lower == "interval" || lower == "point" {
        return TypeCategory::Unknown;
    }

    if lower.contains("int") || lower.contains("serial") || lower == "year" {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" || lower == "bit" {
        return TypeCategory::Binary;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL/NUMERIC values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary columns are returned base64-encoded.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Map<String, JsonValue>;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let value = mysql::decode_column(self, idx, type_name, categorize_type(type_name));
                (col.name().to_string(), value)
            })
            .collect()
    }
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> Map<String, JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let value = postgres::decode_column(self, idx, categorize_type(type_name));
                (col.name().to_string(), value)
            })
            .collect()
    }
}

// =============================================================================
// Engine-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Unknown => None,
        };
        value.unwrap_or_else(|| decode_text(row, idx, type_name))
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(v) => Some(v.map(|d| JsonValue::String(d.0)).unwrap_or(JsonValue::Null)),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to decode DECIMAL, falling back to text");
                None
            }
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return Some(JsonValue::Null);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<u64>, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<i8>, _>(idx) {
            return Some(JsonValue::Number(v.into()));
        }
        None
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .map(|v| v.map(JsonValue::Bool).unwrap_or(JsonValue::Null))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Some(v.map(float_value).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return Some(v.map(|f| float_value(f as f64)).unwrap_or(JsonValue::Null));
        }
        None
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_rfc3339())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_string())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_string())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_string())).unwrap_or(JsonValue::Null));
        }
        None
    }

    fn decode_binary_col(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .map(|v| v.map(|b| decode_binary_value(&b)).unwrap_or(JsonValue::Null))
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .map(|v| v.unwrap_or(JsonValue::Null))
    }

    fn decode_text(row: &MySqlRow, idx: usize, type_name: &str) -> JsonValue {
        let text = row
            .try_get::<Option<String>, _>(idx)
            .or_else(|_| row.try_get_unchecked::<Option<String>, _>(idx));
        match text {
            Ok(Some(v)) => {
                if type_name.to_lowercase().contains("json") {
                    if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                        return json;
                    }
                }
                JsonValue::String(v)
            }
            Ok(None) => JsonValue::Null,
            // Non-UTF-8 text columns (latin1 blobs reported as text)
            Err(_) => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(idx)
                .ok()
                .flatten()
                .map(|b| decode_binary_value(&b))
                .unwrap_or(JsonValue::Null),
        }
    }
}

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Unknown => None,
        };
        value.unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_decimal(row: &PgRow, idx: usize) -> Option<JsonValue> {
        match row.try_get::<Option<RawDecimal>, _>(idx) {
            Ok(v) => Some(v.map(|d| JsonValue::String(d.0)).unwrap_or(JsonValue::Null)),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to decode NUMERIC, falling back to text");
                None
            }
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Some(v.map(|n| JsonValue::Number(n.into())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Some(v.map(|n| JsonValue::Number(n.into())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Some(v.map(|n| JsonValue::Number(n.into())).unwrap_or(JsonValue::Null));
        }
        None
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .map(|v| v.map(JsonValue::Bool).unwrap_or(JsonValue::Null))
    }

    fn decode_float(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Some(v.map(float_value).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
            return Some(v.map(|f| float_value(f as f64)).unwrap_or(JsonValue::Null));
        }
        None
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> Option<JsonValue> {
        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_rfc3339())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_string())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_string())).unwrap_or(JsonValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Some(v.map(|t| JsonValue::String(t.to_string())).unwrap_or(JsonValue::Null));
        }
        None
    }

    fn decode_binary_col(row: &PgRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .map(|v| v.map(|b| decode_binary_value(&b)).unwrap_or(JsonValue::Null))
    }

    fn decode_json(row: &PgRow, idx: usize) -> Option<JsonValue> {
        row.try_get::<Option<JsonValue>, _>(idx)
            .ok()
            .map(|v| v.unwrap_or(JsonValue::Null))
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<String>, _>(idx)
            .or_else(|_| row.try_get_unchecked::<Option<String>, _>(idx))
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}
