//! Conversion of driver rows into JSON maps.
//!
//! Column types are first sorted into a [`TypeCategory`] by name, then a
//! database-specific decoder pulls the value out with the matching Rust type.
//! Anything that fails to decode becomes `null` rather than failing the
//! statement.

use crate::models::DatabaseType;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Json,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Checked before floats since "numeric" is ambiguous
    if lower.contains("decimal") || lower.contains("numeric") {
        return if db == DatabaseType::SQLite {
            TypeCategory::Float
        } else {
            TypeCategory::Decimal
        };
    }
    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }
    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }
    TypeCategory::Text
}

/// DECIMAL/NUMERIC read as its exact textual representation.
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

/// Binary data as UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue>;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        row_to_map(self, DatabaseType::MySQL, mysql::decode_column)
    }
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        row_to_map(self, DatabaseType::PostgreSQL, postgres::decode_column)
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        row_to_map(self, DatabaseType::SQLite, sqlite::decode_column)
    }
}

fn row_to_map<R>(
    row: &R,
    db: DatabaseType,
    decode: fn(&R, usize, &str, TypeCategory) -> JsonValue,
) -> serde_json::Map<String, JsonValue>
where
    R: Row,
{
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let type_name = col.type_info().name();
            let value = decode(row, idx, type_name, categorize_type(type_name, db));
            (col.name().to_string(), value)
        })
        .collect()
}

/// Decode a nullable column, treating decode failures as NULL.
fn get<'r, R, T>(row: &'r R, idx: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

fn number_from_f64(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn text_or_json(v: String, type_name: &str) -> JsonValue {
    if type_name.to_lowercase().contains("json") {
        if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
            return json;
        }
    }
    JsonValue::String(v)
}

mod mysql {
    use super::*;

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => get::<_, RawDecimal>(row, idx).map(|d| JsonValue::String(d.0)),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => get::<_, f64>(row, idx)
                .or_else(|| get::<_, f32>(row, idx).map(f64::from))
                .map(number_from_f64),
            TypeCategory::Binary => get::<_, Vec<u8>>(row, idx).map(|v| decode_binary_value(&v)),
            TypeCategory::Json => get::<_, JsonValue>(row, idx),
            TypeCategory::Text => get::<_, String>(row, idx).map(|v| text_or_json(v, type_name)),
        };
        value.unwrap_or(JsonValue::Null)
    }

    // MySQL integer columns may be signed or unsigned of any width
    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        get::<_, i64>(row, idx)
            .map(JsonValue::from)
            .or_else(|| get::<_, i32>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, i16>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, i8>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, u64>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, u32>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, u16>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, u8>(row, idx).map(JsonValue::from))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        _type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Decimal => get::<_, RawDecimal>(row, idx).map(|d| JsonValue::String(d.0)),
            TypeCategory::Integer => get::<_, i64>(row, idx)
                .map(JsonValue::from)
                .or_else(|| get::<_, i32>(row, idx).map(JsonValue::from))
                .or_else(|| get::<_, i16>(row, idx).map(JsonValue::from)),
            TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => get::<_, f64>(row, idx)
                .or_else(|| get::<_, f32>(row, idx).map(f64::from))
                .map(number_from_f64),
            TypeCategory::Binary => get::<_, Vec<u8>>(row, idx).map(|v| decode_binary_value(&v)),
            TypeCategory::Json => get::<_, JsonValue>(row, idx),
            TypeCategory::Text => get::<_, String>(row, idx).map(JsonValue::String),
        };
        value.unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        type_name: &str,
        category: TypeCategory,
    ) -> JsonValue {
        let value = match category {
            TypeCategory::Integer => get::<_, i64>(row, idx).map(JsonValue::from),
            TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float | TypeCategory::Decimal => {
                get::<_, f64>(row, idx).map(number_from_f64)
            }
            TypeCategory::Binary => get::<_, Vec<u8>>(row, idx).map(|v| decode_binary_value(&v)),
            // Untyped expression columns report NULL as their type name
            TypeCategory::Json | TypeCategory::Text => decode_dynamic(row, idx, type_name),
        };
        value.unwrap_or(JsonValue::Null)
    }

    fn decode_dynamic(row: &SqliteRow, idx: usize, type_name: &str) -> Option<JsonValue> {
        get::<_, String>(row, idx)
            .map(|v| text_or_json(v, type_name))
            .or_else(|| get::<_, i64>(row, idx).map(JsonValue::from))
            .or_else(|| get::<_, f64>(row, idx).map(number_from_f64))
            .or_else(|| get::<_, Vec<u8>>(row, idx).map(|v| decode_binary_value(&v)))
    }
}
