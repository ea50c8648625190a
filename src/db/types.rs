//! Database-agnostic type mappings.
//!
//! This module decodes driver rows into [`Record`]s of [`SqlValue`]s.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction

use crate::error::{DaoError, DaoResult};
use crate::models::{DatabaseType, Record, SqlValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};
use std::sync::Arc;

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
    Text,
    Binary,
    Json,
    Uuid,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "interval" {
        return TypeCategory::Unknown;
    }

    if lower.contains("date") || lower.contains("time") {
        return TypeCategory::Temporal;
    }

    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") {
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

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "string" {
        return TypeCategory::Text;
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

// =============================================================================
// Row Decoding Trait
// =============================================================================

/// Trait for converting driver rows into driver-neutral values.
pub trait RowDecode {
    fn column_names(&self) -> Vec<String>;

    /// Column values in order. A value the driver cannot decode is a
    /// [`DaoError::Mapping`], never a silent NULL.
    fn to_values(&self) -> DaoResult<Vec<SqlValue>>;

    /// Build a record, reusing `columns` when the caller already has them.
    fn to_record(&self, columns: &mut Option<Arc<[String]>>) -> DaoResult<Record> {
        let values = self.to_values()?;
        let shared = columns
            .get_or_insert_with(|| self.column_names().into())
            .clone();
        Ok(Record::new(shared, values))
    }
}

impl RowDecode for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> DaoResult<Vec<SqlValue>> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                mysql::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowDecode for PgRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> DaoResult<Vec<SqlValue>> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                postgres::decode_column(self, idx, category)
            })
            .collect()
    }
}

impl RowDecode for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    fn to_values(&self) -> DaoResult<Vec<SqlValue>> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                sqlite::decode_column(self, idx, category)
            })
            .collect()
    }
}

/// Nullable column `idx` as `T`, or a mapping error naming the column.
fn column<'r, R, T>(row: &'r R, idx: usize) -> DaoResult<Option<T>>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).map_err(|e| {
        let name = row.columns().get(idx).map(|c| c.name()).unwrap_or("?");
        DaoError::mapping(format!("Cannot decode column '{}': {}", name, e))
    })
}

fn nullable<T: Into<SqlValue>>(value: Option<T>) -> SqlValue {
    value.map(Into::into).unwrap_or(SqlValue::Null)
}

fn naive_datetime_text(v: NaiveDateTime) -> SqlValue {
    SqlValue::Text(v.format("%Y-%m-%d %H:%M:%S%.f").to_string())
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

mod mysql {
    use super::*;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> DaoResult<SqlValue> {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => column::<_, bool>(row, idx).map(nullable),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => column::<_, Vec<u8>>(row, idx).map(nullable),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => column::<_, String>(row, idx).map(nullable),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> DaoResult<SqlValue> {
        column::<_, RawDecimal>(row, idx).map(|v| nullable(v.map(|d| d.0)))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(nullable(v));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(nullable(v));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(nullable(v.map(i32::from)));
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(nullable(v.map(i32::from)));
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(nullable(v));
        }
        if let Ok(v) = row.try_get::<Option<u16>, _>(idx) {
            return Ok(nullable(v.map(u32::from)));
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return Ok(nullable(v.map(u32::from)));
        }
        // Values above i64::MAX keep their exact digits
        column::<_, u64>(row, idx).map(|v| match v {
            Some(v) => i64::try_from(v)
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Text(v.to_string())),
            None => SqlValue::Null,
        })
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(nullable(v));
        }
        column::<_, f32>(row, idx).map(nullable)
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> DaoResult<SqlValue> {
        column::<_, serde_json::Value>(row, idx).map(|v| nullable(v.map(|json| json.to_string())))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(v.map(naive_datetime_text).unwrap_or(SqlValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(nullable(v.map(|d| d.to_string())));
        }
        column::<_, NaiveTime>(row, idx).map(|v| nullable(v.map(|t| t.to_string())))
    }
}

mod postgres {
    use super::*;

    pub fn decode_column(row: &PgRow, idx: usize, category: TypeCategory) -> DaoResult<SqlValue> {
        match category {
            TypeCategory::Decimal => {
                column::<_, RawDecimal>(row, idx).map(|v| nullable(v.map(|d| d.0)))
            }
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => column::<_, bool>(row, idx).map(nullable),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => column::<_, Vec<u8>>(row, idx).map(nullable),
            TypeCategory::Json => {
                column::<_, serde_json::Value>(row, idx).map(|v| nullable(v.map(|json| json.to_string())))
            }
            TypeCategory::Uuid => {
                column::<_, uuid::Uuid>(row, idx).map(|v| nullable(v.map(|id| id.to_string())))
            }
            TypeCategory::Temporal => decode_temporal(row, idx),
            _ => column::<_, String>(row, idx).map(nullable),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(nullable(v));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(nullable(v));
        }
        column::<_, i16>(row, idx).map(|v| nullable(v.map(i32::from)))
    }

    fn decode_float(row: &PgRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(nullable(v));
        }
        column::<_, f32>(row, idx).map(nullable)
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Ok(nullable(v.map(|ts| ts.to_rfc3339())));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(v.map(naive_datetime_text).unwrap_or(SqlValue::Null));
        }
        if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(nullable(v.map(|d| d.to_string())));
        }
        column::<_, NaiveTime>(row, idx).map(|v| nullable(v.map(|t| t.to_string())))
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> DaoResult<SqlValue> {
        match category {
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => column::<_, bool>(row, idx).map(nullable),
            TypeCategory::Float | TypeCategory::Decimal => decode_float(row, idx),
            TypeCategory::Binary => column::<_, Vec<u8>>(row, idx).map(nullable),
            _ => decode_dynamic(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> DaoResult<SqlValue> {
        match row.try_get::<Option<i64>, _>(idx) {
            Ok(v) => Ok(nullable(v)),
            Err(_) => decode_dynamic(row, idx),
        }
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> DaoResult<SqlValue> {
        match row.try_get::<Option<f64>, _>(idx) {
            Ok(v) => Ok(nullable(v)),
            Err(_) => decode_dynamic(row, idx),
        }
    }

    /// SQLite stores values by their runtime class, whatever the declared type says.
    fn decode_dynamic(row: &SqliteRow, idx: usize) -> DaoResult<SqlValue> {
        if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            return Ok(nullable(v));
        }
        if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            return Ok(nullable(v));
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            return Ok(nullable(v));
        }
        column::<_, Vec<u8>>(row, idx).map(nullable)
    }
}
