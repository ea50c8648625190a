//! Beans: plain structs mapped to table rows.
//!
//! A bean type describes itself with an [`EntityDescriptor`] (type name,
//! optional table, key field, fields in declaration order) and hands out its
//! field values in the same order. The [`entity!`](crate::entity) macro writes
//! both for a struct whose fields are all convertible into [`SqlValue`].
//!
//! ```ignore
//! #[derive(Debug, Default, Clone, serde::Deserialize)]
//! struct Movie {
//!     id: Option<i64>,
//!     name: Option<String>,
//!     year: Option<i32>,
//! }
//! dao_binder::entity!(Movie, table = "movies", key = id, fields = [id, name, year]);
//! ```

pub mod parser;

use crate::error::{DaoError, DaoResult};
use crate::models::{BeanProjection, Record, SqlValue};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

pub use parser::{BeanParser, DeleteParser, InsertParser, SelectParser, UpdateParser, parse_bean};

/// Static description of a bean type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    /// Explicit table name; the naming convention applies when absent.
    pub table: Option<&'static str>,
    pub key: &'static str,
    pub fields: Vec<&'static str>,
}

impl EntityDescriptor {
    pub fn new(type_name: &'static str, key: &'static str, fields: Vec<&'static str>) -> Self {
        Self {
            type_name,
            table: None,
            key,
            fields,
        }
    }

    pub fn with_table(mut self, table: &'static str) -> Self {
        self.table = Some(table);
        self
    }

    /// Field matching `column`, ignoring ASCII case.
    pub fn field_for_column(&self, column: &str) -> Option<&'static str> {
        self.fields
            .iter()
            .copied()
            .find(|field| field.eq_ignore_ascii_case(column))
    }

    /// Table name for this type under `naming`.
    pub fn table_name(&self, naming: &dyn TableNaming) -> DaoResult<String> {
        let table = match self.table {
            Some(table) => table.to_string(),
            None => naming.table_name(self.type_name),
        };
        if !is_identifier(&table) {
            return Err(DaoError::configuration(format!(
                "Invalid table name '{}' for {}",
                table, self.type_name
            )));
        }
        Ok(table)
    }
}

/// A struct that maps to one table row.
pub trait Entity {
    fn descriptor() -> &'static EntityDescriptor
    where
        Self: Sized;

    /// Field values in descriptor order; `SqlValue::Null` for unset fields.
    fn values(&self) -> Vec<SqlValue>;

    /// Field values of a default-constructed bean, in descriptor order.
    fn defaults() -> Vec<SqlValue>
    where
        Self: Sized;

    fn to_bean(&self) -> Bean
    where
        Self: Sized,
    {
        Bean {
            descriptor: Self::descriptor(),
            values: self.values(),
        }
    }
}

/// Type-erased bean: descriptor plus field values.
#[derive(Debug, Clone, PartialEq)]
pub struct Bean {
    descriptor: &'static EntityDescriptor,
    values: Vec<SqlValue>,
}

impl Bean {
    pub fn of<E: Entity>(entity: &E) -> Self {
        entity.to_bean()
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.descriptor
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn type_name(&self) -> &'static str {
        self.descriptor.type_name
    }

    /// Non-null fields of this bean against its table.
    pub fn project(&self, naming: &dyn TableNaming) -> DaoResult<BeanProjection> {
        let descriptor = self.descriptor;
        if descriptor.fields.len() != self.values.len() {
            return Err(DaoError::configuration(format!(
                "{} declares {} fields but produced {} values",
                descriptor.type_name,
                descriptor.fields.len(),
                self.values.len()
            )));
        }
        let mut projection = BeanProjection::new(descriptor.table_name(naming)?, descriptor.key);
        for (field, value) in descriptor.fields.iter().copied().zip(&self.values) {
            projection.push(field, value.clone());
        }
        Ok(projection)
    }
}

/// Maps a bean type name to a table name.
pub trait TableNaming: Send + Sync {
    fn table_name(&self, type_name: &str) -> String;
}

/// `MovieInfo` -> `movie_info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCaseNaming;

impl TableNaming for SnakeCaseNaming {
    fn table_name(&self, type_name: &str) -> String {
        let name = type_name.rsplit("::").next().unwrap_or(type_name);
        let chars: Vec<char> = name.chars().collect();
        let mut out = String::with_capacity(name.len() + 4);
        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() {
                let prev = i.checked_sub(1).map(|p| chars[p]);
                let next = chars.get(i + 1).copied();
                let boundary = match prev {
                    Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                    Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                    _ => false,
                };
                if boundary && !out.ends_with('_') {
                    out.push('_');
                }
                out.extend(c.to_lowercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl<F> TableNaming for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn table_name(&self, type_name: &str) -> String {
        self(type_name)
    }
}

/// Plain or schema-qualified SQL identifier.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Map a record onto a bean.
///
/// Columns match fields ignoring case; unmatched columns are ignored and
/// unmatched fields keep the value of `T::default()`.
pub fn from_record<T>(record: &Record) -> DaoResult<T>
where
    T: Entity + DeserializeOwned,
{
    let descriptor = T::descriptor();
    let mut object: Map<String, JsonValue> = descriptor
        .fields
        .iter()
        .zip(T::defaults())
        .map(|(field, value)| (field.to_string(), value.to_json()))
        .collect();
    for (column, value) in record.iter() {
        if let Some(field) = descriptor.field_for_column(column) {
            object.insert(field.to_string(), value.to_json());
        }
    }
    serde_json::from_value(JsonValue::Object(object)).map_err(|e| {
        DaoError::mapping(format!(
            "Cannot map row onto {}: {}",
            descriptor.type_name, e
        ))
    })
}

/// Implement [`Entity`] for a struct.
///
/// ```ignore
/// entity!(Movie, key = id, fields = [id, name]);
/// entity!(Movie, table = "movies", key = id, fields = [id, name]);
/// ```
#[macro_export]
macro_rules! entity {
    ($ty:ident, table = $table:literal, key = $key:ident, fields = [$($field:ident),+ $(,)?]) => {
        $crate::entity!(@impl $ty, Some($table), $key, [$($field),+]);
    };
    ($ty:ident, key = $key:ident, fields = [$($field:ident),+ $(,)?]) => {
        $crate::entity!(@impl $ty, None, $key, [$($field),+]);
    };
    (@impl $ty:ident, $table:expr, $key:ident, [$($field:ident),+]) => {
        impl $crate::bean::Entity for $ty {
            fn descriptor() -> &'static $crate::bean::EntityDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<$crate::bean::EntityDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    let table: Option<&'static str> = $table;
                    let descriptor = $crate::bean::EntityDescriptor::new(
                        stringify!($ty),
                        stringify!($key),
                        vec![$(stringify!($field)),+],
                    );
                    match table {
                        Some(table) => descriptor.with_table(table),
                        None => descriptor,
                    }
                })
            }

            fn values(&self) -> Vec<$crate::models::SqlValue> {
                vec![$($crate::models::SqlValue::from(self.$field.clone())),+]
            }

            fn defaults() -> Vec<$crate::models::SqlValue> {
                let seed = <$ty as ::std::default::Default>::default();
                $crate::bean::Entity::values(&seed)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone, PartialEq, Deserialize)]
    struct MovieInfo {
        id: Option<i64>,
        name: Option<String>,
        rating: Option<f64>,
    }
    crate::entity!(MovieInfo, key = id, fields = [id, name, rating]);

    #[derive(Debug, Default, Clone, Deserialize)]
    struct Director {
        id: Option<i64>,
        name: Option<String>,
    }
    crate::entity!(Director, table = "people.directors", key = id, fields = [id, name]);

    #[test]
    fn test_snake_case_naming() {
        let naming = SnakeCaseNaming;
        assert_eq!(naming.table_name("MovieInfo"), "movie_info");
        assert_eq!(naming.table_name("Movie"), "movie");
        assert_eq!(naming.table_name("HTTPRequestLog"), "http_request_log");
        assert_eq!(naming.table_name("crate::models::Movie2Genre"), "movie2_genre");
    }

    #[test]
    fn test_descriptor_from_macro() {
        let descriptor = MovieInfo::descriptor();
        assert_eq!(descriptor.type_name, "MovieInfo");
        assert_eq!(descriptor.key, "id");
        assert_eq!(descriptor.fields, vec!["id", "name", "rating"]);
        assert_eq!(descriptor.table_name(&SnakeCaseNaming).unwrap(), "movie_info");
        assert!(std::ptr::eq(descriptor, MovieInfo::descriptor()));

        assert_eq!(
            Director::descriptor().table_name(&SnakeCaseNaming).unwrap(),
            "people.directors"
        );
    }

    #[test]
    fn test_invalid_table_convention() {
        let empty = |_: &str| String::new();
        let err = MovieInfo::descriptor().table_name(&empty).unwrap_err();
        assert!(matches!(err, DaoError::Configuration { .. }));

        let spaced = |_: &str| "movie info".to_string();
        assert!(MovieInfo::descriptor().table_name(&spaced).is_err());
    }

    #[test]
    fn test_projection_skips_nulls() {
        let movie = MovieInfo {
            id: None,
            name: Some("Alien".into()),
            rating: None,
        };
        let projection = movie.to_bean().project(&SnakeCaseNaming).unwrap();
        assert_eq!(projection.table, "movie_info");
        assert_eq!(projection.columns(), &[("name", SqlValue::from("Alien"))]);
        assert_eq!(projection.key_value(), None);
    }

    #[test]
    fn test_from_record_matches_case_insensitively() {
        let columns: Arc<[String]> = vec!["ID".to_string(), "Name".to_string(), "extra".to_string()].into();
        let record = Record::new(
            columns,
            vec![SqlValue::Int(3), SqlValue::from("Heat"), SqlValue::Int(9)],
        );
        let movie: MovieInfo = from_record(&record).unwrap();
        assert_eq!(
            movie,
            MovieInfo {
                id: Some(3),
                name: Some("Heat".into()),
                rating: None,
            }
        );
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Rating {
        id: i64,
        title: String,
        stars: i32,
        watched: bool,
    }
    crate::entity!(Rating, key = id, fields = [id, title, stars, watched]);

    #[test]
    fn test_from_record_keeps_defaults_for_plain_fields() {
        let columns: Arc<[String]> = vec!["title".to_string(), "id".to_string()].into();
        let record = Record::new(columns, vec![SqlValue::from("Heat"), SqlValue::Int(3)]);
        let rating: Rating = from_record(&record).unwrap();
        assert_eq!(
            rating,
            Rating {
                id: 3,
                title: "Heat".into(),
                stars: 0,
                watched: false,
            }
        );

        let empty = Record::new(Vec::<String>::new().into(), Vec::new());
        assert_eq!(from_record::<Rating>(&empty).unwrap(), Rating::default());
    }

    #[test]
    fn test_from_record_mapping_error() {
        let columns: Arc<[String]> = vec!["id".to_string()].into();
        let record = Record::new(columns, vec![SqlValue::from("not a number")]);
        let err = from_record::<MovieInfo>(&record).unwrap_err();
        assert!(matches!(err, DaoError::Mapping { .. }));
    }
}
