//! Bean to SQL parsers.
//!
//! Each parser handles exactly one [`OperationKind`] and builds its statement
//! from the bean's non-null fields, in declaration order.

use crate::bean::{Bean, TableNaming};
use crate::error::{DaoError, DaoResult};
use crate::models::{BeanProjection, OperationKind, Parameter, SqlValue, Statement};

pub trait BeanParser {
    const KIND: OperationKind;

    fn naming(&self) -> &dyn TableNaming;

    /// Statement for an already projected bean.
    fn build(&self, projection: &BeanProjection) -> DaoResult<Statement>;

    fn parse(&self, bean: &Bean, kind: OperationKind) -> DaoResult<Statement> {
        if kind != Self::KIND {
            return Err(DaoError::configuration(format!(
                "{} parser cannot build a {} statement for {}",
                Self::KIND,
                kind,
                bean.type_name()
            )));
        }
        let projection = bean.project(self.naming())?;
        self.build(&projection)
    }
}

/// Parse `bean` with the parser for `kind`.
pub fn parse_bean(bean: &Bean, kind: OperationKind, naming: &dyn TableNaming) -> DaoResult<Statement> {
    match kind {
        OperationKind::Insert => InsertParser::new(naming).parse(bean, kind),
        OperationKind::Update => UpdateParser::new(naming).parse(bean, kind),
        OperationKind::Delete => DeleteParser::new(naming).parse(bean, kind),
        OperationKind::Select => SelectParser::new(naming).parse(bean, kind),
    }
}

macro_rules! parser {
    ($name:ident) => {
        pub struct $name<'n> {
            naming: &'n dyn TableNaming,
        }

        impl<'n> $name<'n> {
            pub fn new(naming: &'n dyn TableNaming) -> Self {
                Self { naming }
            }
        }

        impl std::fmt::Debug for $name<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

parser!(InsertParser);
parser!(UpdateParser);
parser!(DeleteParser);
parser!(SelectParser);

impl BeanParser for InsertParser<'_> {
    const KIND: OperationKind = OperationKind::Insert;

    fn naming(&self) -> &dyn TableNaming {
        self.naming
    }

    fn build(&self, projection: &BeanProjection) -> DaoResult<Statement> {
        if projection.is_empty() {
            return Err(DaoError::configuration(format!(
                "Nothing to insert into {}: every field is null",
                projection.table
            )));
        }
        let columns: Vec<&str> = projection.columns().iter().map(|(c, _)| *c).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {}({}) VALUES ({})",
            projection.table,
            columns.join(", "),
            placeholders
        );
        Ok(Statement::new(sql, parameters(projection.columns())))
    }
}

impl BeanParser for UpdateParser<'_> {
    const KIND: OperationKind = OperationKind::Update;

    fn naming(&self) -> &dyn TableNaming {
        self.naming
    }

    fn build(&self, projection: &BeanProjection) -> DaoResult<Statement> {
        let key = projection.key_value().ok_or_else(|| {
            DaoError::configuration(format!(
                "Cannot update {} without a value for key '{}'",
                projection.table, projection.key
            ))
        })?;
        let fields: Vec<(&'static str, SqlValue)> = projection.non_key_columns().cloned().collect();
        if fields.is_empty() {
            return Err(DaoError::configuration(format!(
                "Nothing to update in {}: only the key is set",
                projection.table
            )));
        }

        let assignments: Vec<String> = fields.iter().map(|(c, _)| format!("{} = ?", c)).collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            projection.table,
            assignments.join(", "),
            projection.key
        );
        let mut params = parameters(&fields);
        params.push(Parameter::new(projection.key, key.clone()));
        Ok(Statement::new(sql, params))
    }
}

impl BeanParser for DeleteParser<'_> {
    const KIND: OperationKind = OperationKind::Delete;

    fn naming(&self) -> &dyn TableNaming {
        self.naming
    }

    fn build(&self, projection: &BeanProjection) -> DaoResult<Statement> {
        match filter(projection) {
            Some((clause, params)) => Ok(Statement::new(
                format!("DELETE FROM {} WHERE {}", projection.table, clause),
                params,
            )),
            None => Err(DaoError::configuration(format!(
                "Refusing to delete from {} without any condition",
                projection.table
            ))),
        }
    }
}

impl BeanParser for SelectParser<'_> {
    const KIND: OperationKind = OperationKind::Select;

    fn naming(&self) -> &dyn TableNaming {
        self.naming
    }

    fn build(&self, projection: &BeanProjection) -> DaoResult<Statement> {
        Ok(match filter(projection) {
            Some((clause, params)) => Statement::new(
                format!("SELECT * FROM {} WHERE {}", projection.table, clause),
                params,
            ),
            None => Statement::raw(format!("SELECT * FROM {}", projection.table)),
        })
    }
}

/// Key condition when the key is set, otherwise every non-null field AND-ed.
fn filter(projection: &BeanProjection) -> Option<(String, Vec<Parameter>)> {
    if let Some(key) = projection.key_value() {
        return Some((
            format!("{} = ?", projection.key),
            vec![Parameter::new(projection.key, key.clone())],
        ));
    }
    if projection.is_empty() {
        return None;
    }
    let clause: Vec<String> = projection
        .columns()
        .iter()
        .map(|(c, _)| format!("{} = ?", c))
        .collect();
    Some((clause.join(" AND "), parameters(projection.columns())))
}

fn parameters(columns: &[(&'static str, SqlValue)]) -> Vec<Parameter> {
    columns
        .iter()
        .map(|(column, value)| Parameter::new(*column, value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{Entity, SnakeCaseNaming};
    use crate::models::SqlType;
    use serde::Deserialize;

    #[derive(Debug, Default, Clone, Deserialize)]
    struct Movie {
        id: Option<i64>,
        name: Option<String>,
        director: Option<String>,
        year: Option<i32>,
    }
    crate::entity!(Movie, table = "movies", key = id, fields = [id, name, director, year]);

    fn movie(id: Option<i64>, name: Option<&str>, year: Option<i32>) -> Bean {
        Movie {
            id,
            name: name.map(String::from),
            director: None,
            year,
        }
        .to_bean()
    }

    #[test]
    fn test_insert_skips_null_fields() {
        let stmt = InsertParser::new(&SnakeCaseNaming)
            .parse(&movie(None, Some("Alien"), Some(1979)), OperationKind::Insert)
            .unwrap();
        assert_eq!(stmt.sql(), "INSERT INTO movies(name, year) VALUES (?, ?)");
        assert_eq!(stmt.parameters().len(), 2);
        assert_eq!(stmt.parameters()[0].name, "name");
        assert_eq!(stmt.parameters()[0].sql_type, SqlType::Text);
        assert_eq!(stmt.parameters()[1].value, SqlValue::Int(1979));
    }

    #[test]
    fn test_insert_rejects_wrong_kind_and_empty_bean() {
        let err = InsertParser::new(&SnakeCaseNaming)
            .parse(&movie(Some(1), None, None), OperationKind::Update)
            .unwrap_err();
        assert!(matches!(err, DaoError::Configuration { .. }));

        let err = InsertParser::new(&SnakeCaseNaming)
            .parse(&movie(None, None, None), OperationKind::Insert)
            .unwrap_err();
        assert!(matches!(err, DaoError::Configuration { .. }));
    }

    #[test]
    fn test_update_sets_non_key_fields() {
        let stmt = parse_bean(
            &movie(Some(4), Some("Heat"), None),
            OperationKind::Update,
            &SnakeCaseNaming,
        )
        .unwrap();
        assert_eq!(stmt.sql(), "UPDATE movies SET name = ? WHERE id = ?");
        assert_eq!(stmt.values(), vec![SqlValue::from("Heat"), SqlValue::Int(4)]);
    }

    #[test]
    fn test_update_requires_key_and_fields() {
        let naming = SnakeCaseNaming;
        assert!(parse_bean(&movie(None, Some("Heat"), None), OperationKind::Update, &naming).is_err());
        assert!(parse_bean(&movie(Some(4), None, None), OperationKind::Update, &naming).is_err());
    }

    #[test]
    fn test_delete_by_key_or_fields() {
        let naming = SnakeCaseNaming;
        let by_key =
            parse_bean(&movie(Some(9), Some("x"), None), OperationKind::Delete, &naming).unwrap();
        assert_eq!(by_key.sql(), "DELETE FROM movies WHERE id = ?");
        assert_eq!(by_key.values(), vec![SqlValue::Int(9)]);

        let by_fields =
            parse_bean(&movie(None, Some("x"), Some(2000)), OperationKind::Delete, &naming)
                .unwrap();
        assert_eq!(
            by_fields.sql(),
            "DELETE FROM movies WHERE name = ? AND year = ?"
        );

        let err = parse_bean(&movie(None, None, None), OperationKind::Delete, &naming).unwrap_err();
        assert!(matches!(err, DaoError::Configuration { .. }));
    }

    #[test]
    fn test_select_forms() {
        let naming = SnakeCaseNaming;
        let all = parse_bean(&movie(None, None, None), OperationKind::Select, &naming).unwrap();
        assert_eq!(all.sql(), "SELECT * FROM movies");
        assert!(!all.has_parameters());

        let by_key = parse_bean(&movie(Some(2), None, None), OperationKind::Select, &naming).unwrap();
        assert_eq!(by_key.sql(), "SELECT * FROM movies WHERE id = ?");

        let by_name =
            parse_bean(&movie(None, Some("Heat"), None), OperationKind::Select, &naming).unwrap();
        assert_eq!(by_name.sql(), "SELECT * FROM movies WHERE name = ?");
    }
}
