//! Operation kind detection for literal SQL.
//!
//! Uses [sqlparser](https://docs.rs/sqlparser/) with the dialect of the target
//! database. SQL that the parser does not understand (vendor syntax, driver
//! placeholders) falls back to its leading keyword.

use crate::error::{DaoError, DaoResult};
use crate::models::{DatabaseType, OperationKind};
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;
use tracing::debug;

/// Get the appropriate SQL dialect for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Kind of operation `sql` performs.
///
/// Row-returning statements are [`OperationKind::Select`]. Writes other than
/// INSERT and DELETE (DDL, MERGE, ...) report [`OperationKind::Update`] since
/// they run the same way: executed for an affected-row count.
pub fn classify_sql(sql: &str, db_type: DatabaseType) -> DaoResult<OperationKind> {
    if sql.trim().trim_end_matches(';').trim().is_empty() {
        return Err(DaoError::configuration("Empty SQL statement"));
    }

    let dialect = get_dialect(db_type);
    match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) => match statements.first() {
            Some(stmt) => Ok(classify_statement(stmt)),
            None => Err(DaoError::configuration("Empty SQL statement")),
        },
        Err(e) => {
            debug!(error = %e, "SQL not parsed, classifying by leading keyword");
            classify_keyword(sql)
        }
    }
}

/// Classify a parsed statement.
fn classify_statement(stmt: &Statement) -> OperationKind {
    match stmt {
        Statement::Query(_) => OperationKind::Select,
        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowSchemas { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ExplainTable { .. }
        | Statement::Pragma { .. } => OperationKind::Select,

        // EXPLAIN returns rows whatever it explains
        Statement::Explain { .. } => OperationKind::Select,

        Statement::Insert(_) => OperationKind::Insert,
        Statement::Delete(_) => OperationKind::Delete,
        Statement::Update { .. } => OperationKind::Update,

        _ => OperationKind::Update,
    }
}

fn classify_keyword(sql: &str) -> DaoResult<OperationKind> {
    let keyword = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();

    match keyword.as_str() {
        "SELECT" | "WITH" | "SHOW" | "EXPLAIN" | "PRAGMA" | "VALUES" | "DESCRIBE" | "DESC" => {
            Ok(OperationKind::Select)
        }
        "INSERT" | "REPLACE" => Ok(OperationKind::Insert),
        "DELETE" => Ok(OperationKind::Delete),
        "" => Err(DaoError::configuration(format!(
            "Cannot classify SQL statement: {}",
            sql
        ))),
        _ => Ok(OperationKind::Update),
    }
}
