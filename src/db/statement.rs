//! Statement builders.
//!
//! A builder turns a [`Statement`] into a [`WrappedStatement`] bound to one
//! checked-out connection. Plain statements go through the driver's simple
//! protocol; parameterized ones are prepared on the connection at build time and
//! have their values bound at execution.

use crate::db::pool::ConnRef;
use crate::db::types::RowDecode;
use crate::error::{DaoError, DaoResult};
use crate::models::{ConcurMode, DatabaseType, FetchDirection, Record, SqlValue, Statement};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// Produces a connection-bound command from SQL text.
#[async_trait]
pub trait StatementBuilder: Send + Sync {
    /// SQL text with `?` placeholders.
    fn sql(&self) -> &str;

    fn concur_mode(&self) -> ConcurMode;

    /// Build the command on `conn`. The result cannot outlive the borrow.
    async fn build<'c>(&self, conn: ConnRef<'c>) -> DaoResult<WrappedStatement<'c>>;
}

/// Builder for literal SQL without bound parameters.
#[derive(Debug, Clone)]
pub struct SimpleStatementBuilder {
    sql: String,
    concur_mode: ConcurMode,
}

impl SimpleStatementBuilder {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            concur_mode: ConcurMode::default(),
        }
    }

    pub fn with_concur_mode(mut self, concur_mode: ConcurMode) -> Self {
        self.concur_mode = concur_mode;
        self
    }
}

#[async_trait]
impl StatementBuilder for SimpleStatementBuilder {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn concur_mode(&self) -> ConcurMode {
        self.concur_mode
    }

    async fn build<'c>(&self, conn: ConnRef<'c>) -> DaoResult<WrappedStatement<'c>> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders > 0 {
            return Err(DaoError::build(
                &self.sql,
                format!("statement has {placeholders} placeholders but no parameters"),
            ));
        }
        Ok(WrappedStatement {
            conn,
            sql: self.sql.clone(),
            values: Vec::new(),
            prepared: false,
            concur_mode: self.concur_mode,
            fetch_direction: FetchDirection::Forward,
        })
    }
}

/// Builder for parameterized SQL.
#[derive(Debug, Clone)]
pub struct PreparedStatementBuilder {
    sql: String,
    values: Vec<SqlValue>,
    concur_mode: ConcurMode,
}

impl PreparedStatementBuilder {
    pub fn new(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
            concur_mode: ConcurMode::default(),
        }
    }

    pub fn with_concur_mode(mut self, concur_mode: ConcurMode) -> Self {
        self.concur_mode = concur_mode;
        self
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

#[async_trait]
impl StatementBuilder for PreparedStatementBuilder {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn concur_mode(&self) -> ConcurMode {
        self.concur_mode
    }

    async fn build<'c>(&self, mut conn: ConnRef<'c>) -> DaoResult<WrappedStatement<'c>> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders != self.values.len() {
            return Err(DaoError::build(
                &self.sql,
                format!(
                    "statement has {} placeholders but {} parameters",
                    placeholders,
                    self.values.len()
                ),
            ));
        }

        let sql = native_placeholders(&self.sql, conn.db_type());
        prepare(&mut conn, &sql).await?;

        Ok(WrappedStatement {
            conn,
            sql,
            values: self.values.clone(),
            prepared: true,
            concur_mode: self.concur_mode,
            fetch_direction: FetchDirection::Forward,
        })
    }
}

async fn prepare(conn: &mut ConnRef<'_>, sql: &str) -> DaoResult<()> {
    let result = crate::with_conn!(conn, |c, _bind| {
        sqlx::Executor::prepare(&mut **c, sql).await.map(|_| ())
    });
    result.map_err(|e| DaoError::build(sql, e.to_string()))
}

/// Plain builder for statements without parameters, prepared otherwise.
pub fn statement_builder(statement: &Statement, concur_mode: ConcurMode) -> Box<dyn StatementBuilder> {
    if statement.has_parameters() {
        Box::new(
            PreparedStatementBuilder::new(statement.sql(), statement.values())
                .with_concur_mode(concur_mode),
        )
    } else {
        Box::new(SimpleStatementBuilder::new(statement.sql()).with_concur_mode(concur_mode))
    }
}

/// A built command bound to a connection borrow.
#[derive(Debug)]
pub struct WrappedStatement<'c> {
    conn: ConnRef<'c>,
    /// SQL in the driver's placeholder syntax.
    sql: String,
    values: Vec<SqlValue>,
    prepared: bool,
    concur_mode: ConcurMode,
    fetch_direction: FetchDirection,
}

impl<'c> WrappedStatement<'c> {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn concur_mode(&self) -> ConcurMode {
        self.concur_mode
    }

    pub fn fetch_direction(&self) -> FetchDirection {
        self.fetch_direction
    }

    /// Forward-only row stream in driver emission order.
    pub fn fetch(&mut self) -> BoxStream<'_, DaoResult<Record>> {
        debug!(
            sql = %self.sql,
            params = self.values.len(),
            prepared = self.prepared,
            "Fetching rows"
        );
        let sql = self.sql.as_str();
        let values = &self.values;
        let prepared = self.prepared;
        let mut columns: Option<Arc<[String]>> = None;

        crate::with_conn!(&mut self.conn, |c, bind| {
            let rows = if prepared {
                let mut query = sqlx::query(sql);
                for value in values {
                    query = bind(query, value);
                }
                query.fetch(&mut **c)
            } else {
                sqlx::Executor::fetch(&mut **c, sql)
            };
            rows.map(move |row| {
                row.map_err(DaoError::from)
                    .and_then(|row| row.to_record(&mut columns))
            })
            .boxed()
        })
    }

    pub async fn fetch_all(&mut self) -> DaoResult<Vec<Record>> {
        self.fetch().try_collect().await
    }

    /// Run the command and return the number of affected rows.
    pub async fn execute(&mut self) -> DaoResult<u64> {
        debug!(
            sql = %self.sql,
            params = self.values.len(),
            prepared = self.prepared,
            "Executing statement"
        );
        let sql = self.sql.as_str();
        let values = &self.values;
        let prepared = self.prepared;

        let affected = crate::with_conn!(&mut self.conn, |c, bind| {
            if prepared {
                let mut query = sqlx::query(sql);
                for value in values {
                    query = bind(query, value);
                }
                query.execute(&mut **c).await?.rows_affected()
            } else {
                sqlx::Executor::execute(&mut **c, sql).await?.rows_affected()
            }
        });
        Ok(affected)
    }
}

/// Count `?` placeholders outside quoted literals, identifiers and comments.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    scan_sql(sql, |c, code| {
        if code && c == '?' {
            count += 1;
        }
    });
    count
}

/// Rewrite `?` placeholders into the database's native syntax.
pub fn native_placeholders(sql: &str, db_type: DatabaseType) -> String {
    if !db_type.uses_numbered_placeholders() {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    scan_sql(sql, |c, code| {
        if code && c == '?' {
            index += 1;
            out.push('$');
            out.push_str(&index.to_string());
        } else {
            out.push(c);
        }
    });
    out
}

#[derive(Clone, Copy)]
enum ScanState {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Feed every char of `sql` to `f` along with whether it is SQL code, as
/// opposed to part of a quoted literal, quoted identifier or comment.
fn scan_sql(sql: &str, mut f: impl FnMut(char, bool)) {
    let mut state = ScanState::Code;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            ScanState::Code => match c {
                '\'' | '"' | '`' => {
                    state = ScanState::Quoted(c);
                    f(c, false);
                }
                '-' if chars.peek() == Some(&'-') => {
                    state = ScanState::LineComment;
                    f(c, false);
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = ScanState::BlockComment;
                    f('/', false);
                    f('*', false);
                }
                _ => f(c, true),
            },
            // A doubled quote closes and reopens, which leaves the state unchanged
            ScanState::Quoted(q) => {
                if c == q {
                    state = ScanState::Code;
                }
                f(c, false);
            }
            ScanState::LineComment => {
                if c == '\n' {
                    state = ScanState::Code;
                }
                f(c, false);
            }
            ScanState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = ScanState::Code;
                    f('*', false);
                    f('/', false);
                } else {
                    f(c, false);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_placeholders_skips_literals() {
        assert_eq!(count_placeholders("SELECT * FROM movies WHERE id = ?"), 1);
        assert_eq!(
            count_placeholders("SELECT '?' AS q, \"a?b\" FROM t WHERE a = ? AND b = ?"),
            2
        );
        assert_eq!(count_placeholders("SELECT 'it''s?' FROM t"), 0);
    }

    #[test]
    fn test_count_placeholders_skips_comments() {
        assert_eq!(
            count_placeholders("SELECT id FROM movies -- which one?\n WHERE id = ?"),
            1
        );
        assert_eq!(
            count_placeholders("SELECT /* year? */ id FROM movies WHERE year = ? /* or? */"),
            1
        );
        assert_eq!(count_placeholders("SELECT 1 /*/ ? */"), 0);
    }

    #[test]
    fn test_native_placeholders_postgres() {
        assert_eq!(
            native_placeholders(
                "UPDATE movies SET name = ?, note = '?' WHERE id = ?",
                DatabaseType::PostgreSQL
            ),
            "UPDATE movies SET name = $1, note = '?' WHERE id = $2"
        );
    }

    #[test]
    fn test_native_placeholders_leave_comments() {
        assert_eq!(
            native_placeholders(
                "SELECT id FROM movies -- which one?\nWHERE id = ? /* ? */",
                DatabaseType::PostgreSQL
            ),
            "SELECT id FROM movies -- which one?\nWHERE id = $1 /* ? */"
        );
    }

    #[test]
    fn test_native_placeholders_unchanged_elsewhere() {
        let sql = "DELETE FROM movies WHERE id = ?";
        assert_eq!(native_placeholders(sql, DatabaseType::MySQL), sql);
        assert_eq!(native_placeholders(sql, DatabaseType::SQLite), sql);
    }

    #[test]
    fn test_statement_builder_picks_form() {
        let plain = statement_builder(&Statement::raw("SELECT 1"), ConcurMode::ReadOnly);
        assert_eq!(plain.sql(), "SELECT 1");

        let prepared = statement_builder(
            &Statement::with_values("SELECT * FROM t WHERE id = ?", vec![SqlValue::Int(1)]),
            ConcurMode::Updatable,
        );
        assert_eq!(prepared.concur_mode(), ConcurMode::Updatable);
    }

    mod sqlite {
        use super::*;
        use crate::db::pool::DbConnection;
        use sqlx::sqlite::SqlitePoolOptions;

        async fn connection() -> DbConnection {
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .unwrap();
            DbConnection::SQLite(pool.acquire().await.unwrap())
        }

        #[tokio::test]
        async fn test_prepared_build_and_fetch() {
            let mut conn = connection().await;
            SimpleStatementBuilder::new(
                "CREATE TABLE movies (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            )
            .build(conn.as_conn())
            .await
            .unwrap()
            .execute()
            .await
            .unwrap();

            let inserted = PreparedStatementBuilder::new(
                "INSERT INTO movies(id, name) VALUES (?, ?)",
                vec![SqlValue::Int(7), SqlValue::from("Heat")],
            )
            .build(conn.as_conn())
            .await
            .unwrap()
            .execute()
            .await
            .unwrap();
            assert_eq!(inserted, 1);

            let mut stmt = PreparedStatementBuilder::new(
                "SELECT id, name FROM movies WHERE id = ?",
                vec![SqlValue::Int(7)],
            )
            .build(conn.as_conn())
            .await
            .unwrap();
            assert!(stmt.is_prepared());
            assert_eq!(stmt.fetch_direction(), FetchDirection::Forward);

            let rows = stmt.fetch_all().await.unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get_by_name("NAME"), Some(&SqlValue::from("Heat")));
        }

        #[tokio::test]
        async fn test_prepare_rejected_is_build_error() {
            let mut conn = connection().await;
            let err = PreparedStatementBuilder::new(
                "SELECT * FROM no_such_table WHERE id = ?",
                vec![SqlValue::Int(1)],
            )
            .build(conn.as_conn())
            .await
            .unwrap_err();
            assert!(matches!(err, DaoError::Build { .. }));
        }

        #[tokio::test]
        async fn test_placeholder_mismatch_is_build_error() {
            let mut conn = connection().await;
            let err = PreparedStatementBuilder::new("SELECT ?, ?", vec![SqlValue::Int(1)])
                .build(conn.as_conn())
                .await
                .unwrap_err();
            assert!(matches!(err, DaoError::Build { .. }));

            let err = SimpleStatementBuilder::new("SELECT ?")
                .build(conn.as_conn())
                .await
                .unwrap_err();
            assert!(matches!(err, DaoError::Build { .. }));
        }
    }
}
