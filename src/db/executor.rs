//! Query execution engine.
//!
//! This module runs built statements to completion on a borrowed connection:
//! - Statement building (plain or prepared, picked from the parameters)
//! - Full materialization of result rows
//! - Affected-row counts for writes
//! - Query timeouts
//!
//! Streaming consumption lives in [`crate::db::stream`]; this executor is the
//! synchronous path, where the caller awaits the whole result.

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::db::pool::ConnRef;
use crate::db::statement::statement_builder;
use crate::error::{DaoError, DaoResult};
use crate::models::{ConcurMode, Record, Statement};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Query executor that handles statement execution.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(query_timeout: Duration) -> Self {
        Self { query_timeout }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run a query and collect every row.
    pub async fn fetch_all(
        &self,
        conn: ConnRef<'_>,
        statement: &Statement,
        concur_mode: ConcurMode,
    ) -> DaoResult<Vec<Record>> {
        let start = Instant::now();
        debug!(
            sql = %statement.sql(),
            params = statement.parameters().len(),
            timeout_secs = self.query_timeout.as_secs(),
            "Executing query"
        );

        let builder = statement_builder(statement, concur_mode);
        let rows = async {
            let mut wrapped = builder.build(conn).await?;
            wrapped.fetch_all().await
        };
        let rows = match timeout(self.query_timeout, rows).await {
            Ok(rows) => rows?,
            Err(_) => return Err(timeout_error("query execution", self.query_timeout)),
        };

        debug!(
            rows = rows.len(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Query completed"
        );
        Ok(rows)
    }

    /// Run a write and return the affected row count.
    pub async fn execute(&self, conn: ConnRef<'_>, statement: &Statement) -> DaoResult<u64> {
        let start = Instant::now();
        debug!(
            sql = %statement.sql(),
            params = statement.parameters().len(),
            timeout_secs = self.query_timeout.as_secs(),
            "Executing write operation"
        );

        let builder = statement_builder(statement, ConcurMode::Updatable);
        let affected = async {
            let mut wrapped = builder.build(conn).await?;
            wrapped.execute().await
        };
        let affected = match timeout(self.query_timeout, affected).await {
            Ok(affected) => affected?,
            Err(_) => return Err(timeout_error("write operation", self.query_timeout)),
        };

        debug!(
            rows_affected = affected,
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Write completed"
        );
        Ok(affected)
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS))
    }
}

fn timeout_error(operation: &str, timeout: Duration) -> DaoError {
    DaoError::timeout(operation, timeout.as_secs() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::DbConnection;
    use crate::models::SqlValue;
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
    async fn test_execute_then_fetch() {
        let executor = QueryExecutor::default();
        let mut conn = connection().await;

        executor
            .execute(
                conn.as_conn(),
                &Statement::raw("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"),
            )
            .await
            .unwrap();
        let affected = executor
            .execute(
                conn.as_conn(),
                &Statement::with_values(
                    "INSERT INTO t(id, v) VALUES (?, ?), (?, ?)",
                    vec![1.into(), "a".into(), 2.into(), SqlValue::Null],
                ),
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = executor
            .fetch_all(
                conn.as_conn(),
                &Statement::raw("SELECT id, v FROM t ORDER BY id"),
                ConcurMode::ReadOnly,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(1), Some(&SqlValue::from("a")));
        assert_eq!(rows[1].get(1), Some(&SqlValue::Null));
    }

    #[tokio::test]
    async fn test_driver_error_is_execution() {
        let executor = QueryExecutor::default();
        let mut conn = connection().await;
        executor
            .execute(
                conn.as_conn(),
                &Statement::raw("CREATE TABLE t (id INTEGER PRIMARY KEY)"),
            )
            .await
            .unwrap();
        executor
            .execute(conn.as_conn(), &Statement::raw("INSERT INTO t(id) VALUES (1)"))
            .await
            .unwrap();
        let err = executor
            .execute(conn.as_conn(), &Statement::raw("INSERT INTO t(id) VALUES (1)"))
            .await
            .unwrap_err();
        assert!(matches!(err, DaoError::Execution { .. }));
    }
}
