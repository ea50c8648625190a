//! Pagination dialects.
//!
//! A [`Paginator`] holds the dialects it knows and rewrites a statement for
//! one page using the first dialect that supports the active database. It
//! runs as an [`Interceptor`], taking the page of every paged call.

use crate::error::{DaoError, DaoResult};
use crate::intercept::{Interceptor, Invocation};
use crate::models::{DatabaseType, Page, Statement};
use std::sync::Arc;
use tracing::debug;

/// Rewrites a query so it returns a single page.
pub trait PaginationDialect: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, db_type: DatabaseType) -> bool;

    /// `base_sql` with the page window applied. `base_sql` has no trailing `;`.
    fn wrap(&self, base_sql: &str, page: &Page) -> DaoResult<String>;
}

/// `LIMIT offset, size`
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl PaginationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn supports(&self, db_type: DatabaseType) -> bool {
        db_type == DatabaseType::MySQL
    }

    fn wrap(&self, base_sql: &str, page: &Page) -> DaoResult<String> {
        Ok(format!(
            "{} LIMIT {}, {}",
            base_sql,
            page.offset(),
            page.page_size
        ))
    }
}

/// `LIMIT size OFFSET offset`
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PaginationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn supports(&self, db_type: DatabaseType) -> bool {
        db_type == DatabaseType::PostgreSQL
    }

    fn wrap(&self, base_sql: &str, page: &Page) -> DaoResult<String> {
        Ok(limit_offset(base_sql, page))
    }
}

/// `LIMIT size OFFSET offset`
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl PaginationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn supports(&self, db_type: DatabaseType) -> bool {
        db_type == DatabaseType::SQLite
    }

    fn wrap(&self, base_sql: &str, page: &Page) -> DaoResult<String> {
        Ok(limit_offset(base_sql, page))
    }
}

fn limit_offset(base_sql: &str, page: &Page) -> String {
    format!(
        "{} LIMIT {} OFFSET {}",
        base_sql,
        page.page_size,
        page.offset()
    )
}

/// Registry of pagination dialects.
#[derive(Clone, Default)]
pub struct Paginator {
    dialects: Vec<Arc<dyn PaginationDialect>>,
}

impl std::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.dialects.iter().map(|d| d.name()).collect();
        f.debug_struct("Paginator").field("dialects", &names).finish()
    }
}

impl Paginator {
    /// Paginator without any dialect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paginator with the MySQL, PostgreSQL and SQLite dialects.
    pub fn with_defaults() -> Self {
        let mut paginator = Self::new();
        paginator
            .add_dialect(MySqlDialect)
            .add_dialect(PostgresDialect)
            .add_dialect(SqliteDialect);
        paginator
    }

    /// Append a dialect; earlier dialects win when several support a database.
    pub fn add_dialect(&mut self, dialect: impl PaginationDialect + 'static) -> &mut Self {
        self.dialects.push(Arc::new(dialect));
        self
    }

    pub fn dialect_for(&self, db_type: DatabaseType) -> DaoResult<&dyn PaginationDialect> {
        self.dialects
            .iter()
            .find(|d| d.supports(db_type))
            .map(|d| d.as_ref())
            .ok_or_else(|| DaoError::unsupported_dialect(db_type.display_name()))
    }

    /// `statement` restricted to `page`, parameters unchanged.
    pub fn paginate(
        &self,
        db_type: DatabaseType,
        statement: &Statement,
        page: &Page,
    ) -> DaoResult<Statement> {
        page.validate()?;
        let dialect = self.dialect_for(db_type)?;
        let sql = dialect.wrap(strip_terminator(statement.sql()), page)?;
        debug!(dialect = dialect.name(), sql = %sql, "Paginated statement");
        Ok(statement.with_sql(sql))
    }

}

impl Interceptor for Paginator {
    fn name(&self) -> &'static str {
        "paginator"
    }

    fn intercept(&self, invocation: &mut Invocation) -> DaoResult<()> {
        if let Some(page) = invocation.take_page() {
            let paged = self.paginate(invocation.db_type(), invocation.statement(), &page)?;
            invocation.set_statement(paged);
        }
        Ok(())
    }
}

/// Row count of the unpaged query.
pub fn count_sql(base_sql: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM ({}) page_total",
        strip_terminator(base_sql)
    )
}

pub fn count_statement(statement: &Statement) -> Statement {
    statement.with_sql(count_sql(statement.sql()))
}

fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}
