//! Connection-bound query handle.

use crate::bean::{Bean, Entity, from_record, parse_bean};
use crate::dao::{DaoContext, map_records};
use crate::db::ConnRef;
use crate::error::{DaoError, DaoResult};
use crate::models::{
    ConcurMode, DatabaseType, OperationKind, Page, PageResult, Record, SqlValue, Statement,
};
use crate::pagination::count_statement;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Runs statements on one borrowed connection.
///
/// [`CommonDao`](crate::dao::CommonDao) opens a session per call; inside a
/// [`TransactionExecutor`](crate::dao::TransactionExecutor) every call of the
/// unit of work goes through the same session and connection.
#[derive(Debug)]
pub struct Session<'c> {
    conn: ConnRef<'c>,
    context: Arc<DaoContext>,
}

impl<'c> Session<'c> {
    pub fn new(conn: ConnRef<'c>, context: Arc<DaoContext>) -> Self {
        Self { conn, context }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.conn.db_type()
    }

    pub fn context(&self) -> &DaoContext {
        &self.context
    }

    /// Run a row-returning statement.
    pub async fn fetch_statement(&mut self, statement: &Statement) -> DaoResult<Vec<Record>> {
        self.fetch_intercepted(statement, None).await
    }

    /// Run a write statement.
    pub async fn execute_statement(&mut self, statement: &Statement) -> DaoResult<u64> {
        let statement = self.context.intercept(statement, None)?;
        self.context
            .executor()
            .execute(self.conn.reborrow(), &statement)
            .await
    }

    /// One page of `statement` plus the row count of the whole query.
    pub async fn page_statement(
        &mut self,
        statement: &Statement,
        page: Page,
    ) -> DaoResult<PageResult<Record>> {
        page.validate()?;
        let count = count_statement(statement);
        let total = match self.fetch_statement(&count).await?.first() {
            Some(row) => row.scalar::<u64>()?,
            None => 0,
        };
        let items = self.fetch_intercepted(statement, Some(page)).await?;
        Ok(PageResult::new(page, total, items))
    }

    async fn fetch_intercepted(
        &mut self,
        statement: &Statement,
        page: Option<Page>,
    ) -> DaoResult<Vec<Record>> {
        let statement = self.context.intercept(statement, page)?;
        self.context
            .executor()
            .fetch_all(self.conn.reborrow(), &statement, ConcurMode::ReadOnly)
            .await
    }

    pub async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DaoResult<Vec<Record>> {
        self.fetch_statement(&Statement::with_values(sql, params.to_vec()))
            .await
    }

    pub async fn query_as<T>(&mut self, sql: &str, params: &[SqlValue]) -> DaoResult<Vec<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let records = self.query(sql, params).await?;
        map_records(&records)
    }

    /// First row mapped onto `T`, if any.
    pub async fn query_one<T>(&mut self, sql: &str, params: &[SqlValue]) -> DaoResult<Option<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let records = self.query(sql, params).await?;
        records.first().map(from_record::<T>).transpose()
    }

    /// First column of the first row.
    pub async fn query_scalar<T>(&mut self, sql: &str, params: &[SqlValue]) -> DaoResult<T>
    where
        T: DeserializeOwned,
    {
        let records = self.query(sql, params).await?;
        first_scalar(&records, sql)
    }

    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DaoResult<u64> {
        self.execute_statement(&Statement::with_values(sql, params.to_vec()))
            .await
    }

    pub async fn query_page<T>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        page: Page,
    ) -> DaoResult<PageResult<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let result = self
            .page_statement(&Statement::with_values(sql, params.to_vec()), page)
            .await?;
        let items = map_records(&result.items)?;
        Ok(PageResult::new(page, result.total, items))
    }

    /// Run the INSERT, UPDATE or DELETE generated for `bean`.
    pub async fn write_bean(&mut self, bean: &Bean, kind: OperationKind) -> DaoResult<u64> {
        if kind.is_query() {
            return Err(DaoError::configuration(format!(
                "{} is not a write operation",
                kind
            )));
        }
        let statement = parse_bean(bean, kind, self.context.naming())?;
        self.execute_statement(&statement).await
    }

    pub async fn insert<E: Entity>(&mut self, entity: &E) -> DaoResult<u64> {
        self.write_bean(&entity.to_bean(), OperationKind::Insert)
            .await
    }

    /// Update by key; null fields are left untouched.
    pub async fn update<E: Entity>(&mut self, entity: &E) -> DaoResult<u64> {
        self.write_bean(&entity.to_bean(), OperationKind::Update)
            .await
    }

    pub async fn delete<E: Entity>(&mut self, entity: &E) -> DaoResult<u64> {
        self.write_bean(&entity.to_bean(), OperationKind::Delete)
            .await
    }

    /// Rows matching the key, or every non-null field when the key is unset.
    pub async fn select<E>(&mut self, entity: &E) -> DaoResult<Vec<E>>
    where
        E: Entity + DeserializeOwned,
    {
        let statement = parse_bean(&entity.to_bean(), OperationKind::Select, self.context.naming())?;
        let records = self.fetch_statement(&statement).await?;
        map_records(&records)
    }
}

pub(crate) fn first_scalar<T: DeserializeOwned>(records: &[Record], sql: &str) -> DaoResult<T> {
    records
        .first()
        .ok_or_else(|| DaoError::mapping(format!("Scalar query returned no rows: {}", sql)))?
        .scalar()
}
