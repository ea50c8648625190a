//! Synchronous DAO facade.

use crate::bean::{Bean, Entity};
use crate::bind::DaoInterface;
use crate::config::DaoConfig;
use crate::dao::session::Session;
use crate::dao::{AsyncDao, BoundDao, DaoContext, StreamDao, TransactionExecutor};
use crate::db::{DataSource, DbConnection};
use crate::error::{DaoError, DaoResult};
use crate::models::{DatabaseType, OperationKind, Page, PageResult, Record, SqlValue, Statement};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Entry point for data access over one [`DataSource`].
///
/// Every call checks a connection out of the pool, runs to completion and
/// returns the connection before handing back its result. Clones share the
/// pool, the method registry and the async worker permits.
#[derive(Debug, Clone)]
pub struct CommonDao {
    source: DataSource,
    context: Arc<DaoContext>,
    handle: Handle,
    workers: Arc<Semaphore>,
}

impl CommonDao {
    /// Facade with a context built from the source's configuration.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(source: DataSource) -> DaoResult<Self> {
        let context = DaoContext::from_config(source.config());
        Self::with_context(source, context)
    }

    pub fn with_context(source: DataSource, context: DaoContext) -> DaoResult<Self> {
        let handle = Handle::try_current().map_err(|_| {
            DaoError::configuration("CommonDao must be created inside a Tokio runtime")
        })?;
        Ok(Self::with_handle(source, context, handle))
    }

    /// Facade that spawns streams and async calls on `handle`.
    pub fn with_handle(source: DataSource, context: DaoContext, handle: Handle) -> Self {
        let workers = source.config().async_workers.max(1);
        debug!(
            db_type = %source.db_type(),
            async_workers = workers,
            "Creating DAO facade"
        );
        Self {
            source,
            context: Arc::new(context),
            handle,
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Open a pool for `config` and wrap it.
    pub async fn connect(config: DaoConfig) -> DaoResult<Self> {
        let source = DataSource::connect(config).await?;
        Self::new(source)
    }

    pub fn data_source(&self) -> &DataSource {
        &self.source
    }

    pub fn context(&self) -> &Arc<DaoContext> {
        &self.context
    }

    pub fn db_type(&self) -> DatabaseType {
        self.source.db_type()
    }

    pub(crate) fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn workers(&self) -> &Arc<Semaphore> {
        &self.workers
    }

    /// Check out a connection for a [`Session`].
    pub async fn acquire(&self) -> DaoResult<DbConnection> {
        self.source.acquire().await
    }

    /// Session over a checked out connection.
    pub fn session<'c>(&self, conn: &'c mut DbConnection) -> Session<'c> {
        Session::new(conn.as_conn(), Arc::clone(&self.context))
    }

    /// Register `I`'s methods and bind them to this facade.
    pub async fn get_dao<I: DaoInterface>(&self) -> DaoResult<BoundDao<I>> {
        let registry = self.context.registry();
        for method in I::methods() {
            if method.interface != I::NAME {
                return Err(DaoError::configuration(format!(
                    "{}::{} is declared by {}",
                    method.interface,
                    method.name,
                    I::NAME
                )));
            }
            registry.register(method).await?;
        }
        debug!(interface = I::NAME, "Bound DAO interface");
        Ok(BoundDao::new(self.clone()))
    }

    /// Streaming facade with the configured fetch size.
    pub fn with_stream(&self) -> StreamDao {
        StreamDao::new(self.clone())
    }

    /// Asynchronous facade sharing this facade's worker permits.
    pub fn with_async(&self) -> AsyncDao {
        AsyncDao::new(self.clone())
    }

    pub fn transaction_executor(&self) -> TransactionExecutor {
        TransactionExecutor::new(self.source.clone(), Arc::clone(&self.context))
    }

    pub async fn fetch_statement(&self, statement: &Statement) -> DaoResult<Vec<Record>> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).fetch_statement(statement).await
    }

    pub async fn execute_statement(&self, statement: &Statement) -> DaoResult<u64> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).execute_statement(statement).await
    }

    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> DaoResult<Vec<Record>> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).query(sql, params).await
    }

    pub async fn query_as<T>(&self, sql: &str, params: &[SqlValue]) -> DaoResult<Vec<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).query_as(sql, params).await
    }

    pub async fn query_one<T>(&self, sql: &str, params: &[SqlValue]) -> DaoResult<Option<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).query_one(sql, params).await
    }

    pub async fn query_scalar<T>(&self, sql: &str, params: &[SqlValue]) -> DaoResult<T>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).query_scalar(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> DaoResult<u64> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).execute(sql, params).await
    }

    pub async fn query_page<T>(
        &self,
        sql: &str,
        params: &[SqlValue],
        page: Page,
    ) -> DaoResult<PageResult<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).query_page(sql, params, page).await
    }

    /// One page of records.
    pub async fn query_page_records(
        &self,
        sql: &str,
        params: &[SqlValue],
        page: Page,
    ) -> DaoResult<PageResult<Record>> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn)
            .page_statement(&Statement::with_values(sql, params.to_vec()), page)
            .await
    }

    pub async fn write_bean(&self, bean: &Bean, kind: OperationKind) -> DaoResult<u64> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).write_bean(bean, kind).await
    }

    pub async fn insert<E: Entity>(&self, entity: &E) -> DaoResult<u64> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).insert(entity).await
    }

    pub async fn update<E: Entity>(&self, entity: &E) -> DaoResult<u64> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).update(entity).await
    }

    pub async fn delete<E: Entity>(&self, entity: &E) -> DaoResult<u64> {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).delete(entity).await
    }

    pub async fn select<E>(&self, entity: &E) -> DaoResult<Vec<E>>
    where
        E: Entity + DeserializeOwned,
    {
        let mut conn = self.acquire().await?;
        self.session(&mut conn).select(entity).await
    }

    /// Close the pool; clones of this facade stop working.
    pub async fn close(&self) {
        info!(db_type = %self.db_type(), "Closing data source");
        self.source.close().await;
    }
}
