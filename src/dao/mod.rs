//! DAO facades.
//!
//! - [`CommonDao`]: synchronous calls, each on its own pooled connection
//! - [`StreamDao`]: lazily streamed results
//! - [`AsyncDao`]: calls submitted to the runtime, completed through a [`QueryFuture`]
//! - [`TransactionExecutor`]: a unit of work on one transactional [`Session`]
//! - [`BoundDao`]: the methods of a [`DaoInterface`](crate::bind::DaoInterface)
//!
//! Everything shares one [`DaoContext`] holding the method registry, the
//! interceptor chain and the table naming convention.

pub mod async_dao;
pub mod bound;
pub mod common;
pub mod session;
pub mod stream;
pub mod transaction;

pub use async_dao::{AsyncDao, QueryFuture};
pub use bound::{BoundDao, BoundSession};
pub use common::CommonDao;
pub use session::Session;
pub use stream::{EntityStream, StreamDao};
pub use transaction::TransactionExecutor;

use crate::bean::{Entity, SnakeCaseNaming, TableNaming, from_record};
use crate::bind::MethodRegistry;
use crate::config::DaoConfig;
use crate::db::{FetchSize, QueryExecutor};
use crate::error::DaoResult;
use crate::intercept::{Interceptor, InterceptorChain};
use crate::models::{DatabaseType, Page, Record, Statement};
use crate::pagination::Paginator;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// State shared by every facade of one data source.
pub struct DaoContext {
    db_type: DatabaseType,
    registry: MethodRegistry,
    interceptors: InterceptorChain,
    naming: Arc<dyn TableNaming>,
    executor: QueryExecutor,
    fetch_size: FetchSize,
}

impl std::fmt::Debug for DaoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaoContext")
            .field("db_type", &self.db_type)
            .field("interceptors", &self.interceptors)
            .field("executor", &self.executor)
            .field("fetch_size", &self.fetch_size)
            .finish_non_exhaustive()
    }
}

impl DaoContext {
    /// Context with a default [`Paginator`] and snake_case table names.
    pub fn new(db_type: DatabaseType) -> Self {
        let mut interceptors = InterceptorChain::new();
        interceptors.register(Paginator::with_defaults());
        Self {
            db_type,
            registry: MethodRegistry::new(),
            interceptors,
            naming: Arc::new(SnakeCaseNaming),
            executor: QueryExecutor::default(),
            fetch_size: FetchSize::from(crate::config::DEFAULT_FETCH_SIZE),
        }
    }

    /// Context for `config`'s database, timeout and fetch size.
    pub fn from_config(config: &DaoConfig) -> Self {
        let mut context = Self::new(config.db_type);
        context.executor = QueryExecutor::new(config.query_timeout);
        context.fetch_size = FetchSize::from(config.fetch_size);
        context
    }

    /// Swap the paginator, keeping its place in the chain.
    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.interceptors.replace(paginator);
        self
    }

    /// Append `interceptor` to the chain.
    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.register(interceptor);
        self
    }

    pub fn with_naming(mut self, naming: impl TableNaming + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: FetchSize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn interceptors(&self) -> &InterceptorChain {
        &self.interceptors
    }

    /// `statement` as the interceptor chain hands it to the driver.
    pub fn intercept(&self, statement: &Statement, page: Option<Page>) -> DaoResult<Statement> {
        self.interceptors.apply(self.db_type, statement.clone(), page)
    }

    pub fn naming(&self) -> &dyn TableNaming {
        self.naming.as_ref()
    }

    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Default fetch size for new streams.
    pub fn fetch_size(&self) -> FetchSize {
        self.fetch_size
    }
}

/// Map every record onto `T`.
pub(crate) fn map_records<T>(records: &[Record]) -> DaoResult<Vec<T>>
where
    T: Entity + DeserializeOwned,
{
    records.iter().map(from_record).collect()
}
