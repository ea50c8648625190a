//! Asynchronous DAO facade.
//!
//! Calls return a [`QueryFuture`] straight away; the work runs on the runtime
//! the facade was created on, at most `async_workers` calls at a time. A
//! failure never surfaces on the submitting task, only when the future is
//! awaited.

use crate::bean::{Bean, Entity};
use crate::dao::CommonDao;
use crate::error::{DaoError, DaoResult};
use crate::models::{OperationKind, Page, PageResult, Record, SqlValue};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span};

/// Submits calls for background execution.
#[derive(Debug, Clone)]
pub struct AsyncDao {
    dao: CommonDao,
}

impl AsyncDao {
    pub(crate) fn new(dao: CommonDao) -> Self {
        Self { dao }
    }

    /// Run `work` on the runtime once a worker permit is free.
    pub fn submit<T, F, Fut>(&self, operation: &'static str, work: F) -> QueryFuture<T>
    where
        T: Send + 'static,
        F: FnOnce(CommonDao) -> Fut + Send + 'static,
        Fut: Future<Output = DaoResult<T>> + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let workers = Arc::clone(self.dao.workers());
        let dao = self.dao.clone();

        let task = self.dao.handle().spawn(
            async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| DaoError::Cancelled)?;
                if flag.load(Ordering::Acquire) {
                    debug!("Cancelled before start");
                    return Err(DaoError::Cancelled);
                }
                work(dao).await
            }
            .instrument(debug_span!("async_query", operation)),
        );
        QueryFuture { task, cancelled }
    }

    pub fn query(&self, sql: &str, params: &[SqlValue]) -> QueryFuture<Vec<Record>> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.submit("query", move |dao| async move { dao.query(&sql, &params).await })
    }

    pub fn query_as<T>(&self, sql: &str, params: &[SqlValue]) -> QueryFuture<Vec<T>>
    where
        T: Entity + DeserializeOwned + Send + 'static,
    {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.submit("query_as", move |dao| async move {
            dao.query_as::<T>(&sql, &params).await
        })
    }

    pub fn query_one<T>(&self, sql: &str, params: &[SqlValue]) -> QueryFuture<Option<T>>
    where
        T: Entity + DeserializeOwned + Send + 'static,
    {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.submit("query_one", move |dao| async move {
            dao.query_one::<T>(&sql, &params).await
        })
    }

    pub fn query_scalar<T>(&self, sql: &str, params: &[SqlValue]) -> QueryFuture<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.submit("query_scalar", move |dao| async move {
            dao.query_scalar::<T>(&sql, &params).await
        })
    }

    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> QueryFuture<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.submit("execute", move |dao| async move { dao.execute(&sql, &params).await })
    }

    pub fn query_page<T>(&self, sql: &str, params: &[SqlValue], page: Page) -> QueryFuture<PageResult<T>>
    where
        T: Entity + DeserializeOwned + Send + 'static,
    {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.submit("query_page", move |dao| async move {
            dao.query_page::<T>(&sql, &params, page).await
        })
    }

    pub fn insert<E: Entity>(&self, entity: &E) -> QueryFuture<u64> {
        self.write_bean(entity.to_bean(), OperationKind::Insert)
    }

    pub fn update<E: Entity>(&self, entity: &E) -> QueryFuture<u64> {
        self.write_bean(entity.to_bean(), OperationKind::Update)
    }

    pub fn delete<E: Entity>(&self, entity: &E) -> QueryFuture<u64> {
        self.write_bean(entity.to_bean(), OperationKind::Delete)
    }

    fn write_bean(&self, bean: Bean, kind: OperationKind) -> QueryFuture<u64> {
        self.submit("write_bean", move |dao| async move {
            dao.write_bean(&bean, kind).await
        })
    }
}

/// Handle to a submitted call.
///
/// Dropping the future does not stop the call; use [`QueryFuture::cancel`].
#[derive(Debug)]
pub struct QueryFuture<T> {
    task: JoinHandle<DaoResult<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> QueryFuture<T> {
    /// Stop the call. Awaiting the future afterwards yields [`DaoError::Cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Whether the call has completed, failed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Future for QueryFuture<T> {
    type Output = DaoResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let joined = match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(joined) => joined,
            Poll::Pending => return Poll::Pending,
        };
        if self.is_cancelled() {
            return Poll::Ready(Err(DaoError::Cancelled));
        }
        Poll::Ready(match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(DaoError::Cancelled),
            Err(e) => Err(DaoError::execution(
                format!("Asynchronous call panicked: {}", e),
                None,
            )),
        })
    }
}
