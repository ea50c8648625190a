//! Streaming DAO facade.

use crate::bean::{Entity, from_record, parse_bean};
use crate::dao::CommonDao;
use crate::db::{FetchSize, RecordStream};
use crate::error::DaoResult;
use crate::models::{ConcurMode, OperationKind, SqlValue, Statement};
use futures_util::Stream;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Returns results as streams instead of materialized vectors.
///
/// Each stream holds its own pooled connection until it is drained, closed
/// or dropped.
#[derive(Debug, Clone)]
pub struct StreamDao {
    dao: CommonDao,
    fetch_size: FetchSize,
}

impl StreamDao {
    pub(crate) fn new(dao: CommonDao) -> Self {
        let fetch_size = dao.context().fetch_size();
        Self { dao, fetch_size }
    }

    /// Rows prefetched per stream; `0` or [`FetchSize::ROW_BY_ROW`] delivers one row at a time.
    pub fn fetch_size(mut self, fetch_size: impl Into<FetchSize>) -> Self {
        self.fetch_size = fetch_size.into();
        self
    }

    pub fn current_fetch_size(&self) -> FetchSize {
        self.fetch_size
    }

    /// Stream `statement` after the interceptor chain; a chain error is the
    /// stream's only item.
    pub fn stream_statement(&self, statement: Statement) -> RecordStream {
        let statement = match self.dao.context().intercept(&statement, None) {
            Ok(statement) => statement,
            Err(e) => return RecordStream::failed(e),
        };
        RecordStream::spawn(
            self.dao.handle(),
            self.dao.data_source().pool().clone(),
            statement,
            ConcurMode::ReadOnly,
            self.fetch_size,
        )
    }

    pub fn query(&self, sql: &str, params: &[SqlValue]) -> RecordStream {
        self.stream_statement(Statement::with_values(sql, params.to_vec()))
    }

    pub fn query_as<T>(&self, sql: &str, params: &[SqlValue]) -> EntityStream<T>
    where
        T: Entity + DeserializeOwned,
    {
        EntityStream::new(self.query(sql, params))
    }

    /// Stream the rows selected by `entity`'s key or non-null fields.
    pub fn select<E>(&self, entity: &E) -> DaoResult<EntityStream<E>>
    where
        E: Entity + DeserializeOwned,
    {
        let statement = parse_bean(
            &entity.to_bean(),
            OperationKind::Select,
            self.dao.context().naming(),
        )?;
        Ok(EntityStream::new(self.stream_statement(statement)))
    }
}

/// A [`RecordStream`] whose rows are mapped onto `T`.
///
/// Ends after the first error, whether it came from the driver or from
/// mapping a row.
#[derive(Debug)]
pub struct EntityStream<T> {
    inner: RecordStream,
    failed: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> EntityStream<T> {
    pub fn new(inner: RecordStream) -> Self {
        Self {
            inner,
            failed: false,
            _marker: PhantomData,
        }
    }

    /// Stop reading and wait until the connection has been released.
    pub async fn close(self) {
        self.inner.close().await;
    }

    pub fn into_inner(self) -> RecordStream {
        self.inner
    }
}

impl<T> Stream for EntityStream<T>
where
    T: Entity + DeserializeOwned,
{
    type Item = DaoResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        let item = match polled {
            Poll::Ready(Some(row)) => row.and_then(|record| from_record::<T>(&record)),
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => return Poll::Pending,
        };
        if item.is_err() {
            self.failed = true;
            self.inner.stop();
        }
        Poll::Ready(Some(item))
    }
}
