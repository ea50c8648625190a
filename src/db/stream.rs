//! Lazily streamed query results.
//!
//! A [`RecordStream`] owns a background task that checks out a connection,
//! runs the statement and pushes rows into a bounded channel. The channel
//! capacity is the fetch size, so the task never reads further ahead of the
//! consumer than that. Closing or dropping the stream stops the task, which
//! releases the cursor and returns the connection to its pool.

use crate::db::pool::DbPool;
use crate::db::statement::statement_builder;
use crate::error::{DaoError, DaoResult};
use crate::models::{ConcurMode, Record, Statement};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, warn};

/// How many rows a stream may buffer ahead of its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSize {
    /// Deliver rows one at a time.
    RowByRow,
    Rows(usize),
}

impl FetchSize {
    pub const ROW_BY_ROW: FetchSize = FetchSize::RowByRow;

    /// Channel capacity for this fetch size.
    pub fn capacity(&self) -> usize {
        match self {
            FetchSize::RowByRow => 1,
            FetchSize::Rows(n) => (*n).max(1),
        }
    }
}

/// Zero means row by row.
impl From<usize> for FetchSize {
    fn from(rows: usize) -> Self {
        match rows {
            0 => FetchSize::RowByRow,
            n => FetchSize::Rows(n),
        }
    }
}

/// Single-pass stream of records backed by a dedicated connection.
#[derive(Debug)]
pub struct RecordStream {
    rx: mpsc::Receiver<DaoResult<Record>>,
    task: Option<JoinHandle<()>>,
    drained: bool,
}

impl RecordStream {
    /// Start streaming `statement` on a connection from `pool`.
    pub fn spawn(
        handle: &Handle,
        pool: DbPool,
        statement: Statement,
        concur_mode: ConcurMode,
        fetch_size: FetchSize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(fetch_size.capacity());
        let span = debug_span!("record_stream", sql = %statement.sql(), fetch_size = fetch_size.capacity());
        let task = handle.spawn(pump(pool, statement, concur_mode, tx).instrument(span));
        Self {
            rx,
            task: Some(task),
            drained: false,
        }
    }

    /// Stream that yields `error` and ends.
    pub fn failed(error: DaoError) -> Self {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Err(error));
        Self {
            rx,
            task: None,
            drained: false,
        }
    }

    /// Stop reading without waiting for the connection to be released.
    pub(crate) fn stop(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.drained = true;
    }

    /// Stop reading and wait until the connection has been released.
    pub async fn close(mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Stream for RecordStream {
    type Item = DaoResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.rx.poll_recv(cx);
        if let Poll::Ready(None) = polled {
            self.drained = true;
        }
        polled
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if !self.drained && !task.is_finished() {
                warn!("Record stream dropped before it was drained or closed");
            }
            task.abort();
        }
    }
}

async fn pump(
    pool: DbPool,
    statement: Statement,
    concur_mode: ConcurMode,
    tx: mpsc::Sender<DaoResult<Record>>,
) {
    let mut conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            return;
        }
    };

    let builder = statement_builder(&statement, concur_mode);
    match builder.build(conn.as_conn()).await {
        Ok(mut wrapped) => {
            let mut rows = wrapped.fetch();
            let mut delivered = 0usize;
            while let Some(row) = rows.next().await {
                let failed = row.is_err();
                if tx.send(row).await.is_err() {
                    debug!(delivered, "Stream consumer went away");
                    break;
                }
                if failed {
                    break;
                }
                delivered += 1;
            }
            debug!(delivered, "Stream finished");
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
        }
    }

    // Release the connection before the consumer can observe end of stream
    drop(builder);
    drop(conn);
    drop(tx);
}
