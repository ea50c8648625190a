//! Transactional units of work.

use crate::dao::{DaoContext, Session};
use crate::db::{DataSource, DbTransaction};
use crate::error::DaoResult;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Runs closures inside a database transaction.
#[derive(Debug, Clone)]
pub struct TransactionExecutor {
    source: DataSource,
    context: Arc<DaoContext>,
}

impl TransactionExecutor {
    pub fn new(source: DataSource, context: Arc<DaoContext>) -> Self {
        Self { source, context }
    }

    /// Run `work` on one connection with auto-commit off.
    ///
    /// Commits when `work` succeeds. When it fails the transaction is rolled
    /// back and `work`'s error returned, even if the rollback itself fails.
    /// If the returned future is dropped midway the transaction rolls back as
    /// the connection goes back to the pool.
    ///
    /// ```ignore
    /// executor
    ///     .execute(move |tx| Box::pin(async move {
    ///         tx.insert(&movie).await?;
    ///         tx.execute("UPDATE stats SET movies = movies + 1", &[]).await
    ///     }))
    ///     .await?;
    /// ```
    pub async fn execute<T, F>(&self, work: F) -> DaoResult<T>
    where
        F: for<'t> FnOnce(&'t mut Session<'_>) -> BoxFuture<'t, DaoResult<T>> + Send,
        T: Send,
    {
        let transaction_id = format!("tx_{}", Uuid::new_v4().simple());
        let span = info_span!("transaction", transaction_id = %transaction_id);

        async move {
            let mut tx = DbTransaction::begin(self.source.pool()).await?;
            debug!("Transaction started");

            let result = {
                let mut session = Session::new(tx.as_conn(), Arc::clone(&self.context));
                work(&mut session).await
            };

            match result {
                Ok(value) => {
                    tx.commit().await?;
                    info!("Transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    match tx.rollback().await {
                        Ok(()) => info!(error = %e, "Transaction rolled back"),
                        Err(rollback_error) => warn!(
                            error = %e,
                            rollback_error = %rollback_error,
                            "Rollback failed"
                        ),
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
