//! Database transactions over a dedicated pooled connection.

use crate::db::pool::{ConnRef, DbPool};
use crate::error::{DaoError, DaoResult};
use crate::models::DatabaseType;
use sqlx::{MySql, Postgres, Sqlite, Transaction};

/// Database-specific transaction wrapper.
///
/// Dropping an unfinished transaction rolls it back and returns the
/// connection to its pool.
#[derive(Debug)]
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Check out a connection and begin a transaction on it.
    pub async fn begin(pool: &DbPool) -> DaoResult<Self> {
        let tx = crate::impl_db_dispatch!(pool, {
            MySql(p) => DbTransaction::MySql(p.begin().await?),
            Postgres(p) => DbTransaction::Postgres(p.begin().await?),
            SQLite(p) => DbTransaction::SQLite(p.begin().await?),
        });
        Ok(tx)
    }

    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    pub fn as_conn(&mut self) -> ConnRef<'_> {
        match self {
            DbTransaction::MySql(tx) => ConnRef::MySql(&mut **tx),
            DbTransaction::Postgres(tx) => ConnRef::Postgres(&mut **tx),
            DbTransaction::SQLite(tx) => ConnRef::SQLite(&mut **tx),
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DaoResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DaoError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DaoError::from),
            DbTransaction::SQLite(tx) => tx.commit().await.map_err(DaoError::from),
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DaoResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DaoError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DaoError::from),
            DbTransaction::SQLite(tx) => tx.rollback().await.map_err(DaoError::from),
        }
    }
}
