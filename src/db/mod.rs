//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management and connection checkout
//! - Statement building (plain and prepared)
//! - Synchronous execution with timeouts
//! - Streamed execution over a dedicated connection
//! - Transactions
//! - Type mappings and parameter binding
//! - Database dispatch macros for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod params;
pub mod pool;
pub mod statement;
pub mod stream;
pub mod transaction;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{ConnRef, DataSource, DbConnection, DbPool};
pub use statement::{
    PreparedStatementBuilder, SimpleStatementBuilder, StatementBuilder, WrappedStatement,
    statement_builder,
};
pub use stream::{FetchSize, RecordStream};
pub use transaction::DbTransaction;
pub use types::RowDecode;
