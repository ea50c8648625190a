//! dao-binder Library
//!
//! A data access layer for SQL databases (SQLite, PostgreSQL, MySQL): beans
//! mapped to INSERT/UPDATE/DELETE/SELECT statements, DAO interfaces bound to
//! cached SQL commands, a statement interceptor chain, and synchronous,
//! streamed, asynchronous, paginated and transactional execution.

pub mod bean;
pub mod bind;
pub mod config;
pub mod dao;
pub mod db;
pub mod error;
pub mod intercept;
pub mod models;
pub mod pagination;

pub use bean::{Bean, Entity, EntityDescriptor, SnakeCaseNaming, TableNaming};
pub use bind::{Arg, DaoInterface, DaoMethod, MethodRegistry, ParamType, ReturnShape};
pub use config::{Config, DaoConfig};
pub use dao::{
    AsyncDao, BoundDao, CommonDao, DaoContext, EntityStream, QueryFuture, Session, StreamDao,
    TransactionExecutor,
};
pub use db::{DataSource, FetchSize, RecordStream};
pub use error::{DaoError, DaoResult};
pub use intercept::{Interceptor, InterceptorChain, Invocation};
pub use models::{Page, PageResult, Record, SqlValue};
pub use pagination::{PaginationDialect, Paginator};
