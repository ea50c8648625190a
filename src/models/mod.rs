//! Data models shared across the crate.
//!
//! This module re-exports the grammar, value, row and page types.

pub mod connection;
pub mod grammar;
pub mod page;
pub mod record;
pub mod value;

pub use connection::{ConcurMode, DatabaseType, FetchDirection};
pub use grammar::{BeanProjection, OperationKind, Parameter, Statement};
pub use page::{DEFAULT_PAGE_SIZE, Page, PageResult};
pub use record::Record;
pub use value::{SqlType, SqlValue};
