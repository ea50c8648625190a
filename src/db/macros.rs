//! Database dispatch macros for reducing code duplication.
//!
//! The three backends expose the same operations through different concrete
//! `sqlx` types. These macros expand one body per backend at compile time, with
//! the backend's own parameter binder in scope.

/// Run `$body` against the concrete connection inside a [`ConnRef`].
///
/// `$c` is bound to the backend connection (`&mut MySqlConnection`, ...) and
/// `$bind` to the matching `bind_*_param` function.
///
/// # Example
///
/// ```ignore
/// with_conn!(conn, |c, bind| {
///     let mut query = sqlx::query(sql);
///     for value in values {
///         query = bind(query, value);
///     }
///     query.execute(&mut *c).await.map(|r| r.rows_affected())
/// })
/// ```
///
/// [`ConnRef`]: crate::db::pool::ConnRef
#[macro_export]
macro_rules! with_conn {
    ($conn:expr, |$c:ident, $bind:ident| $body:expr) => {
        match $conn {
            $crate::db::pool::ConnRef::MySql($c) => {
                #[allow(unused_imports)]
                use $crate::db::params::bind_mysql_param as $bind;
                $body
            }
            $crate::db::pool::ConnRef::Postgres($c) => {
                #[allow(unused_imports)]
                use $crate::db::params::bind_postgres_param as $bind;
                $body
            }
            $crate::db::pool::ConnRef::SQLite($c) => {
                #[allow(unused_imports)]
                use $crate::db::params::bind_sqlite_param as $bind;
                $body
            }
        }
    };
}

/// Macro for generating database dispatch match arms over `DbPool` variants.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => p.close().await,
///     Postgres(p) => p.close().await,
///     SQLite(p) => p.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
pub use with_conn;
