//! Statement interceptors.
//!
//! Every statement a DAO runs passes through the context's interceptor chain
//! right before it is built on a connection. Interceptors run in registration
//! order and may replace the statement. The [`Paginator`](crate::Paginator)
//! is the built-in interceptor: it consumes the page of a paged call.

use crate::error::{DaoError, DaoResult};
use crate::models::{DatabaseType, Page, Statement};
use std::sync::Arc;
use tracing::debug;

/// A statement on its way to the driver.
#[derive(Debug, Clone)]
pub struct Invocation {
    db_type: DatabaseType,
    statement: Statement,
    page: Option<Page>,
}

impl Invocation {
    pub fn new(db_type: DatabaseType, statement: Statement, page: Option<Page>) -> Self {
        Self {
            db_type,
            statement,
            page,
        }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    pub fn set_statement(&mut self, statement: Statement) {
        self.statement = statement;
    }

    /// Page still waiting to be applied.
    pub fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    /// Take the page; the taker is responsible for restricting the statement.
    pub fn take_page(&mut self) -> Option<Page> {
        self.page.take()
    }
}

/// Hook run on every statement before it is built.
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    fn intercept(&self, invocation: &mut Invocation) -> DaoResult<()>;
}

/// Ordered interceptors of one context.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `interceptor` to the end of the chain.
    pub fn register(&mut self, interceptor: impl Interceptor + 'static) -> &mut Self {
        debug!(interceptor = interceptor.name(), "Registered interceptor");
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Put `interceptor` where the one of the same name sits, or at the end.
    pub fn replace(&mut self, interceptor: impl Interceptor + 'static) -> &mut Self {
        let name = interceptor.name();
        match self.interceptors.iter().position(|i| i.name() == name) {
            Some(idx) => self.interceptors[idx] = Arc::new(interceptor),
            None => {
                self.register(interceptor);
            }
        }
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain over `statement`.
    ///
    /// A page no interceptor took is a configuration error: the call would
    /// otherwise return every row.
    pub fn apply(
        &self,
        db_type: DatabaseType,
        statement: Statement,
        page: Option<Page>,
    ) -> DaoResult<Statement> {
        let mut invocation = Invocation::new(db_type, statement, page);
        for interceptor in &self.interceptors {
            interceptor.intercept(&mut invocation)?;
        }
        if invocation.page.is_some() {
            return Err(DaoError::configuration(
                "Paged call but no interceptor applies pages",
            ));
        }
        Ok(invocation.statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SqlValue;

    struct Comment(&'static str);

    impl Interceptor for Comment {
        fn name(&self) -> &'static str {
            "comment"
        }

        fn intercept(&self, invocation: &mut Invocation) -> DaoResult<()> {
            let sql = format!("/* {} */ {}", self.0, invocation.statement().sql());
            let statement = invocation.statement().with_sql(sql);
            invocation.set_statement(statement);
            Ok(())
        }
    }

    struct Reject;

    impl Interceptor for Reject {
        fn name(&self) -> &'static str {
            "reject"
        }

        fn intercept(&self, _invocation: &mut Invocation) -> DaoResult<()> {
            Err(DaoError::configuration("rejected"))
        }
    }

    #[test]
    fn test_chain_runs_in_order() {
        let mut chain = InterceptorChain::new();
        chain.register(Comment("first")).register(Comment("second"));
        assert_eq!(chain.names(), vec!["comment", "comment"]);

        let statement = Statement::with_values("SELECT * FROM movies WHERE id = ?", vec![SqlValue::Int(1)]);
        let out = chain.apply(DatabaseType::SQLite, statement, None).unwrap();
        assert_eq!(out.sql(), "/* second */ /* first */ SELECT * FROM movies WHERE id = ?");
        assert_eq!(out.values(), vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut chain = InterceptorChain::new();
        chain.register(Comment("old")).register(Reject);
        chain.replace(Comment("new"));
        assert_eq!(chain.names(), vec!["comment", "reject"]);
        assert!(chain.apply(DatabaseType::SQLite, Statement::raw("SELECT 1"), None).is_err());
    }

    #[test]
    fn test_unconsumed_page_is_rejected() {
        let chain = InterceptorChain::new();
        let err = chain
            .apply(DatabaseType::SQLite, Statement::raw("SELECT 1"), Some(Page::default()))
            .unwrap_err();
        assert!(matches!(err, DaoError::Configuration { .. }));

        let out = chain.apply(DatabaseType::SQLite, Statement::raw("SELECT 1"), None).unwrap();
        assert_eq!(out.sql(), "SELECT 1");
    }
}
