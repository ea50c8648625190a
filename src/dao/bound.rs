//! DAO interfaces bound to a data source.

use crate::bean::Entity;
use crate::bind::{Arg, DaoInterface, ReturnShape, SqlCommand, derive_command};
use crate::dao::session::first_scalar;
use crate::dao::{CommonDao, Session, map_records};
use crate::error::{DaoError, DaoResult};
use crate::models::{PageResult, Record, Statement};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Callable methods of interface `I`.
///
/// Obtained from [`CommonDao::get_dao`]. Each call resolves the overload for
/// its arguments, fetches or derives the cached command and runs it on a
/// fresh connection. [`BoundDao::on`] runs the same calls on an existing
/// [`Session`], for instance inside a transaction.
#[derive(Debug)]
pub struct BoundDao<I> {
    dao: CommonDao,
    _interface: PhantomData<fn() -> I>,
}

impl<I> Clone for BoundDao<I> {
    fn clone(&self) -> Self {
        Self {
            dao: self.dao.clone(),
            _interface: PhantomData,
        }
    }
}

/// Resolved call: the cached command and its statement for these arguments.
struct Call {
    command: Arc<SqlCommand>,
    statement: Statement,
    returns: ReturnShape,
}

impl<I: DaoInterface> BoundDao<I> {
    pub(crate) fn new(dao: CommonDao) -> Self {
        Self {
            dao,
            _interface: PhantomData,
        }
    }

    pub fn common(&self) -> &CommonDao {
        &self.dao
    }

    /// Calls of this interface on `session`.
    pub fn on<'b, 'c>(&'b self, session: &'b mut Session<'c>) -> BoundSession<'b, 'c, I> {
        BoundSession {
            bound: self,
            session,
        }
    }

    async fn prepare(&self, method: &'static str, args: &[Arg]) -> DaoResult<Call> {
        let context = self.dao.context().as_ref();
        let registry = context.registry();
        let signature = registry.resolve(I::NAME, method, args).await?;
        let returns = registry.lookup(&signature).await?.returns;
        let command = registry
            .command(&signature, |declared| async move {
                derive_command(&declared, I::entity(), context.naming(), context.db_type())
            })
            .await?;
        let statement = command.statement(args, context.naming())?;
        debug!(
            signature = %signature,
            kind = %command.kind,
            sql = %statement.sql(),
            "Resolved call"
        );
        Ok(Call {
            command,
            statement,
            returns,
        })
    }

    pub async fn records(&self, method: &'static str, args: Vec<Arg>) -> DaoResult<Vec<Record>> {
        let mut conn = self.dao.acquire().await?;
        let mut session = self.dao.session(&mut conn);
        self.on(&mut session).records(method, args).await
    }

    pub async fn fetch_all<T>(&self, method: &'static str, args: Vec<Arg>) -> DaoResult<Vec<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let mut conn = self.dao.acquire().await?;
        let mut session = self.dao.session(&mut conn);
        self.on(&mut session).fetch_all(method, args).await
    }

    pub async fn fetch_one<T>(&self, method: &'static str, args: Vec<Arg>) -> DaoResult<Option<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let mut conn = self.dao.acquire().await?;
        let mut session = self.dao.session(&mut conn);
        self.on(&mut session).fetch_one(method, args).await
    }

    pub async fn scalar<T>(&self, method: &'static str, args: Vec<Arg>) -> DaoResult<T>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.dao.acquire().await?;
        let mut session = self.dao.session(&mut conn);
        self.on(&mut session).scalar(method, args).await
    }

    pub async fn execute(&self, method: &'static str, args: Vec<Arg>) -> DaoResult<u64> {
        let mut conn = self.dao.acquire().await?;
        let mut session = self.dao.session(&mut conn);
        self.on(&mut session).execute(method, args).await
    }

    pub async fn page<T>(&self, method: &'static str, args: Vec<Arg>) -> DaoResult<PageResult<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let mut conn = self.dao.acquire().await?;
        let mut session = self.dao.session(&mut conn);
        self.on(&mut session).page(method, args).await
    }
}

/// Calls of interface `I` on a borrowed [`Session`].
pub struct BoundSession<'b, 'c, I> {
    bound: &'b BoundDao<I>,
    session: &'b mut Session<'c>,
}

impl<I: DaoInterface> BoundSession<'_, '_, I> {
    async fn call(&self, method: &'static str, args: &[Arg], wanted: ReturnShape) -> DaoResult<Call> {
        let call = self.bound.prepare(method, args).await?;
        if !call.returns.allows(wanted) {
            return Err(DaoError::configuration(format!(
                "{}::{} is declared to return {}, not {}",
                I::NAME,
                method,
                call.returns,
                wanted
            )));
        }
        Ok(call)
    }

    async fn query_call(
        &self,
        method: &'static str,
        args: &[Arg],
        wanted: ReturnShape,
    ) -> DaoResult<Statement> {
        let call = self.call(method, args, wanted).await?;
        if !call.command.kind.is_query() {
            return Err(DaoError::configuration(format!(
                "{}::{} is a {} method and returns no rows",
                I::NAME,
                method,
                call.command.kind
            )));
        }
        Ok(call.statement)
    }

    pub async fn records(&mut self, method: &'static str, args: Vec<Arg>) -> DaoResult<Vec<Record>> {
        let statement = self.query_call(method, &args, ReturnShape::Records).await?;
        self.session.fetch_statement(&statement).await
    }

    pub async fn fetch_all<T>(&mut self, method: &'static str, args: Vec<Arg>) -> DaoResult<Vec<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let statement = self.query_call(method, &args, ReturnShape::Beans).await?;
        let records = self.session.fetch_statement(&statement).await?;
        map_records(&records)
    }

    /// First row mapped onto `T`, if any.
    pub async fn fetch_one<T>(&mut self, method: &'static str, args: Vec<Arg>) -> DaoResult<Option<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let statement = self.query_call(method, &args, ReturnShape::One).await?;
        let records = self.session.fetch_statement(&statement).await?;
        records
            .first()
            .map(crate::bean::from_record::<T>)
            .transpose()
    }

    pub async fn scalar<T>(&mut self, method: &'static str, args: Vec<Arg>) -> DaoResult<T>
    where
        T: DeserializeOwned,
    {
        let statement = self.query_call(method, &args, ReturnShape::Scalar).await?;
        let records = self.session.fetch_statement(&statement).await?;
        first_scalar(&records, statement.sql())
    }

    /// Affected-row count of a write method.
    pub async fn execute(&mut self, method: &'static str, args: Vec<Arg>) -> DaoResult<u64> {
        let call = self.call(method, &args, ReturnShape::Affected).await?;
        if call.command.kind.is_query() {
            return Err(DaoError::configuration(format!(
                "{}::{} is a query method; fetch its rows instead",
                I::NAME,
                method
            )));
        }
        self.session.execute_statement(&call.statement).await
    }

    /// The page named by the call's page argument, the first page otherwise.
    pub async fn page<T>(&mut self, method: &'static str, args: Vec<Arg>) -> DaoResult<PageResult<T>>
    where
        T: Entity + DeserializeOwned,
    {
        let page = Arg::find_page(&args).unwrap_or_default();
        let statement = self.query_call(method, &args, ReturnShape::Page).await?;
        let result = self.session.page_statement(&statement, page).await?;
        let items = map_records(&result.items)?;
        Ok(PageResult::new(page, result.total, items))
    }
}
