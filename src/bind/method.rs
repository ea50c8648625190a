//! DAO method metadata, call arguments and resolved SQL commands.

use crate::bean::{Bean, Entity, EntityDescriptor, TableNaming, parse_bean};
use crate::bind::classify::classify_sql;
use crate::error::{DaoError, DaoResult};
use crate::models::{DatabaseType, OperationKind, Page, SqlValue, Statement};
use std::fmt;
use std::sync::Arc;

/// Declared type of one method parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Any scalar value.
    Any,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    /// A bean of the named entity type.
    Bean(&'static str),
    Page,
}

impl ParamType {
    /// Whether a call argument can be passed for this parameter.
    ///
    /// Null fits any scalar parameter and integers widen to floats.
    pub fn accepts(&self, arg: &Arg) -> bool {
        self.match_rank(arg).is_some()
    }

    /// How closely `arg` fits this parameter, `0` being an exact match.
    ///
    /// Widening an integer to a float ranks below an exact match, `Any` below
    /// that. A null argument ranks lowest, with typed parameters ahead of `Any`.
    pub fn match_rank(&self, arg: &Arg) -> Option<u8> {
        match (self, arg) {
            (ParamType::Page, Arg::Page(_)) => Some(0),
            (ParamType::Bean(name), Arg::Bean(bean)) => (bean.type_name() == *name).then_some(0),
            (ParamType::Page | ParamType::Bean(_), _) => None,
            (_, Arg::Page(_) | Arg::Bean(_)) => None,
            (ParamType::Any, Arg::Value(SqlValue::Null)) => Some(4),
            (_, Arg::Value(SqlValue::Null)) => Some(3),
            (ParamType::Any, Arg::Value(_)) => Some(2),
            (ParamType::Float, Arg::Value(SqlValue::Int(_))) => Some(1),
            (ParamType::Bool, Arg::Value(SqlValue::Bool(_)))
            | (ParamType::Int, Arg::Value(SqlValue::Int(_)))
            | (ParamType::Float, Arg::Value(SqlValue::Float(_)))
            | (ParamType::Text, Arg::Value(SqlValue::Text(_)))
            | (ParamType::Bytes, Arg::Value(SqlValue::Bytes(_))) => Some(0),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Any => f.write_str("any"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Int => f.write_str("int"),
            ParamType::Float => f.write_str("float"),
            ParamType::Text => f.write_str("text"),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::Bean(name) => f.write_str(name),
            ParamType::Page => f.write_str("page"),
        }
    }
}

/// What a method hands back to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnShape {
    #[default]
    Records,
    Beans,
    /// At most one bean.
    One,
    Scalar,
    /// Affected-row count.
    Affected,
    Page,
}

impl ReturnShape {
    /// Whether a method declared with this shape can be called for `wanted`.
    ///
    /// Plain row methods serve every row-returning call; the other shapes
    /// only serve their own.
    pub fn allows(self, wanted: ReturnShape) -> bool {
        match self {
            ReturnShape::Records | ReturnShape::Beans => matches!(
                wanted,
                ReturnShape::Records | ReturnShape::Beans | ReturnShape::One
            ),
            declared => declared == wanted,
        }
    }
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnShape::Records => "records",
            ReturnShape::Beans => "beans",
            ReturnShape::One => "one",
            ReturnShape::Scalar => "scalar",
            ReturnShape::Affected => "affected",
            ReturnShape::Page => "page",
        };
        f.write_str(name)
    }
}

/// One method of a DAO contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaoMethod {
    pub interface: &'static str,
    pub name: &'static str,
    pub params: Vec<ParamType>,
    /// Literal SQL; the command is derived from the method name when absent.
    pub sql: Option<&'static str>,
    pub returns: ReturnShape,
}

impl DaoMethod {
    pub fn new(interface: &'static str, name: &'static str) -> Self {
        Self {
            interface,
            name,
            params: Vec::new(),
            sql: None,
            returns: ReturnShape::default(),
        }
    }

    pub fn param(mut self, param: ParamType) -> Self {
        self.params.push(param);
        self
    }

    pub fn sql(mut self, sql: &'static str) -> Self {
        self.sql = Some(sql);
        self
    }

    pub fn returns(mut self, returns: ReturnShape) -> Self {
        self.returns = returns;
        self
    }

    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            interface: self.interface,
            name: self.name,
            params: self.params.clone().into(),
        }
    }

    pub fn accepts(&self, args: &[Arg]) -> bool {
        self.match_ranks(args).is_some()
    }

    /// Per-argument [`ParamType::match_rank`], if every argument fits.
    pub fn match_ranks(&self, args: &[Arg]) -> Option<Vec<u8>> {
        if self.params.len() != args.len() {
            return None;
        }
        self.params
            .iter()
            .zip(args)
            .map(|(param, arg)| param.match_rank(arg))
            .collect()
    }
}

/// Structural identity of a method: interface, name and parameter types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    interface: &'static str,
    name: &'static str,
    params: Arc<[ParamType]>,
}

impl MethodSignature {
    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.interface, self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        f.write_str(")")
    }
}

/// A call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(SqlValue),
    Bean(Bean),
    Page(Page),
}

impl Arg {
    pub fn bean<E: Entity>(entity: &E) -> Self {
        Arg::Bean(entity.to_bean())
    }

    /// The page argument of a call, if any.
    pub fn find_page(args: &[Arg]) -> Option<Page> {
        args.iter().find_map(|arg| match arg {
            Arg::Page(page) => Some(*page),
            _ => None,
        })
    }
}

macro_rules! arg_from_value {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Value(SqlValue::from(value))
                }
            }
        )+
    };
}

arg_from_value!(bool, i32, i64, u32, f32, f64, &str, String, &String, Vec<u8>);

impl<T: Into<SqlValue>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Arg::Value(SqlValue::from(value))
    }
}

impl From<SqlValue> for Arg {
    fn from(value: SqlValue) -> Self {
        Arg::Value(value)
    }
}

impl From<Bean> for Arg {
    fn from(bean: Bean) -> Self {
        Arg::Bean(bean)
    }
}

impl From<Page> for Arg {
    fn from(page: Page) -> Self {
        Arg::Page(page)
    }
}

/// Build a `Vec<Arg>` from values, beans and pages.
///
/// ```ignore
/// dao.fetch_one::<Movie>("get_movie_by_id", args![42]).await?;
/// dao.page::<Movie>("find_all", args![Page::new(2, 20)]).await?;
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::bind::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::bind::Arg::from($arg)),+]
    };
}

/// Where a command's SQL comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSql {
    /// Fixed SQL with `?` placeholders bound from the call's value arguments.
    Literal(String),
    /// SQL generated from the call's bean argument on every call.
    Bean,
}

/// Resolved, cacheable form of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCommand {
    pub sql: CommandSql,
    pub kind: OperationKind,
    /// True when the SQL came verbatim from method metadata.
    pub raw: bool,
}

impl SqlCommand {
    pub fn literal(sql: impl Into<String>, kind: OperationKind, raw: bool) -> Self {
        Self {
            sql: CommandSql::Literal(sql.into()),
            kind,
            raw,
        }
    }

    pub fn bean(kind: OperationKind) -> Self {
        Self {
            sql: CommandSql::Bean,
            kind,
            raw: false,
        }
    }

    /// Statement for one call.
    pub fn statement(&self, args: &[Arg], naming: &dyn TableNaming) -> DaoResult<Statement> {
        match &self.sql {
            CommandSql::Literal(sql) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        Arg::Value(value) => values.push(value.clone()),
                        Arg::Page(_) => {}
                        Arg::Bean(bean) => {
                            return Err(DaoError::configuration(format!(
                                "Bean {} cannot be bound to literal SQL: {}",
                                bean.type_name(),
                                sql
                            )));
                        }
                    }
                }
                Ok(Statement::with_values(sql.as_str(), values))
            }
            CommandSql::Bean => {
                let bean = args
                    .iter()
                    .find_map(|arg| match arg {
                        Arg::Bean(bean) => Some(bean),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        DaoError::configuration(format!(
                            "{} command needs a bean argument",
                            self.kind
                        ))
                    })?;
                parse_bean(bean, self.kind, naming)
            }
        }
    }
}

/// Derive the command for `method`.
///
/// Literal SQL is classified as is. Without SQL the method name must follow a
/// convention and the interface must name an entity.
pub fn derive_command(
    method: &DaoMethod,
    entity: Option<&EntityDescriptor>,
    naming: &dyn TableNaming,
    db_type: DatabaseType,
) -> DaoResult<SqlCommand> {
    if let Some(sql) = method.sql {
        let kind = classify_sql(sql, db_type)?;
        return Ok(SqlCommand::literal(sql, kind, true));
    }

    let entity = entity.ok_or_else(|| {
        DaoError::configuration(format!(
            "{}::{} has no SQL and {} declares no entity",
            method.interface, method.name, method.interface
        ))
    })?;

    let name = method.name;
    match name {
        "insert" | "save" => return Ok(SqlCommand::bean(OperationKind::Insert)),
        "update" => return Ok(SqlCommand::bean(OperationKind::Update)),
        "delete" => return Ok(SqlCommand::bean(OperationKind::Delete)),
        "select" => return Ok(SqlCommand::bean(OperationKind::Select)),
        _ => {}
    }

    let table = entity.table_name(naming)?;
    let (sql, kind) = if name == "delete_by_id" {
        (
            format!("DELETE FROM {} WHERE {} = ?", table, entity.key),
            OperationKind::Delete,
        )
    } else if is_get_by_id(name) {
        (
            format!("SELECT * FROM {} WHERE {} = ?", table, entity.key),
            OperationKind::Select,
        )
    } else if matches!(name, "find_all" | "get_all" | "list_all") {
        (format!("SELECT * FROM {}", table), OperationKind::Select)
    } else if name == "count" {
        (format!("SELECT COUNT(*) FROM {}", table), OperationKind::Select)
    } else {
        return Err(DaoError::configuration(format!(
            "{}::{} has no SQL and its name follows no convention",
            method.interface, method.name
        )));
    };
    Ok(SqlCommand::literal(sql, kind, false))
}

/// `get_by_id`, `find_by_id`, `get_movie_by_id`, `find_movie_by_id`.
fn is_get_by_id(name: &str) -> bool {
    ["get_", "find_"]
        .iter()
        .any(|prefix| name.starts_with(prefix) && name.ends_with("by_id"))
}
