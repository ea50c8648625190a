//! Method binding: DAO contracts, call resolution and cached SQL commands.

pub mod classify;
pub mod method;
pub mod registry;

pub use classify::classify_sql;
pub use method::{
    Arg, CommandSql, DaoMethod, MethodSignature, ParamType, ReturnShape, SqlCommand,
    derive_command,
};
pub use registry::MethodRegistry;

use crate::bean::EntityDescriptor;

/// A DAO contract: a named set of methods, optionally tied to one entity.
///
/// ```ignore
/// struct MovieDao;
///
/// impl DaoInterface for MovieDao {
///     const NAME: &'static str = "MovieDao";
///
///     fn entity() -> Option<&'static EntityDescriptor> {
///         Some(Movie::descriptor())
///     }
///
///     fn methods() -> Vec<DaoMethod> {
///         vec![
///             DaoMethod::new(Self::NAME, "get_movie_by_id")
///                 .param(ParamType::Int)
///                 .returns(ReturnShape::One),
///             DaoMethod::new(Self::NAME, "find_all")
///                 .param(ParamType::Page)
///                 .returns(ReturnShape::Page),
///         ]
///     }
/// }
/// ```
pub trait DaoInterface: Send + Sync + 'static {
    const NAME: &'static str;

    /// Entity used for SQL derived from method names.
    fn entity() -> Option<&'static EntityDescriptor> {
        None
    }

    fn methods() -> Vec<DaoMethod>;
}
