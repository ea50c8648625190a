//! Statement grammar: bound parameters, generated statements and bean projections.

use crate::models::value::{SqlType, SqlValue};
use serde::Serialize;

/// Kind of SQL operation a statement or command performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Select)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A bound parameter: column (or positional) name, declared type and value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub sql_type: SqlType,
    pub value: SqlValue,
}

impl Parameter {
    /// Create a parameter whose declared type is the runtime type of `value`.
    pub fn new(name: impl Into<String>, value: SqlValue) -> Self {
        Self {
            name: name.into(),
            sql_type: value.sql_type(),
            value,
        }
    }

    /// Create an unnamed parameter at `index` (1-based), as used for literal SQL.
    pub fn positional(index: usize, value: SqlValue) -> Self {
        Self::new(format!("?{}", index), value)
    }
}

/// SQL text plus its ordered parameters.
///
/// Parameter order always matches `?` placeholder order in `sql`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    sql: String,
    parameters: Vec<Parameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    /// Statement without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// Statement for literal SQL with positional values.
    pub fn with_values(sql: impl Into<String>, values: Vec<SqlValue>) -> Self {
        let parameters = values
            .into_iter()
            .enumerate()
            .map(|(idx, value)| Parameter::positional(idx + 1, value))
            .collect();
        Self::new(sql, parameters)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn values(&self) -> Vec<SqlValue> {
        self.parameters.iter().map(|p| p.value.clone()).collect()
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameters.is_empty()
    }

    /// Same parameters with different SQL text (pagination rewrites).
    pub fn with_sql(&self, sql: impl Into<String>) -> Self {
        Self::new(sql, self.parameters.clone())
    }
}

/// Sparse column/value view of a bean: only non-null fields, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct BeanProjection {
    pub table: String,
    pub key: &'static str,
    columns: Vec<(&'static str, SqlValue)>,
}

impl BeanProjection {
    pub fn new(table: impl Into<String>, key: &'static str) -> Self {
        Self {
            table: table.into(),
            key,
            columns: Vec::new(),
        }
    }

    /// Add a column; null values are skipped.
    pub fn push(&mut self, column: &'static str, value: SqlValue) {
        if !value.is_null() {
            self.columns.push((column, value));
        }
    }

    pub fn columns(&self) -> &[(&'static str, SqlValue)] {
        &self.columns
    }

    pub fn key_value(&self) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| *name == self.key)
            .map(|(_, value)| value)
    }

    /// Non-null columns other than the key.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &(&'static str, SqlValue)> {
        self.columns.iter().filter(move |(name, _)| *name != self.key)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}
