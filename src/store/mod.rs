//! Row Store Gateway: typed rows, predicates and the storage trait the
//! checks talk to.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::AppResult;

pub mod sql;
pub mod sqlite;

pub use sqlite::SqliteStore;

/// Scalar column value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Integer view used for uid/pid/flag columns. Null and unparsable text read as 0.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Null => 0,
            Value::Int(v) => *v,
            Value::Bool(b) => i64::from(*b),
            Value::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", i64::from(*b)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// An ordered column -> value mapping read from one table row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing an existing column of the same name.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Integer value of `column`; absent columns read as 0.
    pub fn int(&self, column: &str) -> i64 {
        self.get(column).map(Value::as_int).unwrap_or(0)
    }

    pub fn text(&self, column: &str) -> String {
        self.get(column).map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn uid(&self) -> i64 {
        self.int("uid")
    }

    pub fn pid(&self) -> i64 {
        self.int("pid")
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// One term of a [`Predicate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    Gt(String, i64),
    Lt(String, i64),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
    /// Disjunction of nested conditions.
    Any(Vec<Condition>),
}

/// Conjunction of conditions. An empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn uid(uid: i64) -> Self {
        Self::all().eq("uid", uid)
    }

    pub fn push(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(Condition::Eq(column.to_string(), value.into()))
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(Condition::Ne(column.to_string(), value.into()))
    }

    pub fn gt(self, column: &str, value: i64) -> Self {
        self.push(Condition::Gt(column.to_string(), value))
    }

    pub fn lt(self, column: &str, value: i64) -> Self {
        self.push(Condition::Lt(column.to_string(), value))
    }

    pub fn is_in(self, column: &str, values: Vec<Value>) -> Self {
        self.push(Condition::In(column.to_string(), values))
    }

    pub fn any(self, conditions: Vec<Condition>) -> Self {
        self.push(Condition::Any(conditions))
    }

    /// Adds `column = value` only when `column` is present; used for optional soft-delete fields.
    pub fn eq_if(self, column: Option<&str>, value: i64) -> Self {
        match column {
            Some(column) => self.eq(column, value),
            None => self,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Ascending sort key; detection output is always ordered by ascending uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }
}

/// Storage capability consumed by checks and resolvers.
///
/// Implementations execute one statement per call; no transaction spans calls.
pub trait RowStore {
    /// Fetches a single row; `Ok(None)` is the not-found signal.
    fn select_one(
        &self,
        table: &str,
        columns: &[&str],
        predicate: &Predicate,
    ) -> AppResult<Option<Row>>;

    fn select_many(
        &self,
        table: &str,
        columns: &[&str],
        predicate: &Predicate,
        order_by: &[OrderBy],
    ) -> AppResult<Vec<Row>>;

    /// Updates the row with primary key `uid`, returning the affected row count.
    fn update(&self, table: &str, uid: i64, values: &[(String, Value)]) -> AppResult<usize>;

    /// Deletes the row with primary key `uid`, returning the affected row count.
    fn delete(&self, table: &str, uid: i64) -> AppResult<usize>;

    fn table_exists(&self, table: &str) -> AppResult<bool>;

    fn field_exists(&self, table: &str, field: &str) -> AppResult<bool>;

    /// Convenience lookup by primary key.
    fn find_by_uid(&self, table: &str, columns: &[&str], uid: i64) -> AppResult<Option<Row>> {
        self.select_one(table, columns, &Predicate::uid(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_keeps_insertion_order_and_replaces_in_place() {
        let row = Row::new()
            .with("uid", 3)
            .with("pid", 1)
            .with("title", "About")
            .with("pid", 2);
        let names: Vec<_> = row.columns().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["uid", "pid", "title"]);
        assert_eq!(row.pid(), 2);
        assert_eq!(row.text("title"), "About");
    }

    #[test]
    fn int_view_tolerates_missing_and_text_values() {
        let row = Row::new().with("deleted", Value::Null).with("pid", "17");
        assert_eq!(row.int("deleted"), 0);
        assert_eq!(row.int("pid"), 17);
        assert_eq!(row.int("absent"), 0);
    }

    #[test]
    fn row_serializes_as_ordered_object() {
        let row = Row::new().with("uid", 5).with("title", "Home");
        let json = serde_json::to_string(&row).expect("serialize row");
        assert_eq!(json, r#"{"uid":5,"title":"Home"}"#);
    }
}
