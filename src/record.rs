// Record trait shared by lists and items

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// A type the store can persist to a JSONL log and index in SQLite
pub trait Record: Serialize + DeserializeOwned + Clone {
    /// Unique identifier for this record
    fn id(&self) -> &str;

    /// Milliseconds since epoch of the last write; later writes win on replay
    fn updated_at(&self) -> i64;

    /// Collection name, which is also the log file stem: {collection}.jsonl
    fn collection_name() -> &'static str
    where
        Self: Sized;

    /// Human-readable kind used in not-found errors
    fn kind() -> &'static str
    where
        Self: Sized;

    /// Fields written to `record_indexes` so queries can filter on them
    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

/// Value types that can be indexed for filtering
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Column of `record_indexes` holding this kind of value
    pub(crate) fn column(&self) -> &'static str {
        match self {
            IndexValue::String(_) => "field_value_str",
            IndexValue::Int(_) => "field_value_int",
            IndexValue::Bool(_) => "field_value_bool",
        }
    }

    pub(crate) fn to_sql_value(&self) -> rusqlite::types::Value {
        match self {
            IndexValue::String(s) => rusqlite::types::Value::Text(s.clone()),
            IndexValue::Int(i) => rusqlite::types::Value::Integer(*i),
            IndexValue::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        }
    }
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_value_display() {
        assert_eq!(IndexValue::String("Groceries".to_string()).to_string(), "Groceries");
        assert_eq!(IndexValue::Int(42).to_string(), "42");
        assert_eq!(IndexValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_index_value_columns() {
        assert_eq!(IndexValue::String("x".to_string()).column(), "field_value_str");
        assert_eq!(IndexValue::Int(1).column(), "field_value_int");
        assert_eq!(IndexValue::Bool(false).column(), "field_value_bool");
    }

    #[test]
    fn test_bool_binds_as_integer() {
        assert_eq!(IndexValue::Bool(true).to_sql_value(), rusqlite::types::Value::Integer(1));
        assert_eq!(IndexValue::Bool(false).to_sql_value(), rusqlite::types::Value::Integer(0));
    }
}
