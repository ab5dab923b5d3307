// Data models for shopping lists and their items

use crate::error::{StoreError, StoreResult};
use crate::record::{IndexValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Category sentinel meaning "do not filter"
pub const ALL_CATEGORIES: &str = "All";

/// Categories offered by front ends. Not enforced by the store.
pub const SUGGESTED_CATEGORIES: &[&str] = &["Groceries", "Electronics", "Clothing", "Home", "Other"];

/// Units offered by front ends. Not enforced by the store.
pub const SUGGESTED_UNITS: &[&str] = &["piece", "kg", "liter", "gram", "ml"];

pub const DEFAULT_UNIT: &str = "piece";

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub(crate) fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(ListId);
string_id!(ItemId);

/// A named, date-stamped container of items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: ListId,
    pub name: String,
    pub timestamp: i64,
    pub due_date: Option<i64>,
    pub is_completed: bool,
    pub completed_date: Option<i64>,
    pub updated_at: i64,
}

/// A single purchasable entry owned by one list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub id: ItemId,
    pub list_id: ListId,
    pub name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    pub timestamp: i64,
    pub is_completed: bool,
    pub completed_date: Option<i64>,
    pub updated_at: i64,
}

/// A list together with counts of the items it owns
#[derive(Debug, Clone, PartialEq)]
pub struct ListSummary {
    pub list: ShoppingList,
    pub item_count: usize,
    pub completed_count: usize,
}

impl Record for ShoppingList {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "lists"
    }

    fn kind() -> &'static str {
        "list"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("is_completed".to_string(), IndexValue::Bool(self.is_completed));
        fields.insert("timestamp".to_string(), IndexValue::Int(self.timestamp));
        fields
    }
}

impl Record for ShoppingItem {
    fn id(&self) -> &str {
        self.id.as_str()
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "items"
    }

    fn kind() -> &'static str {
        "item"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("list_id".to_string(), IndexValue::String(self.list_id.to_string()));
        fields.insert("category".to_string(), IndexValue::String(self.category.clone()));
        fields.insert("is_completed".to_string(), IndexValue::Bool(self.is_completed));
        fields.insert("timestamp".to_string(), IndexValue::Int(self.timestamp));
        fields
    }
}

/// Reject empty and whitespace-only names
pub(crate) fn validate_name(name: &str, what: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::validation(format!("{} name cannot be empty", what)));
    }
    Ok(())
}

pub(crate) fn validate_quantity(quantity: f64) -> StoreResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(StoreError::validation(format!(
            "quantity must be a positive number, got {}",
            quantity
        )));
    }
    Ok(())
}

/// New `completed_date` after setting the completion flag.
///
/// Stamped on false -> true, cleared on true -> false, untouched otherwise.
pub(crate) fn next_completed_date(was_completed: bool, current: Option<i64>, completed: bool, now: i64) -> Option<i64> {
    match (was_completed, completed) {
        (false, true) => Some(now),
        (true, false) => None,
        (true, true) => current.or(Some(now)),
        (false, false) => None,
    }
}

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
