// shoplist - Shopping lists persisted as JSONL logs with a SQLite index

pub mod config;
pub mod error;
pub mod filter;
pub mod jsonl;
pub mod models;
pub mod query;
pub mod record;
pub mod store;

// Re-export main types for convenience
pub use config::Config;
pub use error::{PersistenceError, StoreError, StoreResult};
pub use filter::{Filter, Sort};
pub use models::{
    ALL_CATEGORIES, DEFAULT_UNIT, ItemId, ListId, ListSummary, SUGGESTED_CATEGORIES, SUGGESTED_UNITS, ShoppingItem,
    ShoppingList, now_ms,
};
pub use record::{IndexValue, Record};
pub use store::Store;
