// Sorted and filtered read views over the store

use crate::error::StoreResult;
use crate::filter::{Filter, Sort};
use crate::models::{ALL_CATEGORIES, ListId, ListSummary, ShoppingItem, ShoppingList};
use crate::store::Store;
use std::collections::{BTreeSet, HashMap};

/// Open entries first, then newest first. Ids are UUIDv7, so the id
/// tie-break keeps equal timestamps in creation order, newest first.
const DISPLAY_ORDER: [Sort; 2] = [Sort::asc("is_completed"), Sort::desc("timestamp")];

impl Store {
    /// Every list, incomplete first, newest first within each group
    pub fn list_all_lists(&self) -> StoreResult<Vec<ShoppingList>> {
        self.list_records_sorted(&[], &DISPLAY_ORDER)
    }

    /// Items of one list in display order.
    ///
    /// `category` of `None` or `Some("All")` returns every item; any other
    /// value keeps only exact, case-sensitive matches.
    pub fn list_items(&self, list_id: &ListId, category: Option<&str>) -> StoreResult<Vec<ShoppingItem>> {
        self.get_list(list_id)?;

        let mut filters = vec![Filter::eq_str("list_id", list_id.as_str())];
        if let Some(category) = category.filter(|c| *c != ALL_CATEGORIES) {
            filters.push(Filter::eq_str("category", category));
        }

        self.list_records_sorted(&filters, &DISPLAY_ORDER)
    }

    /// Every list in display order with its item counts
    pub fn list_summaries(&self) -> StoreResult<Vec<ListSummary>> {
        let items: Vec<ShoppingItem> = self.list_records(&[])?;

        let mut counts: HashMap<&ListId, (usize, usize)> = HashMap::new();
        for item in &items {
            let entry = counts.entry(&item.list_id).or_default();
            entry.0 += 1;
            if item.is_completed {
                entry.1 += 1;
            }
        }

        Ok(self
            .list_all_lists()?
            .into_iter()
            .map(|list| {
                let (item_count, completed_count) = counts.get(&list.id).copied().unwrap_or_default();
                ListSummary {
                    list,
                    item_count,
                    completed_count,
                }
            })
            .collect())
    }

    /// Distinct categories used by a list's items, sorted
    pub fn categories_in_list(&self, list_id: &ListId) -> StoreResult<Vec<String>> {
        let categories: BTreeSet<String> = self
            .list_items(list_id, None)?
            .into_iter()
            .map(|item| item.category)
            .collect();
        Ok(categories.into_iter().collect())
    }
}
