//! Demo: a shopping trip from list creation to cleanup
//!
//! Run with: cargo run --example basic_usage

use eyre::Result;
use shoplist::{ALL_CATEGORIES, Store, now_ms};

fn main() -> Result<()> {
    // Create a temporary directory for this demo
    let temp_dir = tempfile::tempdir()?;
    let store_path = temp_dir.path().to_path_buf();

    println!("shoplist basic usage");
    println!("====================\n");
    println!("Store path: {}\n", store_path.display());

    let mut store = Store::open(&store_path)?;

    println!("1. CREATE - a list due tomorrow with three items");
    let list = store.create_list("Grocery Shopping", Some(now_ms() + 86_400_000))?;
    let milk = store.create_item(&list, "Milk", "Groceries", 2.0, "piece")?;
    store.create_item(&list, "Bread", "Groceries", 1.0, "piece")?;
    store.create_item(&list, "Batteries", "Electronics", 4.0, "piece")?;
    println!("   Created list {}\n", list);

    println!("2. COMPLETE - tick off the milk");
    store.set_item_completion(&milk, true)?;
    for item in store.list_items(&list, Some(ALL_CATEGORIES))? {
        let mark = if item.is_completed { "x" } else { " " };
        println!("   [{}] {} ({}, {:.1} {})", mark, item.name, item.category, item.quantity, item.unit);
    }
    println!();

    println!("3. FILTER - electronics only");
    for item in store.list_items(&list, Some("Electronics"))? {
        println!("   - {}", item.name);
    }
    println!();

    println!("4. UPDATE - rename the list");
    store.update_list(&list, "Weekend Groceries", None)?;
    println!("   Now called: {}\n", store.get_list(&list)?.name);

    println!("5. DELETE - remove the list and its items");
    store.delete_list(&list)?;
    store.commit()?;
    println!("   Lists remaining: {}", store.list_all_lists()?.len());

    println!("\nDemo complete!");
    Ok(())
}
