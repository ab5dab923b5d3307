use chrono::{DateTime, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use shoplist::{
    ALL_CATEGORIES, Config, ItemId, ListId, SUGGESTED_CATEGORIES, SUGGESTED_UNITS, ShoppingItem, Store,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shoplist")]
#[command(about = "shoplist CLI - Shopping lists stored locally as JSONL logs with a SQLite index")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to the store directory (default: from config, else the user data dir)
    #[arg(short, long)]
    store_path: Option<PathBuf>,

    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show all lists, open ones first
    Lists,

    /// Create a list
    AddList {
        name: String,
        /// Due date as YYYY-MM-DD
        #[arg(short, long)]
        due: Option<String>,
    },

    /// Rename a list and set (or clear) its due date
    EditList {
        id: String,
        name: String,
        #[arg(short, long)]
        due: Option<String>,
    },

    /// Mark a list completed
    DoneList { id: String },

    /// Mark a list not completed
    UndoList { id: String },

    /// Delete a list and all its items
    RmList { id: String },

    /// Show the items of a list
    Items {
        list_id: String,
        /// Only show this category ("All" shows everything)
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Add an item to a list
    AddItem {
        list_id: String,
        name: String,
        #[arg(short, long, default_value = "Other")]
        category: String,
        #[arg(short, long, default_value_t = 1.0)]
        quantity: f64,
        /// Defaults to the configured default unit
        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Edit an item; omitted fields keep their current value
    EditItem {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        quantity: Option<f64>,
        #[arg(short, long)]
        unit: Option<String>,
    },

    /// Mark an item completed
    DoneItem { id: String },

    /// Mark an item not completed
    UndoItem { id: String },

    /// Delete an item
    RmItem { id: String },

    /// Rebuild the SQLite index from the JSONL logs
    Sync,

    /// Add sample lists and items
    Seed,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_max_level(config.effective_log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let store_path = config.resolve_store_path(cli.store_path)?;
    let mut store = Store::open(&store_path).context(format!("Failed to open store at {}", store_path.display()))?;

    match cli.command {
        Commands::Lists => print_lists(&store)?,
        Commands::AddList { name, due } => {
            let id = store.create_list(&name, parse_due(due.as_deref())?)?;
            println!("Created list {}", id);
        }
        Commands::EditList { id, name, due } => {
            store.update_list(&ListId::from(id), &name, parse_due(due.as_deref())?)?;
            println!("List updated");
        }
        Commands::DoneList { id } => {
            store.set_list_completion(&ListId::from(id), true)?;
            println!("List completed");
        }
        Commands::UndoList { id } => {
            store.set_list_completion(&ListId::from(id), false)?;
            println!("List reopened");
        }
        Commands::RmList { id } => {
            store.delete_list(&ListId::from(id))?;
            println!("List deleted");
        }
        Commands::Items { list_id, category } => print_items(&store, &ListId::from(list_id), category.as_deref())?,
        Commands::AddItem {
            list_id,
            name,
            category,
            quantity,
            unit,
        } => {
            let unit = unit.unwrap_or_else(|| config.default_unit.clone());
            let id = store.create_item(&ListId::from(list_id), &name, &category, quantity, &unit)?;
            println!("Created item {}", id);
        }
        Commands::EditItem {
            id,
            name,
            category,
            quantity,
            unit,
        } => {
            let id = ItemId::from(id);
            let current = store.get_item(&id)?;
            store.update_item(
                &id,
                name.as_deref().unwrap_or(&current.name),
                category.as_deref().unwrap_or(&current.category),
                quantity.unwrap_or(current.quantity),
                unit.as_deref().unwrap_or(&current.unit),
            )?;
            println!("Item updated");
        }
        Commands::DoneItem { id } => {
            store.set_item_completion(&ItemId::from(id), true)?;
            println!("Item completed");
        }
        Commands::UndoItem { id } => {
            store.set_item_completion(&ItemId::from(id), false)?;
            println!("Item reopened");
        }
        Commands::RmItem { id } => {
            store.delete_item(&ItemId::from(id))?;
            println!("Item deleted");
        }
        Commands::Sync => {
            println!("Rebuilding index from JSONL logs...");
            store.sync()?;
            println!("Sync complete");
        }
        Commands::Seed => {
            let ids = store.seed_sample_data()?;
            println!("Added {} sample lists", ids.len());
        }
    }

    store.commit()?;
    Ok(())
}

fn parse_due(due: Option<&str>) -> Result<Option<i64>> {
    due.map(|s| {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").context(format!("Invalid due date {:?}, expected YYYY-MM-DD", s))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| eyre!("Invalid due date {:?}", s))?;
        Ok(midnight.and_utc().timestamp_millis())
    })
    .transpose()
}

fn format_date(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn checkbox(done: bool) -> colored::ColoredString {
    if done { "[x]".green() } else { "[ ]".normal() }
}

fn print_lists(store: &Store) -> Result<()> {
    let summaries = store.list_summaries()?;
    if summaries.is_empty() {
        println!("No lists yet. Create one with `shoplist add-list <name>`.");
        return Ok(());
    }

    for summary in summaries {
        let list = &summary.list;
        let name = if list.is_completed {
            list.name.strikethrough().dimmed()
        } else {
            list.name.bold()
        };
        let due = list
            .due_date
            .map(|d| format!("  due {}", format_date(d)))
            .unwrap_or_default();
        println!(
            "{} {}  {}/{} items{}  {}",
            checkbox(list.is_completed),
            name,
            summary.completed_count,
            summary.item_count,
            due.dimmed(),
            list.id.to_string().dimmed()
        );
    }
    Ok(())
}

fn print_items(store: &Store, list_id: &ListId, category: Option<&str>) -> Result<()> {
    let list = store.get_list(list_id)?;
    let items = store.list_items(list_id, category)?;

    println!("{}", list.name.bold().underline());
    if items.is_empty() {
        let shown = category.unwrap_or(ALL_CATEGORIES);
        println!(
            "No items (category: {}). Suggested categories: {}; units: {}",
            shown,
            SUGGESTED_CATEGORIES.join(", "),
            SUGGESTED_UNITS.join(", ")
        );
        return Ok(());
    }

    for item in &items {
        print_item(item);
    }
    Ok(())
}

fn print_item(item: &ShoppingItem) {
    let name = if item.is_completed {
        item.name.strikethrough().dimmed()
    } else {
        item.name.normal()
    };
    println!(
        "{} {}  {:.1} {}  {}  {}",
        checkbox(item.is_completed),
        name,
        item.quantity,
        item.unit,
        item.category.dimmed(),
        item.id.to_string().dimmed()
    );
}
