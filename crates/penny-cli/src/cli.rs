use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "penny")]
#[command(about = "Track spending from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Quick capture: penny 12.50 coffee with Sam
    #[arg(trailing_var_arg = true)]
    pub entry: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a new expense
    #[command(alias = "new")]
    Add {
        /// Amount spent
        amount: String,
        /// What the money went on
        description: Vec<String>,
        /// Category name (defaults to "Uncategorized")
        #[arg(short, long)]
        category: Option<String>,
        /// Subcategory name within the category (created on first use)
        #[arg(long)]
        subcategory: Option<String>,
        /// Currency code (defaults to PENNY_CURRENCY, then USD)
        #[arg(long)]
        currency: Option<String>,
        /// Transaction date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
    },
    /// List recent expenses
    List {
        /// Number of expenses to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Filter by category name
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an expense
    Delete {
        /// Expense ID or unique ID prefix
        id: String,
    },
    /// Manage spending categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Sync with the penny API
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Create a category
    Add {
        /// Category name
        name: String,
        /// Icon identifier
        #[arg(long, default_value = "CIRCLE")]
        icon: String,
        /// Display color
        #[arg(long, default_value = "#008236")]
        color: String,
    },
    /// Add a subcategory to an existing category
    AddSub {
        /// Parent category name
        category: String,
        /// Subcategory name
        name: String,
    },
    /// List categories
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a category
    Delete {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Reset both checkpoints and sync everything from scratch
    Full,
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
