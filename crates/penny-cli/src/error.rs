use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] penny_core::Error),
    #[error(transparent)]
    LibSql(#[from] libsql::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Expense not found for id/prefix: {0}")]
    ExpenseNotFound(String),
    #[error("{0}")]
    AmbiguousExpenseId(String),
    #[error(
        "Sync is not configured. Set PENNY_API_URL and PENNY_API_TOKEN to enable `penny sync`."
    )]
    SyncNotConfigured,
}
