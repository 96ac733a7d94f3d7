//! Helpers shared across CLI commands.

use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use penny_core::db::{CategoryRepository, Database, ExpenseRepository, LibSqlCategoryRepository,
                     LibSqlExpenseRepository};
use penny_core::models::{Category, Expense};
use penny_core::sync::ApiClient;

use crate::error::CliError;

/// Category expenses land in when none is named.
pub const DEFAULT_CATEGORY_NAME: &str = "Uncategorized";
pub const DEFAULT_CATEGORY_ICON: &str = "CIRCLE";
pub const DEFAULT_CATEGORY_COLOR: &str = "#008236";

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("PENNY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("penny")
        .join("penny.db")
}

pub async fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path).await?)
}

pub fn api_client_from_env() -> Result<ApiClient, CliError> {
    api_client_from_values(env::var("PENNY_API_URL").ok(), env::var("PENNY_API_TOKEN").ok())
}

fn api_client_from_values(
    url: Option<String>,
    token: Option<String>,
) -> Result<ApiClient, CliError> {
    let (Some(url), Some(token)) = (url, token) else {
        return Err(CliError::SyncNotConfigured);
    };
    if url.trim().is_empty() || token.trim().is_empty() {
        return Err(CliError::SyncNotConfigured);
    }

    Ok(ApiClient::new(url, token)?)
}

pub fn parse_amount(raw: &str) -> Result<f64, CliError> {
    let amount: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CliError::InvalidAmount(raw.to_string()))?;

    if !amount.is_finite() || amount < 0.0 {
        return Err(CliError::InvalidAmount(raw.to_string()));
    }
    Ok(amount)
}

pub fn parse_transaction_date(raw: Option<&str>) -> Result<DateTime<Utc>, CliError> {
    let Some(raw) = raw else {
        return Ok(penny_core::models::now_millis());
    };

    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CliError::InvalidDate(raw.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidDate(raw.to_string()))?;
    Ok(midnight.and_utc())
}

pub fn resolve_currency(raw: Option<&str>) -> Result<String, CliError> {
    let code = raw
        .map(str::to_string)
        .or_else(|| env::var("PENNY_CURRENCY").ok())
        .unwrap_or_else(|| "USD".to_string());

    let code = code.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CliError::InvalidCurrency(code));
    }
    Ok(code)
}

/// Find a category by name, or materialize the default one when none is named.
pub async fn resolve_or_create_category(
    db: &Database,
    name: Option<&str>,
) -> Result<Category, CliError> {
    let repo = LibSqlCategoryRepository::new(db.connection());

    let name = name.unwrap_or(DEFAULT_CATEGORY_NAME);
    if let Some(category) = repo.find_by_name(name).await? {
        return Ok(category);
    }

    // Only the default category is created implicitly; a named category
    // that does not exist is a user error.
    if !name.eq_ignore_ascii_case(DEFAULT_CATEGORY_NAME) {
        return Err(CliError::CategoryNotFound(name.to_string()));
    }

    Ok(repo
        .create(
            DEFAULT_CATEGORY_NAME,
            DEFAULT_CATEGORY_ICON,
            DEFAULT_CATEGORY_COLOR,
        )
        .await?)
}

pub async fn resolve_category(db: &Database, name: &str) -> Result<Category, CliError> {
    let repo = LibSqlCategoryRepository::new(db.connection());
    repo.find_by_name(name)
        .await?
        .ok_or_else(|| CliError::CategoryNotFound(name.to_string()))
}

/// Resolve an expense by exact id or unique id prefix.
pub async fn resolve_expense(db: &Database, query: &str) -> Result<Expense, CliError> {
    let repo = LibSqlExpenseRepository::new(db.connection());

    if let Ok(expense_id) = query.parse() {
        if let Some(expense) = repo.get(&expense_id).await? {
            return Ok(expense);
        }
    }

    let mut rows = db
        .connection()
        .query(
            "SELECT id
             FROM expenses
             WHERE deleted_at IS NULL AND id LIKE ?
             ORDER BY updated_at DESC
             LIMIT ?",
            libsql::params![format!("{query}%"), 3i64],
        )
        .await?;

    let mut matching_ids = Vec::new();
    while let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        matching_ids.push(id);
    }

    match matching_ids.len() {
        0 => Err(CliError::ExpenseNotFound(query.to_string())),
        1 => {
            let resolved_id = matching_ids[0]
                .parse()
                .map_err(|_| CliError::ExpenseNotFound(query.to_string()))?;
            repo.get(&resolved_id)
                .await?
                .ok_or_else(|| CliError::ExpenseNotFound(query.to_string()))
        }
        _ => {
            let options = matching_ids
                .iter()
                .take(3)
                .map(|id| short_id(id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousExpenseId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
