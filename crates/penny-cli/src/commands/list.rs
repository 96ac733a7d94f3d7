use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use penny_core::db::{CategoryRepository, ExpenseRepository, LibSqlCategoryRepository,
                     LibSqlExpenseRepository};
use penny_core::models::Expense;
use serde::Serialize;

use crate::commands::common::{format_relative_time, open_database, resolve_category, short_id};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ExpenseListItem {
    id: String,
    date: String,
    amount: f64,
    currency: String,
    category: String,
    subcategory_id: Option<String>,
    description: String,
    relative_time: String,
}

pub async fn run_list(
    limit: usize,
    category: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;

    let expenses = match category {
        Some(name) => {
            let category = resolve_category(&db, name).await?;
            LibSqlExpenseRepository::new(db.connection())
                .list_by_category(&category.id, limit)
                .await?
        }
        None => {
            LibSqlExpenseRepository::new(db.connection())
                .list(limit, 0)
                .await?
        }
    };

    let category_names = category_names(&db).await?;
    let items: Vec<ExpenseListItem> = expenses
        .iter()
        .map(|expense| expense_to_list_item(expense, &category_names))
        .collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No expenses recorded.");
        return Ok(());
    }

    for item in &items {
        println!(
            "{:<13}  {}  {:>10.2} {}  {:<14}  {}",
            short_id(&item.id),
            item.date,
            item.amount,
            item.currency,
            item.category,
            item.description,
        );
    }
    Ok(())
}

async fn category_names(
    db: &penny_core::db::Database,
) -> Result<HashMap<String, String>, CliError> {
    let categories = LibSqlCategoryRepository::new(db.connection()).list().await?;
    Ok(categories
        .into_iter()
        .map(|category| (category.id.as_str(), category.name))
        .collect())
}

fn expense_to_list_item(
    expense: &Expense,
    category_names: &HashMap<String, String>,
) -> ExpenseListItem {
    let now_ms = Utc::now().timestamp_millis();
    let category = category_names
        .get(&expense.category_id.as_str())
        .cloned()
        .unwrap_or_else(|| "(deleted)".to_string());

    ExpenseListItem {
        id: expense.id.as_str(),
        date: expense.date.format("%Y-%m-%d").to_string(),
        amount: expense.amount,
        currency: expense.currency.clone(),
        category,
        subcategory_id: expense.subcategory_id.clone(),
        description: expense.description.clone(),
        relative_time: format_relative_time(expense.updated_at.timestamp_millis(), now_ms),
    }
}

#[cfg(test)]
mod tests {
    use penny_core::models::CategoryId;

    use super::*;

    #[test]
    fn deleted_category_renders_a_placeholder() {
        let expense = Expense::new(
            CategoryId::new(),
            3.0,
            "USD",
            "ghost",
            penny_core::models::now_millis(),
        );

        let item = expense_to_list_item(&expense, &HashMap::new());
        assert_eq!(item.category, "(deleted)");
        assert_eq!(item.description, "ghost");
    }
}
