use std::path::Path;

use penny_core::db::{CategoryRepository, ExpenseRepository, LibSqlCategoryRepository,
                     LibSqlExpenseRepository};
use penny_core::models::Expense;

use crate::commands::common::{open_database, parse_amount, parse_transaction_date,
                              resolve_currency, resolve_or_create_category};
use crate::error::CliError;

#[allow(clippy::too_many_arguments)]
pub async fn run_add(
    amount: &str,
    description_parts: &[String],
    category: Option<&str>,
    subcategory: Option<&str>,
    currency: Option<&str>,
    date: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let amount = parse_amount(amount)?;
    let currency = resolve_currency(currency)?;
    let date = parse_transaction_date(date)?;
    let description = description_parts.join(" ").trim().to_string();

    let db = open_database(db_path).await?;
    let category = resolve_or_create_category(&db, category).await?;

    let subcategory_id = match subcategory {
        None => None,
        Some(name) => Some(resolve_subcategory_id(&db, &category.id, name).await?),
    };

    let mut expense = Expense::new(category.id, amount, currency, description, date);
    if let Some(subcategory_id) = subcategory_id {
        expense = expense.with_subcategory(subcategory_id);
    }

    let repo = LibSqlExpenseRepository::new(db.connection());
    repo.create(&expense).await?;

    println!("{}", expense.id);
    Ok(())
}

/// Find a subcategory by name within the category, creating it on first use.
async fn resolve_subcategory_id(
    db: &penny_core::db::Database,
    category_id: &penny_core::models::CategoryId,
    name: &str,
) -> Result<String, CliError> {
    let repo = LibSqlCategoryRepository::new(db.connection());
    let category = repo
        .get(category_id)
        .await?
        .ok_or_else(|| CliError::CategoryNotFound(category_id.to_string()))?;

    if let Some(existing) = category
        .subcategories
        .iter()
        .find(|subcategory| subcategory.name.eq_ignore_ascii_case(name))
    {
        return Ok(existing.id.clone());
    }

    let updated = repo.add_subcategory(category_id, name).await?;
    let added = updated
        .subcategories
        .last()
        .ok_or_else(|| CliError::CategoryNotFound(category_id.to_string()))?;
    Ok(added.id.clone())
}

#[cfg(test)]
mod tests {
    use penny_core::db::{Database, ExpenseRepository, LibSqlExpenseRepository};

    use super::*;
    use crate::commands::common::resolve_or_create_category;

    #[tokio::test(flavor = "multi_thread")]
    async fn subcategory_is_created_once_and_reused() {
        let db = Database::open_in_memory().await.unwrap();
        let category = resolve_or_create_category(&db, None).await.unwrap();

        let first = resolve_subcategory_id(&db, &category.id, "Snacks").await.unwrap();
        let second = resolve_subcategory_id(&db, &category.id, "snacks").await.unwrap();
        assert_eq!(first, second);

        let repo = LibSqlCategoryRepository::new(db.connection());
        let fetched = repo.get(&category.id).await.unwrap().unwrap();
        assert_eq!(fetched.subcategories.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn captured_expense_lands_in_the_store() {
        let db_path = std::env::temp_dir().join(format!(
            "penny-add-test-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        run_add(
            "12.50",
            &["coffee".to_string(), "with".to_string(), "Sam".to_string()],
            None,
            None,
            Some("usd"),
            Some("2026-08-01"),
            &db_path,
        )
        .await
        .unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let repo = LibSqlExpenseRepository::new(db.connection());
        let expenses = repo.list(10, 0).await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].description, "coffee with Sam");
        assert_eq!(expenses[0].amount, 12.5);
        assert_eq!(expenses[0].currency, "USD");
        drop(db);

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
    }
}
