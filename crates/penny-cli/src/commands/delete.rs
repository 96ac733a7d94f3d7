use std::path::Path;

use penny_core::db::{ExpenseRepository, LibSqlExpenseRepository};

use crate::commands::common::{open_database, resolve_expense};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let query = id.trim();
    if query.is_empty() {
        return Err(CliError::ExpenseNotFound(id.to_string()));
    }

    let db = open_database(db_path).await?;
    let expense = resolve_expense(&db, query).await?;

    let repo = LibSqlExpenseRepository::new(db.connection());
    repo.delete(&expense.id).await?;
    println!("{}", expense.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use penny_core::db::Database;
    use penny_core::models::{CategoryId, Expense};

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_leaves_a_tombstone_behind() {
        let db_path = std::env::temp_dir().join(format!(
            "penny-delete-test-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let expense = Expense::new(
            CategoryId::new(),
            5.0,
            "USD",
            "to delete",
            penny_core::models::now_millis(),
        );
        {
            let db = Database::open(&db_path).await.unwrap();
            let repo = LibSqlExpenseRepository::new(db.connection());
            repo.create(&expense).await.unwrap();
        }

        run_delete(&expense.id.as_str(), &db_path).await.unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let repo = LibSqlExpenseRepository::new(db.connection());
        assert!(repo.get(&expense.id).await.unwrap().is_none());

        // Still present as a tombstone for the next sync pass
        use penny_core::sync::LocalRecords;
        assert_eq!(repo.count().await.unwrap(), 1);
        drop(db);

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
    }
}
