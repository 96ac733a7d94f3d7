use std::path::Path;

use penny_core::db::{CategoryRepository, LibSqlCategoryRepository};
use penny_core::models::Category;
use serde::Serialize;

use crate::commands::common::{open_database, resolve_category, short_id};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct CategoryListItem {
    id: String,
    name: String,
    icon: String,
    color: String,
    subcategories: Vec<String>,
}

pub async fn run_category_add(
    name: &str,
    icon: &str,
    color: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlCategoryRepository::new(db.connection());

    let category = repo.create(name, icon, color).await?;
    println!("{}", category.id);
    Ok(())
}

pub async fn run_category_add_sub(
    category_name: &str,
    name: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let category = resolve_category(&db, category_name).await?;

    let repo = LibSqlCategoryRepository::new(db.connection());
    let updated = repo.add_subcategory(&category.id, name).await?;

    if let Some(added) = updated.subcategories.last() {
        println!("{}", added.id);
    }
    Ok(())
}

pub async fn run_category_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlCategoryRepository::new(db.connection());
    let categories = repo.list().await?;

    if as_json {
        let items: Vec<CategoryListItem> = categories.iter().map(category_to_list_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if categories.is_empty() {
        println!("No categories defined.");
        return Ok(());
    }

    for category in &categories {
        let subcategories = category
            .subcategories
            .iter()
            .map(|subcategory| subcategory.name.clone())
            .collect::<Vec<_>>()
            .join(", ");

        if subcategories.is_empty() {
            println!(
                "{:<13}  {:<20}  {:<8}  {}",
                short_id(&category.id.as_str()),
                category.name,
                category.icon,
                category.color,
            );
        } else {
            println!(
                "{:<13}  {:<20}  {:<8}  {}  [{}]",
                short_id(&category.id.as_str()),
                category.name,
                category.icon,
                category.color,
                subcategories,
            );
        }
    }
    Ok(())
}

pub async fn run_category_delete(name: &str, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let category = resolve_category(&db, name).await?;

    let repo = LibSqlCategoryRepository::new(db.connection());
    repo.delete(&category.id).await?;
    println!("{}", category.id);
    Ok(())
}

fn category_to_list_item(category: &Category) -> CategoryListItem {
    CategoryListItem {
        id: category.id.as_str(),
        name: category.name.clone(),
        icon: category.icon.clone(),
        color: category.color.clone(),
        subcategories: category
            .subcategories
            .iter()
            .map(|subcategory| subcategory.name.clone())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use penny_core::db::Database;

    use super::*;

    fn unique_db_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "penny-category-test-{tag}-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    fn cleanup(path: &std::path::Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_and_delete_round_trip() {
        let db_path = unique_db_path("round-trip");

        run_category_add("Transport", "BUS", "#1d4ed8", &db_path)
            .await
            .unwrap();
        run_category_add_sub("Transport", "Fuel", &db_path)
            .await
            .unwrap();

        {
            let db = Database::open(&db_path).await.unwrap();
            let repo = LibSqlCategoryRepository::new(db.connection());
            let fetched = repo.find_by_name("Transport").await.unwrap().unwrap();
            assert_eq!(fetched.subcategories.len(), 1);
            assert_eq!(fetched.subcategories[0].name, "Fuel");
        }

        run_category_delete("Transport", &db_path).await.unwrap();

        let db = Database::open(&db_path).await.unwrap();
        let repo = LibSqlCategoryRepository::new(db.connection());
        assert!(repo.find_by_name("Transport").await.unwrap().is_none());
        drop(db);

        cleanup(&db_path);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn deleting_a_missing_category_reports_not_found() {
        let db_path = unique_db_path("missing");

        let error = run_category_delete("Nope", &db_path).await.unwrap_err();
        assert!(matches!(error, CliError::CategoryNotFound(_)));

        cleanup(&db_path);
    }
}
