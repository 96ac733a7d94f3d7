//! Category repository implementation

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{now_millis, Category, CategoryId};
use crate::sync::LocalRecords;

use super::{datetime_from_millis, optional_datetime_from_millis};

const CATEGORY_COLUMNS: &str =
    "id, name, icon, color, subcategories, created_at, updated_at, deleted_at";

/// Trait for category storage operations (async)
#[allow(async_fn_in_trait)]
pub trait CategoryRepository {
    /// Create a new category
    async fn create(&self, name: &str, icon: &str, color: &str) -> Result<Category>;

    /// Get a category by ID, excluding tombstones
    async fn get(&self, id: &CategoryId) -> Result<Option<Category>>;

    /// Find a category by name (case-insensitive), excluding tombstones
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>>;

    /// List categories (excluding tombstones), sorted by name
    async fn list(&self) -> Result<Vec<Category>>;

    /// Append a subcategory to a category
    async fn add_subcategory(&self, id: &CategoryId, name: &str) -> Result<Category>;

    /// Soft delete a category
    async fn delete(&self, id: &CategoryId) -> Result<()>;
}

/// libSQL implementation of `CategoryRepository`
pub struct LibSqlCategoryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCategoryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn upsert(&self, category: &Category) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO categories
                     (id, name, icon, color, subcategories, created_at, updated_at, deleted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     icon = excluded.icon,
                     color = excluded.color,
                     subcategories = excluded.subcategories,
                     created_at = excluded.created_at,
                     updated_at = excluded.updated_at,
                     deleted_at = excluded.deleted_at",
                params![
                    category.id.as_str(),
                    category.name.clone(),
                    category.icon.clone(),
                    category.color.clone(),
                    serde_json::to_string(&category.subcategories)?,
                    category.created_at.timestamp_millis(),
                    category.updated_at.timestamp_millis(),
                    category.deleted_at.map(|at| at.timestamp_millis()),
                ],
            )
            .await?;
        Ok(())
    }

    fn parse_category(row: &libsql::Row) -> Result<Category> {
        let id: String = row.get(0)?;
        let subcategories: String = row.get(4)?;

        Ok(Category {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid category id: {id}")))?,
            name: row.get(1)?,
            icon: row.get(2)?,
            color: row.get(3)?,
            subcategories: serde_json::from_str(&subcategories)?,
            created_at: datetime_from_millis(row.get(5)?)?,
            updated_at: datetime_from_millis(row.get(6)?)?,
            deleted_at: optional_datetime_from_millis(row.get(7)?)?,
        })
    }
}

impl CategoryRepository for LibSqlCategoryRepository<'_> {
    async fn create(&self, name: &str, icon: &str, color: &str) -> Result<Category> {
        let category = Category::new(name, icon, color);
        self.upsert(&category).await?;
        Ok(category)
    }

    async fn get(&self, id: &CategoryId) -> Result<Option<Category>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories
                     WHERE id = ? AND deleted_at IS NULL"
                ),
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_category(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Category>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories
                     WHERE name = ? COLLATE NOCASE AND deleted_at IS NULL
                     LIMIT 1"
                ),
                params![name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_category(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Category>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories
                     WHERE deleted_at IS NULL
                     ORDER BY name COLLATE NOCASE ASC"
                ),
                (),
            )
            .await?;

        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            categories.push(Self::parse_category(&row)?);
        }
        Ok(categories)
    }

    async fn add_subcategory(&self, id: &CategoryId, name: &str) -> Result<Category> {
        let mut category = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        category.add_subcategory(name);
        self.upsert(&category).await?;
        Ok(category)
    }

    async fn delete(&self, id: &CategoryId) -> Result<()> {
        let now = now_millis().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE categories SET deleted_at = ?, updated_at = ?
                 WHERE id = ? AND deleted_at IS NULL",
                params![now, now, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }
}

impl LocalRecords<Category> for LibSqlCategoryRepository<'_> {
    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Category>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CATEGORY_COLUMNS} FROM categories
                     WHERE updated_at > ?
                     ORDER BY updated_at ASC"
                ),
                params![since.timestamp_millis()],
            )
            .await?;

        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            categories.push(Self::parse_category(&row)?);
        }
        Ok(categories)
    }

    async fn bulk_upsert(&self, records: &[Category]) -> Result<()> {
        for category in records {
            self.upsert(category).await?;
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM categories", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
