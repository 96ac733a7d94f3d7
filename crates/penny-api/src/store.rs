//! Authoritative multi-user record store.
//!
//! Every query is scoped to one user's rows; ownership of uploaded ids is
//! checked before anything in a batch is applied.

use chrono::{DateTime, Utc};
use libsql::{params, Builder, Connection, Database as LibSqlDatabase};
use penny_core::models::{Category, Expense};
use penny_core::sync::{ModifiedBatch, SYNC_BATCH_SIZE};

use crate::error::AppError;

pub struct ServerStore {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl ServerStore {
    /// Open (and migrate) the store at the given path; `:memory:` works for tests.
    pub async fn open(path: &str) -> Result<Self, AppError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        let store = Self { _db: db, conn };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), AppError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                icon TEXT NOT NULL,
                color TEXT NOT NULL,
                subcategories TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_categories_user_updated
                 ON categories(user_id, updated_at DESC)",
            "CREATE TABLE IF NOT EXISTS expenses (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                category_id TEXT NOT NULL,
                subcategory_id TEXT,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                description TEXT NOT NULL,
                date INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_expenses_user_updated
                 ON expenses(user_id, updated_at DESC)",
        ];

        for stmt in statements {
            self.conn.execute(stmt, ()).await?;
        }
        Ok(())
    }

    pub async fn modified_categories(
        &self,
        user_id: &str,
        page: u32,
        since: DateTime<Utc>,
    ) -> Result<ModifiedBatch<Category>, AppError> {
        let total = self
            .count_matching("categories", user_id, Some(since))
            .await?;

        let mut rows = self
            .conn
            .query(
                "SELECT id, name, icon, color, subcategories, created_at, updated_at, deleted_at
                 FROM categories
                 WHERE user_id = ? AND updated_at > ?
                 ORDER BY updated_at DESC
                 LIMIT ? OFFSET ?",
                params![
                    user_id,
                    since.timestamp_millis(),
                    SYNC_BATCH_SIZE as i64,
                    page_offset(page),
                ],
            )
            .await?;

        let mut data = Vec::new();
        while let Some(row) = rows.next().await? {
            data.push(parse_category(&row)?);
        }

        Ok(ModifiedBatch {
            data,
            has_more: u64::from(page) * (SYNC_BATCH_SIZE as u64) < total,
            total,
        })
    }

    pub async fn modified_expenses(
        &self,
        user_id: &str,
        page: u32,
        since: DateTime<Utc>,
    ) -> Result<ModifiedBatch<Expense>, AppError> {
        let total = self.count_matching("expenses", user_id, Some(since)).await?;

        let mut rows = self
            .conn
            .query(
                "SELECT id, category_id, subcategory_id, amount, currency, description,
                        date, created_at, updated_at, deleted_at
                 FROM expenses
                 WHERE user_id = ? AND updated_at > ?
                 ORDER BY updated_at DESC
                 LIMIT ? OFFSET ?",
                params![
                    user_id,
                    since.timestamp_millis(),
                    SYNC_BATCH_SIZE as i64,
                    page_offset(page),
                ],
            )
            .await?;

        let mut data = Vec::new();
        while let Some(row) = rows.next().await? {
            data.push(parse_expense(&row)?);
        }

        Ok(ModifiedBatch {
            data,
            has_more: u64::from(page) * (SYNC_BATCH_SIZE as u64) < total,
            total,
        })
    }

    pub async fn upload_categories(
        &self,
        user_id: &str,
        records: &[Category],
    ) -> Result<(), AppError> {
        let ids: Vec<String> = records.iter().map(|record| record.id.as_str()).collect();
        self.assert_batch_ownership("categories", "category", user_id, &ids)
            .await?;

        for record in records {
            self.conn
                .execute(
                    "INSERT INTO categories
                         (id, user_id, name, icon, color, subcategories,
                          created_at, updated_at, deleted_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                         name = excluded.name,
                         icon = excluded.icon,
                         color = excluded.color,
                         subcategories = excluded.subcategories,
                         created_at = excluded.created_at,
                         updated_at = excluded.updated_at,
                         deleted_at = excluded.deleted_at",
                    params![
                        record.id.as_str(),
                        user_id,
                        record.name.clone(),
                        record.icon.clone(),
                        record.color.clone(),
                        serde_json::to_string(&record.subcategories)?,
                        record.created_at.timestamp_millis(),
                        record.updated_at.timestamp_millis(),
                        record.deleted_at.map(|at| at.timestamp_millis()),
                    ],
                )
                .await?;
        }
        Ok(())
    }

    pub async fn upload_expenses(
        &self,
        user_id: &str,
        records: &[Expense],
    ) -> Result<(), AppError> {
        let ids: Vec<String> = records.iter().map(|record| record.id.as_str()).collect();
        self.assert_batch_ownership("expenses", "expense", user_id, &ids)
            .await?;

        for record in records {
            self.conn
                .execute(
                    "INSERT INTO expenses
                         (id, user_id, category_id, subcategory_id, amount, currency,
                          description, date, created_at, updated_at, deleted_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(id) DO UPDATE SET
                         category_id = excluded.category_id,
                         subcategory_id = excluded.subcategory_id,
                         amount = excluded.amount,
                         currency = excluded.currency,
                         description = excluded.description,
                         date = excluded.date,
                         created_at = excluded.created_at,
                         updated_at = excluded.updated_at,
                         deleted_at = excluded.deleted_at",
                    params![
                        record.id.as_str(),
                        user_id,
                        record.category_id.as_str(),
                        record.subcategory_id.clone(),
                        record.amount,
                        record.currency.clone(),
                        record.description.clone(),
                        record.date.timestamp_millis(),
                        record.created_at.timestamp_millis(),
                        record.updated_at.timestamp_millis(),
                        record.deleted_at.map(|at| at.timestamp_millis()),
                    ],
                )
                .await?;
        }
        Ok(())
    }

    pub async fn count_categories(&self, user_id: &str) -> Result<u64, AppError> {
        self.count_matching("categories", user_id, None).await
    }

    pub async fn count_expenses(&self, user_id: &str) -> Result<u64, AppError> {
        self.count_matching("expenses", user_id, None).await
    }

    async fn count_matching(
        &self,
        table: &str,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, AppError> {
        let mut rows = match since {
            Some(since) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT COUNT(*) FROM {table} WHERE user_id = ? AND updated_at > ?"
                        ),
                        params![user_id, since.timestamp_millis()],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        &format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?"),
                        params![user_id],
                    )
                    .await?
            }
        };

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Reject the whole batch if any id already belongs to another user.
    async fn assert_batch_ownership(
        &self,
        table: &str,
        singular: &str,
        user_id: &str,
        ids: &[String],
    ) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT user_id FROM {table} WHERE id IN ({placeholders})");

        let mut rows = self
            .conn
            .query(&sql, libsql::params_from_iter(ids.iter().cloned()))
            .await?;

        while let Some(row) = rows.next().await? {
            let owner: String = row.get(0)?;
            if owner != user_id {
                return Err(AppError::forbidden(format!(
                    "Attempt to modify another user's {singular}"
                )));
            }
        }
        Ok(())
    }
}

const fn page_offset(page: u32) -> i64 {
    (page as i64 - 1) * SYNC_BATCH_SIZE as i64
}

fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::internal(format!("timestamp out of range: {millis}")))
}

fn parse_category(row: &libsql::Row) -> Result<Category, AppError> {
    let id: String = row.get(0)?;
    let subcategories: String = row.get(4)?;

    Ok(Category {
        id: id
            .parse()
            .map_err(|_| AppError::internal(format!("invalid category id: {id}")))?,
        name: row.get(1)?,
        icon: row.get(2)?,
        color: row.get(3)?,
        subcategories: serde_json::from_str(&subcategories)?,
        created_at: datetime_from_millis(row.get(5)?)?,
        updated_at: datetime_from_millis(row.get(6)?)?,
        deleted_at: row
            .get::<Option<i64>>(7)?
            .map(datetime_from_millis)
            .transpose()?,
    })
}

fn parse_expense(row: &libsql::Row) -> Result<Expense, AppError> {
    let id: String = row.get(0)?;
    let category_id: String = row.get(1)?;

    Ok(Expense {
        id: id
            .parse()
            .map_err(|_| AppError::internal(format!("invalid expense id: {id}")))?,
        category_id: category_id
            .parse()
            .map_err(|_| AppError::internal(format!("invalid category id: {category_id}")))?,
        subcategory_id: row.get(2)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        description: row.get(5)?,
        date: datetime_from_millis(row.get(6)?)?,
        created_at: datetime_from_millis(row.get(7)?)?,
        updated_at: datetime_from_millis(row.get(8)?)?,
        deleted_at: row
            .get::<Option<i64>>(9)?
            .map(datetime_from_millis)
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use penny_core::models::CategoryId;

    use super::*;

    async fn setup() -> ServerStore {
        ServerStore::open(":memory:").await.unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn expense_at(description: &str, millis: i64) -> Expense {
        let mut expense = Expense::new(CategoryId::new(), 5.0, "USD", description, at(millis));
        expense.created_at = at(millis);
        expense.updated_at = at(millis);
        expense
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_then_fetch_round_trips() {
        let store = setup().await;

        let mut category = Category::new("Groceries", "CART", "#008236");
        category.add_subcategory("Produce");
        store
            .upload_categories("user-a", std::slice::from_ref(&category))
            .await
            .unwrap();

        let batch = store
            .modified_categories("user-a", 1, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(batch.total, 1);
        assert!(!batch.has_more);
        assert_eq!(batch.data, vec![category]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queries_are_scoped_to_the_requesting_user() {
        let store = setup().await;

        store
            .upload_expenses("user-a", &[expense_at("a's coffee", 1_000)])
            .await
            .unwrap();
        store
            .upload_expenses("user-b", &[expense_at("b's lunch", 2_000)])
            .await
            .unwrap();

        let batch = store
            .modified_expenses("user-a", 1, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(batch.total, 1);
        assert_eq!(batch.data[0].description, "a's coffee");

        assert_eq!(store.count_expenses("user-a").await.unwrap(), 1);
        assert_eq!(store.count_expenses("user-b").await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreign_record_in_a_batch_rejects_the_whole_batch() {
        let store = setup().await;

        let owned_by_a = expense_at("a's coffee", 1_000);
        store
            .upload_expenses("user-a", std::slice::from_ref(&owned_by_a))
            .await
            .unwrap();

        let innocent = expense_at("b's lunch", 2_000);
        let mut hijack = owned_by_a.clone();
        hijack.description = "tampered".to_string();
        hijack.updated_at = at(3_000);

        let error = store
            .upload_expenses("user-b", &[innocent.clone(), hijack])
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Forbidden(_)));

        // Nothing from the batch was applied, including the innocent record
        assert_eq!(store.count_expenses("user-b").await.unwrap(), 0);
        let batch = store
            .modified_expenses("user-a", 1, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(batch.data[0].description, "a's coffee");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_is_an_idempotent_upsert() {
        let store = setup().await;

        let mut expense = expense_at("coffee", 1_000);
        store
            .upload_expenses("user-a", std::slice::from_ref(&expense))
            .await
            .unwrap();

        expense.amount = 6.5;
        expense.updated_at = at(2_000);
        store
            .upload_expenses("user-a", std::slice::from_ref(&expense))
            .await
            .unwrap();
        store
            .upload_expenses("user-a", std::slice::from_ref(&expense))
            .await
            .unwrap();

        let batch = store
            .modified_expenses("user-a", 1, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(batch.total, 1);
        assert_eq!(batch.data[0].amount, 6.5);
        assert_eq!(batch.data[0].updated_at, at(2_000));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pagination_walks_the_full_result_set_newest_first() {
        let store = setup().await;

        let records: Vec<Expense> = (0..296)
            .map(|index| expense_at(&format!("e{index}"), 1 + index))
            .collect();
        for chunk in records.chunks(SYNC_BATCH_SIZE) {
            store.upload_expenses("user-a", chunk).await.unwrap();
        }

        let first = store
            .modified_expenses("user-a", 1, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(first.total, 296);
        assert_eq!(first.data.len(), 128);
        assert!(first.has_more);
        assert_eq!(first.data[0].updated_at, at(296));

        let second = store
            .modified_expenses("user-a", 2, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(second.data.len(), 128);
        assert!(second.has_more);

        let third = store
            .modified_expenses("user-a", 3, DateTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(third.data.len(), 40);
        assert!(!third.has_more);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn modified_filter_is_strictly_greater() {
        let store = setup().await;

        store
            .upload_expenses("user-a", &[expense_at("coffee", 1_000)])
            .await
            .unwrap();

        let at_threshold = store
            .modified_expenses("user-a", 1, at(1_000))
            .await
            .unwrap();
        assert_eq!(at_threshold.total, 0);
        assert!(at_threshold.data.is_empty());

        let below_threshold = store.modified_expenses("user-a", 1, at(999)).await.unwrap();
        assert_eq!(below_threshold.total, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn counts_include_tombstones() {
        let store = setup().await;

        let mut tombstone = expense_at("deleted later", 1_000);
        tombstone.deleted_at = Some(at(2_000));
        tombstone.updated_at = at(2_000);

        store
            .upload_expenses("user-a", &[expense_at("alive", 1_500), tombstone])
            .await
            .unwrap();

        assert_eq!(store.count_expenses("user-a").await.unwrap(), 2);
    }
}
