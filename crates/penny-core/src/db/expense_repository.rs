//! Expense repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use chrono::{DateTime, Utc};
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{now_millis, CategoryId, Expense, ExpenseId};
use crate::sync::LocalRecords;

use super::{datetime_from_millis, optional_datetime_from_millis};

const EXPENSE_COLUMNS: &str = "id, category_id, subcategory_id, amount, currency, description, \
                               date, created_at, updated_at, deleted_at";

/// Trait for expense storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ExpenseRepository {
    /// Insert a newly captured expense
    async fn create(&self, expense: &Expense) -> Result<()>;

    /// Get an expense by ID, excluding tombstones
    async fn get(&self, id: &ExpenseId) -> Result<Option<Expense>>;

    /// List expenses (excluding tombstones), newest transaction date first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Expense>>;

    /// List expenses belonging to a category, newest transaction date first
    async fn list_by_category(&self, category_id: &CategoryId, limit: usize)
        -> Result<Vec<Expense>>;

    /// Soft delete an expense
    async fn delete(&self, id: &ExpenseId) -> Result<()>;
}

/// libSQL implementation of `ExpenseRepository`
pub struct LibSqlExpenseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlExpenseRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn upsert(&self, expense: &Expense) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO expenses
                     (id, category_id, subcategory_id, amount, currency, description,
                      date, created_at, updated_at, deleted_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
                    expense.id.as_str(),
                    expense.category_id.as_str(),
                    expense.subcategory_id.clone(),
                    expense.amount,
                    expense.currency.clone(),
                    expense.description.clone(),
                    expense.date.timestamp_millis(),
                    expense.created_at.timestamp_millis(),
                    expense.updated_at.timestamp_millis(),
                    expense.deleted_at.map(|at| at.timestamp_millis()),
                ],
            )
            .await?;
        Ok(())
    }

    fn parse_expense(row: &libsql::Row) -> Result<Expense> {
        let id: String = row.get(0)?;
        let category_id: String = row.get(1)?;

        Ok(Expense {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid expense id: {id}")))?,
            category_id: category_id
                .parse()
                .map_err(|_| Error::Database(format!("invalid category id: {category_id}")))?,
            subcategory_id: row.get(2)?,
            amount: row.get(3)?,
            currency: row.get(4)?,
            description: row.get(5)?,
            date: datetime_from_millis(row.get(6)?)?,
            created_at: datetime_from_millis(row.get(7)?)?,
            updated_at: datetime_from_millis(row.get(8)?)?,
            deleted_at: optional_datetime_from_millis(row.get(9)?)?,
        })
    }
}

impl ExpenseRepository for LibSqlExpenseRepository<'_> {
    async fn create(&self, expense: &Expense) -> Result<()> {
        self.upsert(expense).await
    }

    async fn get(&self, id: &ExpenseId) -> Result<Option<Expense>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXPENSE_COLUMNS} FROM expenses
                     WHERE id = ? AND deleted_at IS NULL"
                ),
                params![id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_expense(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Expense>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXPENSE_COLUMNS} FROM expenses
                     WHERE deleted_at IS NULL
                     ORDER BY date DESC
                     LIMIT ? OFFSET ?"
                ),
                params![limit as i64, offset as i64],
            )
            .await?;

        let mut expenses = Vec::new();
        while let Some(row) = rows.next().await? {
            expenses.push(Self::parse_expense(&row)?);
        }
        Ok(expenses)
    }

    async fn list_by_category(
        &self,
        category_id: &CategoryId,
        limit: usize,
    ) -> Result<Vec<Expense>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXPENSE_COLUMNS} FROM expenses
                     WHERE category_id = ? AND deleted_at IS NULL
                     ORDER BY date DESC
                     LIMIT ?"
                ),
                params![category_id.as_str(), limit as i64],
            )
            .await?;

        let mut expenses = Vec::new();
        while let Some(row) = rows.next().await? {
            expenses.push(Self::parse_expense(&row)?);
        }
        Ok(expenses)
    }

    async fn delete(&self, id: &ExpenseId) -> Result<()> {
        let now = now_millis().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE expenses SET deleted_at = ?, updated_at = ?
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

impl LocalRecords<Expense> for LibSqlExpenseRepository<'_> {
    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<Expense>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXPENSE_COLUMNS} FROM expenses
                     WHERE updated_at > ?
                     ORDER BY updated_at ASC"
                ),
                params![since.timestamp_millis()],
            )
            .await?;

        let mut expenses = Vec::new();
        while let Some(row) = rows.next().await? {
            expenses.push(Self::parse_expense(&row)?);
        }
        Ok(expenses)
    }

    async fn bulk_upsert(&self, records: &[Expense]) -> Result<()> {
        for expense in records {
            self.upsert(expense).await?;
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM expenses", ()).await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
