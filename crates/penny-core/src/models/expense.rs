//! Expense model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::now_millis;
use crate::models::CategoryId;
use crate::sync::Syncable;

/// A unique identifier for an expense, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpenseId(Uuid);

impl ExpenseId {
    /// Create a new unique expense ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }

    /// Get the raw UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExpenseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExpenseId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A single spend record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Unique identifier
    pub id: ExpenseId,
    /// Owning category; may reference a category that has been tombstoned
    pub category_id: CategoryId,
    /// Optional subcategory within the owning category
    #[serde(default)]
    pub subcategory_id: Option<String>,
    /// Non-negative amount in `currency` units
    pub amount: f64,
    /// ISO 4217 currency code
    pub currency: String,
    /// Free-text description
    pub description: String,
    /// When the spend occurred (user-chosen, distinct from `created_at`)
    pub date: DateTime<Utc>,
    /// Creation timestamp, preserved across updates
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp; the last-writer-wins vector
    pub updated_at: DateTime<Utc>,
    /// Tombstone marker; set instead of physically deleting
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    /// Create a new expense dated `date`
    #[must_use]
    pub fn new(
        category_id: CategoryId,
        amount: f64,
        currency: impl Into<String>,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: ExpenseId::new(),
            category_id,
            subcategory_id: None,
            amount,
            currency: currency.into(),
            description: description.into(),
            date,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Attach a subcategory at construction time
    #[must_use]
    pub fn with_subcategory(mut self, subcategory_id: impl Into<String>) -> Self {
        self.subcategory_id = Some(subcategory_id.into());
        self
    }

    /// Bump `updated_at` so the change is picked up by the next sync pass
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// Turn this expense into a tombstone
    pub fn mark_deleted(&mut self) {
        let now = now_millis();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

impl Syncable for Expense {
    fn record_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::now_millis;

    fn sample_expense() -> Expense {
        Expense::new(
            CategoryId::new(),
            12.5,
            "USD",
            "coffee with Sam",
            now_millis(),
        )
    }

    #[test]
    fn test_expense_id_parse() {
        let id = ExpenseId::new();
        let parsed: ExpenseId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_expense_new() {
        let expense = sample_expense();
        assert_eq!(expense.description, "coffee with Sam");
        assert_eq!(expense.currency, "USD");
        assert!(expense.subcategory_id.is_none());
        assert!(expense.deleted_at.is_none());
        assert_eq!(expense.created_at, expense.updated_at);
    }

    #[test]
    fn test_with_subcategory() {
        let expense = sample_expense().with_subcategory("sub-1");
        assert_eq!(expense.subcategory_id.as_deref(), Some("sub-1"));
    }

    #[test]
    fn test_mark_deleted_bumps_updated_at() {
        let mut expense = sample_expense();
        let created_at = expense.created_at;

        std::thread::sleep(std::time::Duration::from_millis(2));
        expense.mark_deleted();

        assert!(expense.is_deleted());
        assert!(expense.updated_at > created_at);
        assert_eq!(expense.deleted_at, Some(expense.updated_at));
    }

    #[test]
    fn test_serde_round_trip() {
        let expense = sample_expense().with_subcategory("sub-9");
        let json = serde_json::to_string(&expense).unwrap();
        let restored: Expense = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, expense);
    }
}
