//! Data models for Penny

mod category;
mod expense;
mod sync_conflict;

pub use category::{Category, CategoryId, Subcategory};
pub use expense::{Expense, ExpenseId};
pub use sync_conflict::SyncConflict;

use chrono::{DateTime, Utc};

/// Current time truncated to millisecond precision.
///
/// Mutation timestamps must survive a round-trip through millisecond
/// storage columns, otherwise `updated_at` equality breaks after save/load.
#[must_use]
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
