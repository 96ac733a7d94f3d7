//! Local database layer for Penny

mod category_repository;
mod checkpoint_repository;
mod conflict_repository;
mod connection;
mod expense_repository;
mod migrations;

pub use category_repository::{CategoryRepository, LibSqlCategoryRepository};
pub use checkpoint_repository::LibSqlCheckpointRepository;
pub use conflict_repository::{ConflictRepository, LibSqlConflictRepository};
pub use connection::Database;
pub use expense_repository::{ExpenseRepository, LibSqlExpenseRepository};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Convert a millisecond storage column back into a timestamp
pub(crate) fn datetime_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Database(format!("timestamp out of range: {millis}")))
}

/// Convert a nullable millisecond column back into an optional timestamp
pub(crate) fn optional_datetime_from_millis(millis: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    millis.map(datetime_from_millis).transpose()
}
