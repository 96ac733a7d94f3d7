//! Sync conflict log queries

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::SyncConflict;

/// Trait for reading the LWW conflict log (async)
#[allow(async_fn_in_trait)]
pub trait ConflictRepository {
    /// Most recently resolved conflicts first
    async fn list_recent(&self, limit: usize) -> Result<Vec<SyncConflict>>;
}

/// libSQL implementation of `ConflictRepository`
pub struct LibSqlConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ConflictRepository for LibSqlConflictRepository<'_> {
    async fn list_recent(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, entity, record_id, local_updated_at, incoming_updated_at,
                        resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                params![limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                entity: row.get(1)?,
                record_id: row.get(2)?,
                local_updated_at: row.get(3)?,
                incoming_updated_at: row.get(4)?,
                resolved_at: row.get(5)?,
                strategy: row.get(6)?,
            });
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::db::{Database, LibSqlExpenseRepository};
    use crate::models::{CategoryId, Expense};
    use crate::sync::LocalRecords;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_guard_trigger_feeds_the_conflict_log() {
        let db = Database::open_in_memory().await.unwrap();
        let expenses = LibSqlExpenseRepository::new(db.connection());
        let conflicts = LibSqlConflictRepository::new(db.connection());

        assert!(conflicts.list_recent(10).await.unwrap().is_empty());

        let mut current = Expense::new(
            CategoryId::new(),
            5.0,
            "USD",
            "coffee",
            DateTime::from_timestamp_millis(1_000).unwrap(),
        );
        current.updated_at = DateTime::from_timestamp_millis(2_000).unwrap();
        expenses
            .bulk_upsert(std::slice::from_ref(&current))
            .await
            .unwrap();

        let mut stale = current.clone();
        stale.updated_at = DateTime::from_timestamp_millis(1_500).unwrap();
        expenses
            .bulk_upsert(std::slice::from_ref(&stale))
            .await
            .unwrap();

        let recent = conflicts.list_recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].entity, "expenses");
        assert_eq!(recent[0].record_id, current.id.as_str());
        assert_eq!(recent[0].local_updated_at, 2_000);
        assert_eq!(recent[0].incoming_updated_at, 1_500);
        assert_eq!(recent[0].strategy, "lww");
    }
}
