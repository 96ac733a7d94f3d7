//! Sync checkpoint persistence

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::sync::{CheckpointStore, EntityKind};

/// libSQL implementation of [`CheckpointStore`] over the `settings` table.
///
/// Checkpoints persist as RFC 3339 strings under the per-entity keys, so a
/// checkpoint survives wipes of the record tables themselves only if the
/// settings row is cleared with them.
pub struct LibSqlCheckpointRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCheckpointRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CheckpointStore for LibSqlCheckpointRepository<'_> {
    async fn load(&self, entity: EntityKind) -> Result<Option<DateTime<Utc>>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM settings WHERE key = ?",
                params![entity.checkpoint_key()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };

        let value: String = row.get(0)?;
        let parsed = DateTime::parse_from_rfc3339(&value)
            .map_err(|_| Error::Database(format!("invalid checkpoint value: {value}")))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    async fn save(&self, entity: EntityKind, latest: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                params![
                    entity.checkpoint_key(),
                    latest.to_rfc3339_opts(SecondsFormat::Millis, true),
                ],
            )
            .await?;
        Ok(())
    }

    async fn clear(&self, entity: EntityKind) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM settings WHERE key = ?",
                params![entity.checkpoint_key()],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_checkpoint_loads_as_none() {
        let db = setup().await;
        let repo = LibSqlCheckpointRepository::new(db.connection());

        assert_eq!(repo.load(EntityKind::Categories).await.unwrap(), None);
        assert_eq!(repo.load(EntityKind::Expenses).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_load_round_trip() {
        let db = setup().await;
        let repo = LibSqlCheckpointRepository::new(db.connection());

        let at = DateTime::from_timestamp_millis(1_717_171_717_171).unwrap();
        repo.save(EntityKind::Expenses, at).await.unwrap();

        assert_eq!(repo.load(EntityKind::Expenses).await.unwrap(), Some(at));
        // The two entity checkpoints are independent
        assert_eq!(repo.load(EntityKind::Categories).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_overwrites_previous_checkpoint() {
        let db = setup().await;
        let repo = LibSqlCheckpointRepository::new(db.connection());

        let first = DateTime::from_timestamp_millis(1_000).unwrap();
        let second = DateTime::from_timestamp_millis(2_000).unwrap();
        repo.save(EntityKind::Categories, first).await.unwrap();
        repo.save(EntityKind::Categories, second).await.unwrap();

        assert_eq!(
            repo.load(EntityKind::Categories).await.unwrap(),
            Some(second)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_forgets_the_checkpoint() {
        let db = setup().await;
        let repo = LibSqlCheckpointRepository::new(db.connection());

        let at = DateTime::from_timestamp_millis(3_000).unwrap();
        repo.save(EntityKind::Expenses, at).await.unwrap();
        repo.clear(EntityKind::Expenses).await.unwrap();

        assert_eq!(repo.load(EntityKind::Expenses).await.unwrap(), None);
    }
}
