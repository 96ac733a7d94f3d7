//! Database migrations

use libsql::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // Using a transaction for atomicity

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Categories table; subcategories travel as a JSON document column
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            icon TEXT NOT NULL,
            color TEXT NOT NULL,
            subcategories TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_categories_updated ON categories(updated_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_categories_deleted ON categories(deleted_at)",
        // Expenses table
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
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
        "CREATE INDEX IF NOT EXISTS idx_expenses_updated ON expenses(updated_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category_id)",
        "CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date DESC)",
        "CREATE INDEX IF NOT EXISTS idx_expenses_deleted ON expenses(deleted_at)",
        // Settings table (local only; also holds the sync checkpoints)
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: LWW conflict logging support
///
/// The guard triggers make a stale incoming update (older `updated_at`) a
/// recorded no-op, so replayed save-sets cannot move a record backwards.
async fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_conflicts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity TEXT NOT NULL,
            record_id TEXT NOT NULL,
            local_updated_at INTEGER NOT NULL,
            incoming_updated_at INTEGER NOT NULL,
            resolved_at INTEGER NOT NULL,
            strategy TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_record_id ON sync_conflicts(record_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_conflicts_resolved_at ON sync_conflicts(resolved_at DESC)",
        "CREATE TRIGGER IF NOT EXISTS categories_lww_conflict_guard BEFORE UPDATE ON categories
         FOR EACH ROW
         WHEN NEW.updated_at < OLD.updated_at
         BEGIN
             INSERT INTO sync_conflicts (
                 entity,
                 record_id,
                 local_updated_at,
                 incoming_updated_at,
                 resolved_at,
                 strategy
             ) VALUES (
                 'categories',
                 OLD.id,
                 OLD.updated_at,
                 NEW.updated_at,
                 CAST(strftime('%s','now') AS INTEGER) * 1000,
                 'lww'
             );
             SELECT RAISE(IGNORE);
         END",
        "CREATE TRIGGER IF NOT EXISTS expenses_lww_conflict_guard BEFORE UPDATE ON expenses
         FOR EACH ROW
         WHEN NEW.updated_at < OLD.updated_at
         BEGIN
             INSERT INTO sync_conflicts (
                 entity,
                 record_id,
                 local_updated_at,
                 incoming_updated_at,
                 resolved_at,
                 strategy
             ) VALUES (
                 'expenses',
                 OLD.id,
                 OLD.updated_at,
                 NEW.updated_at,
                 CAST(strftime('%s','now') AS INTEGER) * 1000,
                 'lww'
             );
             SELECT RAISE(IGNORE);
         END",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use libsql::Builder;

    use super::*;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migration_v2_creates_conflict_guard() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'trigger' AND name LIKE '%_lww_conflict_guard'",
                (),
            )
            .await
            .unwrap();

        let count: i32 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(count, 2);
    }
}
