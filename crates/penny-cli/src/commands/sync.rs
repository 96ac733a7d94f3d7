use std::path::Path;

use penny_core::db::{ConflictRepository, LibSqlCategoryRepository, LibSqlCheckpointRepository,
                     LibSqlConflictRepository, LibSqlExpenseRepository};
use penny_core::models::SyncConflict;
use penny_core::sync::{self, CheckpointStore, EntityKind, SyncOutcome};
use serde::Serialize;

use crate::commands::common::{api_client_from_env, format_relative_time, open_database, short_id};
use crate::error::CliError;

pub async fn run_sync(full: bool, db_path: &Path) -> Result<(), CliError> {
    let api = api_client_from_env()?;
    let db = open_database(db_path).await?;

    let categories = LibSqlCategoryRepository::new(db.connection());
    let expenses = LibSqlExpenseRepository::new(db.connection());
    let checkpoints = LibSqlCheckpointRepository::new(db.connection());

    if full {
        tracing::info!("forcing a full resync from epoch");
        checkpoints.clear(EntityKind::Categories).await?;
        checkpoints.clear(EntityKind::Expenses).await?;
    }

    let summary = sync::sync_all(&categories, &expenses, &api, &checkpoints).await;

    print_outcome("categories", summary.categories);
    print_outcome("expenses", summary.expenses);
    Ok(())
}

fn print_outcome(entity: &str, outcome: Option<SyncOutcome>) {
    match outcome {
        Some(outcome) if outcome.full_resync => println!(
            "{entity}: uploaded {}, saved {} (full resync)",
            outcome.uploaded, outcome.saved
        ),
        Some(outcome) => println!(
            "{entity}: uploaded {}, saved {}",
            outcome.uploaded, outcome.saved
        ),
        None => println!("{entity}: sync failed, will retry on the next run"),
    }
}

#[derive(Debug, Serialize)]
struct SyncConflictItem {
    id: i64,
    entity: String,
    record_id: String,
    local_updated_at: i64,
    incoming_updated_at: i64,
    resolved_at: i64,
    strategy: String,
}

pub async fn run_sync_conflicts(
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let repo = LibSqlConflictRepository::new(db.connection());
    let conflicts = repo.list_recent(limit).await?;

    if as_json {
        let items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<SyncConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    for conflict in &conflicts {
        println!(
            "{:<13}  {:<10}  kept local @{}  rejected incoming @{}  {}",
            short_id(&conflict.record_id),
            conflict.entity,
            conflict.local_updated_at,
            conflict.incoming_updated_at,
            format_relative_time(conflict.resolved_at, now_ms),
        );
    }
    Ok(())
}

fn conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        id: conflict.id,
        entity: conflict.entity.clone(),
        record_id: conflict.record_id.clone(),
        local_updated_at: conflict.local_updated_at,
        incoming_updated_at: conflict.incoming_updated_at,
        resolved_at: conflict.resolved_at,
        strategy: conflict.strategy.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn sync_conflicts_handles_an_empty_log() {
        let db_path = std::env::temp_dir().join(format!(
            "penny-sync-test-{}-{}.db",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        run_sync_conflicts(10, false, &db_path).await.unwrap();
        run_sync_conflicts(10, true, &db_path).await.unwrap();

        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
    }
}
