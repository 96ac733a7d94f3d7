//! Bidirectional incremental sync between the local store and the server.
//!
//! Each entity type syncs through the same pass: fetch the local and server
//! change-sets since the last checkpoint (concurrently), merge them with the
//! last-writer-wins resolver, upload the locally-authoritative records in
//! fixed-size batches, save the server-authoritative ones into the local
//! store, then advance the checkpoint to the newest timestamp observed.
//! Deletions travel as tombstones through the same channel.
//!
//! A pass that fails at any step leaves the checkpoint untouched, so the
//! next pass re-fetches the same window; uploads and saves are upsert-by-id,
//! which makes retries safe (at-least-once delivery).

mod remote;
mod resolve;

pub use remote::{ApiClient, ModifiedBatch};
pub use resolve::{resolve_conflicts, ResolvedChanges};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Category, Expense};

/// Records fetched or uploaded per request; shared by the download page
/// size and the upload chunk size.
pub const SYNC_BATCH_SIZE: usize = 128;

/// Shared contract for records that flow through the sync channel.
pub trait Syncable: Clone {
    /// Stable client-generated identity; upserts on both sides match on it.
    fn record_id(&self) -> Uuid;

    /// Last mutation timestamp; the conflict-resolution vector.
    fn updated_at(&self) -> DateTime<Utc>;

    /// Tombstone timestamp, when the record is soft-deleted.
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Whether the record is a tombstone.
    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Discriminant for the two synchronizable entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Categories,
    Expenses,
}

impl EntityKind {
    /// Name used in transport paths and log fields
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Expenses => "expenses",
        }
    }

    /// Key the entity's checkpoint persists under
    #[must_use]
    pub const fn checkpoint_key(self) -> &'static str {
        match self {
            Self::Categories => "categories_updated_at",
            Self::Expenses => "expenses_updated_at",
        }
    }
}

/// Local-store seam the orchestrators drive. Implemented by the libsql
/// repositories; tests substitute in-memory doubles.
#[allow(async_fn_in_trait)]
pub trait LocalRecords<T: Syncable> {
    /// Records with `updated_at` strictly greater than `since`, tombstones
    /// included.
    async fn changed_since(&self, since: DateTime<Utc>) -> Result<Vec<T>>;

    /// Idempotent upsert-by-id; replaying the same records is a no-op.
    async fn bulk_upsert(&self, records: &[T]) -> Result<()>;

    /// Total record count, tombstones included.
    async fn count(&self) -> Result<u64>;
}

/// Remote-store seam: the server's paginated download, batch upload, and
/// count endpoints, scoped to the authenticated user.
#[allow(async_fn_in_trait)]
pub trait RemoteRecords<T: Syncable> {
    /// One page of records with `updated_at` greater than `since`, newest
    /// first. Pages start at 1; the caller drains until `has_more` is false.
    async fn fetch_modified_batch(
        &self,
        page: u32,
        since: DateTime<Utc>,
    ) -> Result<ModifiedBatch<T>>;

    /// Idempotent upsert of up to [`SYNC_BATCH_SIZE`] records.
    async fn upload_batch(&self, records: &[T]) -> Result<()>;

    /// Total record count for the calling user, tombstones included.
    async fn total_count(&self) -> Result<u64>;
}

/// Persistence seam for the per-entity checkpoint timestamps.
#[allow(async_fn_in_trait)]
pub trait CheckpointStore {
    /// Newest `updated_at` this device has fully reconciled, if any.
    async fn load(&self, entity: EntityKind) -> Result<Option<DateTime<Utc>>>;

    /// Persist a new checkpoint.
    async fn save(&self, entity: EntityKind, latest: DateTime<Utc>) -> Result<()>;

    /// Forget the checkpoint so the next pass starts from epoch.
    async fn clear(&self, entity: EntityKind) -> Result<()>;
}

/// What one entity's sync pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Records written to the server
    pub uploaded: usize,
    /// Records written to the local store
    pub saved: usize,
    /// Whether count verification forced a full resync
    pub full_resync: bool,
}

/// Outcome of [`sync_all`]. `None` means that entity's pass failed; the
/// failure was logged and the local data stays serveable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub categories: Option<SyncOutcome>,
    pub expenses: Option<SyncOutcome>,
}

struct PassStats {
    uploaded: usize,
    saved: usize,
}

/// Run one sync pass for categories.
pub async fn sync_categories<L, R, C>(local: &L, remote: &R, checkpoints: &C) -> Result<SyncOutcome>
where
    L: LocalRecords<Category>,
    R: RemoteRecords<Category>,
    C: CheckpointStore,
{
    let entity = EntityKind::Categories;
    let since = checkpoints
        .load(entity)
        .await?
        .unwrap_or(DateTime::UNIX_EPOCH);

    let stats = run_pass(entity, local, remote, checkpoints, since).await?;
    Ok(SyncOutcome {
        uploaded: stats.uploaded,
        saved: stats.saved,
        full_resync: false,
    })
}

/// Run one sync pass for expenses, then verify that the local and server
/// totals agree.
///
/// A count mismatch means the incremental window missed something (clock
/// skew, a lost delete); the checkpoint is cleared and the pass re-runs
/// once from epoch. One full resync per invocation: a mismatch that
/// survives it is logged and left for the next scheduled sync.
pub async fn sync_expenses<L, R, C>(local: &L, remote: &R, checkpoints: &C) -> Result<SyncOutcome>
where
    L: LocalRecords<Expense>,
    R: RemoteRecords<Expense>,
    C: CheckpointStore,
{
    let entity = EntityKind::Expenses;
    let since = checkpoints
        .load(entity)
        .await?
        .unwrap_or(DateTime::UNIX_EPOCH);

    let stats = run_pass(entity, local, remote, checkpoints, since).await?;
    let mut outcome = SyncOutcome {
        uploaded: stats.uploaded,
        saved: stats.saved,
        full_resync: false,
    };

    let (local_count, server_count) = tokio::try_join!(local.count(), remote.total_count())?;
    if local_count == server_count {
        return Ok(outcome);
    }

    tracing::warn!(
        local = local_count,
        server = server_count,
        "expense counts diverged, running full resync"
    );

    checkpoints.clear(entity).await?;
    let resync = run_pass(entity, local, remote, checkpoints, DateTime::UNIX_EPOCH).await?;
    outcome.uploaded += resync.uploaded;
    outcome.saved += resync.saved;
    outcome.full_resync = true;

    let (local_count, server_count) = tokio::try_join!(local.count(), remote.total_count())?;
    if local_count != server_count {
        tracing::warn!(
            local = local_count,
            server = server_count,
            "expense counts still diverged after full resync"
        );
    }

    Ok(outcome)
}

/// Sync both entity types concurrently.
///
/// This is the best-effort boundary: pass failures are logged and swallowed
/// here so the application keeps operating on its local data.
pub async fn sync_all<LC, LE, R, C>(
    categories: &LC,
    expenses: &LE,
    remote: &R,
    checkpoints: &C,
) -> SyncSummary
where
    LC: LocalRecords<Category>,
    LE: LocalRecords<Expense>,
    R: RemoteRecords<Category> + RemoteRecords<Expense>,
    C: CheckpointStore,
{
    let (categories_result, expenses_result) = tokio::join!(
        sync_categories(categories, remote, checkpoints),
        sync_expenses(expenses, remote, checkpoints),
    );

    SyncSummary {
        categories: swallow(EntityKind::Categories, categories_result),
        expenses: swallow(EntityKind::Expenses, expenses_result),
    }
}

fn swallow(entity: EntityKind, result: Result<SyncOutcome>) -> Option<SyncOutcome> {
    match result {
        Ok(outcome) => {
            tracing::debug!(
                entity = entity.as_str(),
                uploaded = outcome.uploaded,
                saved = outcome.saved,
                full_resync = outcome.full_resync,
                "sync pass completed"
            );
            Some(outcome)
        }
        Err(error) => {
            tracing::warn!(
                entity = entity.as_str(),
                %error,
                "sync pass failed, continuing on local data"
            );
            None
        }
    }
}

/// One fetch → resolve → upload → save → checkpoint cycle.
///
/// The checkpoint only moves after every upload and save succeeded, and
/// only when the resolution observed at least one record.
async fn run_pass<T, L, R, C>(
    entity: EntityKind,
    local: &L,
    remote: &R,
    checkpoints: &C,
    since: DateTime<Utc>,
) -> Result<PassStats>
where
    T: Syncable,
    L: LocalRecords<T>,
    R: RemoteRecords<T>,
    C: CheckpointStore,
{
    let (local_changes, server_changes) =
        tokio::try_join!(local.changed_since(since), download_changes(remote, since))?;

    tracing::debug!(
        entity = entity.as_str(),
        %since,
        local = local_changes.len(),
        server = server_changes.len(),
        "fetched change-sets"
    );

    let resolved = resolve_conflicts(&local_changes, &server_changes);

    if !resolved.to_upload.is_empty() {
        upload_in_batches(remote, &resolved.to_upload).await?;
    }
    if !resolved.to_save.is_empty() {
        local.bulk_upsert(&resolved.to_save).await?;
    }
    if let Some(latest) = resolved.latest_updated_at {
        checkpoints.save(entity, latest).await?;
    }

    Ok(PassStats {
        uploaded: resolved.to_upload.len(),
        saved: resolved.to_save.len(),
    })
}

/// Drain every server page newer than `since` into one change-set.
async fn download_changes<T, R>(remote: &R, since: DateTime<Utc>) -> Result<Vec<T>>
where
    T: Syncable,
    R: RemoteRecords<T>,
{
    let mut all_changes = Vec::new();
    let mut page = 1u32;

    loop {
        let batch = remote.fetch_modified_batch(page, since).await?;
        all_changes.extend(batch.data);

        if !batch.has_more {
            break;
        }
        page += 1;
    }

    Ok(all_changes)
}

/// Upload in [`SYNC_BATCH_SIZE`] chunks; each chunk is an independent
/// idempotent upsert request, so chunk order does not matter.
async fn upload_in_batches<T, R>(remote: &R, records: &[T]) -> Result<()>
where
    T: Syncable,
    R: RemoteRecords<T>,
{
    for chunk in records.chunks(SYNC_BATCH_SIZE) {
        remote.upload_batch(chunk).await?;
    }
    Ok(())
}
