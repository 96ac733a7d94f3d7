//! Last-writer-wins merge of a local and a server change-set.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Syncable;

/// Outcome of merging a local and a server change-set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChanges<T> {
    /// Records whose local version is authoritative; write to the server.
    pub to_upload: Vec<T>,
    /// Records whose server version is authoritative or unseen locally;
    /// write to the local store.
    pub to_save: Vec<T>,
    /// Newest `updated_at` across both change-sets; `None` when both were empty.
    pub latest_updated_at: Option<DateTime<Utc>>,
}

/// Merge two unordered change-sets of the same entity type.
///
/// Per record id the greater `updated_at` wins; equal timestamps resolve
/// toward the server copy. Server records the local list never mentioned
/// are saved unconditionally. Duplicate ids within one list are out of
/// contract.
///
/// Pure and deterministic; wall-clock timestamps are the only vector, so a
/// device with a skewed clock can make an older edit win.
pub fn resolve_conflicts<T: Syncable>(local: &[T], server: &[T]) -> ResolvedChanges<T> {
    let server_by_id: HashMap<Uuid, &T> = server
        .iter()
        .map(|record| (record.record_id(), record))
        .collect();

    let mut to_upload = Vec::new();
    let mut to_save = Vec::new();
    let mut processed: HashSet<Uuid> = HashSet::new();
    let mut latest_updated_at: Option<DateTime<Utc>> = None;

    for local_record in local {
        observe(&mut latest_updated_at, local_record.updated_at());

        match server_by_id.get(&local_record.record_id()) {
            None => to_upload.push(local_record.clone()),
            Some(server_record) => {
                observe(&mut latest_updated_at, server_record.updated_at());

                if local_record.updated_at() > server_record.updated_at() {
                    to_upload.push(local_record.clone());
                } else {
                    to_save.push((*server_record).clone());
                }
                processed.insert(local_record.record_id());
            }
        }
    }

    for server_record in server {
        if processed.contains(&server_record.record_id()) {
            continue;
        }
        observe(&mut latest_updated_at, server_record.updated_at());
        to_save.push(server_record.clone());
    }

    ResolvedChanges {
        to_upload,
        to_save,
        latest_updated_at,
    }
}

fn observe(latest: &mut Option<DateTime<Utc>>, seen: DateTime<Utc>) {
    if latest.is_none_or(|current| seen > current) {
        *latest = Some(seen);
    }
}
