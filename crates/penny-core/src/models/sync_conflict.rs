//! Sync conflict model

use serde::{Deserialize, Serialize};

/// Recorded sync conflict resolved by strategy (e.g., LWW)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Conflict row identifier
    pub id: i64,
    /// Table the conflicting record lives in (`categories` or `expenses`)
    pub entity: String,
    /// Record involved in the conflict
    pub record_id: String,
    /// Existing row's timestamp when conflict occurred (unix ms)
    pub local_updated_at: i64,
    /// Incoming row's timestamp that was rejected (unix ms)
    pub incoming_updated_at: i64,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy name
    pub strategy: String,
}
