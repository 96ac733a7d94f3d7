//! Category model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::now_millis;
use crate::sync::Syncable;

/// A unique identifier for a category, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(Uuid);

impl CategoryId {
    /// Create a new unique category ID using UUID v7
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

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CategoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named subdivision of a category.
///
/// Subcategories have no sync lifecycle of their own; they travel embedded
/// in their parent category document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    /// Unique identifier within the parent category
    pub id: String,
    /// Display name
    pub name: String,
}

impl Subcategory {
    /// Create a new subcategory with a fresh ID
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
        }
    }
}

/// A spending category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: CategoryId,
    /// Display name
    pub name: String,
    /// Icon identifier
    pub icon: String,
    /// Display color (hex)
    pub color: String,
    /// Ordered subcategories, synced as part of this document
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
    /// Creation timestamp, preserved across updates
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp; the last-writer-wins vector
    pub updated_at: DateTime<Utc>,
    /// Tombstone marker; set instead of physically deleting
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Category {
    /// Create a new category with the given name, icon, and color
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        icon: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: CategoryId::new(),
            name: name.into(),
            icon: icon.into(),
            color: color.into(),
            subcategories: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Bump `updated_at` so the change is picked up by the next sync pass
    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// Append a subcategory and bump `updated_at`
    pub fn add_subcategory(&mut self, name: impl Into<String>) {
        self.subcategories.push(Subcategory::new(name));
        self.touch();
    }

    /// Turn this category into a tombstone
    pub fn mark_deleted(&mut self) {
        let now = now_millis();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

impl Syncable for Category {
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
