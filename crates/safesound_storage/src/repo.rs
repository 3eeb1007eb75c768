#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use safesound_contracts::alert::{Alert, AlertCreateInput, AlertId, AlertStatus};
use safesound_contracts::user::{UserId, UserProfile};
use safesound_contracts::ContractViolation;
use serde::Serialize;

pub const DEFAULT_RECENT_LIMIT: usize = 50;
pub const MAX_RECENT_LIMIT: usize = 200;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("{table}: no row for {key}")]
    NotFound { table: &'static str, key: String },
    #[error("{table}: duplicate key {key}")]
    DuplicateKey { table: &'static str, key: String },
    #[error("{table}: {key} cannot move from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition {
        table: &'static str,
        key: String,
        from: AlertStatus,
        to: AlertStatus,
    },
    #[error("{table} unavailable: {detail}")]
    Unavailable { table: &'static str, detail: String },
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub active: u64,
    pub resolved: u64,
    pub dismissed: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertTypeStat {
    #[serde(rename = "type")]
    pub alert_type: String,
    pub count: u64,
    /// Mean confidence, rounded to the nearest integer.
    pub average_confidence: u8,
}

/// Typed repository interface for alert persistence.
pub trait AlertRepo {
    /// Assigns the id and `created_at`; every call creates a new row.
    fn create_alert(
        &mut self,
        input: AlertCreateInput,
        now: DateTime<Utc>,
    ) -> Result<Alert, StorageError>;
    fn alert(&self, id: AlertId) -> Option<&Alert>;
    /// Newest first, at most `min(limit, MAX_RECENT_LIMIT)` rows.
    fn list_recent(&self, limit: usize) -> Vec<&Alert>;
    fn update_status(
        &mut self,
        id: AlertId,
        target: AlertStatus,
        actor: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Alert, StorageError>;
    fn count_by_status(&self) -> StatusCounts;
    /// Sorted by count descending, then type ascending.
    fn aggregate_by_type(&self) -> Vec<AlertTypeStat>;
}

/// Typed repository interface for user/contact snapshots.
pub trait UserRepo {
    fn user(&self, id: &UserId) -> Option<&UserProfile>;
    fn insert_user(&mut self, user: UserProfile) -> Result<(), StorageError>;
    fn user_count(&self) -> usize;
}
