//! Core Monitoring Types
//!
//! Shared data carried between the registry, the sweep coordinator and the
//! transition engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

pub type TargetId = Uuid;
pub type OwnerId = i64;

/// A monitored hostname owned by one user.
///
/// Unique per (owner_id, hostname). Immutable after registration; removal is
/// the only mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub owner_id: OwnerId,
    pub hostname: String,
    pub created_at: DateTime<Utc>,
}

impl Target {
    pub fn new(owner_id: OwnerId, hostname: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            hostname,
            created_at: Utc::now(),
        }
    }
}

/// One of the three independent health aspects checked per target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckDimension {
    Reachability,
    Certificate,
    Registration,
}

impl CheckDimension {
    pub const ALL: [CheckDimension; 3] = [
        CheckDimension::Reachability,
        CheckDimension::Certificate,
        CheckDimension::Registration,
    ];
}

/// Dimension status, unified across dimensions so the engine stays agnostic
/// to which checker produced it.
///
/// Reachability emits Up/Down, the two expiry dimensions emit
/// Valid/ExpiringSoon/Expired. Unknown means "could not determine status"
/// and is distinct from every confirmed negative result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Up,
    Down,
    Valid,
    ExpiringSoon,
    Expired,
    Unknown,
}

/// What a checker produced for one hostname, before the sweep stamps it with
/// target identity and observation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: HealthStatus,
    pub detail: String,
}

impl CheckResult {
    pub fn new(status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

/// One (target, dimension) observation produced by a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub target_id: TargetId,
    pub dimension: CheckDimension,
    pub status: HealthStatus,
    pub observed_at: DateTime<Utc>,
    pub detail: String,
}

/// Last-known state per (target, dimension).
///
/// `last_notified_status` is the comparison baseline for notifications and is
/// deliberately separate from `last_status`: what we last measured is not the
/// same thing as what we last told the user. Unknown observations update
/// `last_status` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    pub last_status: HealthStatus,
    pub last_observed_at: DateTime<Utc>,
    pub last_notified_status: Option<HealthStatus>,
}

/// A notification-worthy change, handed to the notifier dispatcher.
/// Ephemeral; not persisted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionEvent {
    pub target_id: TargetId,
    pub owner_id: OwnerId,
    pub hostname: String,
    pub dimension: CheckDimension,
    pub previous_status: Option<HealthStatus>,
    pub new_status: HealthStatus,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(HealthStatus::ExpiringSoon.to_string(), "expiring_soon");
        assert_eq!(HealthStatus::Up.to_string(), "up");
        assert_eq!(CheckDimension::Registration.to_string(), "registration");
    }

    #[test]
    fn test_dimension_all_is_exhaustive() {
        assert_eq!(CheckDimension::ALL.len(), 3);
    }
}
