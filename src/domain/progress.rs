//! Progress reporting shared by the catalog builder and the scanner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a long-running operation.
///
/// Hosts that subscribe late pull this instead of replaying every
/// callback they missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Operation still in flight
    pub running: bool,

    /// Operation finished (successfully or not)
    pub completed: bool,

    /// Current step or item index
    pub current: usize,

    /// Total steps or items
    pub total: usize,

    /// Human-readable description of the current step
    pub message: String,

    /// When this snapshot was taken
    pub updated_at: DateTime<Utc>,
}

impl ProgressSnapshot {
    /// Snapshot of a running operation
    pub fn running(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            running: true,
            completed: false,
            current,
            total,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    /// Snapshot of a finished operation
    pub fn finished(total: usize, message: impl Into<String>) -> Self {
        Self {
            running: false,
            completed: true,
            current: total,
            total,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }
}
