//! Notification status store
//!
//! Last known lifecycle state per notification id. Entries are created when a
//! request is admitted and are never removed.

use crate::error::{NotificationError, Result};
use fanout_shared::{NotificationStatus, StatusEntry};

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct StatusStore {
    entries: Arc<DashMap<String, StatusEntry>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, id: &str, status: NotificationStatus) {
        debug!(notification_id = %id, %status, "Status updated");
        self.entries.insert(
            id.to_string(),
            StatusEntry {
                status,
                updated_at: Utc::now(),
            },
        );
    }

    /// Move to `status` only if the current state is `expected`.
    ///
    /// Returns whether the transition happened.
    pub fn transition(
        &self,
        id: &str,
        expected: NotificationStatus,
        status: NotificationStatus,
    ) -> bool {
        match self.entries.get_mut(id) {
            Some(mut entry) if entry.status == expected => {
                entry.status = status;
                entry.updated_at = Utc::now();
                debug!(notification_id = %id, from = %expected, to = %status, "Status transition");
                true
            }
            _ => false,
        }
    }

    pub fn get_status(&self, id: &str) -> Result<NotificationStatus> {
        self.get_entry(id).map(|entry| entry.status)
    }

    pub fn get_entry(&self, id: &str) -> Result<StatusEntry> {
        self.entries
            .get(id)
            .map(|entry| *entry.value())
            .ok_or_else(|| NotificationError::not_found(format!("notification {}", id)))
    }

    /// Number of notifications currently in `status`
    pub fn count_with_status(&self, status: NotificationStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().status == status)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
