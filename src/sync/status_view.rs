//! Sync status view model for the presentation layer.

use serde::Serialize;
use std::sync::Arc;

use super::coordinator::{Subscription, SyncCoordinator, SyncError, SyncOutcome, SyncStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub pending_count: usize,
    pub is_online: bool,
}

/// The only sync surface the UI depends on.
#[derive(Clone)]
pub struct SyncStatusView {
    coordinator: Arc<SyncCoordinator>,
}

impl SyncStatusView {
    pub fn new(coordinator: Arc<SyncCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            status: self.coordinator.status(),
            pending_count: self.coordinator.pending_count(),
            is_online: self.coordinator.is_online(),
        }
    }

    /// Re-reads the pending count before taking a snapshot.
    pub async fn refresh(&self) -> Result<SyncSnapshot, SyncError> {
        self.coordinator.refresh_pending_count().await?;
        Ok(self.snapshot())
    }

    /// Emits `(status, pending_count)` immediately, then on every change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(SyncStatus, usize) + Send + Sync + 'static,
    {
        self.coordinator.subscribe(listener)
    }

    pub fn is_online(&self) -> bool {
        self.coordinator.is_online()
    }

    /// Manual sync trigger.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.coordinator.sync().await
    }
}
